//! In-memory fakes for the protocol, webhook transport and persistence tiers
//!
//! Compiled for unit tests and behind the `test-util` feature for downstream
//! test crates.

mod connector;
mod persistence;
mod transport;

pub use connector::{FakeConnector, FakeHandle, FakeSocket};
pub use persistence::{MemoryCredentialSource, MemoryRecordSource};
pub use transport::RecordingTransport;

/// Let spawned tasks run until they park
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
