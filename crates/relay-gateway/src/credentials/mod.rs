//! Tiered credential persistence
//!
//! Reads prefer the remote tier, then the cache, then local disk. Writes land on
//! local disk first and are mirrored to the other tiers in the background.

mod disk;
mod store;

pub use disk::LocalDiskCredentialSource;
pub use store::CredentialStore;
