//! Protocol-level definitions
//!
//! Disconnect reason codes and the placeholder connector used when no protocol
//! backend is linked into the binary.

mod reason_codes;
mod unlinked;

pub use reason_codes::{CloseClass, DisconnectReason};
pub use unlinked::UnlinkedConnector;
