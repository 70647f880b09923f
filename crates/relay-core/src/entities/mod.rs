//! Domain entities - core business objects

mod credentials;
mod message;
mod protocol_event;
mod session_record;

pub use credentials::Credentials;
pub use message::{InboundMedia, InboundMessage, OutboundContent};
pub use protocol_event::{ProtocolEvent, StateChange};
pub use session_record::{SessionRecord, SessionStatus};
