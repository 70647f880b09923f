//! Protocol events - what an open protocol session reports back to the gateway

use super::{Credentials, InboundMessage};

/// Connection-state change reported by the protocol layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Open,
    /// Socket closed with a protocol reason code
    Closed(u16),
}

/// Events emitted by an open protocol session, in emission order
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// A pairing code must be shown to the account owner
    PairingCodeNeeded(String),
    StateChanged(StateChange),
    MessageReceived(InboundMessage),
    /// The protocol learned the external address behind an opaque identifier
    IdentityHint {
        opaque_id: String,
        external_address: String,
    },
    /// Auth state or key material changed and must be persisted
    CredentialsUpdated(Credentials),
}

impl ProtocolEvent {
    /// Event name for logging
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PairingCodeNeeded(_) => "pairing_code_needed",
            Self::StateChanged(StateChange::Open) => "state_open",
            Self::StateChanged(StateChange::Closed(_)) => "state_closed",
            Self::MessageReceived(_) => "message_received",
            Self::IdentityHint { .. } => "identity_hint",
            Self::CredentialsUpdated(_) => "credentials_updated",
        }
    }
}
