//! Disconnect reason codes
//!
//! Maps the reason code carried by a socket close onto the three ways a session
//! reacts to it.

use std::fmt;

/// How a session reacts to a socket close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseClass {
    /// Credentials are no longer valid: wipe them and stay disconnected
    Fatal,
    /// The pairing code timed out: wipe credentials and reconnect at once
    PairingExpired,
    /// Network-level failure: reconnect with backoff
    Transient,
}

/// Known disconnect reason codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum DisconnectReason {
    /// Account logged out from the device
    LoggedOut = 401,
    /// Account banned or access revoked
    Forbidden = 403,
    /// Connection lost or timed out
    ConnectionLost = 408,
    /// Pairing code was never confirmed
    PairingExpired = 410,
    /// Device list no longer matches the credentials
    MultideviceMismatch = 411,
    /// Server closed the stream
    ConnectionClosed = 428,
    /// Another client took over the session
    ConnectionReplaced = 440,
    /// Stored session state is corrupt
    BadSession = 500,
    /// Service temporarily unavailable
    UnavailableService = 503,
    /// Server asked for a fresh socket
    RestartRequired = 515,
}

impl DisconnectReason {
    /// Create a `DisconnectReason` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            401 => Some(Self::LoggedOut),
            403 => Some(Self::Forbidden),
            408 => Some(Self::ConnectionLost),
            410 => Some(Self::PairingExpired),
            411 => Some(Self::MultideviceMismatch),
            428 => Some(Self::ConnectionClosed),
            440 => Some(Self::ConnectionReplaced),
            500 => Some(Self::BadSession),
            503 => Some(Self::UnavailableService),
            515 => Some(Self::RestartRequired),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    #[must_use]
    pub const fn class(self) -> CloseClass {
        match self {
            Self::LoggedOut | Self::Forbidden | Self::MultideviceMismatch | Self::BadSession => {
                CloseClass::Fatal
            }
            Self::PairingExpired => CloseClass::PairingExpired,
            Self::ConnectionLost
            | Self::ConnectionClosed
            | Self::ConnectionReplaced
            | Self::UnavailableService
            | Self::RestartRequired => CloseClass::Transient,
        }
    }

    /// Classify a raw code; unknown codes are treated as transient
    #[must_use]
    pub fn classify(code: u16) -> CloseClass {
        Self::from_u16(code).map_or(CloseClass::Transient, Self::class)
    }

    /// Get the description for this reason
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::LoggedOut => "Logged out",
            Self::Forbidden => "Access forbidden",
            Self::ConnectionLost => "Connection lost",
            Self::PairingExpired => "Pairing code expired",
            Self::MultideviceMismatch => "Multi-device mismatch",
            Self::ConnectionClosed => "Connection closed",
            Self::ConnectionReplaced => "Connection replaced",
            Self::BadSession => "Bad session",
            Self::UnavailableService => "Service unavailable",
            Self::RestartRequired => "Restart required",
        }
    }

    /// Human-readable reason for any raw code, used in status events
    #[must_use]
    pub fn describe(code: u16) -> String {
        match Self::from_u16(code) {
            Some(reason) => reason.to_string(),
            None => format!("Unknown ({code})"),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<DisconnectReason> for u16 {
    fn from(reason: DisconnectReason) -> Self {
        reason.as_u16()
    }
}
