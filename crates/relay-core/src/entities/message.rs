//! Message entities - the routing-relevant parts of inbound and outbound messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media attached to an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMedia {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub file_name: Option<String>,
}

/// A message received from the protocol layer
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Protocol-assigned message ID (dedup identity)
    pub message_id: String,
    /// Sender address as reported by the protocol
    pub sender: String,
    /// Whether `sender` is an opaque routable identifier that needs resolution
    pub sender_is_opaque: bool,
    /// Alternate stable address carried on the event itself, if any
    pub sender_alt: Option<String>,
    /// Display name supplied by the sender
    pub push_name: Option<String>,
    pub text: Option<String>,
    pub media: Option<InboundMedia>,
    pub from_me: bool,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Create a plain text message from a stable sender address
    pub fn text(
        message_id: impl Into<String>,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            sender: sender.into(),
            sender_is_opaque: false,
            sender_alt: None,
            push_name: None,
            text: Some(text.into()),
            media: None,
            from_me: false,
            timestamp: Utc::now(),
        }
    }

    /// Mark the sender as an opaque identifier
    #[must_use]
    pub fn with_opaque_sender(mut self, alt: Option<String>) -> Self {
        self.sender_is_opaque = true;
        self.sender_alt = alt;
        self
    }

    /// Attach media
    #[must_use]
    pub fn with_media(mut self, media: InboundMedia) -> Self {
        self.media = Some(media);
        self
    }
}

/// Content of an outbound send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundContent {
    Text {
        text: String,
    },
    Media {
        mime_type: String,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
    },
    Reaction {
        message_id: String,
        emoji: String,
    },
}

impl OutboundContent {
    /// Short name used in logs and webhook payloads
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Media { .. } => "media",
            Self::Reaction { .. } => "reaction",
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        STANDARD.decode(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_media_encodes_base64() {
        let content = OutboundContent::Media {
            mime_type: "image/png".to_string(),
            data: vec![1, 2, 3],
            caption: None,
            file_name: None,
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "media");
        assert_eq!(json["data"], "AQID");
        assert_eq!(content.kind(), "media");
    }

    #[test]
    fn test_opaque_sender_builder() {
        let msg = InboundMessage::text("m1", "123@lid", "hi")
            .with_opaque_sender(Some("555@s.whatsapp.net".to_string()));
        assert!(msg.sender_is_opaque);
        assert_eq!(msg.sender_alt.as_deref(), Some("555@s.whatsapp.net"));
    }
}
