//! Pairing artifact rendering
//!
//! The pairing code is encoded as a QR symbol and shipped as an SVG data URL,
//! so consumers can show a scannable image without another round trip.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use qrcode::render::svg;
use qrcode::QrCode;
use serde::Serialize;

/// A pairing code plus its transportable rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingArtifact {
    pub code: String,
    /// `data:image/svg+xml;base64,...`, absent when the code does not fit a QR symbol
    pub image: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl PairingArtifact {
    #[must_use]
    pub fn render(code: &str) -> Self {
        let image = match QrCode::new(code.as_bytes()) {
            Ok(qr) => {
                let svg = qr
                    .render::<svg::Color<'_>>()
                    .min_dimensions(256, 256)
                    .build();
                Some(format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg)))
            }
            Err(e) => {
                tracing::warn!(error = %e, len = code.len(), "Pairing code cannot be rendered as QR");
                None
            }
        };

        Self {
            code: code.to_string(),
            image,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded_svg(artifact: &PairingArtifact) -> String {
        let encoded = artifact
            .image
            .as_deref()
            .unwrap()
            .strip_prefix("data:image/svg+xml;base64,")
            .unwrap();
        String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap()
    }

    #[test]
    fn test_render_produces_qr_matrix() {
        let artifact = PairingArtifact::render("2@abc<def>,key==,id==");
        assert_eq!(artifact.code, "2@abc<def>,key==,id==");

        let svg = decoded_svg(&artifact);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("<path"));
        assert!(!svg.contains("<text"));
        assert!(!svg.contains("abc"));
    }

    #[test]
    fn test_distinct_codes_render_distinct_symbols() {
        let a = decoded_svg(&PairingArtifact::render("2@first"));
        let b = decoded_svg(&PairingArtifact::render("2@second"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_oversized_code_keeps_text_without_image() {
        let code = "X".repeat(8000);
        let artifact = PairingArtifact::render(&code);
        assert_eq!(artifact.code, code);
        assert!(artifact.image.is_none());
    }
}
