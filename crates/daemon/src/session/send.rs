//! Outbound send pipeline.
//!
//! Validates a pending send, qualifies the target address, and turns the
//! host-supplied text/attachment pair into a transport payload. The manager
//! composes these steps with the connection-state check and the actual
//! dispatch; everything here is pure and synchronous.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use transport::{OutboundPayload, PLATFORM_DOMAIN};

/// Errors surfaced by `send`.
///
/// Returned to the caller as a structured result; none of these cross the
/// host boundary as a failure of the call itself.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendError {
    /// The session is not open; the link was not touched.
    #[error("not connected")]
    NotConnected,

    /// The target is empty after trimming.
    #[error("invalid target")]
    InvalidTarget,

    /// No attachment and no usable text.
    #[error("empty message")]
    EmptyMessage,

    /// Attachment decode or transport dispatch failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// An attachment as supplied by the host, payload still base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Base64-encoded payload bytes.
    pub data: String,

    /// MIME type, e.g. `image/png` or `application/pdf`.
    pub mime_type: String,

    /// Suggested filename, carried through for document attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Validate and qualify a target address.
///
/// Bare targets get the platform domain appended; targets that already
/// carry a domain pass through unchanged.
pub fn normalize_target(target: &str) -> Result<String, SendError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(SendError::InvalidTarget);
    }

    if trimmed.contains('@') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}@{}", trimmed, PLATFORM_DOMAIN))
    }
}

/// Build the transport payload for one send.
///
/// With an attachment, the payload is classified by MIME prefix: `image/`
/// types go inline as an image, everything else as a named document with
/// filename and MIME type carried through. The text becomes the caption
/// either way. Without an attachment the text itself is the message and
/// must be non-blank.
pub fn build_payload(
    text: Option<&str>,
    attachment: Option<&Attachment>,
) -> Result<OutboundPayload, SendError> {
    match attachment {
        Some(attachment) => {
            let bytes = BASE64
                .decode(attachment.data.as_bytes())
                .map_err(|e| SendError::SendFailed(format!("attachment decode: {}", e)))?;
            let caption = text.filter(|t| !t.is_empty()).map(str::to_string);

            if attachment.mime_type.starts_with("image/") {
                Ok(OutboundPayload::Image { bytes, caption })
            } else {
                Ok(OutboundPayload::Document {
                    bytes,
                    filename: attachment.filename.clone(),
                    mime_type: attachment.mime_type.clone(),
                    caption,
                })
            }
        }
        None => {
            let text = text.unwrap_or_default();
            if text.trim().is_empty() {
                return Err(SendError::EmptyMessage);
            }
            Ok(OutboundPayload::Text {
                body: text.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_attachment() -> Attachment {
        Attachment {
            data: BASE64.encode(b"fake png bytes"),
            mime_type: "image/png".to_string(),
            filename: None,
        }
    }

    fn pdf_attachment() -> Attachment {
        Attachment {
            data: BASE64.encode(b"fake pdf bytes"),
            mime_type: "application/pdf".to_string(),
            filename: Some("report.pdf".to_string()),
        }
    }

    #[test]
    fn test_normalize_bare_target_gets_domain() {
        assert_eq!(
            normalize_target("5511987654321").unwrap(),
            "5511987654321@s.iris.net"
        );
    }

    #[test]
    fn test_normalize_keeps_existing_domain() {
        assert_eq!(
            normalize_target("5511987654321@s.iris.net").unwrap(),
            "5511987654321@s.iris.net"
        );
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        assert_eq!(normalize_target("  123  ").unwrap(), "123@s.iris.net");
    }

    #[test]
    fn test_normalize_empty_target() {
        assert_eq!(normalize_target(""), Err(SendError::InvalidTarget));
        assert_eq!(normalize_target("   "), Err(SendError::InvalidTarget));
    }

    #[test]
    fn test_text_payload() {
        let payload = build_payload(Some("hello"), None).unwrap();
        assert_eq!(
            payload,
            OutboundPayload::Text {
                body: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_text_preserves_inner_whitespace() {
        // Trimming is only for the emptiness check, not the body.
        let payload = build_payload(Some(" hello "), None).unwrap();
        assert_eq!(
            payload,
            OutboundPayload::Text {
                body: " hello ".to_string()
            }
        );
    }

    #[test]
    fn test_empty_text_without_attachment() {
        assert_eq!(build_payload(None, None), Err(SendError::EmptyMessage));
        assert_eq!(build_payload(Some(""), None), Err(SendError::EmptyMessage));
        assert_eq!(build_payload(Some("   "), None), Err(SendError::EmptyMessage));
    }

    #[test]
    fn test_image_attachment_with_caption() {
        let payload = build_payload(Some("a picture"), Some(&png_attachment())).unwrap();
        match payload {
            OutboundPayload::Image { bytes, caption } => {
                assert_eq!(bytes, b"fake png bytes");
                assert_eq!(caption.as_deref(), Some("a picture"));
            }
            other => panic!("expected image payload, got {:?}", other),
        }
    }

    #[test]
    fn test_image_attachment_without_caption() {
        let payload = build_payload(None, Some(&png_attachment())).unwrap();
        match payload {
            OutboundPayload::Image { caption, .. } => assert_eq!(caption, None),
            other => panic!("expected image payload, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_caption_becomes_none() {
        let payload = build_payload(Some(""), Some(&png_attachment())).unwrap();
        match payload {
            OutboundPayload::Image { caption, .. } => assert_eq!(caption, None),
            other => panic!("expected image payload, got {:?}", other),
        }
    }

    #[test]
    fn test_document_attachment_carries_fields() {
        let payload = build_payload(Some("quarterly numbers"), Some(&pdf_attachment())).unwrap();
        match payload {
            OutboundPayload::Document {
                bytes,
                filename,
                mime_type,
                caption,
            } => {
                assert_eq!(bytes, b"fake pdf bytes");
                assert_eq!(filename.as_deref(), Some("report.pdf"));
                assert_eq!(mime_type, "application/pdf");
                assert_eq!(caption.as_deref(), Some("quarterly numbers"));
            }
            other => panic!("expected document payload, got {:?}", other),
        }
    }

    #[test]
    fn test_non_image_mime_is_document() {
        // Only the image/ prefix selects the inline path.
        let attachment = Attachment {
            data: BASE64.encode(b"bytes"),
            mime_type: "imagination/vivid".to_string(),
            filename: None,
        };
        let payload = build_payload(None, Some(&attachment)).unwrap();
        assert!(matches!(payload, OutboundPayload::Document { .. }));
    }

    #[test]
    fn test_attachment_decode_failure() {
        let attachment = Attachment {
            data: "not base64 !!!".to_string(),
            mime_type: "image/png".to_string(),
            filename: None,
        };
        let err = build_payload(None, Some(&attachment)).unwrap_err();
        assert!(matches!(err, SendError::SendFailed(_)));
    }

    #[test]
    fn test_attachment_beats_empty_text() {
        // An attachment with no text is a valid send.
        let payload = build_payload(None, Some(&pdf_attachment()));
        assert!(payload.is_ok());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(SendError::NotConnected.to_string(), "not connected");
        assert_eq!(SendError::InvalidTarget.to_string(), "invalid target");
        assert_eq!(SendError::EmptyMessage.to_string(), "empty message");
        assert_eq!(
            SendError::SendFailed("boom".to_string()).to_string(),
            "send failed: boom"
        );
    }

    #[test]
    fn test_error_serde_renames() {
        let json = serde_json::to_string(&SendError::NotConnected).unwrap();
        assert_eq!(json, "\"not_connected\"");
        let json = serde_json::to_string(&SendError::SendFailed("boom".to_string())).unwrap();
        assert_eq!(json, "{\"send_failed\":\"boom\"}");

        let err: SendError = serde_json::from_str("\"empty_message\"").unwrap();
        assert_eq!(err, SendError::EmptyMessage);
    }
}
