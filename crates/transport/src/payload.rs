//! Outbound message payloads.

use serde::{Deserialize, Serialize};

/// A fully prepared outbound message, ready for the wire.
///
/// The session core builds these from caller input; the link serializes
/// them into whatever the platform protocol requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundPayload {
    /// A plain text message.
    Text {
        /// Message body.
        body: String,
    },
    /// An inline image, rendered in the conversation.
    Image {
        /// Raw image bytes.
        bytes: Vec<u8>,
        /// Caption shown under the image.
        caption: Option<String>,
    },
    /// A named document delivered as a file.
    Document {
        /// Raw document bytes.
        bytes: Vec<u8>,
        /// File name shown to the recipient.
        filename: Option<String>,
        /// MIME type, carried through unchanged.
        mime_type: String,
        /// Caption shown with the document.
        caption: Option<String>,
    },
}

impl OutboundPayload {
    /// Human-readable payload kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundPayload::Text { .. } => "text",
            OutboundPayload::Image { .. } => "image",
            OutboundPayload::Document { .. } => "document",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_kinds() {
        let text = OutboundPayload::Text {
            body: "hi".to_string(),
        };
        let image = OutboundPayload::Image {
            bytes: vec![1, 2, 3],
            caption: None,
        };
        let document = OutboundPayload::Document {
            bytes: vec![4, 5],
            filename: Some("report.pdf".to_string()),
            mime_type: "application/pdf".to_string(),
            caption: Some("Q3 report".to_string()),
        };
        assert_eq!(text.kind(), "text");
        assert_eq!(image.kind(), "image");
        assert_eq!(document.kind(), "document");
    }

    #[test]
    fn test_document_json_round_trip() {
        let payload = OutboundPayload::Document {
            bytes: vec![0x25, 0x50, 0x44, 0x46],
            filename: Some("invoice.pdf".to_string()),
            mime_type: "application/pdf".to_string(),
            caption: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: OutboundPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
