//! Personalized, transport-agnostic message forms.

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// A remote image fetched for embedding as a content-addressed MIME part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlinePart {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Sniffed or inferred MIME type (e.g., "image/png").
    pub content_type: String,
    /// Unique content id referenced from the HTML as `cid:<id>`.
    pub content_id: String,
    /// Filename derived from the source URL.
    pub filename: String,
}

impl InlinePart {
    /// Base64-encode the image bytes for a MIME body part.
    pub fn base64_data(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// The fully personalized intermediate form handed to a transport.
///
/// Subject, body, and CC/BCC have already been resolved against one
/// recipient; `html` has been through image rewriting and, for the API
/// transport, cid substitution matching `inline_parts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSpec {
    /// Sender identity.
    pub from: Address,
    /// The single recipient address for this message.
    pub to: String,
    /// Resolved CC header value; `None` when blank after trimming.
    pub cc: Option<String>,
    /// Resolved BCC header value; `None` when blank after trimming.
    pub bcc: Option<String>,
    /// Resolved subject (may be empty; encoders default it).
    pub subject: String,
    /// Resolved HTML body, not yet wrapped in the style shell.
    pub html: String,
    /// Inline images collected for this message.
    pub inline_parts: Vec<InlinePart>,
}

impl MessageSpec {
    /// Create a spec with no CC/BCC or inline parts.
    pub fn new(
        from: Address,
        to: impl Into<String>,
        subject: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            from,
            to: to.into(),
            cc: None,
            bcc: None,
            subject: subject.into(),
            html: html.into(),
            inline_parts: Vec::new(),
        }
    }
}

/// Result of one successful delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    /// Message ID assigned by the transport or provider.
    pub message_id: String,
}

impl SendOutcome {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
        }
    }
}

/// Normalize a CC/BCC template result: blank after trim becomes `None` so
/// the header is omitted entirely instead of emitted empty.
pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
