//! # Mailblast
//!
//! Personalized bulk email delivery: template resolution, inline image
//! handling, and background dispatch over a mailbox API or an SMTP relay.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mailblast::{Address, BulkMailer, BulkRequest, Recipient, TransportCredential};
//!
//! let mailer = BulkMailer::new();
//!
//! let request = BulkRequest {
//!     recipients: vec![
//!         Recipient::new()
//!             .field("email", "ana@example.com")
//!             .field("name", "Ana"),
//!     ],
//!     subject: "Hello {{name}}".into(),
//!     body_html: "<p>Hi {{name}}, welcome aboard.</p>".into(),
//!     cc: None,
//!     bcc: None,
//! };
//!
//! let credential = TransportCredential::Api {
//!     bearer_token: token,
//!     sender: Address::with_name("Ana's Team", "team@example.com"),
//! };
//!
//! let job_id = mailer.start_job("user-42", request, credential)?;
//!
//! // Later, from anywhere holding the mailer:
//! if let Some(progress) = mailer.progress("user-42", &job_id) {
//!     println!("{}/{} sent", progress.sent, progress.total);
//! }
//! ```
//!
//! Jobs run on detached tasks; [`BulkMailer::progress`] and
//! [`BulkMailer::cancel`] observe and control them through the shared
//! [`JobLedger`].
//!
//! ## Templates
//!
//! `{{key}}` placeholders resolve against each recipient's fields with a
//! tolerant lookup: exact match first, then case variants, then a normalized
//! comparison that ignores underscores, hyphens, and spaces. Unmatched
//! placeholders are kept verbatim so a typo is visible in the delivered mail
//! instead of silently vanishing.
//!
//! ## Feature Flags
//!
//! - `api` - mailbox REST API transport via reqwest (default)
//! - `relay` - SMTP relay transport via lettre, with DKIM signing (default)

/// Version of the mailblast crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod bulk;
mod encode;
mod error;
mod inline;
mod job;
mod message;
mod recipient;
mod template;
pub mod transport;

pub use address::Address;
pub use bulk::{BulkMailer, BulkRequest};
pub use encode::{build_raw, decode_raw, encode_raw, wrap_html, DEFAULT_SUBJECT};
pub use error::SendError;
pub use inline::{
    fetch_inline_parts, normalize_image_host, rewrite_by_content_type, rewrite_images,
};
pub use job::{JobLedger, JobRecord, JobStatus, RecipientOutcome};
pub use message::{InlinePart, MessageSpec, SendOutcome};
pub use recipient::{Recipient, SENTINEL_ADDRESS};
pub use template::render;
pub use transport::{DomainSigning, Transport, TransportCredential};

/// Convenience re-exports for the common path.
pub mod prelude {
    pub use crate::Address;
    pub use crate::BulkMailer;
    pub use crate::BulkRequest;
    pub use crate::JobStatus;
    pub use crate::Recipient;
    pub use crate::SendError;
    pub use crate::Transport;
    pub use crate::TransportCredential;
}
