//! Error types for mailblast.

use thiserror::Error;

/// Errors that can occur while preparing or delivering mail.
///
/// The bulk orchestrator uses [`SendError::is_fatal`] to decide whether a
/// per-recipient failure aborts the whole job or is recorded and skipped.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// Configuration error (bad credential shape, disabled feature, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required field (e.g., recipients, subject).
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Bearer token rejected by the mailbox API (HTTP 401).
    ///
    /// Recoverable only by the caller re-authenticating; never retried here.
    #[error("Mailbox access expired; re-authenticate with the provider")]
    AuthExpired,

    /// The provider's send API is not enabled for the OAuth project.
    ///
    /// Permanent configuration fault: every subsequent send in the job would
    /// fail the same way, so this aborts the batch.
    #[error("Mailbox API is not enabled for project {project_id}")]
    ApiNotEnabled {
        project_id: String,
        /// Console URL where the API can be enabled.
        setup_url: String,
    },

    /// Provider send quota or rate limit exceeded.
    #[error("Mailbox API quota exceeded")]
    QuotaExceeded,

    /// The bearer token lacks the scope needed to send.
    #[error("Insufficient mailbox permissions")]
    InsufficientPermissions,

    /// SMTP relay rejected the username/secret.
    #[error("Relay authentication failed: {0}")]
    AuthFailed(String),

    /// Could not reach the SMTP relay.
    #[error("Relay connection failed: {0}")]
    ConnectionFailed(String),

    /// A transport call timed out.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// DKIM signing failed (bad key, selector, or domain).
    #[error("DKIM signing failed: {0}")]
    Dkim(String),

    /// Error building the outgoing message.
    #[error("Build error: {0}")]
    BuildError(String),

    /// Error sending the message (unclassified transport failure).
    #[error("Send error: {0}")]
    SendFailed(String),

    /// Transport-specific error with details.
    #[error("Transport error ({transport}): {message}")]
    Transport {
        transport: &'static str,
        message: String,
        /// Optional HTTP status code
        status: Option<u16>,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
}

impl SendError {
    /// Create a transport-specific error.
    pub fn transport(transport: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            transport,
            message: message.into(),
            status: None,
        }
    }

    /// Create a transport error with HTTP status.
    pub fn transport_with_status(
        transport: &'static str,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::Transport {
            transport,
            message: message.into(),
            status: Some(status),
        }
    }

    /// Whether this error invalidates every remaining recipient in a job.
    ///
    /// Only permanent provider configuration faults qualify; auth expiry and
    /// quota errors stay on the recorded-and-continue path.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ApiNotEnabled { .. })
    }

    /// A remediation hint for the caller, when one is known.
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::ApiNotEnabled { setup_url, .. } => Some(format!(
                "Enable the mailbox API for this project, then try again: {setup_url}"
            )),
            Self::AuthExpired => {
                Some("Sign in with the provider again to refresh mailbox access.".to_string())
            }
            Self::QuotaExceeded => Some(
                "Wait a few minutes before retrying, or review the project's API quotas."
                    .to_string(),
            ),
            Self::InsufficientPermissions => {
                Some("Sign in again and grant mail-sending permission when prompted.".to_string())
            }
            Self::AuthFailed(_) => Some("Check the relay username and password.".to_string()),
            Self::ConnectionFailed(_) => Some("Check the relay host and port settings.".to_string()),
            Self::Dkim(_) => Some("Check the DKIM domain, selector, and private key.".to_string()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

#[cfg(feature = "relay")]
impl From<lettre::error::Error> for SendError {
    fn from(err: lettre::error::Error) -> Self {
        Self::BuildError(err.to_string())
    }
}

#[cfg(feature = "relay")]
impl From<lettre::address::AddressError> for SendError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}
