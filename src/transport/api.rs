//! Mailbox API transport: bearer-token raw sends.
//!
//! Submits the base64url multipart document to the provider's send endpoint.
//! Error classification prefers the provider's structured error reasons; the
//! message-text regex only runs as a last resort, since vendor message text
//! can change between releases.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::address::Address;
use crate::encode;
use crate::error::SendError;
use crate::message::{MessageSpec, SendOutcome};
use crate::transport::Transport;

const API_BASE_URL: &str = "https://gmail.googleapis.com";
const SEND_PATH: &str = "/gmail/v1/users/me/messages/send";

/// Matches the provider's "API has not been used in project … Enable it by
/// visiting …" message and captures the project id and setup URL.
fn api_not_enabled_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"Gmail API has not been used in project (\d+) before or it is disabled\. Enable it by visiting (https://console\.developers\.google\.com/apis/api/gmail\.googleapis\.com/overview\?project=\d+)",
        )
        .expect("valid api-not-enabled regex")
    })
}

/// Mailbox API delivery backend.
pub struct ApiTransport {
    bearer_token: String,
    sender: Address,
    client: Client,
    base_url: String,
}

impl ApiTransport {
    /// Create a transport for a bearer token and sender identity.
    pub fn new(bearer_token: impl Into<String>, sender: Address) -> Self {
        Self::with_client(bearer_token, sender, Client::new())
    }

    /// Create with a shared reqwest client.
    pub fn with_client(bearer_token: impl Into<String>, sender: Address, client: Client) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            sender,
            client,
            base_url: API_BASE_URL.to_string(),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn classify_error(status: u16, body: &str) -> SendError {
        if status == 401 {
            return SendError::AuthExpired;
        }

        let envelope: Option<ApiErrorEnvelope> = serde_json::from_str(body).ok();
        let message = envelope
            .as_ref()
            .map(|e| e.error.message.clone())
            .unwrap_or_else(|| body.to_string());
        let reasons: Vec<&str> = envelope
            .as_ref()
            .map(|e| {
                e.error
                    .errors
                    .iter()
                    .filter_map(|d| d.reason.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        // Structured reason mapping first.
        if reasons.contains(&"accessNotConfigured") {
            return Self::api_not_enabled_from_message(&message);
        }
        if reasons.iter().any(|r| {
            matches!(
                *r,
                "rateLimitExceeded" | "userRateLimitExceeded" | "dailyLimitExceeded" | "quotaExceeded"
            )
        }) || status == 429
        {
            return SendError::QuotaExceeded;
        }
        if reasons.contains(&"insufficientPermissions")
            || (status == 403 && (message.contains("insufficient") || message.contains("scope")))
        {
            return SendError::InsufficientPermissions;
        }

        // Last-resort message sniffing; the vendor text carries the project
        // id and setup URL that the structured payload does not.
        if api_not_enabled_regex().is_match(&message) {
            return Self::api_not_enabled_from_message(&message);
        }
        if message.contains("quota exceeded") || message.contains("rate limit") {
            return SendError::QuotaExceeded;
        }
        if message.contains("invalid_grant") || message.contains("unauthorized") {
            return SendError::AuthExpired;
        }

        SendError::transport_with_status("api", message, status)
    }

    fn api_not_enabled_from_message(message: &str) -> SendError {
        match api_not_enabled_regex().captures(message) {
            Some(caps) => SendError::ApiNotEnabled {
                project_id: caps[1].to_string(),
                setup_url: caps[2].to_string(),
            },
            None => SendError::ApiNotEnabled {
                project_id: "unknown".to_string(),
                setup_url: "https://console.developers.google.com/apis/library/gmail.googleapis.com"
                    .to_string(),
            },
        }
    }
}

#[async_trait]
impl Transport for ApiTransport {
    async fn send(&self, spec: &MessageSpec) -> Result<SendOutcome, SendError> {
        let payload = RawSendRequest {
            raw: encode::encode_raw(spec),
        };

        let url = format!("{}{}", self.base_url, SEND_PATH);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .header("User-Agent", format!("mailblast/{}", crate::VERSION))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let result: RawSendResponse = response.json().await?;
            Ok(SendOutcome::new(result.id))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Self::classify_error(status.as_u16(), &body))
        }
    }

    fn sender(&self) -> &Address {
        &self.sender
    }

    fn name(&self) -> &'static str {
        "api"
    }
}

#[derive(Debug, Serialize)]
struct RawSendRequest {
    raw: String,
}

#[derive(Debug, Deserialize)]
struct RawSendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}
