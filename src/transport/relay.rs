//! SMTP relay transport using lettre, with optional DKIM signing.

use async_trait::async_trait;
use lettre::{
    message::{
        dkim::{DkimConfig, DkimSigningAlgorithm, DkimSigningKey},
        header::ContentType,
        Attachment as LettreAttachment, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;

use crate::address::Address;
use crate::encode;
use crate::error::SendError;
use crate::message::{MessageSpec, SendOutcome};
use crate::transport::{DomainSigning, Transport};

/// Pause inserted between relay sub-batches so a user-supplied SMTP server is
/// not hammered with back-to-back connections.
const RELAY_BATCH_DELAY: Duration = Duration::from_secs(1);

/// SMTP relay delivery backend.
pub struct RelayTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Address,
    dkim: Option<DkimConfig>,
}

impl RelayTransport {
    /// Connect parameters come straight from a relay credential. `secure`
    /// selects implicit TLS (port 465 style); otherwise STARTTLS.
    ///
    /// The DKIM key is parsed here so a malformed key fails the job at start
    /// rather than on the first send.
    pub fn new(
        host: &str,
        port: u16,
        secure: bool,
        username: &str,
        secret: &str,
        sender: Address,
        signing: Option<DomainSigning>,
    ) -> Result<Self, SendError> {
        let credentials = Credentials::new(username.to_string(), secret.to_string());

        // A failed TLS setup is an error, never a downgrade: credentials must
        // not travel over a cleartext connection.
        let builder = if secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| SendError::ConnectionFailed(e.to_string()))?;
        let transport = builder.port(port).credentials(credentials).build();

        let dkim = signing
            .map(|s| {
                let key = DkimSigningKey::new(&s.private_key, DkimSigningAlgorithm::Rsa)
                    .map_err(|e| SendError::Dkim(e.to_string()))?;
                Ok::<_, SendError>(DkimConfig::default_config(s.selector, s.domain, key))
            })
            .transpose()?;

        Ok(Self {
            transport,
            sender,
            dkim,
        })
    }

    fn build_message(&self, spec: &MessageSpec) -> Result<Message, SendError> {
        let mut builder = Message::builder()
            .from(address_to_mailbox(&self.sender)?)
            .to(parse_mailbox(&spec.to)?)
            .subject(if spec.subject.is_empty() {
                encode::DEFAULT_SUBJECT
            } else {
                &spec.subject
            });

        if let Some(cc) = spec.cc.as_deref() {
            for mailbox in parse_mailbox_list(cc)? {
                builder = builder.cc(mailbox);
            }
        }
        if let Some(bcc) = spec.bcc.as_deref() {
            for mailbox in parse_mailbox_list(bcc)? {
                builder = builder.bcc(mailbox);
            }
        }

        let html = encode::wrap_html(&spec.html);

        let mut message = if spec.inline_parts.is_empty() {
            builder.header(ContentType::TEXT_HTML).body(html)?
        } else {
            let mut multipart = MultiPart::related().singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html),
            );
            for part in &spec.inline_parts {
                let content_type: ContentType =
                    part.content_type.parse().unwrap_or(ContentType::TEXT_PLAIN);
                multipart = multipart.singlepart(
                    LettreAttachment::new_inline(part.content_id.clone())
                        .body(part.data.clone(), content_type),
                );
            }
            builder.multipart(multipart)?
        };

        if let Some(dkim) = &self.dkim {
            message.sign(dkim);
        }

        Ok(message)
    }

    fn classify_send_error(err: &lettre::transport::smtp::Error) -> SendError {
        let text = err.to_string();
        let lowered = text.to_lowercase();
        if lowered.contains("timed out") || lowered.contains("timeout") {
            SendError::Timeout(text)
        } else if text.contains("535") || lowered.contains("authentication") {
            SendError::AuthFailed(text)
        } else if lowered.contains("connection") || lowered.contains("dns") {
            SendError::ConnectionFailed(text)
        } else {
            SendError::SendFailed(text)
        }
    }
}

#[async_trait]
impl Transport for RelayTransport {
    async fn send(&self, spec: &MessageSpec) -> Result<SendOutcome, SendError> {
        let message = self.build_message(spec)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| Self::classify_send_error(&e))?;

        // Extract a message id from the SMTP response, or generate one.
        let message_id = response
            .message()
            .next()
            .and_then(|m| m.lines().next())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(SendOutcome::new(message_id))
    }

    fn sender(&self) -> &Address {
        &self.sender
    }

    fn name(&self) -> &'static str {
        "relay"
    }

    fn batch_delay(&self) -> Option<Duration> {
        Some(RELAY_BATCH_DELAY)
    }
}

fn address_to_mailbox(addr: &Address) -> Result<Mailbox, SendError> {
    let email = addr.email.parse()?;
    Ok(Mailbox::new(addr.name.clone(), email))
}

fn parse_mailbox(value: &str) -> Result<Mailbox, SendError> {
    value
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| SendError::InvalidAddress(format!("'{}': {e}", value.trim())))
}

/// Parse a comma-separated header value into mailboxes, skipping blanks.
fn parse_mailbox_list(value: &str) -> Result<Vec<Mailbox>, SendError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_mailbox)
        .collect()
}
