//! Bulk orchestrator: accepts a campaign, spawns a detached worker, and
//! exposes owner-scoped progress and cancellation against the ledger.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::SendError;
use crate::inline;
use crate::job::{JobLedger, JobRecord, JobStatus, RecipientOutcome};
use crate::message::{non_blank, MessageSpec};
use crate::recipient::Recipient;
use crate::template;
use crate::transport::{self, Transport, TransportCredential};

/// Recipients per sub-batch; transports with a `batch_delay` pause between
/// sub-batches.
const CHUNK_SIZE: usize = 10;

/// One bulk campaign: a recipient list plus templated message fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRequest {
    /// Recipient rows; each carries the fields its templates resolve against.
    pub recipients: Vec<Recipient>,
    /// Subject template.
    pub subject: String,
    /// HTML body template.
    pub body_html: String,
    /// Optional CC template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    /// Optional BCC template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcc: Option<String>,
}

/// Entry point for bulk delivery.
///
/// Cheap to clone; clones share the ledger and the HTTP client.
#[derive(Clone)]
pub struct BulkMailer {
    ledger: Arc<JobLedger>,
    http: reqwest::Client,
}

impl Default for BulkMailer {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkMailer {
    pub fn new() -> Self {
        Self::with_ledger(Arc::new(JobLedger::new()))
    }

    /// Share an externally owned ledger (e.g., one per process).
    pub fn with_ledger(ledger: Arc<JobLedger>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { ledger, http }
    }

    /// The ledger backing this mailer.
    pub fn ledger(&self) -> &Arc<JobLedger> {
        &self.ledger
    }

    /// Validate a campaign, record it, and start a detached worker.
    ///
    /// Returns the job id immediately; delivery proceeds in the background
    /// and is observed through [`BulkMailer::progress`].
    pub fn start_job(
        &self,
        owner_id: &str,
        request: BulkRequest,
        credential: TransportCredential,
    ) -> Result<String, SendError> {
        let transport = transport::for_credential(credential, self.http.clone())?;
        self.start_job_with_transport(owner_id, request, transport)
    }

    /// As [`BulkMailer::start_job`], but with a pre-built transport.
    pub fn start_job_with_transport(
        &self,
        owner_id: &str,
        request: BulkRequest,
        transport: Arc<dyn Transport>,
    ) -> Result<String, SendError> {
        if request.recipients.is_empty() {
            return Err(SendError::MissingField("recipients"));
        }
        if request.subject.trim().is_empty() {
            return Err(SendError::MissingField("subject"));
        }
        if request.body_html.trim().is_empty() {
            return Err(SendError::MissingField("body_html"));
        }

        let job_id = format!("bulk_{}_{}", owner_id, uuid::Uuid::new_v4().simple());
        self.ledger
            .insert(JobRecord::new(&job_id, owner_id, request.recipients.len()));

        tracing::info!(
            job_id = %job_id,
            transport = transport.name(),
            recipients = request.recipients.len(),
            "bulk job accepted"
        );

        let ledger = Arc::clone(&self.ledger);
        let http = self.http.clone();
        let worker_id = job_id.clone();
        tokio::spawn(async move {
            run_job(ledger, http, worker_id, request, transport).await;
        });

        Ok(job_id)
    }

    /// Progress snapshot, owner-scoped: a job is only visible to the owner
    /// that started it.
    pub fn progress(&self, owner_id: &str, job_id: &str) -> Option<Arc<JobRecord>> {
        self.ledger
            .snapshot(job_id)
            .filter(|record| record.owner_id == owner_id)
    }

    /// Request cancellation of a running job. The worker stops before the
    /// next send. Returns false for unknown jobs or a non-owner.
    pub fn cancel(&self, owner_id: &str, job_id: &str) -> bool {
        match self.ledger.snapshot(job_id) {
            Some(record) if record.owner_id == owner_id => self.ledger.cancel(job_id),
            _ => false,
        }
    }
}

async fn run_job(
    ledger: Arc<JobLedger>,
    http: reqwest::Client,
    job_id: String,
    request: BulkRequest,
    transport: Arc<dyn Transport>,
) {
    ledger.update(&job_id, |r| r.status = JobStatus::Sending);

    let total = request.recipients.len();
    for (index, recipient) in request.recipients.iter().enumerate() {
        if ledger.is_cancelled(&job_id) {
            tracing::info!(job_id = %job_id, "bulk job cancelled");
            ledger.update(&job_id, |r| {
                r.status = JobStatus::Failed;
                r.error = Some("job cancelled".to_string());
                r.current = None;
            });
            return;
        }

        let to = recipient.email_or_sentinel();
        ledger.update(&job_id, |r| r.current = Some(to.clone()));

        let spec = prepare_message(&http, transport.as_ref(), recipient, &request, &to).await;

        match transport.send(&spec).await {
            Ok(outcome) => {
                tracing::debug!(
                    job_id = %job_id,
                    to = %to,
                    message_id = %outcome.message_id,
                    "message sent"
                );
                ledger.update(&job_id, |r| {
                    r.sent += 1;
                    r.results
                        .push(RecipientOutcome::success(&to, outcome.message_id.clone()));
                });
            }
            Err(err) if err.is_fatal() => {
                tracing::error!(job_id = %job_id, to = %to, error = %err, "bulk job aborted");
                let remediation = err.remediation();
                ledger.update(&job_id, |r| {
                    // The aborting recipient still gets a recorded outcome.
                    r.failed += 1;
                    r.results.push(RecipientOutcome::failure(
                        &to,
                        err.to_string(),
                        remediation.clone(),
                    ));
                    r.status = JobStatus::Failed;
                    r.error = Some(err.to_string());
                    r.remediation = remediation.clone();
                    r.current = None;
                });
                return;
            }
            Err(err) => {
                tracing::warn!(job_id = %job_id, to = %to, error = %err, "send failed");
                let remediation = err.remediation();
                ledger.update(&job_id, |r| {
                    r.failed += 1;
                    r.results
                        .push(RecipientOutcome::failure(&to, err.to_string(), remediation.clone()));
                });
            }
        }

        // Pause between sub-batches when the transport asks for it.
        let end_of_chunk = (index + 1) % CHUNK_SIZE == 0 && index + 1 < total;
        if end_of_chunk {
            if let Some(delay) = transport.batch_delay() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    ledger.update(&job_id, |r| {
        r.status = JobStatus::Completed;
        r.current = None;
    });
    tracing::info!(job_id = %job_id, "bulk job completed");
}

/// Resolve templates against one recipient and run the image pipeline.
async fn prepare_message(
    http: &reqwest::Client,
    transport: &dyn Transport,
    recipient: &Recipient,
    request: &BulkRequest,
    to: &str,
) -> MessageSpec {
    let subject = template::render(&request.subject, recipient);
    let body = template::render(&request.body_html, recipient);
    let cc = request
        .cc
        .as_deref()
        .and_then(|t| non_blank(&template::render(t, recipient)));
    let bcc = request
        .bcc
        .as_deref()
        .and_then(|t| non_blank(&template::render(t, recipient)));

    let html = inline::rewrite_images(&body);
    let html = inline::rewrite_by_content_type(http, &html).await;
    let (html, inline_parts) = inline::fetch_inline_parts(http, &html).await;

    let mut spec = MessageSpec::new(transport.sender().clone(), to, subject, html);
    spec.cc = cc;
    spec.bcc = bcc;
    spec.inline_parts = inline_parts;
    spec
}
