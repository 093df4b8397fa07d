//! End-to-end bulk orchestration tests against a scripted transport.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mailblast::{
    Address, BulkMailer, BulkRequest, JobRecord, JobStatus, MessageSpec, Recipient, SendError,
    SendOutcome, Transport, SENTINEL_ADDRESS,
};

/// Transport that replays a scripted list of outcomes and records every
/// message it was asked to send.
struct MockTransport {
    sender: Address,
    script: Mutex<Vec<Result<String, SendError>>>,
    sent: Mutex<Vec<MessageSpec>>,
    per_send_delay: Option<Duration>,
}

impl MockTransport {
    fn new(script: Vec<Result<String, SendError>>) -> Arc<Self> {
        Arc::new(Self {
            sender: Address::with_name("Campaigns", "campaigns@example.com"),
            script: Mutex::new(script),
            sent: Mutex::new(Vec::new()),
            per_send_delay: None,
        })
    }

    fn slow(script: Vec<Result<String, SendError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            sender: Address::new("campaigns@example.com"),
            script: Mutex::new(script),
            sent: Mutex::new(Vec::new()),
            per_send_delay: Some(delay),
        })
    }

    fn specs(&self) -> Vec<MessageSpec> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, spec: &MessageSpec) -> Result<SendOutcome, SendError> {
        if let Some(delay) = self.per_send_delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(spec.clone());
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Ok(SendOutcome::new("default-id"));
        }
        script.remove(0).map(SendOutcome::new)
    }

    fn sender(&self) -> &Address {
        &self.sender
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn recipient(email: &str, name: &str) -> Recipient {
    Recipient::new().field("email", email).field("name", name)
}

fn request(recipients: Vec<Recipient>) -> BulkRequest {
    BulkRequest {
        recipients,
        subject: "Hi {{name}}".into(),
        body_html: "<p>Hello {{name}}</p>".into(),
        cc: None,
        bcc: None,
    }
}

async fn wait_terminal(mailer: &BulkMailer, owner: &str, job_id: &str) -> Arc<JobRecord> {
    for _ in 0..500 {
        if let Some(record) = mailer.progress(owner, job_id) {
            if record.status.is_terminal() {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach a terminal state");
}

#[tokio::test]
async fn all_successes_complete_with_counts() {
    let transport = MockTransport::new(vec![
        Ok("id-1".into()),
        Ok("id-2".into()),
        Ok("id-3".into()),
    ]);
    let mailer = BulkMailer::new();
    let req = request(vec![
        recipient("a@example.com", "Ana"),
        recipient("b@example.com", "Ben"),
        recipient("c@example.com", "Cal"),
    ]);

    let job_id = mailer
        .start_job_with_transport("owner", req, transport.clone())
        .unwrap();
    let record = wait_terminal(&mailer, "owner", &job_id).await;

    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.sent, 3);
    assert_eq!(record.failed, 0);
    assert_eq!(record.sent + record.failed, record.total);
    assert_eq!(record.results.len(), 3);
    assert!(record.current.is_none());
    assert_eq!(record.results[0].message_id.as_deref(), Some("id-1"));
    // Outcomes stay in dispatch order.
    let emails: Vec<&str> = record.results.iter().map(|r| r.email.as_str()).collect();
    assert_eq!(
        emails,
        vec!["a@example.com", "b@example.com", "c@example.com"]
    );
}

#[tokio::test]
async fn templates_resolve_per_recipient() {
    let transport = MockTransport::new(vec![Ok("id-1".into()), Ok("id-2".into())]);
    let mailer = BulkMailer::new();
    let req = request(vec![
        recipient("a@example.com", "Ana"),
        recipient("b@example.com", "Ben"),
    ]);

    let job_id = mailer
        .start_job_with_transport("owner", req, transport.clone())
        .unwrap();
    wait_terminal(&mailer, "owner", &job_id).await;

    let specs = transport.specs();
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].subject, "Hi Ana");
    assert_eq!(specs[0].html, "<p>Hello Ana</p>");
    assert_eq!(specs[0].to, "a@example.com");
    assert_eq!(specs[1].subject, "Hi Ben");
    assert_eq!(specs[1].from.email, "campaigns@example.com");
}

#[tokio::test]
async fn nonfatal_failure_is_recorded_and_job_continues() {
    let transport = MockTransport::new(vec![
        Ok("id-1".into()),
        Err(SendError::AuthFailed("535 5.7.8 rejected".into())),
        Ok("id-3".into()),
    ]);
    let mailer = BulkMailer::new();
    let req = request(vec![
        recipient("a@example.com", "Ana"),
        recipient("b@example.com", "Ben"),
        recipient("c@example.com", "Cal"),
    ]);

    let job_id = mailer
        .start_job_with_transport("owner", req, transport.clone())
        .unwrap();
    let record = wait_terminal(&mailer, "owner", &job_id).await;

    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.sent, 2);
    assert_eq!(record.failed, 1);
    assert_eq!(record.sent + record.failed, record.total);

    let failure = &record.results[1];
    assert_eq!(failure.email, "b@example.com");
    assert!(failure.error.as_deref().unwrap().contains("535"));
    assert!(failure.remediation.is_some());
}

#[tokio::test]
async fn fatal_error_aborts_remaining_recipients() {
    let transport = MockTransport::new(vec![
        Ok("id-1".into()),
        Err(SendError::ApiNotEnabled {
            project_id: "424242".into(),
            setup_url: "https://console.example.com/enable".into(),
        }),
        Ok("never-sent".into()),
    ]);
    let mailer = BulkMailer::new();
    let req = request(vec![
        recipient("a@example.com", "Ana"),
        recipient("b@example.com", "Ben"),
        recipient("c@example.com", "Cal"),
    ]);

    let job_id = mailer
        .start_job_with_transport("owner", req, transport.clone())
        .unwrap();
    let record = wait_terminal(&mailer, "owner", &job_id).await;

    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.sent, 1);
    assert_eq!(record.failed, 1);
    assert!(record.sent + record.failed < record.total);
    assert!(record.error.is_some());
    assert!(record
        .remediation
        .as_deref()
        .unwrap()
        .contains("https://console.example.com/enable"));

    // The aborting recipient still has a per-recipient outcome.
    assert_eq!(record.results.len(), 2);
    let aborted = &record.results[1];
    assert_eq!(aborted.email, "b@example.com");
    assert!(aborted.error.is_some());
    assert!(aborted
        .remediation
        .as_deref()
        .unwrap()
        .contains("https://console.example.com/enable"));

    // The third recipient was never attempted.
    assert_eq!(transport.specs().len(), 2);
}

#[tokio::test]
async fn recipient_without_email_gets_sentinel_address() {
    let transport = MockTransport::new(vec![Ok("id-1".into())]);
    let mailer = BulkMailer::new();
    let req = request(vec![Recipient::new().field("name", "Ana")]);

    let job_id = mailer
        .start_job_with_transport("owner", req, transport.clone())
        .unwrap();
    let record = wait_terminal(&mailer, "owner", &job_id).await;

    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.results[0].email, SENTINEL_ADDRESS);
    assert_eq!(transport.specs()[0].to, SENTINEL_ADDRESS);
}

#[tokio::test]
async fn cc_and_bcc_templates_resolve_and_blanks_are_dropped() {
    let transport = MockTransport::new(vec![Ok("id-1".into())]);
    let mailer = BulkMailer::new();
    let mut req = request(vec![recipient("a@example.com", "Ana")
        .field("manager", "boss@example.com")]);
    req.cc = Some("{{manager}}".into());
    req.bcc = Some("{{assistant}}   ".into());

    let job_id = mailer
        .start_job_with_transport("owner", req, transport.clone())
        .unwrap();
    wait_terminal(&mailer, "owner", &job_id).await;

    let spec = &transport.specs()[0];
    assert_eq!(spec.cc.as_deref(), Some("boss@example.com"));
    // {{assistant}} has no match and stays verbatim, so BCC is kept as-is
    // rather than silently swallowed.
    assert_eq!(spec.bcc.as_deref(), Some("{{assistant}}"));
}

#[tokio::test]
async fn cancellation_stops_before_next_send() {
    let script = (0..50).map(|i| Ok(format!("id-{i}"))).collect();
    let transport = MockTransport::slow(script, Duration::from_millis(30));
    let mailer = BulkMailer::new();
    let recipients = (0..50)
        .map(|i| recipient(&format!("r{i}@example.com"), "R"))
        .collect();

    let job_id = mailer
        .start_job_with_transport("owner", request(recipients), transport.clone())
        .unwrap();

    // Let a send or two happen, then cancel.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(mailer.cancel("owner", &job_id));

    let record = wait_terminal(&mailer, "owner", &job_id).await;
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("job cancelled"));
    assert!(record.sent + record.failed < record.total);
}
