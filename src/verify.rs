//! Verification adapters.
//!
//! Every way of proving a task turns into a ledger append tagged with its
//! method. Adapters never decide unlock state; the gate does that from the
//! ledger afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::model::{meta_object, Completion, CompletionMethod, CompletionStatus, NewCompletion};
use crate::validate;

/// Caller input for an adapter. Adapters ignore the fields they do not use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub visit_id: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub meta: Option<Value>,
    #[serde(default)]
    pub proof_url: Option<String>,
}

impl Submission {
    pub fn new(visit_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            visit_id: visit_id.into(),
            task_id: task_id.into(),
            ..Self::default()
        }
    }

    fn require_ids(&self) -> Result<()> {
        validate::require_text("visit_id", &self.visit_id)?;
        validate::require_text("task_id", &self.task_id)?;
        Ok(())
    }
}

pub trait VerificationAdapter {
    fn method(&self) -> CompletionMethod;

    fn submit(&self, ledger: &Ledger, submission: Submission) -> Result<Completion>;
}

/// Visitor uploads proof and waits for a human. Always `pending`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClaim;

impl VerificationAdapter for ManualClaim {
    fn method(&self) -> CompletionMethod {
        CompletionMethod::Manual
    }

    fn submit(&self, ledger: &Ledger, submission: Submission) -> Result<Completion> {
        submission.require_ids()?;
        let proof = submission
            .proof_url
            .as_deref()
            .ok_or_else(|| Error::InvalidArgument("missing proof_url".to_string()))?;
        let proof = validate::parse_web_url("proof", proof)?;

        let mut meta = meta_object(submission.meta)?;
        meta.insert("proof_url".to_string(), Value::String(proof.to_string()));

        ledger.append(NewCompletion {
            visit_id: submission.visit_id,
            task_id: submission.task_id,
            method: self.method(),
            status: CompletionStatus::Pending,
            meta,
        })
    }
}

/// Verify-by-task endpoint. The caller may choose method and status.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericVerify;

impl VerificationAdapter for GenericVerify {
    fn method(&self) -> CompletionMethod {
        CompletionMethod::RedirectCheck
    }

    fn submit(&self, ledger: &Ledger, submission: Submission) -> Result<Completion> {
        submission.require_ids()?;
        let method = match submission.method.as_deref() {
            Some(raw) => raw.parse()?,
            None => self.method(),
        };
        let status = match submission.status.as_deref() {
            Some(raw) => raw.parse()?,
            None => CompletionStatus::Pending,
        };

        ledger.append(NewCompletion {
            visit_id: submission.visit_id,
            task_id: submission.task_id,
            method,
            status,
            meta: meta_object(submission.meta)?,
        })
    }
}

/// Payload posted by an external platform integration.
///
/// The field set and the status values are a wire contract; do not rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub visit_id: String,
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CompletionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl From<WebhookPayload> for Submission {
    fn from(payload: WebhookPayload) -> Self {
        Submission {
            visit_id: payload.visit_id,
            task_id: payload.task_id,
            status: payload.status.map(|status| status.as_str().to_string()),
            meta: payload.meta.map(Value::Object),
            ..Submission::default()
        }
    }
}

/// Asynchronous platform callback. Defaults to `success`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookCallback;

impl VerificationAdapter for WebhookCallback {
    fn method(&self) -> CompletionMethod {
        CompletionMethod::Webhook
    }

    fn submit(&self, ledger: &Ledger, submission: Submission) -> Result<Completion> {
        let visit_id = validate::parse_id("visit_id", &submission.visit_id)?;
        let task_id = validate::parse_id("task_id", &submission.task_id)?;
        let status = match submission.status.as_deref() {
            Some(raw) => raw.parse()?,
            None => CompletionStatus::Success,
        };

        ledger.append(NewCompletion {
            visit_id: visit_id.to_string(),
            task_id: task_id.to_string(),
            method: self.method(),
            status,
            meta: meta_object(submission.meta)?,
        })
    }
}

/// Time-based heuristic.
///
/// Low assurance: opening the task target is taken as doing the task, and
/// success is recorded once `delay` has passed. Nothing checks the
/// visitor actually followed, joined or subscribed.
#[derive(Debug, Clone, Copy)]
pub struct TimedVerification {
    delay: Duration,
}

/// Returned to the visitor when a timed task is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenTicket {
    pub target: Option<String>,
    pub verify_after_secs: u64,
}

impl TimedVerification {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Hand out the task target now and schedule the success record.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn open(
        &self,
        ledger: &Ledger,
        visit_id: &str,
        task_id: &str,
    ) -> Result<(OpenTicket, JoinHandle<()>)> {
        validate::parse_id("visit_id", visit_id)?;
        validate::parse_id("task_id", task_id)?;
        let task = ledger.check_references(visit_id, task_id)?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::OperationFailed("no async runtime for timed verification".to_string()))?;

        let adapter = *self;
        let ledger = ledger.clone();
        let submission = Submission::new(visit_id, task_id);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(adapter.delay).await;
            let visit_id = submission.visit_id.clone();
            let task_id = submission.task_id.clone();
            let result = tokio::task::spawn_blocking(move || adapter.submit(&ledger, submission)).await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    tracing::warn!(%visit_id, %task_id, error = %err, "timed verification failed")
                }
                Err(err) => {
                    tracing::warn!(%visit_id, %task_id, error = %err, "timed verification aborted")
                }
            }
        });

        Ok((
            OpenTicket {
                target: task.target,
                verify_after_secs: self.delay.as_secs(),
            },
            handle,
        ))
    }
}

impl VerificationAdapter for TimedVerification {
    fn method(&self) -> CompletionMethod {
        CompletionMethod::TimeBasedVerification
    }

    fn submit(&self, ledger: &Ledger, submission: Submission) -> Result<Completion> {
        submission.require_ids()?;
        let mut meta = Map::new();
        meta.insert(
            "delay_ms".to_string(),
            Value::from(u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX)),
        );
        ledger.append(NewCompletion {
            visit_id: submission.visit_id,
            task_id: submission.task_id,
            method: self.method(),
            status: CompletionStatus::Success,
            meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate;
    use crate::ledger::tests::fixture;
    use serde_json::json;

    #[test]
    fn manual_claim_is_pending_with_proof() {
        let fx = fixture();
        let mut submission = Submission::new(&fx.visit_id, &fx.task_id);
        submission.proof_url = Some("https://imgur.com/proof.png".to_string());
        submission.meta = Some(json!({"note": "joined as @someone"}));

        let row = ManualClaim.submit(&fx.ledger, submission).unwrap();
        assert_eq!(row.status, CompletionStatus::Pending);
        assert_eq!(row.method, CompletionMethod::Manual);
        assert_eq!(row.meta["proof_url"], "https://imgur.com/proof.png");
        assert_eq!(row.meta["note"], "joined as @someone");
    }

    #[test]
    fn manual_claim_requires_proof_url() {
        let fx = fixture();
        let submission = Submission::new(&fx.visit_id, &fx.task_id);
        assert!(matches!(
            ManualClaim.submit(&fx.ledger, submission),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn manual_claim_only_unlocks_after_review() {
        let fx = fixture();
        let mut submission = Submission::new(&fx.visit_id, &fx.task_id);
        submission.proof_url = Some("https://example.com/shot.png".to_string());
        let row = ManualClaim.submit(&fx.ledger, submission).unwrap();

        let tasks = fx.links.registry().unwrap().tasks_for(&fx.link_id);
        let rows = fx.ledger.for_visit(&fx.visit_id).unwrap();
        assert!(!gate::evaluate(&tasks, &rows).unlocked);

        fx.ledger.review(&row.id, CompletionStatus::Success, "admin").unwrap();
        let rows = fx.ledger.for_visit(&fx.visit_id).unwrap();
        assert!(gate::evaluate(&tasks, &rows).unlocked);
    }

    #[test]
    fn generic_verify_defaults_and_overrides() {
        let fx = fixture();
        let row = GenericVerify
            .submit(&fx.ledger, Submission::new(&fx.visit_id, &fx.task_id))
            .unwrap();
        assert_eq!(row.method, CompletionMethod::RedirectCheck);
        assert_eq!(row.status, CompletionStatus::Pending);

        let mut custom = Submission::new(&fx.visit_id, &fx.task_id);
        custom.method = Some("oauth_check".to_string());
        custom.status = Some("success".to_string());
        let row = GenericVerify.submit(&fx.ledger, custom).unwrap();
        assert_eq!(row.method, CompletionMethod::Other("oauth_check".to_string()));
        assert_eq!(row.status, CompletionStatus::Success);

        let mut bad = Submission::new(&fx.visit_id, &fx.task_id);
        bad.status = Some("done".to_string());
        assert!(matches!(
            GenericVerify.submit(&fx.ledger, bad),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn webhook_defaults_to_success() {
        let fx = fixture();
        let payload: WebhookPayload = serde_json::from_value(json!({
            "visit_id": fx.visit_id,
            "task_id": fx.task_id,
        }))
        .unwrap();
        let row = WebhookCallback.submit(&fx.ledger, payload.into()).unwrap();
        assert_eq!(row.status, CompletionStatus::Success);
        assert_eq!(row.method, CompletionMethod::Webhook);
        assert!(row.meta.is_empty());
    }

    #[test]
    fn webhook_payload_shape_is_strict_about_status() {
        let parsed = serde_json::from_value::<WebhookPayload>(json!({
            "visit_id": "v",
            "task_id": "t",
            "status": "verified",
        }));
        assert!(parsed.is_err());

        let payload = WebhookPayload {
            visit_id: "v".to_string(),
            task_id: "t".to_string(),
            status: Some(CompletionStatus::Failed),
            meta: Some(Map::new()),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"visit_id": "v", "task_id": "t", "status": "failed", "meta": {}})
        );
    }

    #[test]
    fn webhook_ids_must_be_uuids_then_exist() {
        let fx = fixture();
        let malformed = Submission::new("visit-1", &fx.task_id);
        assert!(matches!(
            WebhookCallback.submit(&fx.ledger, malformed),
            Err(Error::InvalidArgument(_))
        ));

        let unknown = Submission::new(uuid::Uuid::new_v4().to_string(), &fx.task_id);
        assert!(matches!(
            WebhookCallback.submit(&fx.ledger, unknown),
            Err(Error::ReferenceViolation(_))
        ));
    }

    #[tokio::test]
    async fn timed_verification_records_success_after_delay() {
        let fx = fixture();
        let adapter = TimedVerification::new(Duration::from_millis(20));

        let (ticket, handle) = adapter.open(&fx.ledger, &fx.visit_id, &fx.task_id).unwrap();
        assert_eq!(ticket.target.as_deref(), Some("https://t.me/example"));
        assert_eq!(ticket.verify_after_secs, 0);
        assert!(fx.ledger.for_visit(&fx.visit_id).unwrap().is_empty());

        handle.await.unwrap();
        let rows = fx.ledger.for_visit(&fx.visit_id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, CompletionStatus::Success);
        assert_eq!(rows[0].method, CompletionMethod::TimeBasedVerification);
    }

    #[tokio::test]
    async fn timed_verification_checks_references_up_front() {
        let fx = fixture();
        let adapter = TimedVerification::new(Duration::from_secs(5));
        let missing = uuid::Uuid::new_v4().to_string();
        assert!(matches!(
            adapter.open(&fx.ledger, &missing, &fx.task_id),
            Err(Error::ReferenceViolation(_))
        ));
    }

    #[test]
    fn timed_open_outside_runtime_fails_cleanly() {
        let fx = fixture();
        let adapter = TimedVerification::new(Duration::from_secs(1));
        assert!(matches!(
            adapter.open(&fx.ledger, &fx.visit_id, &fx.task_id),
            Err(Error::OperationFailed(_))
        ));
    }
}
