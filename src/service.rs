//! Application facade shared by the HTTP server and the CLI.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::analytics::{Analytics, AnalyticsResponse};
use crate::auth::{self, IdentityProvider, StaticTokens};
use crate::catalog::TaskKind;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gate::{self, GateDecision, TaskState};
use crate::ledger::Ledger;
use crate::links::{LinkDetails, LinkStore, LinkUpdate, NewLink, NewTask, PublicLink, TaskUpdate};
use crate::model::{Completion, CompletionStatus, Link, Task, Visit};
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::storage::Storage;
use crate::verify::{
    GenericVerify, ManualClaim, OpenTicket, Submission, TimedVerification, VerificationAdapter,
    WebhookCallback, WebhookPayload,
};
use crate::visits::{ClientMeta, VisitStore};

/// One task as the gate sees it for a visit.
#[derive(Debug, Clone, Serialize)]
pub struct TaskProgress {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub label: String,
    pub required: bool,
    pub state: TaskState,
}

/// Unlock decision for a visit. `destination` is present only when unlocked.
#[derive(Debug, Clone, Serialize)]
pub struct GateView {
    pub visit_id: String,
    pub link_id: String,
    pub unlocked: bool,
    pub satisfied: Vec<String>,
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    pub tasks: Vec<TaskProgress>,
}

impl GateView {
    fn new(visit: &Visit, link: &Link, tasks: &[Task], decision: GateDecision) -> Self {
        let progress = tasks
            .iter()
            .map(|task| TaskProgress {
                id: task.id.clone(),
                kind: task.kind.clone(),
                label: task.label.clone(),
                required: task.required,
                state: decision.task_state(&task.id),
            })
            .collect();
        Self {
            visit_id: visit.id.clone(),
            link_id: link.id.clone(),
            unlocked: decision.unlocked,
            destination: decision.unlocked.then(|| link.destination.clone()),
            satisfied: decision.satisfied,
            missing: decision.missing,
            tasks: progress,
        }
    }
}

pub struct Linksy {
    config: Config,
    storage: Storage,
    links: LinkStore,
    visits: VisitStore,
    ledger: Ledger,
    analytics: Analytics,
    limiter: Option<RateLimiter>,
    identity: Box<dyn IdentityProvider>,
    timed: TimedVerification,
}

impl Linksy {
    pub fn open(storage: Storage, config: Config) -> Result<Self> {
        Self::with_clock(storage, config, Arc::new(SystemClock))
    }

    /// Build with an explicit clock for the cache and rate limiter.
    pub fn with_clock(storage: Storage, config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        storage.init()?;

        let links = LinkStore::new(storage.clone(), config.links.quota);
        let visits = VisitStore::new(storage.clone(), links.clone());
        let ledger = Ledger::new(storage.clone(), links.clone(), visits.clone());

        let ttl = to_chrono(config.analytics_cache_ttl()?)?;
        let analytics = Analytics::new(
            links.clone(),
            visits.clone(),
            ledger.clone(),
            ttl,
            clock.clone(),
        );

        let limiter = if config.rate_limit.enabled {
            let window = to_chrono(config.rate_limit_window()?)?;
            Some(RateLimiter::new(config.rate_limit.limit, window, clock))
        } else {
            None
        };

        let identity = Box::new(StaticTokens::from_config(&config.auth));
        let timed = TimedVerification::new(config.verification_delay()?);

        Ok(Self {
            config,
            storage,
            links,
            visits,
            ledger,
            analytics,
            limiter,
            identity,
            timed,
        })
    }

    /// Replace the token table with another identity provider.
    pub fn with_identity(mut self, identity: Box<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn links(&self) -> &LinkStore {
        &self.links
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    // =========================================================================
    // Identity and throttling
    // =========================================================================

    pub fn authenticate(&self, header: Option<&str>) -> Result<String> {
        auth::authenticate(self.identity.as_ref(), header)
    }

    /// Count a public request. `None` when throttling is disabled.
    pub fn throttle(&self, client: &str) -> Result<Option<RateDecision>> {
        let Some(limiter) = &self.limiter else {
            return Ok(None);
        };
        let decision = limiter.check(client);
        if !decision.allowed {
            return Err(Error::RateLimited {
                retry_after_secs: decision.retry_after_secs(limiter.now()),
            });
        }
        Ok(Some(decision))
    }

    // =========================================================================
    // Owner operations
    // =========================================================================

    pub fn create_link(&self, user_id: &str, input: NewLink) -> Result<Link> {
        self.links.create(user_id, input)
    }

    pub fn list_links(&self, user_id: &str) -> Result<Vec<Link>> {
        self.links.list(user_id)
    }

    pub fn get_link(&self, user_id: &str, link_id: &str) -> Result<LinkDetails> {
        self.links.get(user_id, link_id)
    }

    pub fn update_link(&self, user_id: &str, link_id: &str, changes: LinkUpdate) -> Result<Link> {
        self.links.update(user_id, link_id, changes)
    }

    pub fn delete_link(&self, user_id: &str, link_id: &str) -> Result<()> {
        self.links.delete(user_id, link_id)?;
        self.analytics.forget(user_id, link_id);
        Ok(())
    }

    pub fn add_task(&self, user_id: &str, link_id: &str, input: NewTask) -> Result<Task> {
        self.links.add_task(user_id, link_id, input)
    }

    pub fn update_task(
        &self,
        user_id: &str,
        link_id: &str,
        task_id: &str,
        changes: TaskUpdate,
    ) -> Result<Task> {
        self.links.update_task(user_id, link_id, task_id, changes)
    }

    pub fn remove_task(&self, user_id: &str, link_id: &str, task_id: &str) -> Result<()> {
        self.links.remove_task(user_id, link_id, task_id)
    }

    pub fn analytics(&self, user_id: &str, link_id: &str) -> Result<AnalyticsResponse> {
        self.analytics.report(user_id, link_id)
    }

    // =========================================================================
    // Public flow
    // =========================================================================

    pub fn public_link(&self, slug: &str) -> Result<PublicLink> {
        self.links.public_by_slug(slug)
    }

    pub fn record_visit(&self, link_id: &str, client: &ClientMeta) -> Result<Visit> {
        self.visits.record(link_id, client)
    }

    pub fn record_visit_best_effort(&self, link_id: &str, client: &ClientMeta) -> Option<Visit> {
        self.visits.record_best_effort(link_id, client)
    }

    pub fn claim(&self, submission: Submission) -> Result<Completion> {
        ManualClaim.submit(&self.ledger, submission)
    }

    pub fn verify(&self, task_id: &str, mut submission: Submission) -> Result<Completion> {
        submission.task_id = task_id.to_string();
        GenericVerify.submit(&self.ledger, submission)
    }

    pub fn webhook(&self, payload: WebhookPayload) -> Result<Completion> {
        WebhookCallback.submit(&self.ledger, payload.into())
    }

    /// Open a task target and schedule its time-based verification.
    pub fn open_task(&self, visit_id: &str, task_id: &str) -> Result<(OpenTicket, JoinHandle<()>)> {
        self.timed.open(&self.ledger, visit_id, task_id)
    }

    pub fn gate(&self, visit_id: &str) -> Result<GateView> {
        let visit = self
            .visits
            .find(visit_id)?
            .ok_or_else(|| Error::NotFound(format!("visit {visit_id}")))?;
        let link = self.links.active_link(&visit.link_id)?;
        let tasks = self.links.registry()?.tasks_for(&link.id);
        let completions = self.ledger.for_visit(visit_id)?;

        let decision = gate::evaluate(&tasks, &completions);
        tracing::debug!(
            visit_id,
            unlocked = decision.unlocked,
            missing = decision.missing.len(),
            "gate evaluated"
        );
        Ok(GateView::new(&visit, &link, &tasks, decision))
    }

    // =========================================================================
    // Administration
    // =========================================================================

    pub fn review(
        &self,
        completion_id: &str,
        status: CompletionStatus,
        admin_token: Option<&str>,
    ) -> Result<Completion> {
        auth::require_admin(&self.config.auth, admin_token)?;
        self.ledger.review(completion_id, status, "admin")
    }
}

fn to_chrono(duration: std::time::Duration) -> Result<Duration> {
    Duration::from_std(duration)
        .map_err(|_| Error::InvalidConfig(format!("duration out of range: {duration:?}")))
}
