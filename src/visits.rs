//! Visit recorder.
//!
//! Each page load of a public link appends one visit to `visits.jsonl`.
//! There is no de-duplication: two loads by the same client are two visits.

use std::net::IpAddr;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::links::LinkStore;
use crate::lock::FileLock;
use crate::model::Visit;
use crate::storage::Storage;

const UNKNOWN: &str = "unknown";

/// Request metadata captured with a visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientMeta {
    pub ip: String,
    pub user_agent: String,
    pub referer: Option<String>,
}

impl Default for ClientMeta {
    fn default() -> Self {
        Self {
            ip: UNKNOWN.to_string(),
            user_agent: UNKNOWN.to_string(),
            referer: None,
        }
    }
}

impl ClientMeta {
    /// Client IP: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer.
    pub fn client_ip(
        forwarded_for: Option<&str>,
        real_ip: Option<&str>,
        peer: Option<IpAddr>,
    ) -> String {
        forwarded_for
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .or_else(|| real_ip.map(str::trim).filter(|ip| !ip.is_empty()))
            .map(str::to_string)
            .or_else(|| peer.map(|ip| ip.to_string()))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn new(ip: String, user_agent: Option<&str>, referer: Option<&str>) -> Self {
        Self {
            ip,
            user_agent: user_agent
                .map(str::trim)
                .filter(|ua| !ua.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string(),
            referer: referer
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisitStore {
    storage: Storage,
    links: LinkStore,
}

impl VisitStore {
    pub fn new(storage: Storage, links: LinkStore) -> Self {
        Self { storage, links }
    }

    /// Append a visit for a live link.
    pub fn record(&self, link_id: &str, client: &ClientMeta) -> Result<Visit> {
        let link = self.links.active_link(link_id).map_err(|err| match err {
            Error::NotFound(_) => {
                Error::ReferenceViolation(format!("visit references unknown link {link_id}"))
            }
            other => other,
        })?;

        let visit = Visit {
            id: Uuid::new_v4().to_string(),
            link_id: link.id,
            ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            referer: client.referer.clone(),
            created_at: Utc::now(),
        };

        let path = self.storage.visits_file();
        let _lock = FileLock::for_file(&path)?;
        self.storage.append_jsonl(&path, &visit)?;

        tracing::debug!(visit_id = %visit.id, link_id = %visit.link_id, "visit recorded");
        Ok(visit)
    }

    /// Record without failing the caller; a lost visit only costs analytics.
    pub fn record_best_effort(&self, link_id: &str, client: &ClientMeta) -> Option<Visit> {
        match self.record(link_id, client) {
            Ok(visit) => Some(visit),
            Err(err) => {
                tracing::warn!(link_id, error = %err, "failed to record visit");
                None
            }
        }
    }

    pub fn all(&self) -> Result<Vec<Visit>> {
        self.storage.read_jsonl(&self.storage.visits_file())
    }

    pub fn find(&self, visit_id: &str) -> Result<Option<Visit>> {
        Ok(self.all()?.into_iter().find(|visit| visit.id == visit_id))
    }

    pub fn for_link(&self, link_id: &str) -> Result<Vec<Visit>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|visit| visit.link_id == link_id)
            .collect())
    }
}
