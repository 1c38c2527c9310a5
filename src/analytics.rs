//! Per-link analytics for owners.
//!
//! Reports are derived from the visit log and the completion ledger and are
//! cached per `(link, user)` for a short TTL.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::links::LinkStore;
use crate::model::{Completion, CompletionStatus, Visit};
use crate::visits::VisitStore;

const CHART_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub visits: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub link_id: String,
    pub total_visits: u64,
    pub total_completions: u64,
    /// Percent, rounded to two decimals.
    pub conversion_rate: f64,
    pub chart_data: Vec<DayCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsResponse {
    #[serde(flatten)]
    pub report: AnalyticsReport,
    pub cached: bool,
    pub cache_timestamp: DateTime<Utc>,
}

/// Aggregate one link's numbers as of `today` (UTC).
pub fn compute(
    link_id: &str,
    visits: &[Visit],
    completions: &[Completion],
    today: NaiveDate,
) -> AnalyticsReport {
    let link_visits: Vec<&Visit> = visits.iter().filter(|v| v.link_id == link_id).collect();
    let visit_ids: HashSet<&str> = link_visits.iter().map(|v| v.id.as_str()).collect();

    let total_visits = link_visits.len() as u64;
    let total_completions = completions
        .iter()
        .filter(|c| c.status == CompletionStatus::Success && visit_ids.contains(c.visit_id.as_str()))
        .count() as u64;

    let conversion_rate = if total_visits == 0 {
        0.0
    } else {
        let pct = total_completions as f64 / total_visits as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    };

    let mut per_day: HashMap<NaiveDate, u64> = HashMap::new();
    for visit in &link_visits {
        *per_day.entry(visit.created_at.date_naive()).or_default() += 1;
    }
    let chart_data = (0..CHART_DAYS)
        .rev()
        .map(|days_ago| {
            let date = today - Duration::days(days_ago);
            DayCount {
                date,
                visits: per_day.get(&date).copied().unwrap_or(0),
            }
        })
        .collect();

    AnalyticsReport {
        link_id: link_id.to_string(),
        total_visits,
        total_completions,
        conversion_rate,
        chart_data,
    }
}

pub struct Analytics {
    links: LinkStore,
    visits: VisitStore,
    ledger: Ledger,
    clock: Arc<dyn Clock>,
    cache: TtlCache<(String, String), AnalyticsReport>,
}

impl Analytics {
    pub fn new(
        links: LinkStore,
        visits: VisitStore,
        ledger: Ledger,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            links,
            visits,
            ledger,
            cache: TtlCache::new(ttl, clock.clone()),
            clock,
        }
    }

    /// Report for an owned link; other users see `NotFound`.
    pub fn report(&self, user_id: &str, link_id: &str) -> Result<AnalyticsResponse> {
        let key = (link_id.to_string(), user_id.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(AnalyticsResponse {
                report: hit.value,
                cached: true,
                cache_timestamp: hit.stored_at,
            });
        }

        self.links.owned_link(user_id, link_id)?;
        let visits = self.visits.for_link(link_id)?;
        let completions = self.ledger.completions()?;
        let now = self.clock.now();
        let report = compute(link_id, &visits, &completions, now.date_naive());

        let stored_at = self.cache.insert(key, report.clone());
        tracing::debug!(link_id, user_id, "analytics computed");
        Ok(AnalyticsResponse {
            report,
            cached: false,
            cache_timestamp: stored_at,
        })
    }

    /// Drop the cached report so the next request re-checks the link.
    pub fn forget(&self, user_id: &str, link_id: &str) {
        self.cache
            .invalidate(&(link_id.to_string(), user_id.to_string()));
    }
}
