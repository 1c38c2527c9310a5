//! Completion ledger.
//!
//! Completions are stored as append-only events in `completions.jsonl`.
//! Replaying the log yields the current completion rows:
//!
//! - `completion_recorded` adds a row
//! - `completion_reviewed` sets the status of an existing row
//!
//! Sequence numbers are assigned under the ledger lock as `last + 1`, and
//! `created_at` never moves backwards, so `(created_at, seq)` orders rows
//! in insertion order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::links::LinkStore;
use crate::lock::FileLock;
use crate::model::{Completion, CompletionMethod, CompletionStatus, NewCompletion, Task};
use crate::storage::Storage;
use crate::visits::VisitStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventType {
    CompletionRecorded,
    CompletionReviewed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: LedgerEventType,
    pub timestamp: DateTime<Utc>,
    pub completion_id: String,
    pub status: CompletionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<CompletionMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
}

impl LedgerEvent {
    fn new(
        event_type: LedgerEventType,
        completion_id: impl Into<String>,
        status: CompletionStatus,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Ulid::new().to_string(),
            event_type,
            timestamp,
            completion_id: completion_id.into(),
            status,
            seq: None,
            visit_id: None,
            task_id: None,
            method: None,
            meta: None,
            reviewed_by: None,
        }
    }
}

/// Fold events into completion rows, in insertion order.
pub fn replay(events: &[LedgerEvent]) -> Vec<Completion> {
    let mut rows: Vec<Completion> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for event in events {
        match event.event_type {
            LedgerEventType::CompletionRecorded => {
                let (Some(seq), Some(visit_id), Some(task_id), Some(method)) = (
                    event.seq,
                    event.visit_id.clone(),
                    event.task_id.clone(),
                    event.method.clone(),
                ) else {
                    tracing::warn!(event_id = %event.event_id, "skipping incomplete ledger event");
                    continue;
                };
                index.insert(event.completion_id.clone(), rows.len());
                rows.push(Completion {
                    id: event.completion_id.clone(),
                    seq,
                    visit_id,
                    task_id,
                    method,
                    status: event.status,
                    meta: event.meta.clone().unwrap_or_default(),
                    created_at: event.timestamp,
                    updated_at: None,
                    reviewed_by: None,
                });
            }
            LedgerEventType::CompletionReviewed => {
                let Some(&pos) = index.get(&event.completion_id) else {
                    tracing::warn!(
                        completion_id = %event.completion_id,
                        "review for unknown completion ignored"
                    );
                    continue;
                };
                let row = &mut rows[pos];
                row.status = event.status;
                row.updated_at = Some(event.timestamp);
                row.reviewed_by = event.reviewed_by.clone();
            }
        }
    }

    rows
}

/// The completion ledger
#[derive(Debug, Clone)]
pub struct Ledger {
    storage: Storage,
    links: LinkStore,
    visits: VisitStore,
}

impl Ledger {
    pub fn new(storage: Storage, links: LinkStore, visits: VisitStore) -> Self {
        Self {
            storage,
            links,
            visits,
        }
    }

    pub fn events(&self) -> Result<Vec<LedgerEvent>> {
        self.storage.read_jsonl(&self.storage.completions_file())
    }

    pub fn completions(&self) -> Result<Vec<Completion>> {
        Ok(replay(&self.events()?))
    }

    pub fn get(&self, completion_id: &str) -> Result<Completion> {
        self.completions()?
            .into_iter()
            .find(|row| row.id == completion_id)
            .ok_or_else(|| Error::NotFound(format!("completion {completion_id}")))
    }

    /// The visit's rows in insertion order.
    pub fn for_visit(&self, visit_id: &str) -> Result<Vec<Completion>> {
        Ok(self
            .completions()?
            .into_iter()
            .filter(|row| row.visit_id == visit_id)
            .collect())
    }

    /// Append a completion after checking that the visit and task exist and
    /// belong to the same link.
    pub fn append(&self, new: NewCompletion) -> Result<Completion> {
        self.check_references(&new.visit_id, &new.task_id)?;

        let path = self.storage.completions_file();
        let _lock = FileLock::for_file(&path)?;

        let events = self.events()?;
        let last_seq = events.iter().filter_map(|event| event.seq).max().unwrap_or(0);
        let last_time = events.iter().map(|event| event.timestamp).max();
        let now = Utc::now();
        let created_at = match last_time {
            Some(last) if last > now => last,
            _ => now,
        };

        let mut event = LedgerEvent::new(
            LedgerEventType::CompletionRecorded,
            Uuid::new_v4().to_string(),
            new.status,
            created_at,
        );
        event.seq = Some(last_seq + 1);
        event.visit_id = Some(new.visit_id);
        event.task_id = Some(new.task_id);
        event.method = Some(new.method);
        event.meta = Some(new.meta);

        self.storage.append_jsonl(&path, &event)?;

        let completion = replay(std::slice::from_ref(&event))
            .pop()
            .ok_or_else(|| Error::OperationFailed("ledger event did not replay".to_string()))?;
        tracing::info!(
            completion_id = %completion.id,
            seq = completion.seq,
            visit_id = %completion.visit_id,
            task_id = %completion.task_id,
            method = %completion.method,
            status = %completion.status,
            "completion recorded"
        );
        Ok(completion)
    }

    /// Administrative status change of an existing row.
    pub fn review(
        &self,
        completion_id: &str,
        status: CompletionStatus,
        reviewed_by: &str,
    ) -> Result<Completion> {
        let path = self.storage.completions_file();
        let _lock = FileLock::for_file(&path)?;

        let events = self.events()?;
        let mut rows = replay(&events);
        let pos = rows
            .iter()
            .position(|row| row.id == completion_id)
            .ok_or_else(|| Error::NotFound(format!("completion {completion_id}")))?;

        let mut event = LedgerEvent::new(
            LedgerEventType::CompletionReviewed,
            completion_id,
            status,
            Utc::now(),
        );
        event.reviewed_by = Some(reviewed_by.to_string());
        self.storage.append_jsonl(&path, &event)?;

        let mut row = rows.swap_remove(pos);
        row.status = status;
        row.updated_at = Some(event.timestamp);
        row.reviewed_by = event.reviewed_by;
        tracing::info!(completion_id, status = %status, reviewed_by, "completion reviewed");
        Ok(row)
    }

    /// The task a completion for `(visit_id, task_id)` would point at.
    pub fn check_references(&self, visit_id: &str, task_id: &str) -> Result<Task> {
        let visit = self.visits.find(visit_id)?.ok_or_else(|| {
            Error::ReferenceViolation(format!("completion references unknown visit {visit_id}"))
        })?;
        let (task, _) = self.links.find_task(task_id)?.ok_or_else(|| {
            Error::ReferenceViolation(format!("completion references unknown task {task_id}"))
        })?;
        if task.link_id != visit.link_id {
            return Err(Error::ReferenceViolation(format!(
                "task {} does not belong to the link of visit {}",
                task.id, visit.id
            )));
        }
        Ok(task)
    }
}
