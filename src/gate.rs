//! Gating evaluator.
//!
//! Decides whether a visit has unlocked its link's destination. The
//! decision is recomputed from the ledger on every call; nothing here is
//! stored or mutated.
//!
//! Rules:
//! - per task, the authoritative completion is the one with the greatest
//!   `(created_at, seq)`; the task is satisfied iff that completion is
//!   `success`
//! - a task with no completion is unsatisfied (absence is not pending)
//! - the visit is unlocked iff every required task is satisfied, so a
//!   link with no required tasks is always unlocked
//! - completions that name a task outside `tasks` are ignored

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Completion, CompletionStatus, Task};

/// Per-task view for rendering a checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    None,
    Pending,
    Success,
    Failed,
}

impl From<CompletionStatus> for TaskState {
    fn from(status: CompletionStatus) -> Self {
        match status {
            CompletionStatus::Pending => TaskState::Pending,
            CompletionStatus::Success => TaskState::Success,
            CompletionStatus::Failed => TaskState::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateDecision {
    pub unlocked: bool,
    /// Satisfied task ids, required or not, in task order.
    pub satisfied: Vec<String>,
    /// Required task ids that are not satisfied, in task order.
    pub missing: Vec<String>,
    #[serde(skip)]
    states: Vec<(String, TaskState)>,
}

impl GateDecision {
    pub fn task_state(&self, task_id: &str) -> TaskState {
        self.states
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, state)| *state)
            .unwrap_or(TaskState::None)
    }

    pub fn task_states(&self) -> impl Iterator<Item = (&str, TaskState)> {
        self.states.iter().map(|(id, state)| (id.as_str(), *state))
    }
}

/// Evaluate one visit. `completions` are that visit's ledger rows.
pub fn evaluate(tasks: &[Task], completions: &[Completion]) -> GateDecision {
    let latest = latest_per_task(completions);

    let mut satisfied = Vec::new();
    let mut missing = Vec::new();
    let mut states = Vec::with_capacity(tasks.len());

    for task in tasks {
        let state = latest
            .get(task.id.as_str())
            .map(|completion| TaskState::from(completion.status))
            .unwrap_or(TaskState::None);

        if state == TaskState::Success {
            satisfied.push(task.id.clone());
        } else if task.required {
            missing.push(task.id.clone());
        }
        states.push((task.id.clone(), state));
    }

    GateDecision {
        unlocked: missing.is_empty(),
        satisfied,
        missing,
        states,
    }
}

fn latest_per_task(completions: &[Completion]) -> HashMap<&str, &Completion> {
    let mut latest: HashMap<&str, &Completion> = HashMap::new();
    for completion in completions {
        latest
            .entry(completion.task_id.as_str())
            .and_modify(|current| {
                if (completion.created_at, completion.seq) > (current.created_at, current.seq) {
                    *current = completion;
                }
            })
            .or_insert(completion);
    }
    latest
}
