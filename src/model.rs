//! Records shared by the store, the ledger and the evaluator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::TaskKind;
use crate::error::{Error, Result};
use crate::validate;

/// A branded short link. Never physically removed; `is_deleted` hides it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub user_id: String,
    pub slug: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub link_id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub label: String,
    #[serde(default = "default_required")]
    pub required: bool,
    pub created_at: DateTime<Utc>,
}

fn default_required() -> bool {
    true
}

/// One page load of a public link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: String,
    pub link_id: String,
    pub ip: String,
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Pending,
    Success,
    Failed,
}

impl CompletionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionStatus::Pending => "pending",
            CompletionStatus::Success => "success",
            CompletionStatus::Failed => "failed",
        }
    }
}

impl FromStr for CompletionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "pending" => Ok(CompletionStatus::Pending),
            "success" => Ok(CompletionStatus::Success),
            "failed" => Ok(CompletionStatus::Failed),
            other => Err(Error::InvalidArgument(format!(
                "invalid status '{other}'. Must be pending, success, or failed"
            ))),
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance tag of a completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompletionMethod {
    Manual,
    Webhook,
    RedirectCheck,
    TimeBasedVerification,
    Other(String),
}

impl CompletionMethod {
    pub fn as_str(&self) -> &str {
        match self {
            CompletionMethod::Manual => "manual",
            CompletionMethod::Webhook => "webhook",
            CompletionMethod::RedirectCheck => "redirect_check",
            CompletionMethod::TimeBasedVerification => "time_based_verification",
            CompletionMethod::Other(tag) => tag,
        }
    }
}

impl FromStr for CompletionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tag = s.trim();
        validate::validate_tag("method", tag)?;
        Ok(match tag {
            "manual" => CompletionMethod::Manual,
            "webhook" => CompletionMethod::Webhook,
            "redirect_check" => CompletionMethod::RedirectCheck,
            "time_based_verification" => CompletionMethod::TimeBasedVerification,
            other => CompletionMethod::Other(other.to_string()),
        })
    }
}

impl TryFrom<String> for CompletionMethod {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CompletionMethod> for String {
    fn from(method: CompletionMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for CompletionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ledger row: evidence that a task was (or was not) done during a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub id: String,
    /// Insertion order within the ledger; breaks `created_at` ties.
    pub seq: u64,
    pub visit_id: String,
    pub task_id: String,
    pub method: CompletionMethod,
    pub status: CompletionStatus,
    #[serde(default)]
    pub meta: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
}

/// What an adapter asks the ledger to append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCompletion {
    pub visit_id: String,
    pub task_id: String,
    pub method: CompletionMethod,
    pub status: CompletionStatus,
    pub meta: Map<String, Value>,
}

/// Interpret an optional JSON value as a meta object; `null` means empty.
pub fn meta_object(value: Option<Value>) -> Result<Map<String, Value>> {
    match value {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(Error::InvalidArgument("meta must be a JSON object".to_string())),
    }
}
