//! Error types for linksy
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad input, missing record, bad credentials)
//! - 3: Blocked by policy (quota, slug collision, rate limit)
//! - 4: Operation failed (io, serialization, lock contention)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the linksy CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for linksy operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Insert rejected: {0}")]
    ReferenceViolation(String),

    // Policy blocks (exit code 3)
    #[error("Link quota exceeded: {owned} of {quota} links in use")]
    QuotaExceeded { owned: usize, quota: usize },

    #[error("Slug already taken: {0}")]
    SlugTaken(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::Unauthorized(_)
            | Error::NotFound(_)
            | Error::ReferenceViolation(_) => exit_codes::USER_ERROR,

            // Policy blocks
            Error::QuotaExceeded { .. } | Error::SlugTaken(_) | Error::RateLimited { .. } => {
                exit_codes::POLICY_BLOCKED
            }

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable machine-readable code, shared by the CLI envelope and HTTP bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidArgument(_) => "validation_error",
            Error::Unauthorized(_) => "unauthorized",
            Error::NotFound(_) => "not_found",
            Error::ReferenceViolation(_) => "reference_violation",
            Error::QuotaExceeded { .. } => "quota_exceeded",
            Error::SlugTaken(_) => "slug_taken",
            Error::RateLimited { .. } => "rate_limited",
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => "internal_error",
        }
    }

    /// Optional structured details for JSON output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::QuotaExceeded { owned, quota } => Some(serde_json::json!({
                "owned": owned,
                "quota": quota,
            })),
            Error::SlugTaken(slug) => Some(serde_json::json!({ "slug": slug })),
            Error::RateLimited { retry_after_secs } => Some(serde_json::json!({
                "retry_after_secs": retry_after_secs,
            })),
            _ => None,
        }
    }

    /// True for failures of the service itself rather than of the caller's input.
    pub fn is_internal(&self) -> bool {
        self.exit_code() == exit_codes::OPERATION_FAILED
    }
}

/// Result type alias for linksy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        // Internal failures never leak paths or parser output to callers.
        let error = if err.is_internal() {
            "Internal Server Error".to_string()
        } else {
            err.to_string()
        };
        JsonError {
            error,
            code: err.kind(),
            details: err.details(),
        }
    }
}
