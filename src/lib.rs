//! linksy - branded short links gated behind social tasks
//!
//! An owner creates a link with a public slug and attaches tasks (join a
//! channel, follow an account, subscribe). A visitor lands on the slug, a
//! visit is recorded, and the destination stays hidden until every required
//! task has a successful completion for that visit.
//!
//! # Core Concepts
//!
//! - **Links**: slug, destination and branding, owned by one user, soft-deleted
//! - **Tasks**: typed, ordered steps attached to a link, required or optional
//! - **Visits**: one record per landing, the unit completions attach to
//! - **Completion ledger**: append-only log of verification results
//! - **Gate**: pure evaluation of tasks against a visit's completions
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `server`: HTTP API using axum
//! - `service`: Facade shared by the CLI and the server
//! - `config`: Configuration loading from `linksy.toml`
//! - `error`: Error types and result aliases
//! - `storage` / `lock`: Data directory layout, file locking and atomic writes
//! - `links` / `visits` / `ledger`: The three stores
//! - `gate`: Unlock evaluation
//! - `verify`: Verification adapters
//! - `analytics`, `cache`, `rate_limit`, `clock`: Supporting services
//! - `catalog`, `slug`, `validate`, `model`, `auth`: Shared types and rules

pub mod analytics;
pub mod auth;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod links;
pub mod lock;
pub mod model;
pub mod output;
pub mod rate_limit;
pub mod server;
pub mod service;
pub mod slug;
pub mod storage;
pub mod validate;
pub mod verify;
pub mod visits;

pub use error::{Error, Result};
