//! Command-line interface for linksy
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::service::Linksy;
use crate::storage::Storage;

mod flow;
mod init;
mod link;
mod serve;
mod slug;
mod task;

/// linksy - branded short links gated behind social tasks
///
/// Owners create links and attach tasks; visitors complete the tasks
/// before the destination is revealed.
#[derive(Parser, Debug)]
#[command(name = "linksy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true, env = "LINKSY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Config file (defaults to <data dir>/linksy.toml)
    #[arg(long, global = true, env = "LINKSY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Acting owner for link and task commands
    #[arg(long, global = true, env = "LINKSY_USER")]
    pub user: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and a default linksy.toml
    Init,

    /// Run the HTTP API
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Link management
    #[command(subcommand)]
    Link(LinkCommands),

    /// Task management for a link
    #[command(subcommand)]
    Task(TaskCommands),

    /// Slug helpers
    #[command(subcommand)]
    Slug(SlugCommands),

    /// Record a visit to a link
    Visit {
        /// Link id
        link: String,

        /// Client address to record
        #[arg(long, default_value = "unknown")]
        ip: String,

        #[arg(long)]
        user_agent: Option<String>,

        #[arg(long)]
        referer: Option<String>,
    },

    /// Submit a manual claim with proof
    Claim {
        /// Visit id
        visit: String,

        /// Task id
        task: String,

        /// URL of the uploaded proof
        #[arg(long)]
        proof_url: String,

        /// Free-form note stored in the completion meta
        #[arg(long)]
        note: Option<String>,
    },

    /// Record a verification result for a task
    Verify {
        /// Task id
        task: String,

        /// Visit id
        #[arg(long)]
        visit: String,

        /// pending, success or failed (default: pending)
        #[arg(long)]
        status: Option<String>,

        /// Verification method tag (default: redirect_check)
        #[arg(long)]
        method: Option<String>,
    },

    /// Deliver a platform callback as the webhook endpoint would
    Webhook {
        /// Visit id
        visit: String,

        /// Task id
        task: String,

        /// pending, success or failed (default: success)
        #[arg(long)]
        status: Option<String>,
    },

    /// Open a task target and record success after the verification delay
    Open {
        /// Visit id
        visit: String,

        /// Task id
        task: String,
    },

    /// Show the unlock decision for a visit
    Gate {
        /// Visit id
        visit: String,
    },

    /// Override a completion status (admin)
    Review {
        /// Completion id
        completion: String,

        /// pending, success or failed
        #[arg(long)]
        status: String,

        /// Admin token (must match auth.admin_token)
        #[arg(long, env = "LINKSY_ADMIN_TOKEN", hide_env_values = true)]
        admin_token: Option<String>,
    },

    /// List completions recorded for a visit
    Completions {
        /// Visit id
        visit: String,
    },

    /// Visit and conversion numbers for an owned link
    Analytics {
        /// Link id
        link: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum LinkCommands {
    /// Create a link
    Create {
        /// Public slug
        slug: String,

        /// Destination URL revealed once the gate opens
        destination: String,

        #[arg(long)]
        title: Option<String>,

        /// Hex color, e.g. #1a2b3c
        #[arg(long)]
        brand_color: Option<String>,

        #[arg(long)]
        logo_url: Option<String>,
    },

    /// List your links, newest first
    List,

    /// Show a link with its tasks
    Show {
        /// Link id
        id: String,
    },

    /// Update link fields (pass an empty value to clear an optional field)
    Update {
        /// Link id
        id: String,

        #[arg(long)]
        destination: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        brand_color: Option<String>,

        #[arg(long)]
        logo_url: Option<String>,
    },

    /// Soft-delete a link
    Delete {
        /// Link id
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Attach a task to a link
    Add {
        /// Link id
        link: String,

        /// Task type tag (see `linksy task kinds`)
        #[arg(long = "type")]
        kind: String,

        #[arg(long)]
        label: String,

        /// URL the visitor opens for the task
        #[arg(long)]
        target: Option<String>,

        /// Mark the task optional
        #[arg(long)]
        optional: bool,
    },

    /// Edit a task
    Edit {
        /// Link id
        link: String,

        /// Task id
        task: String,

        #[arg(long = "type")]
        kind: Option<String>,

        #[arg(long)]
        label: Option<String>,

        #[arg(long)]
        target: Option<String>,

        #[arg(long)]
        required: Option<bool>,
    },

    /// Remove a task
    Rm {
        /// Link id
        link: String,

        /// Task id
        task: String,
    },

    /// List the built-in task types
    Kinds,
}

#[derive(Subcommand, Debug)]
pub enum SlugCommands {
    /// Check that a slug is well formed and free
    Check { slug: String },

    /// Derive a slug from free text
    Generate { text: String },
}

/// Global flags every command receives.
pub(crate) struct Context {
    pub data_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub user: Option<String>,
    pub output: OutputOptions,
}

impl Context {
    pub fn storage(&self) -> Result<Storage> {
        Storage::resolve(self.data_dir.clone())
    }

    pub fn load_config(&self, storage: &Storage) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load(path),
            None => Config::load_from_dir(storage.data_dir()),
        }
    }

    pub fn open(&self) -> Result<Linksy> {
        let storage = self.storage()?;
        let config = self.load_config(&storage)?;
        Linksy::open(storage, config)
    }

    pub fn require_user(&self) -> Result<String> {
        match self.user.as_deref().map(str::trim) {
            Some(user) if !user.is_empty() => Ok(user.to_string()),
            _ => Err(Error::InvalidArgument(
                "no owner given; pass --user or set LINKSY_USER".to_string(),
            )),
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = Context {
            data_dir: self.data_dir,
            config: self.config,
            user: self.user,
            output: OutputOptions {
                json: self.json,
                quiet: self.quiet,
            },
        };

        match self.command {
            Commands::Init => init::run(&ctx),
            Commands::Serve { bind } => serve::run(&ctx, bind),
            Commands::Link(cmd) => match cmd {
                LinkCommands::Create {
                    slug,
                    destination,
                    title,
                    brand_color,
                    logo_url,
                } => link::run_create(
                    &ctx,
                    crate::links::NewLink {
                        slug,
                        destination,
                        title,
                        brand_color,
                        logo_url,
                    },
                ),
                LinkCommands::List => link::run_list(&ctx),
                LinkCommands::Show { id } => link::run_show(&ctx, &id),
                LinkCommands::Update {
                    id,
                    destination,
                    title,
                    brand_color,
                    logo_url,
                } => link::run_update(
                    &ctx,
                    &id,
                    crate::links::LinkUpdate {
                        title,
                        destination,
                        brand_color,
                        logo_url,
                    },
                ),
                LinkCommands::Delete { id } => link::run_delete(&ctx, &id),
            },
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    link,
                    kind,
                    label,
                    target,
                    optional,
                } => task::run_add(
                    &ctx,
                    &link,
                    crate::links::NewTask {
                        kind,
                        label,
                        target,
                        required: Some(!optional),
                    },
                ),
                TaskCommands::Edit {
                    link,
                    task,
                    kind,
                    label,
                    target,
                    required,
                } => task::run_edit(
                    &ctx,
                    &link,
                    &task,
                    crate::links::TaskUpdate {
                        kind,
                        label,
                        target,
                        required,
                    },
                ),
                TaskCommands::Rm { link, task } => task::run_rm(&ctx, &link, &task),
                TaskCommands::Kinds => task::run_kinds(&ctx),
            },
            Commands::Slug(cmd) => match cmd {
                SlugCommands::Check { slug } => slug::run_check(&ctx, &slug),
                SlugCommands::Generate { text } => slug::run_generate(&ctx, &text),
            },
            Commands::Visit {
                link,
                ip,
                user_agent,
                referer,
            } => flow::run_visit(&ctx, &link, ip, user_agent, referer),
            Commands::Claim {
                visit,
                task,
                proof_url,
                note,
            } => flow::run_claim(&ctx, visit, task, proof_url, note),
            Commands::Verify {
                task,
                visit,
                status,
                method,
            } => flow::run_verify(&ctx, &task, visit, status, method),
            Commands::Webhook {
                visit,
                task,
                status,
            } => flow::run_webhook(&ctx, visit, task, status),
            Commands::Open { visit, task } => flow::run_open(&ctx, &visit, &task),
            Commands::Gate { visit } => flow::run_gate(&ctx, &visit),
            Commands::Review {
                completion,
                status,
                admin_token,
            } => flow::run_review(&ctx, &completion, &status, admin_token.as_deref()),
            Commands::Completions { visit } => flow::run_completions(&ctx, &visit),
            Commands::Analytics { link } => link::run_analytics(&ctx, &link),
        }
    }
}
