//! linksy init command implementation
//!
//! Creates the data directory and a default linksy.toml.

use std::path::PathBuf;

use super::Context;
use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct InitReport {
    data_dir: PathBuf,
    config_file: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    data_dir: bool,
    config: bool,
}

pub fn run(ctx: &Context) -> Result<()> {
    let storage = ctx.storage()?;
    let created_dir = !storage.data_dir().exists();
    storage.init()?;

    let config_file = ctx.config.clone().unwrap_or_else(|| storage.config_file());
    let created_config = if config_file.exists() {
        // An existing file is kept but must parse.
        Config::load(&config_file)?;
        false
    } else {
        Config::default().save(&config_file)?;
        true
    };

    let report = InitReport {
        data_dir: storage.data_dir().to_path_buf(),
        config_file: config_file.clone(),
        created: InitCreated {
            data_dir: created_dir,
            config: created_config,
        },
    };

    let header = if created_dir || created_config {
        "linksy init: initialized data directory"
    } else {
        "linksy init: nothing to do"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("data dir", storage.data_dir().display().to_string());
    human.push_summary("config", config_file.display().to_string());
    human.push_next_step("add owner tokens under [auth.tokens]");
    human.push_next_step("linksy --user <id> link create <slug> <url>");

    emit_success(ctx.output, "init", &report, Some(&human))
}
