//! linksy CLI
//!
//! Manages gated links from the command line and runs the HTTP API.

use clap::Parser;
use linksy::cli::Cli;
use linksy::output::{emit_error, infer_command_name_from_args};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let command = infer_command_name_from_args();

    // Tracing is opt-in via RUST_LOG, except for `serve` which logs requests.
    // Ignore invalid/huge filters so startup never fails on them.
    let default_filter = if command == "serve" {
        "linksy=info,tower_http=info"
    } else {
        "off"
    };
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    if let Err(err) = cli.run() {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
