#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

pub const OWNER_TOKEN: &str = "tok-alice";
pub const ADMIN_TOKEN: &str = "root-secret";

pub const DEFAULT_CONFIG: &str = r#"
[auth]
admin_token = "root-secret"

[auth.tokens]
tok-alice = "alice"
tok-bob = "bob"

[verification]
delay = "0s"
"#;

/// A throwaway data directory with a linksy.toml.
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let env = Self::empty();
        env.write_config(DEFAULT_CONFIG).expect("write config");
        env
    }

    /// Data directory without a config file.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join("linksy.toml");
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// `linksy` with the data dir pinned and ambient overrides cleared.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("linksy").expect("binary");
        cmd.env("LINKSY_DATA_DIR", self.dir.path())
            .env_remove("LINKSY_USER")
            .env_remove("LINKSY_CONFIG")
            .env_remove("LINKSY_ADMIN_TOKEN")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run as `user` with `--json` and return the `data` of a success envelope.
    pub fn json_as(&self, user: &str, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(["--user", user])
            .args(args)
            .output()
            .expect("run linksy");
        assert!(
            output.status.success(),
            "linksy {:?} failed: {}{}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("json envelope");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }

    pub fn json(&self, args: &[&str]) -> Value {
        self.json_as("alice", args)
    }

    /// Run with `--json`, expect failure, return (exit code, error object).
    pub fn json_error(&self, user: &str, args: &[&str]) -> (i32, Value) {
        let output = self
            .cmd()
            .arg("--json")
            .args(["--user", user])
            .args(args)
            .output()
            .expect("run linksy");
        assert!(!output.status.success(), "linksy {args:?} unexpectedly succeeded");
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("json envelope");
        assert_eq!(envelope["status"], "error");
        (output.status.code().unwrap_or(-1), envelope["error"].clone())
    }

    /// Create a link owned by alice and return its id.
    pub fn create_link(&self, slug: &str) -> String {
        let link = self.json(&["link", "create", slug, "https://example.com/dest"]);
        link["id"].as_str().expect("link id").to_string()
    }

    pub fn add_task(&self, link_id: &str, kind: &str, required: bool) -> String {
        let mut args = vec![
            "task",
            "add",
            link_id,
            "--type",
            kind,
            "--label",
            "Do the thing",
            "--target",
            "https://t.me/example",
        ];
        if !required {
            args.push("--optional");
        }
        let task = self.json(&args);
        task["id"].as_str().expect("task id").to_string()
    }

    pub fn visit(&self, link_id: &str) -> String {
        let visit = self.json(&["visit", link_id, "--ip", "203.0.113.7"]);
        visit["id"].as_str().expect("visit id").to_string()
    }

    pub fn gate(&self, visit_id: &str) -> Value {
        self.json(&["gate", visit_id])
    }
}
