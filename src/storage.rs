//! Storage layer for linksy
//!
//! All state lives in a single data directory. It plays the role of the
//! system of record: a registry file for mutable link/task records and
//! append-only logs for visits and completions.
//!
//! # Directory Structure
//!
//! ```text
//! <data dir>/
//!   linksy.toml          # Optional configuration
//!   links.json           # Registry of links and their tasks (rewritten under lock)
//!   visits.jsonl         # One line per recorded visit (append-only)
//!   completions.jsonl    # Completion ledger events (append-only)
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::lock;

/// Configuration file name inside the data directory
pub const CONFIG_FILE: &str = "linksy.toml";

const LINKS_FILE: &str = "links.json";
const VISITS_FILE: &str = "visits.jsonl";
const COMPLETIONS_FILE: &str = "completions.jsonl";

/// Storage manager for linksy state
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolve the data directory: explicit path, else the platform data dir.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }
        let dirs = directories::ProjectDirs::from("", "", "linksy").ok_or_else(|| {
            Error::InvalidConfig(
                "no home directory found; pass --data-dir or set LINKSY_DATA_DIR".to_string(),
            )
        })?;
        Ok(Self::new(dirs.data_dir()))
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn links_file(&self) -> PathBuf {
        self.data_dir.join(LINKS_FILE)
    }

    pub fn visits_file(&self) -> PathBuf {
        self.data_dir.join(VISITS_FILE)
    }

    pub fn completions_file(&self) -> PathBuf {
        self.data_dir.join(COMPLETIONS_FILE)
    }

    /// Create the data directory if it does not exist yet
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Write JSON data atomically (write to temp, then rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Read JSON data from a file, or `None` when the file does not exist
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(Some(data))
    }

    /// Append a line to a JSONL file.
    ///
    /// Not atomic across processes on its own; callers hold the file's lock.
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        writeln!(file, "{}", json)?;
        file.sync_all()?;

        Ok(())
    }

    /// Read all records from a JSONL file
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: T = serde_json::from_str(&line)?;
            records.push(record);
        }

        Ok(records)
    }
}
