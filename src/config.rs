//! Configuration loading and management
//!
//! Handles parsing of `linksy.toml` configuration files.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::CONFIG_FILE;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Link lifecycle configuration
    #[serde(default)]
    pub links: LinksConfig,

    /// Bearer token table and admin key
    #[serde(default)]
    pub auth: AuthConfig,

    /// Per-client request throttling
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Analytics aggregation
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Verification adapters
    #[serde(default)]
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Maximum number of active (non-deleted) links per owner
    #[serde(default = "default_quota")]
    pub quota: usize,
}

fn default_quota() -> usize {
    10
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            quota: default_quota(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token that authorizes completion reviews
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,

    /// Bearer token -> user id
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests allowed per window and client
    #[serde(default = "default_rate_limit")]
    pub limit: u32,

    /// Window length (e.g., "60s", "1m")
    #[serde(default = "default_rate_window")]
    pub window: String,
}

fn default_true() -> bool {
    true
}

fn default_rate_limit() -> u32 {
    20
}

fn default_rate_window() -> String {
    "60s".to_string()
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: default_rate_limit(),
            window: default_rate_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// How long an aggregated report is served from cache
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: String,
}

fn default_cache_ttl() -> String {
    "30s".to_string()
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            cache_ttl: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Delay before a time-based verification records success
    #[serde(default = "default_verification_delay")]
    pub delay: String,
}

fn default_verification_delay() -> String {
    "5s".to_string()
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            delay: default_verification_delay(),
        }
    }
}

impl Config {
    /// Load configuration from a `linksy.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `linksy.toml` from the data directory, or return defaults when absent
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind.parse().map_err(|err| {
            Error::InvalidConfig(format!(
                "server.bind: invalid address '{}': {err}",
                self.server.bind
            ))
        })
    }

    pub fn rate_limit_window(&self) -> Result<std::time::Duration> {
        to_std(parse_duration(&self.rate_limit.window)?, "rate_limit.window")
    }

    pub fn analytics_cache_ttl(&self) -> Result<std::time::Duration> {
        to_std(parse_duration(&self.analytics.cache_ttl)?, "analytics.cache_ttl")
    }

    pub fn verification_delay(&self) -> Result<std::time::Duration> {
        to_std(parse_duration(&self.verification.delay)?, "verification.delay")
    }

    fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self.links.quota == 0 {
            return Err(Error::InvalidConfig(
                "links.quota must be >= 1".to_string(),
            ));
        }

        if self.rate_limit.limit == 0 {
            return Err(Error::InvalidConfig(
                "rate_limit.limit must be >= 1".to_string(),
            ));
        }
        if self.rate_limit_window()?.is_zero() {
            return Err(Error::InvalidConfig(
                "rate_limit.window must be > 0".to_string(),
            ));
        }

        self.analytics_cache_ttl()?;
        self.verification_delay()?;

        if let Some(admin) = &self.auth.admin_token {
            if admin.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "auth.admin_token cannot be empty".to_string(),
                ));
            }
        }
        for (token, user) in &self.auth.tokens {
            if token.trim().is_empty() || user.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "auth.tokens cannot include empty tokens or user ids".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn to_std(duration: Duration, field: &str) -> Result<std::time::Duration> {
    duration
        .to_std()
        .map_err(|_| Error::InvalidConfig(format!("{field}: duration must not be negative")))
}

/// Parse a duration string like "30s", "5m", "2h", "1d".
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if s.is_empty() {
        return Err(Error::InvalidConfig("duration cannot be empty".to_string()));
    }

    let (num_str, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => (&s[..pos], s[pos..].trim()),
        None => (s, "s"),
    };

    let num: i64 = num_str.parse().map_err(|_| {
        Error::InvalidConfig(format!("invalid duration number: '{num_str}'"))
    })?;

    let duration = match unit.to_lowercase().as_str() {
        "ms" => Duration::milliseconds(num),
        "s" | "sec" | "second" | "seconds" => Duration::seconds(num),
        "m" | "min" | "minute" | "minutes" => Duration::minutes(num),
        "h" | "hr" | "hour" | "hours" => Duration::hours(num),
        "d" | "day" | "days" => Duration::days(num),
        _ => {
            return Err(Error::InvalidConfig(format!(
                "invalid duration unit '{unit}'. Expected: ms, s, m, h, d"
            )));
        }
    };

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.server.bind, "127.0.0.1:3000");
        assert_eq!(cfg.links.quota, 10);
        assert!(cfg.auth.admin_token.is_none());
        assert!(cfg.auth.tokens.is_empty());
        assert!(cfg.rate_limit.enabled);
        assert_eq!(cfg.rate_limit.limit, 20);
        assert_eq!(cfg.rate_limit_window().unwrap().as_secs(), 60);
        assert_eq!(cfg.analytics_cache_ttl().unwrap().as_secs(), 30);
        assert_eq!(cfg.verification_delay().unwrap().as_secs(), 5);
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[server]
bind = "0.0.0.0:8080"

[links]
quota = 3

[auth]
admin_token = "root-key"

[auth.tokens]
"tok-alice" = "alice"
"tok-bob" = "bob"

[rate_limit]
enabled = false
limit = 5
window = "2m"

[analytics]
cache_ttl = "10s"

[verification]
delay = "250ms"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.bind_addr().unwrap().port(), 8080);
        assert_eq!(cfg.links.quota, 3);
        assert_eq!(cfg.auth.admin_token.as_deref(), Some("root-key"));
        assert_eq!(cfg.auth.tokens.get("tok-bob").map(String::as_str), Some("bob"));
        assert!(!cfg.rate_limit.enabled);
        assert_eq!(cfg.rate_limit.limit, 5);
        assert_eq!(cfg.rate_limit_window().unwrap().as_secs(), 120);
        assert_eq!(cfg.analytics_cache_ttl().unwrap().as_secs(), 10);
        assert_eq!(cfg.verification_delay().unwrap().as_millis(), 250);
    }

    #[test]
    fn zero_quota_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[links]\nquota = 0").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_durations_and_bind_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);

        fs::write(&path, "[rate_limit]\nwindow = \"soon\"").expect("write config");
        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));

        fs::write(&path, "[server]\nbind = \"localhost\"").expect("write config");
        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn load_from_dir_defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path()).expect("defaults");
        assert_eq!(cfg.links.quota, 10);
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        Config::default().save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("quota = 10"));
        let reloaded = Config::load(&path).expect("reload");
        assert_eq!(reloaded.rate_limit.limit, 20);
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("45").unwrap(), Duration::seconds(45));
        assert_eq!(parse_duration("5m").unwrap(), Duration::minutes(5));
        assert_eq!(parse_duration("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_duration("1d").unwrap(), Duration::days(1));
        assert_eq!(parse_duration("100ms").unwrap(), Duration::milliseconds(100));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3 fortnights").is_err());
    }
}
