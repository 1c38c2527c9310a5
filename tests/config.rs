mod support;

use std::time::Duration;

use linksy::config::Config;
use linksy::error::{exit_codes, Error};

use support::TestEnv;

#[test]
fn config_defaults_when_missing() {
    let env = TestEnv::empty();
    let config = Config::load_from_dir(env.path()).expect("defaults");

    assert_eq!(config.server.bind, "127.0.0.1:3000");
    assert_eq!(config.links.quota, 10);
    assert!(config.rate_limit.enabled);
    assert_eq!(config.rate_limit.limit, 20);
    assert_eq!(config.rate_limit_window().unwrap(), Duration::from_secs(60));
    assert_eq!(config.analytics_cache_ttl().unwrap(), Duration::from_secs(30));
    assert_eq!(config.verification_delay().unwrap(), Duration::from_secs(5));
    assert!(config.auth.tokens.is_empty());
    assert!(config.auth.admin_token.is_none());
}

#[test]
fn config_overrides_from_toml() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::empty();
    env.write_config(
        r#"
[server]
bind = "0.0.0.0:8080"

[links]
quota = 3

[rate_limit]
enabled = false
limit = 5
window = "2m"

[analytics]
cache_ttl = "500ms"

[auth]
admin_token = "adm"

[auth.tokens]
t1 = "user-1"
"#,
    )?;

    let config = Config::load_from_dir(env.path())?;
    assert_eq!(config.bind_addr()?.port(), 8080);
    assert_eq!(config.links.quota, 3);
    assert!(!config.rate_limit.enabled);
    assert_eq!(config.rate_limit_window()?, Duration::from_secs(120));
    assert_eq!(config.analytics_cache_ttl()?, Duration::from_millis(500));
    assert_eq!(config.auth.tokens.get("t1").map(String::as_str), Some("user-1"));
    Ok(())
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        "[links]\nquota = 0\n",
        "[rate_limit]\nwindow = \"0s\"\n",
        "[rate_limit]\nwindow = \"5 fortnights\"\n",
        "[server]\nbind = \"not an address\"\n",
        "[auth]\nadmin_token = \"  \"\n",
    ];
    for case in cases {
        let env = TestEnv::empty();
        env.write_config(case).expect("write");
        let err = Config::load_from_dir(env.path()).expect_err(case);
        assert!(matches!(err, Error::InvalidConfig(_)), "{case}: {err}");
    }
}

#[test]
fn quota_from_config_applies_to_cli() {
    let env = TestEnv::new();
    env.write_config(&format!("{}\n[links]\nquota = 1\n", support::DEFAULT_CONFIG))
        .expect("write");

    env.create_link("only-one");
    let (code, error) = env.json_error("alice", &["link", "create", "second", "https://example.com"]);
    assert_eq!(code, exit_codes::POLICY_BLOCKED);
    assert_eq!(error["details"]["quota"], 1);
}

#[test]
fn init_writes_default_config_once() {
    let env = TestEnv::empty();
    let data_dir = env.path().join("nested");

    let output = env
        .cmd()
        .env("LINKSY_DATA_DIR", &data_dir)
        .args(["--json", "init"])
        .output()
        .expect("run init");
    assert!(output.status.success());
    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(envelope["data"]["created"]["config"], true);
    assert!(data_dir.join("linksy.toml").exists());

    let config = Config::load_from_dir(&data_dir).expect("written config parses");
    assert_eq!(config.links.quota, 10);

    let output = env
        .cmd()
        .env("LINKSY_DATA_DIR", &data_dir)
        .args(["--json", "init"])
        .output()
        .expect("run init");
    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(envelope["data"]["created"]["config"], false);
}

#[test]
fn broken_config_fails_with_user_error() {
    let env = TestEnv::empty();
    env.write_config("[links\nquota = ").expect("write");

    let (code, error) = env.json_error("alice", &["link", "list"]);
    assert_eq!(code, exit_codes::OPERATION_FAILED);
    assert_eq!(error["kind"], "internal_error");

    env.write_config("[links]\nquota = 0\n").expect("write");
    let (code, error) = env.json_error("alice", &["link", "list"]);
    assert_eq!(code, exit_codes::USER_ERROR);
    assert_eq!(error["kind"], "invalid_config");
}
