mod support;

use linksy::error::exit_codes;
use serde_json::Value;

use support::{TestEnv, ADMIN_TOKEN};

fn ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("id").to_string())
        .collect()
}

#[test]
fn webhook_success_unlocks_visit() {
    let env = TestEnv::new();
    let link = env.create_link("gated");
    let task = env.add_task(&link, "join_telegram", true);
    let visit = env.visit(&link);

    let gate = env.gate(&visit);
    assert_eq!(gate["unlocked"], false);
    assert_eq!(ids(&gate["missing"]), vec![task.clone()]);
    assert!(gate.get("destination").is_none());

    let row = env.json(&["webhook", &visit, &task]);
    assert_eq!(row["status"], "success");
    assert_eq!(row["method"], "webhook");

    let gate = env.gate(&visit);
    assert_eq!(gate["unlocked"], true);
    assert_eq!(gate["destination"], "https://example.com/dest");
    assert_eq!(ids(&gate["satisfied"]), vec![task]);
}

#[test]
fn optional_tasks_do_not_block() {
    let env = TestEnv::new();
    let link = env.create_link("mixed");
    let required = env.add_task(&link, "youtube", true);
    let optional = env.add_task(&link, "instagram", false);
    let visit = env.visit(&link);

    env.json(&["verify", &required, "--visit", &visit, "--status", "success"]);
    let gate = env.gate(&visit);
    assert_eq!(gate["unlocked"], true);
    assert!(!ids(&gate["satisfied"]).contains(&optional));

    env.json(&["webhook", &visit, &optional]);
    let gate = env.gate(&visit);
    assert_eq!(ids(&gate["satisfied"]).len(), 2);
}

#[test]
fn latest_completion_wins() {
    let env = TestEnv::new();
    let link = env.create_link("flaky");
    let task = env.add_task(&link, "twitter_follow", true);
    let visit = env.visit(&link);

    env.json(&["webhook", &visit, &task]);
    assert_eq!(env.gate(&visit)["unlocked"], true);

    env.json(&["webhook", &visit, &task, "--status", "failed"]);
    assert_eq!(env.gate(&visit)["unlocked"], false);

    env.json(&["verify", &task, "--visit", &visit, "--status", "success"]);
    assert_eq!(env.gate(&visit)["unlocked"], true);

    let listed = env.json(&["completions", &visit]);
    assert_eq!(listed["total"], 3);
    let seqs: Vec<u64> = listed["completions"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|row| row["seq"].as_u64().expect("seq"))
        .collect();
    assert!(seqs.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn completions_are_scoped_to_their_visit() {
    let env = TestEnv::new();
    let link = env.create_link("scoped");
    let task = env.add_task(&link, "join_discord", true);
    let first = env.visit(&link);
    let second = env.visit(&link);

    env.json(&["webhook", &first, &task]);
    assert_eq!(env.gate(&first)["unlocked"], true);
    assert_eq!(env.gate(&second)["unlocked"], false);
}

#[test]
fn manual_claim_waits_for_admin_review() {
    let env = TestEnv::new();
    let link = env.create_link("manual");
    let task = env.add_task(&link, "manual", true);
    let visit = env.visit(&link);

    let claim = env.json(&[
        "claim",
        &visit,
        &task,
        "--proof-url",
        "https://example.com/proof.png",
        "--note",
        "joined",
    ]);
    assert_eq!(claim["status"], "pending");
    assert_eq!(claim["meta"]["proof_url"], "https://example.com/proof.png");
    let completion = claim["id"].as_str().expect("id").to_string();
    assert_eq!(env.gate(&visit)["unlocked"], false);

    let (code, error) = env.json_error(
        "alice",
        &["review", &completion, "--status", "success", "--admin-token", "guess"],
    );
    assert_eq!(code, exit_codes::USER_ERROR);
    assert_eq!(error["kind"], "unauthorized");

    let reviewed = env.json(&[
        "review",
        &completion,
        "--status",
        "success",
        "--admin-token",
        ADMIN_TOKEN,
    ]);
    assert_eq!(reviewed["status"], "success");
    assert_eq!(reviewed["reviewed_by"], "admin");
    assert_eq!(env.gate(&visit)["unlocked"], true);
}

#[test]
fn references_are_checked() {
    let env = TestEnv::new();
    let link = env.create_link("refs-one");
    let other = env.create_link("refs-two");
    let task = env.add_task(&link, "youtube", true);
    let foreign_task = env.add_task(&other, "youtube", true);
    let visit = env.visit(&link);

    let (code, error) = env.json_error("alice", &["webhook", &visit, &foreign_task]);
    assert_eq!(code, exit_codes::USER_ERROR);
    assert_eq!(error["kind"], "reference_violation");

    let missing = "00000000-0000-4000-8000-000000000000";
    let (_, error) = env.json_error("alice", &["webhook", missing, &task]);
    assert_eq!(error["kind"], "reference_violation");

    let (_, error) = env.json_error("alice", &["webhook", "not-a-uuid", &task]);
    assert_eq!(error["kind"], "validation_error");

    let (_, error) = env.json_error("alice", &["visit", missing]);
    assert_eq!(error["kind"], "reference_violation");

    let (_, error) = env.json_error("alice", &["gate", missing]);
    assert_eq!(error["kind"], "not_found");
}

#[test]
fn open_records_time_based_success() {
    let env = TestEnv::new();
    let link = env.create_link("timed");
    let task = env.add_task(&link, "tiktok_follow", true);
    let visit = env.visit(&link);

    let opened = env.json(&["open", &visit, &task]);
    assert_eq!(opened["target"], "https://t.me/example");
    assert_eq!(opened["completion"]["method"], "time_based_verification");
    assert_eq!(opened["completion"]["status"], "success");
    assert_eq!(env.gate(&visit)["unlocked"], true);
}

#[test]
fn deleted_link_hides_gate() {
    let env = TestEnv::new();
    let link = env.create_link("gone-soon");
    let visit = env.visit(&link);
    assert_eq!(env.gate(&visit)["unlocked"], true);

    env.json(&["link", "delete", &link]);
    let (_, error) = env.json_error("alice", &["gate", &visit]);
    assert_eq!(error["kind"], "not_found");
}

#[test]
fn analytics_counts_successful_visits() {
    let env = TestEnv::new();
    let link = env.create_link("stats");
    let task = env.add_task(&link, "youtube", true);
    let converted = env.visit(&link);
    env.visit(&link);
    env.visit(&link);
    env.json(&["webhook", &converted, &task]);

    let report = env.json(&["analytics", &link]);
    assert_eq!(report["total_visits"], 3);
    assert_eq!(report["total_completions"], 1);
    assert_eq!(report["conversion_rate"], 33.33);
    assert_eq!(report["chart_data"].as_array().expect("chart").len(), 7);
    assert_eq!(report["cached"], false);

    let (_, error) = env.json_error("bob", &["analytics", &link]);
    assert_eq!(error["kind"], "not_found");
}
