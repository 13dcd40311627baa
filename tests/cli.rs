use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn deskflow(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("deskflow").unwrap();
    cmd.env("DESKFLOW_HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("DESKFLOW_OUTPUT");
    cmd
}

fn json(home: &Path, args: &[&str]) -> Value {
    let output = deskflow(home).args(["-o", "json"]).args(args).output().unwrap();
    assert!(
        output.status.success(),
        "deskflow {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_profile_add_and_list() {
    let home = TempDir::new().unwrap();

    deskflow(home.path())
        .args(["profile", "add", "Standard", "-r", "240", "-s", "1440", "--default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added SLA profile"));

    let list = json(home.path(), &["profile", "list"]);
    assert_eq!(list["count"], 1);
    assert_eq!(list["items"][0]["name"], "Standard");
    assert_eq!(list["items"][0]["is_default"], true);
}

#[test]
fn test_profile_add_rejects_unbounded_target() {
    let home = TempDir::new().unwrap();

    deskflow(home.path())
        .args(["profile", "add", "Huge", "-r", "999999999999", "-s", "1", "--default"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("over"));

    let list = json(home.path(), &["profile", "list"]);
    assert_eq!(list["count"], 0);

    let outcome = json(home.path(), &["ticket", "create", "Still works"]);
    assert!(outcome["ticket"]["sla_response_due"].is_null());
}

#[test]
fn test_ticket_create_uses_default_profile() {
    let home = TempDir::new().unwrap();
    json(
        home.path(),
        &["profile", "add", "Standard", "-r", "240", "-s", "1440", "--standard-multipliers", "--default"],
    );

    let outcome = json(
        home.path(),
        &["ticket", "create", "Printer jammed", "-p", "high", "-t", "hardware", "-t", " hardware "],
    );
    let ticket = &outcome["ticket"];
    assert_eq!(ticket["status"], "open");
    assert_eq!(ticket["priority"], "high");
    assert_eq!(ticket["tags"], serde_json::json!(["hardware"]));
    assert!(ticket["sla_response_due"].is_string());
    assert!(ticket["sla_resolution_due"].is_string());
    assert_eq!(outcome["events"][0]["kind"]["type"], "ticket_created");

    let id = ticket["id"].as_i64().unwrap().to_string();
    let shown = json(home.path(), &["ticket", "show", &id]);
    assert_eq!(shown["ticket"]["title"], "Printer jammed");
}

#[test]
fn test_status_flow_and_history() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("config.yaml"),
        "sla:\n  allow_reopen_closed: false\n",
    )
    .unwrap();
    let outcome = json(home.path(), &["ticket", "create", "VPN down"]);
    let id = outcome["ticket"]["id"].as_i64().unwrap().to_string();

    let moved = json(home.path(), &["ticket", "status", &id, "in_progress"]);
    assert_eq!(moved["ticket"]["status"], "in_progress");

    let resolved = json(home.path(), &["ticket", "status", &id, "resolved"]);
    assert!(resolved["ticket"]["resolved_at"].is_string());

    let history = json(home.path(), &["ticket", "history", &id]);
    assert!(history["count"].as_u64().unwrap() >= 2);

    json(home.path(), &["ticket", "status", &id, "closed"]);
    deskflow(home.path())
        .args(["ticket", "status", &id, "resolved"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot be reopened"));
    deskflow(home.path())
        .args(["ticket", "status", &id, "open"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot be reopened"));
}

#[test]
fn test_rule_import_fires_on_create() {
    let home = TempDir::new().unwrap();
    let rules = home.path().join("import.yaml");
    std::fs::write(
        &rules,
        r"
rules:
  - name: Tag VIP orgs
    trigger_type: ticket_created
    conditions:
      - field: organization_id
        operator: equals
        value: acme
    action:
      type: add_tag
      tag: vip
",
    )
    .unwrap();

    deskflow(home.path())
        .args(["rule", "import"])
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 rules"));

    let list = json(home.path(), &["rule", "list"]);
    assert_eq!(list["count"], 1);

    let outcome = json(home.path(), &["ticket", "create", "Outage", "--org", "acme"]);
    assert_eq!(outcome["ticket"]["tags"], serde_json::json!(["vip"]));
    assert_eq!(outcome["logs"][0]["status"], "success");

    let other = json(home.path(), &["ticket", "create", "Question", "--org", "globex"]);
    assert_eq!(other["ticket"]["tags"], serde_json::json!([]));

    let logs = json(home.path(), &["rule", "logs"]);
    assert_eq!(logs["count"], 1);
}

#[test]
fn test_rule_import_rejects_invalid_set() {
    let home = TempDir::new().unwrap();
    let rules = home.path().join("bad.yaml");
    std::fs::write(
        &rules,
        r"
rules:
  - name: Nightly
    trigger_type: scheduled
    action:
      type: escalate
",
    )
    .unwrap();

    deskflow(home.path())
        .args(["rule", "import"])
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nightly"));

    let list = json(home.path(), &["rule", "list"]);
    assert_eq!(list["count"], 0);
}

#[test]
fn test_rule_toggle_flips_state() {
    let home = TempDir::new().unwrap();
    let rules = home.path().join("import.yaml");
    std::fs::write(
        &rules,
        r"
rules:
  - name: Escalate breaches
    trigger_type: sla_breach
    action:
      type: escalate
",
    )
    .unwrap();
    deskflow(home.path()).args(["rule", "import"]).arg(&rules).assert().success();

    let id = json(home.path(), &["rule", "list"])["items"][0]["id"]
        .as_i64()
        .unwrap()
        .to_string();

    let toggled = json(home.path(), &["rule", "toggle", &id]);
    assert_eq!(toggled["is_active"], false);
    let toggled = json(home.path(), &["rule", "toggle", &id]);
    assert_eq!(toggled["is_active"], true);

    deskflow(home.path())
        .args(["rule", "export"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Escalate breaches"));
}

#[test]
fn test_sweep_on_empty_desk() {
    let home = TempDir::new().unwrap();

    let report = json(home.path(), &["sweep"]);
    assert_eq!(report["breaches"], serde_json::json!([]));
    assert_eq!(report["logs"], serde_json::json!([]));

    deskflow(home.path()).args(["watch", "-i", "1", "--count", "1"]).assert().success();
}

#[test]
fn test_task_needs_known_assignee() {
    let home = TempDir::new().unwrap();

    deskflow(home.path())
        .args(["task", "add", "Call back", "-a", "sam"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown assignee"));

    json(home.path(), &["agent", "add", "sam", "Sam Lee"]);
    json(home.path(), &["task", "add", "Call back", "-a", "sam", "--due-in", "30"]);

    let tasks = json(home.path(), &["task", "list"]);
    assert_eq!(tasks["count"], 1);
    assert_eq!(tasks["items"][0]["assignee_id"], "sam");
}

#[test]
fn test_unknown_ticket_exits_with_error() {
    let home = TempDir::new().unwrap();

    deskflow(home.path())
        .args(["ticket", "show", "42"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_output_format_from_env() {
    let home = TempDir::new().unwrap();

    let output = deskflow(home.path())
        .env("DESKFLOW_OUTPUT", "json")
        .args(["ticket", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let list: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(list["count"], 0);
}
