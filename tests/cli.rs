//! Integration tests for top-level CLI behavior.

use std::path::Path;
use std::process::Command;

use agentcontract::cassette;
use agentcontract::trajectory::{Run, ToolCall, TurnDraft};

fn run_agentcontract(dir: &Path, args: &[&str]) -> std::process::Output {
    let bin = env!("CARGO_BIN_EXE_agentcontract");
    Command::new(bin)
        .args(args)
        .current_dir(dir)
        .env_remove("AGENTCONTRACT_LOG")
        .output()
        .expect("failed to run agentcontract binary")
}

fn write_cassette(dir: &Path) {
    let mut run = Run::new("refund");
    run.run_id = "run-1".into();
    let lookup = ToolCall::new("c1", "lookup_order", serde_json::Map::new());
    let call_turn = TurnDraft::assistant("").with_tool_call(lookup);
    let reply = TurnDraft::assistant("Your refund has been processed.");
    run.push_turn(TurnDraft::user("refund order 123")).unwrap();
    run.push_turn(call_turn).unwrap();
    run.push_turn(reply).unwrap();
    run.summarize();
    cassette::save(&run, &dir.join("refund.agentrun.json")).unwrap();
}

#[test]
fn help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_agentcontract(dir.path(), &["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    for command in ["info", "validate", "check", "init"] {
        assert!(stdout.contains(command), "{stdout}");
    }
}

#[test]
fn validate_reports_scenario_and_turns() {
    let dir = tempfile::tempdir().unwrap();
    write_cassette(dir.path());
    let output = run_agentcontract(dir.path(), &["validate", "refund.agentrun.json"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert_eq!(stdout.trim(), "Valid cassette: refund (3 turns)");
}

#[test]
fn validate_rejects_index_gaps() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("bad.agentrun.json"),
        r#"{"turns": [{"index": 0, "role": "user"}, {"index": 2, "role": "assistant"}]}"#,
    )
    .unwrap();
    let output = run_agentcontract(dir.path(), &["validate", "bad.agentrun.json"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("malformed cassette"), "{stderr}");
}

#[test]
fn validate_without_path_shows_usage() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_agentcontract(dir.path(), &["validate"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("PATH"), "{stderr}");
}

#[test]
fn info_prints_summary() {
    let dir = tempfile::tempdir().unwrap();
    write_cassette(dir.path());
    let output = run_agentcontract(dir.path(), &["info", "refund.agentrun.json"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Scenario:    refund"), "{stdout}");
    assert!(stdout.contains("Run ID:      run-1"));
    assert!(stdout.contains("Tool calls:  1"));
}

#[test]
fn info_on_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_agentcontract(dir.path(), &["info", "missing.agentrun.json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.agentrun.json"));
}

#[test]
fn init_then_check() {
    let dir = tempfile::tempdir().unwrap();
    write_cassette(dir.path());

    let output = run_agentcontract(dir.path(), &["init"]);
    assert!(output.status.success());
    assert!(dir.path().join("agentcontract.yml").is_file());

    let again = run_agentcontract(dir.path(), &["init"]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("already exists"));

    // Starter allowlist is empty, so the recorded lookup_order call violates it.
    let output = run_agentcontract(dir.path(), &["check", "refund.agentrun.json"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success());
    assert!(stdout.contains("PASS contains:final_response"), "{stdout}");
    assert!(stdout.contains("FAIL policy:allowed-tools"), "{stdout}");
}

#[test]
fn check_with_explicit_config_passes() {
    let dir = tempfile::tempdir().unwrap();
    write_cassette(dir.path());
    std::fs::write(
        dir.path().join("strict.yml"),
        "policies:\n  - name: allowed\n    type: tool_allowlist\n    tools: [lookup_order]\n",
    )
    .unwrap();
    let args = ["check", "refund.agentrun.json", "--config", "strict.yml"];
    let output = run_agentcontract(dir.path(), &args);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{stdout}");
    assert!(stdout.contains("PASSED (1 passed, 0 failed)"));
}
