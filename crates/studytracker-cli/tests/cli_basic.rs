//! Basic CLI E2E tests.
//!
//! Each test drives the compiled binary against its own temporary data
//! directory.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::TempDir;

fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_studytracker"));
    cmd.env("STUDYTRACKER_DATA_DIR", data_dir)
        .env_remove("STUDYTRACKER_ENV")
        .env_remove("STUDYTRACKER_DEBUG_LOG")
        .env_remove("RUST_LOG");
    cmd
}

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = cli(data_dir)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_cli_success(data_dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "CLI command failed: {args:?}\n{stderr}");
    stdout
}

/// Run an interactive command, feeding `input` on stdin.
fn run_interactive(data_dir: &Path, args: &[&str], input: &str) -> (String, i32) {
    let mut child = cli(data_dir)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI command");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    (
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

fn parse_json(json: &str) -> serde_json::Value {
    serde_json::from_str(json).expect("Failed to parse JSON output")
}

#[test]
fn test_stats_on_empty_log() {
    let dir = TempDir::new().unwrap();
    let stats = parse_json(&run_cli_success(dir.path(), &["stats"]));
    assert_eq!(stats["today_seconds"], 0);
    assert_eq!(stats["streak_days"], 0);
    assert_eq!(stats["total_days"], 0);
    assert!(dir.path().join("study.db").exists());
}

#[test]
fn test_today_on_empty_log() {
    let dir = TempDir::new().unwrap();
    assert_eq!(run_cli_success(dir.path(), &["today"]).trim(), "00:00:00");
}

#[test]
fn test_history_and_totals_on_empty_log() {
    let dir = TempDir::new().unwrap();
    let history = parse_json(&run_cli_success(dir.path(), &["history", "--json"]));
    assert_eq!(history, serde_json::json!([]));

    let totals = parse_json(&run_cli_success(
        dir.path(),
        &["totals", "--from", "2024-01-01", "--to", "2024-01-03"],
    ));
    let totals = totals.as_array().unwrap();
    assert_eq!(totals.len(), 3);
    assert_eq!(totals[0]["local_date"], "2024-01-01");
    assert!(totals.iter().all(|t| t["total_sec"] == 0));
}

#[test]
fn test_totals_rejects_reversed_range() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(
        dir.path(),
        &["totals", "--from", "2024-02-01", "--to", "2024-01-01"],
    );
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));
}

#[test]
fn test_totals_at_end_of_calendar() {
    let dir = TempDir::new().unwrap();
    let totals = parse_json(&run_cli_success(
        dir.path(),
        &["totals", "--from", "+262142-12-30", "--to", "+262142-12-31"],
    ));
    assert_eq!(totals.as_array().unwrap().len(), 2);
}

#[test]
fn test_totals_rejects_oversized_range() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(
        dir.path(),
        &["totals", "--from", "1000-01-01", "--to", "9000-12-31"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("at most 3660"));
}

#[test]
fn test_todo_lifecycle() {
    let dir = TempDir::new().unwrap();
    assert!(run_cli_success(dir.path(), &["todo", "list"]).contains("nothing to do"));

    run_cli_success(dir.path(), &["todo", "add", "Read chapter 3"]);
    run_cli_success(dir.path(), &["todo", "add", "Flashcards"]);
    run_cli_success(dir.path(), &["todo", "toggle", "2"]);

    let items = parse_json(&run_cli_success(dir.path(), &["todo", "list", "--json"]));
    assert_eq!(
        items,
        serde_json::json!([
            {"text": "Read chapter 3", "checked": false},
            {"text": "Flashcards", "checked": true}
        ])
    );

    run_cli_success(dir.path(), &["todo", "remove", "1"]);
    let listed = run_cli_success(dir.path(), &["todo", "list"]);
    assert!(listed.contains("[x] Flashcards"));
    assert!(!listed.contains("Read chapter 3"));
}

#[test]
fn test_todo_bad_index_fails() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["todo", "toggle", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no to-do item #1"));
}

#[test]
fn test_config_set_get_reset() {
    let dir = TempDir::new().unwrap();
    assert_eq!(
        run_cli_success(dir.path(), &["config", "get", "pomodoro.study_min"]).trim(),
        "25"
    );

    run_cli_success(dir.path(), &["config", "set", "pomodoro.study_min", "50"]);
    assert_eq!(
        run_cli_success(dir.path(), &["config", "get", "pomodoro.study_min"]).trim(),
        "50"
    );
    let listed = parse_json(&run_cli_success(dir.path(), &["config", "list"]));
    assert_eq!(listed["pomodoro"]["study_min"], 50);

    run_cli_success(dir.path(), &["config", "reset"]);
    assert_eq!(
        run_cli_success(dir.path(), &["config", "get", "pomodoro.study_min"]).trim(),
        "25"
    );
}

#[test]
fn test_config_rejects_bad_values() {
    let dir = TempDir::new().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["config", "set", "pomodoro.study_min", "0"]);
    assert_eq!(code, 1);
    let (_, _, code) = run_cli(dir.path(), &["config", "set", "pomodoro.study_min", "soon"]);
    assert_eq!(code, 1);
    let (_, stderr, code) = run_cli(dir.path(), &["config", "get", "theme"]);
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));

    assert_eq!(
        run_cli_success(dir.path(), &["config", "get", "pomodoro.study_min"]).trim(),
        "25"
    );
}

#[test]
fn test_timer_stop_records_session() {
    let dir = TempDir::new().unwrap();
    let (stderr, code) = run_interactive(
        dir.path(),
        &["timer", "--subject", "math", "--note", "ch 4"],
        "s\n",
    );
    assert_eq!(code, 0, "{stderr}");

    let history = parse_json(&run_cli_success(dir.path(), &["history", "--json"]));
    let sessions = history.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["source"], "timer");
    assert_eq!(sessions[0]["subject"], "math");
    assert_eq!(sessions[0]["note"], "ch 4");
    assert!(!sessions[0]["end_utc"].is_null());
    assert!(sessions[0]["duration_sec"].as_i64().unwrap() >= 0);
}

#[test]
fn test_pomodoro_quit_saves_snapshot_and_finalizes() {
    let dir = TempDir::new().unwrap();
    let (stderr, code) = run_interactive(dir.path(), &["pomodoro"], "p\nq\n");
    assert_eq!(code, 0, "{stderr}");

    let snapshot_path = dir.path().join("pomodoro_state.json");
    let snapshot = parse_json(&std::fs::read_to_string(&snapshot_path).unwrap());
    assert_eq!(snapshot["phase"], "study");
    assert_eq!(snapshot["running"], true);

    let history = parse_json(&run_cli_success(dir.path(), &["history", "--json"]));
    let sessions = history.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["source"], "pomodoro");
    assert!(!sessions[0]["end_utc"].is_null());

    // The next run consumes the snapshot and comes back stopped.
    let (stderr, code) = run_interactive(dir.path(), &["pomodoro"], "q\n");
    assert_eq!(code, 0, "{stderr}");
    let snapshot = parse_json(&std::fs::read_to_string(&snapshot_path).unwrap());
    assert_eq!(snapshot["running"], false);
    assert!(snapshot["session_id"].is_null());
}

#[test]
fn test_reset_deletes_log_but_keeps_todos() {
    let dir = TempDir::new().unwrap();
    run_cli_success(dir.path(), &["stats"]);
    run_cli_success(dir.path(), &["todo", "add", "keep me"]);
    assert!(dir.path().join("study.db").exists());

    let out = run_cli_success(dir.path(), &["reset", "--yes"]);
    assert!(out.contains("session log deleted"));
    assert!(!dir.path().join("study.db").exists());
    assert!(dir.path().join("todos.json").exists());

    run_cli_success(dir.path(), &["reset", "--yes", "--todos"]);
    assert!(!dir.path().join("todos.json").exists());
}

#[test]
fn test_reset_without_confirmation_keeps_log() {
    let dir = TempDir::new().unwrap();
    run_cli_success(dir.path(), &["stats"]);
    // stdin is empty, so the prompt reads no answer.
    let out = run_cli_success(dir.path(), &["reset"]);
    assert!(out.contains("cancelled"));
    assert!(dir.path().join("study.db").exists());
}
