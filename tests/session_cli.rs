mod support;

use predicates::str::contains;
use serde_json::Value;

use support::TestTracker;
use tw::error::exit_codes;

#[test]
fn running_query_reflects_session_state() {
    let tracker = TestTracker::init();
    let task_id = tracker.new_task("watching");

    let value = tracker.json_output(&["session", "running", &task_id]);
    assert!(value["data"]["session"].is_null());

    tracker.cmd().args(["start", &task_id]).assert().success();

    let value = tracker.json_output(&["session", "running", &task_id]);
    let session = &value["data"]["session"];
    assert_eq!(session["task_id"].as_str(), Some(task_id.as_str()));
    assert_eq!(session["is_running"].as_bool(), Some(true));
    assert!(session["duration_seconds"].as_i64().unwrap() >= 0);
}

#[test]
fn ls_lists_all_and_completed_orders_recent_first() {
    let tracker = TestTracker::init();
    let task_id = tracker.new_task("sessions");

    for _ in 0..3 {
        tracker.cmd().args(["start", &task_id]).assert().success();
        tracker.cmd().args(["stop", &task_id]).assert().success();
    }
    tracker.cmd().args(["start", &task_id]).assert().success();

    let all = tracker.json_output(&["session", "ls", &task_id]);
    assert_eq!(all["data"]["sessions"].as_array().unwrap().len(), 4);

    let completed = tracker.json_output(&["session", "ls", &task_id, "--completed"]);
    let completed = completed["data"]["sessions"].as_array().unwrap();
    assert_eq!(completed.len(), 3);
    assert!(completed
        .iter()
        .all(|s| s["is_running"].as_bool() == Some(false)));

    // Most recently started first.
    let starts: Vec<&str> = completed
        .iter()
        .map(|s| s["start_time"].as_str().unwrap())
        .collect();
    let mut sorted = starts.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(starts, sorted);
}

#[test]
fn show_finds_session_by_prefix() {
    let tracker = TestTracker::init();
    let task_id = tracker.new_task("lookup");

    let started = tracker.json_output(&["start", &task_id]);
    let session_id = started["data"]["id"].as_str().unwrap().to_string();

    let shown = tracker.json_output(&["session", "show", &session_id[..8]]);
    assert_eq!(shown["data"]["id"].as_str(), Some(session_id.as_str()));
    assert_eq!(shown["data"]["task_id"].as_str(), Some(task_id.as_str()));
}

#[test]
fn show_unknown_session_is_not_found() {
    let tracker = TestTracker::init();
    tracker.new_task("empty");

    tracker
        .cmd()
        .args(["session", "show", "ffffffff"])
        .assert()
        .failure()
        .code(exit_codes::USER_ERROR)
        .stderr(contains("not found"));
}

#[test]
fn sessions_for_unknown_task_fail() {
    let tracker = TestTracker::init();

    tracker
        .cmd()
        .args(["session", "ls", "deadbeef"])
        .assert()
        .failure()
        .code(exit_codes::USER_ERROR);
}

#[test]
fn stop_reports_duration() {
    let tracker = TestTracker::init();
    let task_id = tracker.new_task("quick");

    tracker.cmd().args(["start", &task_id]).assert().success();
    let stopped = tracker.json_output(&["stop", &task_id]);

    // Immediate stop: a zero-or-near-zero duration is valid, never
    // negative.
    let duration = stopped["data"]["duration_seconds"].as_i64().unwrap();
    assert!((0..5).contains(&duration));
}

#[test]
fn events_filter_rejects_unknown_kind() {
    let tracker = TestTracker::init();
    let task_id = tracker.new_task("picky");

    tracker
        .cmd()
        .args(["events", &task_id, "--kind", "finished"])
        .assert()
        .failure()
        .code(exit_codes::USER_ERROR)
        .stderr(contains("Invalid event kind"));
}

#[test]
fn events_are_listed_most_recent_first() {
    let tracker = TestTracker::init();
    let task_id = tracker.new_task("ordered");

    tracker.cmd().args(["start", &task_id]).assert().success();
    tracker.cmd().args(["stop", &task_id]).assert().success();
    tracker.cmd().args(["start", &task_id]).assert().success();

    let value = tracker.json_output(&["events", &task_id]);
    let kinds: Vec<&str> = value["data"]["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["start", "stop", "start"]);

    let occurred: Vec<&str> = value["data"]["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["occurred_at"].as_str().unwrap())
        .collect();
    let mut sorted = occurred.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(occurred, sorted);
}
