//! Stress tests for the running-session invariant under concurrent
//! CLI invocations. Each thread spawns a real tw process, so the
//! exclusion being exercised is the cross-process store lock, not
//! in-process synchronization.

mod support;

use std::process::Command;
use std::sync::{Arc, Barrier};
use std::thread;

use support::{tw_bin, TestTracker};
use tw::error::exit_codes;

fn spawn_tw(tracker: &TestTracker, args: &[&str]) -> std::process::Output {
    Command::new(tw_bin())
        .current_dir(tracker.path())
        .env_remove("TW_DATA_DIR")
        .env_remove("TW_USER")
        .args(args)
        .output()
        .expect("failed to run tw")
}

#[test]
fn concurrent_starts_yield_exactly_one_session() {
    let tracker = TestTracker::init();
    let task_id = tracker.new_task("contended");

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let mut handles = Vec::with_capacity(threads);

    for _ in 0..threads {
        let barrier = Arc::clone(&barrier);
        let bin = tw_bin();
        let dir = tracker.path().to_path_buf();
        let task_id = task_id.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            Command::new(bin)
                .current_dir(dir)
                .env_remove("TW_DATA_DIR")
                .env_remove("TW_USER")
                .args(["start", &task_id])
                .output()
                .expect("failed to run tw")
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        let output = handle.join().unwrap();
        match output.status.code() {
            Some(code) if code == exit_codes::SUCCESS => successes += 1,
            Some(code) if code == exit_codes::CONFLICT => conflicts += 1,
            other => panic!(
                "unexpected exit {:?}: {}",
                other,
                String::from_utf8_lossy(&output.stderr)
            ),
        }
    }

    assert_eq!(successes, 1, "exactly one start must win");
    assert_eq!(conflicts, threads - 1);

    // Exactly one open session exists afterward and the task runs.
    let sessions = tracker.json_output(&["session", "ls", &task_id]);
    let sessions = sessions["data"]["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["is_running"].as_bool(), Some(true));

    let shown = tracker.task_show_json(&task_id);
    assert_eq!(shown["data"]["status"].as_str(), Some("running"));

    let events = tracker.json_output(&["events", &task_id]);
    assert_eq!(events["data"]["events"].as_array().unwrap().len(), 1);
}

#[test]
fn concurrent_start_stop_churn_preserves_invariant() {
    let tracker = TestTracker::init();
    let task_id = tracker.new_task("churn");

    let threads = 6;
    let rounds = 5;
    let barrier = Arc::new(Barrier::new(threads));
    let mut handles = Vec::with_capacity(threads);

    for i in 0..threads {
        let barrier = Arc::clone(&barrier);
        let bin = tw_bin();
        let dir = tracker.path().to_path_buf();
        let task_id = task_id.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            for round in 0..rounds {
                let verb = if (i + round) % 2 == 0 { "start" } else { "stop" };
                let output = Command::new(&bin)
                    .current_dir(&dir)
                    .env_remove("TW_DATA_DIR")
                    .env_remove("TW_USER")
                    .args([verb, &task_id])
                    .output()
                    .expect("failed to run tw");
                match output.status.code() {
                    Some(code)
                        if code == exit_codes::SUCCESS || code == exit_codes::CONFLICT => {}
                    other => panic!(
                        "unexpected exit {:?}: {}",
                        other,
                        String::from_utf8_lossy(&output.stderr)
                    ),
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // The invariant: never more than one open session, and the task
    // status agrees with the session state.
    let sessions = tracker.json_output(&["session", "ls", &task_id]);
    let open: Vec<_> = sessions["data"]["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["is_running"].as_bool() == Some(true))
        .collect();
    assert!(open.len() <= 1, "found {} open sessions", open.len());

    let shown = tracker.task_show_json(&task_id);
    let status = shown["data"]["status"].as_str().unwrap();
    if open.is_empty() {
        assert_eq!(status, "pending");
    } else {
        assert_eq!(status, "running");
    }

    // Start and stop events alternate, so their counts differ by at
    // most one.
    let starts = tracker.json_output(&["events", &task_id, "--kind", "start"]);
    let stops = tracker.json_output(&["events", &task_id, "--kind", "stop"]);
    let start_count = starts["data"]["events"].as_array().unwrap().len() as i64;
    let stop_count = stops["data"]["events"].as_array().unwrap().len() as i64;
    assert!((start_count - stop_count).abs() <= 1);
    assert_eq!(start_count - stop_count, open.len() as i64);
}

#[test]
fn starts_on_different_tasks_do_not_conflict() {
    let tracker = TestTracker::init();
    let task_a = tracker.new_task("left");
    let task_b = tracker.new_task("right");

    let out_a = spawn_tw(&tracker, &["start", &task_a]);
    let out_b = spawn_tw(&tracker, &["start", &task_b]);
    assert!(out_a.status.success());
    assert!(out_b.status.success());

    for task in [&task_a, &task_b] {
        let running = tracker.json_output(&["session", "running", task]);
        assert!(running["data"]["session"].is_object());
    }
}
