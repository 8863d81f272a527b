use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// A temporary directory with an initialized tracker
pub struct TestTracker {
    dir: TempDir,
}

impl TestTracker {
    /// Create a tracker directory without running `tw init`
    pub fn bare() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// Create a tracker directory and run `tw init` in it
    pub fn init() -> Self {
        let tracker = Self::bare();
        tracker.cmd().arg("init").assert().success();
        tracker
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join(".tw")
    }

    /// A `tw` command rooted in this tracker, isolated from the
    /// ambient environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = tw_cmd();
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// Create a task via the CLI and return its id
    pub fn new_task(&self, name: &str) -> String {
        let output = self
            .cmd()
            .args(["task", "new", name, "--json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let value: Value = serde_json::from_slice(&output).expect("task new json");
        value["data"]["id"].as_str().expect("task id").to_string()
    }

    /// `tw task show <id> --json` parsed
    pub fn task_show_json(&self, task_id: &str) -> Value {
        self.json_output(&["task", "show", task_id])
    }

    /// Run a command with `--json` and parse the envelope
    pub fn json_output(&self, args: &[&str]) -> Value {
        let mut full_args: Vec<&str> = args.to_vec();
        full_args.push("--json");
        let output = self
            .cmd()
            .args(&full_args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json envelope")
    }
}

/// A `tw` command isolated from the ambient environment
pub fn tw_cmd() -> Command {
    let mut cmd = Command::cargo_bin("tw").expect("tw binary");
    cmd.env_remove("TW_DATA_DIR");
    cmd.env_remove("TW_USER");
    cmd
}

/// Path to the built `tw` binary, for tests that spawn raw processes
pub fn tw_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin!("tw").to_path_buf()
}
