//! Record store for tw
//!
//! All durable state lives in a data directory (by default `.tw/` at
//! the project root):
//!
//! ```text
//! .tw/
//!   config.toml    # optional configuration
//!   user           # persisted user identity
//!   tasks.json     # task table
//!   sessions.jsonl # session table
//!   events.jsonl   # event table
//!   store.lock     # transaction lock
//! ```
//!
//! # Transactions
//!
//! Every read or write goes through a [`Transaction`]. `begin()` takes
//! an exclusive advisory lock on `store.lock` and loads all three
//! tables; mutations are staged in memory; `commit()` first writes
//! every dirty table to a temp file and only then renames them into
//! place, so a failure before the rename phase leaves the store
//! untouched. Dropping a transaction without committing discards all
//! staged writes. The lock is advisory and cross-process, which makes
//! the transaction boundary hold across independent tw processes, not
//! just threads.
//!
//! The open-session constraint lives here too: [`Transaction::insert_session`]
//! refuses a second session with an unset end time for the same task,
//! regardless of what the caller checked beforehand.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::Event;
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::registry::Task;
use crate::session::Session;

/// Name of the data directory created by `tw init`
pub const DATA_DIR: &str = ".tw";

const TASKS_FILE: &str = "tasks.json";
const SESSIONS_FILE: &str = "sessions.jsonl";
const EVENTS_FILE: &str = "events.jsonl";
const LOCK_FILE: &str = "store.lock";

const TASKS_SCHEMA_VERSION: &str = "tw.tasks.v1";

/// Handle to a tw data directory
#[derive(Debug, Clone)]
pub struct RecordStore {
    data_dir: PathBuf,
    lock_timeout_ms: u64,
}

impl RecordStore {
    /// Open a store rooted at an existing data directory
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    /// Override the transaction lock timeout
    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Create the data directory and empty tables; idempotent.
    pub fn init(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::open(data_dir);
        fs::create_dir_all(&store.data_dir)?;

        if !store.tasks_file().exists() {
            let table = TaskTable {
                schema_version: TASKS_SCHEMA_VERSION.to_string(),
                tasks: Vec::new(),
            };
            let json = serde_json::to_string_pretty(&table)?;
            lock::write_atomic(store.tasks_file(), json.as_bytes())?;
        }
        if !store.sessions_file().exists() {
            File::create(store.sessions_file())?;
        }
        if !store.events_file().exists() {
            File::create(store.events_file())?;
        }

        Ok(store)
    }

    /// Walk up from `start` looking for a `.tw/` data directory.
    ///
    /// Fails with `NotInitialized` when no ancestor contains one.
    pub fn discover(start: &Path) -> Result<PathBuf> {
        let mut current = Some(start);
        while let Some(dir) = current {
            let candidate = dir.join(DATA_DIR);
            if candidate.join(TASKS_FILE).exists() {
                return Ok(candidate);
            }
            current = dir.parent();
        }
        Err(Error::NotInitialized(start.to_path_buf()))
    }

    /// Check whether this store has been initialized
    pub fn is_initialized(&self) -> bool {
        self.tasks_file().exists()
    }

    /// Path to the data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path to the task table
    pub fn tasks_file(&self) -> PathBuf {
        self.data_dir.join(TASKS_FILE)
    }

    /// Path to the session table
    pub fn sessions_file(&self) -> PathBuf {
        self.data_dir.join(SESSIONS_FILE)
    }

    /// Path to the event table
    pub fn events_file(&self) -> PathBuf {
        self.data_dir.join(EVENTS_FILE)
    }

    /// Path to the transaction lock file
    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILE)
    }

    /// Begin a transaction: take the store lock and load all tables.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized(self.data_dir.clone()));
        }

        let guard = FileLock::acquire(self.lock_file(), self.lock_timeout_ms)?;

        let table: TaskTable = read_json_or_default(&self.tasks_file())?;
        let sessions: Vec<Session> = read_jsonl(&self.sessions_file())?;
        let events: Vec<Event> = read_jsonl(&self.events_file())?;

        Ok(Transaction {
            store: self,
            _guard: guard,
            tasks: table.tasks,
            sessions,
            events,
            dirty_tasks: false,
            dirty_sessions: false,
            dirty_events: false,
        })
    }
}

/// In-flight unit of work over all three tables.
///
/// Holds the store lock for its whole lifetime. Query methods observe
/// committed state plus this transaction's own staged writes.
pub struct Transaction<'a> {
    store: &'a RecordStore,
    _guard: FileLock,
    tasks: Vec<Task>,
    sessions: Vec<Session>,
    events: Vec<Event>,
    dirty_tasks: bool,
    dirty_sessions: bool,
    dirty_events: bool,
}

impl Transaction<'_> {
    // =========================================================================
    // Task table
    // =========================================================================

    /// All tasks, in table order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Look up a task by id
    pub fn task_by_id(&self, task_id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    /// Insert a new task; the id must not already exist.
    pub fn insert_task(&mut self, task: Task) -> Result<()> {
        if self.task_by_id(task.id).is_some() {
            return Err(Error::UniqueViolation(format!(
                "task already exists: {}",
                task.id
            )));
        }
        self.tasks.push(task);
        self.dirty_tasks = true;
        Ok(())
    }

    /// Replace a task record by id
    pub fn update_task(&mut self, task: Task) -> Result<()> {
        let slot = self
            .tasks
            .iter_mut()
            .find(|existing| existing.id == task.id)
            .ok_or_else(|| Error::NotFound(format!("task not found: {}", task.id)))?;
        *slot = task;
        self.dirty_tasks = true;
        Ok(())
    }

    /// Remove a task and cascade to its sessions and events
    pub fn remove_task(&mut self, task_id: Uuid) -> Result<Task> {
        let idx = self
            .tasks
            .iter()
            .position(|task| task.id == task_id)
            .ok_or_else(|| Error::NotFound(format!("task not found: {task_id}")))?;
        let removed = self.tasks.remove(idx);

        self.sessions.retain(|session| session.task_id != task_id);
        self.events.retain(|event| event.task_id != task_id);
        self.dirty_tasks = true;
        self.dirty_sessions = true;
        self.dirty_events = true;

        Ok(removed)
    }

    // =========================================================================
    // Session table
    // =========================================================================

    /// All sessions for a task, in insertion order
    pub fn sessions_for(&self, task_id: Uuid) -> Vec<&Session> {
        self.sessions
            .iter()
            .filter(|session| session.task_id == task_id)
            .collect()
    }

    /// The session with an unset end time for a task, if any
    pub fn find_running_session(&self, task_id: Uuid) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|session| session.task_id == task_id && session.end_time.is_none())
    }

    /// Look up a session by id
    pub fn session_by_id(&self, session_id: Uuid) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == session_id)
    }

    /// Insert a new session.
    ///
    /// Enforces the open-session constraint: fails with
    /// `UniqueViolation` if the task already has a session with an
    /// unset end time, whether committed or staged in this transaction.
    pub fn insert_session(&mut self, session: Session) -> Result<()> {
        if session.end_time.is_none() && self.find_running_session(session.task_id).is_some() {
            return Err(Error::UniqueViolation(format!(
                "open session already exists for task: {}",
                session.task_id
            )));
        }
        self.sessions.push(session);
        self.dirty_sessions = true;
        Ok(())
    }

    /// Replace a session record by id
    pub fn update_session(&mut self, session: Session) -> Result<()> {
        let slot = self
            .sessions
            .iter_mut()
            .find(|existing| existing.id == session.id)
            .ok_or_else(|| Error::NotFound(format!("session not found: {}", session.id)))?;
        *slot = session;
        self.dirty_sessions = true;
        Ok(())
    }

    // =========================================================================
    // Event table
    // =========================================================================

    /// All events for a task, in insertion order
    pub fn events_for(&self, task_id: Uuid) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|event| event.task_id == task_id)
            .collect()
    }

    /// Append an event; events are never updated or removed except by
    /// task cascade.
    pub fn append_event(&mut self, event: Event) {
        self.events.push(event);
        self.dirty_events = true;
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Write all dirty tables and release the lock.
    ///
    /// Two phases: every dirty table is serialized to a temp file
    /// first, then the temp files are renamed into place. An error in
    /// the first phase leaves every table at its committed state.
    pub fn commit(self) -> Result<()> {
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();

        if self.dirty_tasks {
            let table = TaskTable {
                schema_version: TASKS_SCHEMA_VERSION.to_string(),
                tasks: self.tasks.clone(),
            };
            let json = serde_json::to_string_pretty(&table)?;
            staged.push(stage(&self.store.tasks_file(), json.as_bytes())?);
        }
        if self.dirty_sessions {
            staged.push(stage(
                &self.store.sessions_file(),
                to_jsonl(&self.sessions)?.as_bytes(),
            )?);
        }
        if self.dirty_events {
            staged.push(stage(
                &self.store.events_file(),
                to_jsonl(&self.events)?.as_bytes(),
            )?);
        }

        for (temp_path, path) in staged {
            fs::rename(&temp_path, &path)?;
        }

        Ok(())
    }
}

/// Write `data` to a temp file next to `path`; return (temp, target).
fn stage(path: &Path, data: &[u8]) -> Result<(PathBuf, PathBuf)> {
    let temp_path = path.with_extension(format!("staged.{}", std::process::id()));
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok((temp_path, path.to_path_buf()))
}

fn to_jsonl<T: Serialize>(records: &[T]) -> Result<String> {
    let mut buffer = String::new();
    for record in records {
        buffer.push_str(&serde_json::to_string(record)?);
        buffer.push('\n');
    }
    Ok(buffer)
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&content)?)
}

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
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
        records.push(serde_json::from_str(&line)?);
    }

    Ok(records)
}

/// On-disk shape of the task table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TaskTable {
    #[serde(default)]
    schema_version: String,
    #[serde(default)]
    tasks: Vec<Task>,
}
