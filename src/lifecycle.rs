//! Lifecycle orchestration for tw
//!
//! The orchestrator sequences registry, ledger, and recorder calls
//! into atomic operations: each public operation captures the clock
//! once, opens a single store transaction, stages every write, and
//! either commits or returns an error with nothing written. It decides
//! which events a transition produces; the registry and ledger never
//! emit events on their own.
//!
//! Task state machine as exposed to callers:
//!
//! ```text
//! pending --(start)--> running --(stop)--> pending
//! pending|running --(complete)--> completed   (terminal)
//! pending|running --(cancel)---> cancelled    (terminal)
//! ```
//!
//! `change_status` is deliberately decoupled from session state: a
//! task can be completed or cancelled while a session is still open.
//! The operation reports the open session so callers can warn, but it
//! neither checks nor closes it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::{Event, EventKind, EventRecorder};
use crate::registry::{Task, TaskRegistry, TaskStatus};
use crate::session::{Session, SessionLedger};
use crate::store::RecordStore;

// =============================================================================
// Views
// =============================================================================

/// Caller-facing shape of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub task_id: Uuid,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub is_running: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionView {
    /// Project a session record, computing its duration as of `now`
    pub fn from_session(session: &Session, now: DateTime<Utc>) -> Self {
        Self {
            id: session.id,
            task_id: session.task_id,
            start_time: session.start_time,
            end_time: session.end_time,
            duration_seconds: session.duration_seconds(now),
            is_running: session.is_running(),
            created_at: session.created_at,
        }
    }
}

/// Caller-facing shape of a task
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub id: Uuid,
    pub user: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            user: task.user,
            name: task.name,
            description: task.description,
            status: task.status,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Caller-facing shape of an event
#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    pub id: String,
    pub task_id: Uuid,
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            task_id: event.task_id,
            kind: event.kind,
            occurred_at: event.occurred_at,
        }
    }
}

/// Result of a `change_status` call.
///
/// `open_session` reports a still-running session at the moment of the
/// change; the change itself leaves that session untouched.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub task: TaskView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_session: Option<SessionView>,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Sequences registry, ledger, and recorder calls into atomic
/// lifecycle operations. Built once at startup with concrete parts;
/// no runtime lookup.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    store: RecordStore,
    registry: TaskRegistry,
    ledger: SessionLedger,
    recorder: EventRecorder,
}

impl Lifecycle {
    /// Build an orchestrator over a record store
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            registry: TaskRegistry,
            ledger: SessionLedger,
            recorder: EventRecorder,
        }
    }

    /// The underlying record store
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Start timing a task: open a session, mark the task running,
    /// record a Start event. One transaction; all or nothing.
    pub fn start(&self, task_id: Uuid) -> Result<SessionView> {
        let now = Utc::now();
        let mut txn = self.store.begin()?;

        self.registry.get(&txn, task_id)?;
        let session = self.ledger.start(&mut txn, task_id, now)?;
        self.registry
            .set_status(&mut txn, task_id, TaskStatus::Running, now)?;
        self.recorder.append(&mut txn, task_id, EventKind::Start, now);

        txn.commit()?;
        Ok(SessionView::from_session(&session, now))
    }

    /// Stop timing a task: close the running session, mark the task
    /// pending, record a Stop event. One transaction; all or nothing.
    pub fn stop(&self, task_id: Uuid) -> Result<SessionView> {
        let now = Utc::now();
        let mut txn = self.store.begin()?;

        self.registry.get(&txn, task_id)?;
        let session = self.ledger.stop(&mut txn, task_id, now)?;
        self.registry
            .set_status(&mut txn, task_id, TaskStatus::Pending, now)?;
        self.recorder.append(&mut txn, task_id, EventKind::Stop, now);

        txn.commit()?;
        Ok(SessionView::from_session(&session, now))
    }

    /// Change a task's status outside the start/stop path.
    ///
    /// Completed records a Complete event, Cancelled a Cancel event,
    /// anything else no event. Any running session is reported but
    /// left open.
    pub fn change_status(&self, task_id: Uuid, status: TaskStatus) -> Result<StatusChange> {
        let now = Utc::now();
        let mut txn = self.store.begin()?;

        let task = self.registry.set_status(&mut txn, task_id, status, now)?;
        match status {
            TaskStatus::Completed => {
                self.recorder
                    .append(&mut txn, task_id, EventKind::Complete, now);
            }
            TaskStatus::Cancelled => {
                self.recorder
                    .append(&mut txn, task_id, EventKind::Cancel, now);
            }
            _ => {}
        }

        let open_session = self
            .ledger
            .find_running(&txn, task_id)
            .map(|session| SessionView::from_session(&session, now));

        txn.commit()?;
        Ok(StatusChange {
            task: task.into(),
            open_session,
        })
    }

    // =========================================================================
    // Task management
    // =========================================================================

    /// Create a new pending task
    pub fn create_task(
        &self,
        user: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<TaskView> {
        let now = Utc::now();
        let mut txn = self.store.begin()?;
        let task = self.registry.create(&mut txn, user, name, description, now)?;
        txn.commit()?;
        Ok(task.into())
    }

    /// Update a task's name and description
    pub fn update_task(
        &self,
        task_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<TaskView> {
        let now = Utc::now();
        let mut txn = self.store.begin()?;
        let task = self
            .registry
            .update(&mut txn, task_id, name, description, now)?;
        txn.commit()?;
        Ok(task.into())
    }

    /// Delete a task and, by cascade, its sessions and events
    pub fn delete_task(&self, task_id: Uuid) -> Result<TaskView> {
        let mut txn = self.store.begin()?;
        let task = self.registry.delete(&mut txn, task_id)?;
        txn.commit()?;
        Ok(task.into())
    }

    /// Look up a single task
    pub fn task(&self, task_id: Uuid) -> Result<TaskView> {
        let txn = self.store.begin()?;
        Ok(self.registry.get(&txn, task_id)?.into())
    }

    /// List tasks, optionally filtered by owner and status
    pub fn tasks(&self, user: Option<&str>, status: Option<TaskStatus>) -> Result<Vec<TaskView>> {
        let txn = self.store.begin()?;
        Ok(self
            .registry
            .list(&txn, user, status)
            .into_iter()
            .map(TaskView::from)
            .collect())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The running session for a task, if any
    pub fn running_session(&self, task_id: Uuid) -> Result<Option<SessionView>> {
        let now = Utc::now();
        let txn = self.store.begin()?;
        self.registry.get(&txn, task_id)?;
        Ok(self
            .ledger
            .find_running(&txn, task_id)
            .map(|session| SessionView::from_session(&session, now)))
    }

    /// All sessions for a task
    pub fn sessions(&self, task_id: Uuid) -> Result<Vec<SessionView>> {
        let now = Utc::now();
        let txn = self.store.begin()?;
        self.registry.get(&txn, task_id)?;
        Ok(self
            .ledger
            .list_all(&txn, task_id)
            .iter()
            .map(|session| SessionView::from_session(session, now))
            .collect())
    }

    /// Completed sessions for a task, most recently started first
    pub fn completed_sessions(&self, task_id: Uuid) -> Result<Vec<SessionView>> {
        let now = Utc::now();
        let txn = self.store.begin()?;
        self.registry.get(&txn, task_id)?;
        Ok(self
            .ledger
            .list_completed(&txn, task_id)
            .iter()
            .map(|session| SessionView::from_session(session, now))
            .collect())
    }

    /// Look up a session by id
    pub fn session_by_id(&self, session_id: Uuid) -> Result<SessionView> {
        let now = Utc::now();
        let txn = self.store.begin()?;
        let session = self.ledger.find_session(&txn, session_id)?;
        Ok(SessionView::from_session(&session, now))
    }

    /// Events for a task, most recent first; optionally one kind only
    pub fn events(&self, task_id: Uuid, kind: Option<EventKind>) -> Result<Vec<EventView>> {
        let txn = self.store.begin()?;
        self.registry.get(&txn, task_id)?;
        let events = match kind {
            Some(kind) => self.recorder.list_for_task_by_kind(&txn, task_id, kind),
            None => self.recorder.list_for_task(&txn, task_id),
        };
        Ok(events.into_iter().map(EventView::from).collect())
    }

    // =========================================================================
    // Id resolution
    // =========================================================================

    /// Resolve a task id from a full UUID or a unique prefix
    pub fn resolve_task_id(&self, input: &str) -> Result<Uuid> {
        let txn = self.store.begin()?;
        resolve_id(input, txn.tasks().iter().map(|task| task.id), "task")
    }

    /// Resolve a session id from a full UUID or a unique prefix
    pub fn resolve_session_id(&self, input: &str) -> Result<Uuid> {
        let txn = self.store.begin()?;
        let ids: Vec<Uuid> = {
            let mut seen = Vec::new();
            for task in txn.tasks() {
                for session in txn.sessions_for(task.id) {
                    seen.push(session.id);
                }
            }
            seen
        };
        resolve_id(input, ids.into_iter(), "session")
    }
}

/// Match `input` against ids by full value or unique string prefix.
fn resolve_id(input: &str, ids: impl Iterator<Item = Uuid>, noun: &str) -> Result<Uuid> {
    let trimmed = input.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!("{noun} id cannot be empty")));
    }

    if let Ok(id) = Uuid::parse_str(&trimmed) {
        return Ok(id);
    }

    let mut matches: Vec<Uuid> = ids
        .filter(|id| id.to_string().starts_with(&trimmed))
        .collect();
    matches.sort();
    matches.dedup();

    match matches.len() {
        0 => Err(Error::NotFound(format!("{noun} not found: {input}"))),
        1 => Ok(matches[0]),
        _ => Err(Error::InvalidArgument(format!(
            "ambiguous {noun} id '{}': {}",
            input,
            matches
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DATA_DIR;
    use tempfile::TempDir;

    fn test_lifecycle(dir: &TempDir) -> Lifecycle {
        let store = RecordStore::init(dir.path().join(DATA_DIR)).unwrap();
        Lifecycle::new(store)
    }

    fn open_session_count(lifecycle: &Lifecycle, task_id: Uuid) -> usize {
        lifecycle
            .sessions(task_id)
            .unwrap()
            .iter()
            .filter(|session| session.is_running)
            .count()
    }

    #[test]
    fn start_then_stop_round_trip() {
        let dir = TempDir::new().unwrap();
        let lifecycle = test_lifecycle(&dir);
        let task = lifecycle.create_task("alice", "report", None).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        let session = lifecycle.start(task.id).unwrap();
        assert!(session.is_running);
        assert_eq!(lifecycle.task(task.id).unwrap().status, TaskStatus::Running);
        assert_eq!(
            lifecycle.running_session(task.id).unwrap().unwrap().id,
            session.id
        );
        let events = lifecycle.events(task.id, None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Start);

        let stopped = lifecycle.stop(task.id).unwrap();
        assert_eq!(stopped.id, session.id);
        assert!(!stopped.is_running);
        assert!(stopped.end_time.is_some());
        assert_eq!(lifecycle.task(task.id).unwrap().status, TaskStatus::Pending);
        assert!(lifecycle.running_session(task.id).unwrap().is_none());

        let events = lifecycle.events(task.id, None).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Stop);
    }

    #[test]
    fn second_start_conflicts_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let lifecycle = test_lifecycle(&dir);
        let task = lifecycle.create_task("alice", "report", None).unwrap();

        let first = lifecycle.start(task.id).unwrap();
        let err = lifecycle.start(task.id).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Failed call changed nothing: same session, one Start event,
        // status still Running.
        assert_eq!(
            lifecycle.running_session(task.id).unwrap().unwrap().id,
            first.id
        );
        assert_eq!(open_session_count(&lifecycle, task.id), 1);
        assert_eq!(
            lifecycle
                .events(task.id, Some(EventKind::Start))
                .unwrap()
                .len(),
            1
        );
        assert_eq!(lifecycle.task(task.id).unwrap().status, TaskStatus::Running);
    }

    #[test]
    fn stop_without_running_session_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let lifecycle = test_lifecycle(&dir);
        let task = lifecycle.create_task("alice", "report", None).unwrap();

        let err = lifecycle.stop(task.id).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        assert_eq!(lifecycle.task(task.id).unwrap().status, TaskStatus::Pending);
        assert!(lifecycle.events(task.id, None).unwrap().is_empty());
        assert!(lifecycle.sessions(task.id).unwrap().is_empty());
    }

    #[test]
    fn unknown_task_is_not_found_everywhere() {
        let dir = TempDir::new().unwrap();
        let lifecycle = test_lifecycle(&dir);
        let ghost = Uuid::new_v4();

        assert!(matches!(lifecycle.start(ghost), Err(Error::NotFound(_))));
        assert!(matches!(lifecycle.stop(ghost), Err(Error::NotFound(_))));
        assert!(matches!(
            lifecycle.running_session(ghost),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            lifecycle.change_status(ghost, TaskStatus::Completed),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn complete_records_event_and_leaves_session_open() {
        let dir = TempDir::new().unwrap();
        let lifecycle = test_lifecycle(&dir);
        let task = lifecycle.create_task("alice", "report", None).unwrap();
        lifecycle.start(task.id).unwrap();

        let change = lifecycle
            .change_status(task.id, TaskStatus::Completed)
            .unwrap();
        assert_eq!(change.task.status, TaskStatus::Completed);
        assert!(change.open_session.is_some());

        // The session was not closed by the status change.
        assert!(lifecycle.running_session(task.id).unwrap().is_some());
        let events = lifecycle.events(task.id, None).unwrap();
        assert_eq!(events[0].kind, EventKind::Complete);
    }

    #[test]
    fn cancel_records_event_pending_does_not() {
        let dir = TempDir::new().unwrap();
        let lifecycle = test_lifecycle(&dir);
        let task = lifecycle.create_task("alice", "report", None).unwrap();

        lifecycle
            .change_status(task.id, TaskStatus::Cancelled)
            .unwrap();
        assert_eq!(
            lifecycle
                .events(task.id, Some(EventKind::Cancel))
                .unwrap()
                .len(),
            1
        );

        lifecycle
            .change_status(task.id, TaskStatus::Pending)
            .unwrap();
        // Back to pending adds no event.
        assert_eq!(lifecycle.events(task.id, None).unwrap().len(), 1);
    }

    #[test]
    fn invariant_holds_after_concurrent_starts() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let dir = TempDir::new().unwrap();
        let store = RecordStore::init(dir.path().join(DATA_DIR))
            .unwrap()
            .with_lock_timeout(10_000);
        let lifecycle = Lifecycle::new(store);
        let task = lifecycle.create_task("alice", "contended", None).unwrap();

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let mut handles = Vec::with_capacity(threads);

        for _ in 0..threads {
            let barrier = Arc::clone(&barrier);
            let lifecycle = lifecycle.clone();
            let task_id = task.id;
            handles.push(thread::spawn(move || {
                barrier.wait();
                lifecycle.start(task_id)
            }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => successes += 1,
                Err(Error::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(conflicts, threads - 1);
        assert_eq!(open_session_count(&lifecycle, task.id), 1);
        assert_eq!(
            lifecycle
                .events(task.id, Some(EventKind::Start))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn concurrent_start_stop_never_leaves_two_open_sessions() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let dir = TempDir::new().unwrap();
        let store = RecordStore::init(dir.path().join(DATA_DIR))
            .unwrap()
            .with_lock_timeout(10_000);
        let lifecycle = Lifecycle::new(store);
        let task = lifecycle.create_task("alice", "churn", None).unwrap();

        let threads = 6;
        let rounds = 10;
        let barrier = Arc::new(Barrier::new(threads));
        let mut handles = Vec::with_capacity(threads);

        for i in 0..threads {
            let barrier = Arc::clone(&barrier);
            let lifecycle = lifecycle.clone();
            let task_id = task.id;
            handles.push(thread::spawn(move || {
                barrier.wait();
                for round in 0..rounds {
                    let result = if (i + round) % 2 == 0 {
                        lifecycle.start(task_id).map(|_| ())
                    } else {
                        lifecycle.stop(task_id).map(|_| ())
                    };
                    match result {
                        Ok(()) | Err(Error::Conflict(_)) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(open_session_count(&lifecycle, task.id) <= 1);
    }

    #[test]
    fn resolve_task_id_accepts_unique_prefix() {
        let dir = TempDir::new().unwrap();
        let lifecycle = test_lifecycle(&dir);
        let task = lifecycle.create_task("alice", "report", None).unwrap();

        let full = task.id.to_string();
        assert_eq!(lifecycle.resolve_task_id(&full).unwrap(), task.id);
        assert_eq!(lifecycle.resolve_task_id(&full[..8]).unwrap(), task.id);
        assert_eq!(
            lifecycle
                .resolve_task_id(&full[..8].to_uppercase())
                .unwrap(),
            task.id
        );

        let err = lifecycle.resolve_task_id("zzzz").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn delete_task_cascades_sessions_and_events() {
        let dir = TempDir::new().unwrap();
        let lifecycle = test_lifecycle(&dir);
        let task = lifecycle.create_task("alice", "doomed", None).unwrap();
        lifecycle.start(task.id).unwrap();
        lifecycle.stop(task.id).unwrap();

        lifecycle.delete_task(task.id).unwrap();
        assert!(matches!(lifecycle.task(task.id), Err(Error::NotFound(_))));
        assert!(matches!(
            lifecycle.sessions(task.id),
            Err(Error::NotFound(_))
        ));
    }
}
