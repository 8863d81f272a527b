//! Session ledger for tw
//!
//! The ledger owns the running-session exclusivity invariant: for any
//! task, at most one session with an unset end time exists at any
//! instant. Enforcement is two layers deep. `start` pre-checks
//! `find_running` and answers the common case with a clear `Conflict`;
//! the record store's open-session constraint then rejects whatever
//! slips between the check and the insert, and that constraint
//! violation is translated into the same `Conflict` here. Callers
//! cannot tell which layer refused them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Transaction;

/// One contiguous timed interval of work on a task.
///
/// A session with an unset end time is running. Sessions are created
/// on start, mutated exactly once (setting the end time) on stop, and
/// immutable afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: Uuid,

    /// Task this session belongs to
    pub task_id: Uuid,

    /// When timing began
    pub start_time: DateTime<Utc>,

    /// When timing ended; None while running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Record creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a new running session starting at `start_time`
    pub fn new(task_id: Uuid, start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            start_time,
            end_time: None,
            created_at: start_time,
        }
    }

    /// Whether this session is still open
    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }

    /// Elapsed seconds from start to end time, or to `now` while
    /// running. Truncated to whole seconds; never negative.
    pub fn duration_seconds(&self, now: DateTime<Utc>) -> i64 {
        let effective_end = self.end_time.unwrap_or(now);
        (effective_end - self.start_time).num_seconds().max(0)
    }
}

/// Session lifecycle controller
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionLedger;

impl SessionLedger {
    /// The running session for a task, if any
    pub fn find_running(&self, txn: &Transaction<'_>, task_id: Uuid) -> Option<Session> {
        txn.find_running_session(task_id).cloned()
    }

    /// Open a new session for a task.
    ///
    /// Fails with `Conflict` when the task already has a running
    /// session, whether that is caught by the pre-check here or by the
    /// store's open-session constraint on insert.
    pub fn start(
        &self,
        txn: &mut Transaction<'_>,
        task_id: Uuid,
        start_at: DateTime<Utc>,
    ) -> Result<Session> {
        if txn.find_running_session(task_id).is_some() {
            return Err(already_running(task_id));
        }

        let session = Session::new(task_id, start_at);
        match txn.insert_session(session.clone()) {
            Ok(()) => Ok(session),
            // Lost the race between pre-check and insert; same answer
            // as losing the pre-check.
            Err(Error::UniqueViolation(_)) => Err(already_running(task_id)),
            Err(err) => Err(err),
        }
    }

    /// Close the running session for a task at `end_at`.
    ///
    /// Fails with `Conflict` when nothing is running and with
    /// `InvalidArgument` when `end_at` precedes the session's start
    /// time. An end time equal to the start time is allowed and yields
    /// a zero-length session.
    pub fn stop(
        &self,
        txn: &mut Transaction<'_>,
        task_id: Uuid,
        end_at: DateTime<Utc>,
    ) -> Result<Session> {
        let mut session = txn
            .find_running_session(task_id)
            .cloned()
            .ok_or_else(|| Error::Conflict(format!("no running session for task: {task_id}")))?;

        if end_at < session.start_time {
            return Err(Error::InvalidArgument(format!(
                "end time {} precedes session start {}",
                end_at.to_rfc3339(),
                session.start_time.to_rfc3339()
            )));
        }

        session.end_time = Some(end_at);
        txn.update_session(session.clone())?;
        Ok(session)
    }

    /// All sessions for a task, in creation order
    pub fn list_all(&self, txn: &Transaction<'_>, task_id: Uuid) -> Vec<Session> {
        txn.sessions_for(task_id).into_iter().cloned().collect()
    }

    /// Completed sessions for a task, most recently started first
    pub fn list_completed(&self, txn: &Transaction<'_>, task_id: Uuid) -> Vec<Session> {
        let mut sessions: Vec<Session> = txn
            .sessions_for(task_id)
            .into_iter()
            .filter(|session| session.end_time.is_some())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    /// Look up a session by id, failing with `NotFound` if absent
    pub fn find_session(&self, txn: &Transaction<'_>, session_id: Uuid) -> Result<Session> {
        txn.session_by_id(session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session not found: {session_id}")))
    }
}

fn already_running(task_id: Uuid) -> Error {
    Error::Conflict(format!("task already has a running session: {task_id}"))
}
