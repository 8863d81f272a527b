//! Event recorder for tw
//!
//! Lifecycle events are immutable, append-only records derived from
//! task and session transitions. They are never updated; the only way
//! one disappears is the cascade when its task is deleted. Retrieval
//! is ordered by occurrence time descending, with the sortable event
//! id as tiebreaker.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Transaction;

/// Kind of lifecycle event.
///
/// Pause and Resume are part of the recorded vocabulary but no current
/// operation emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    Stop,
    Pause,
    Resume,
    Complete,
    Cancel,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Start => write!(f, "start"),
            EventKind::Stop => write!(f, "stop"),
            EventKind::Pause => write!(f, "pause"),
            EventKind::Resume => write!(f, "resume"),
            EventKind::Complete => write!(f, "complete"),
            EventKind::Cancel => write!(f, "cancel"),
        }
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "start" => Ok(EventKind::Start),
            "stop" => Ok(EventKind::Stop),
            "pause" => Ok(EventKind::Pause),
            "resume" => Ok(EventKind::Resume),
            "complete" => Ok(EventKind::Complete),
            "cancel" => Ok(EventKind::Cancel),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid event kind '{}'. Expected: start, stop, pause, resume, complete, cancel",
                s
            ))),
        }
    }
}

/// An immutable timestamped record of a lifecycle transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Sortable unique identifier
    pub id: String,

    /// Task this event belongs to
    pub task_id: Uuid,

    /// What happened
    pub kind: EventKind,

    /// When it happened
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    /// Build a new event record
    pub fn new(task_id: Uuid, kind: EventKind, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            task_id,
            kind,
            occurred_at,
        }
    }
}

/// Append and retrieval operations over the event table
#[derive(Debug, Clone, Copy, Default)]
pub struct EventRecorder;

impl EventRecorder {
    /// Append a lifecycle event; pure insert.
    pub fn append(
        &self,
        txn: &mut Transaction<'_>,
        task_id: Uuid,
        kind: EventKind,
        occurred_at: DateTime<Utc>,
    ) -> Event {
        let event = Event::new(task_id, kind, occurred_at);
        txn.append_event(event.clone());
        event
    }

    /// Events for a task, most recent first
    pub fn list_for_task(&self, txn: &Transaction<'_>, task_id: Uuid) -> Vec<Event> {
        let mut events: Vec<Event> = txn.events_for(task_id).into_iter().cloned().collect();
        events.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        events
    }

    /// Events of one kind for a task; contains all matches, no
    /// ordering promise beyond that.
    pub fn list_for_task_by_kind(
        &self,
        txn: &Transaction<'_>,
        task_id: Uuid,
        kind: EventKind,
    ) -> Vec<Event> {
        txn.events_for(task_id)
            .into_iter()
            .filter(|event| event.kind == kind)
            .cloned()
            .collect()
    }
}
