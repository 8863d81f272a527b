//! Task registry for tw
//!
//! Owns task identity and status. Status writes here are raw
//! overwrites: which transitions are valid depends on session state,
//! so the lifecycle layer decides validity and which events a change
//! produces. The registry itself never emits events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Transaction;

// =============================================================================
// Task status
// =============================================================================

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not currently being timed
    Pending,
    /// Has an open timing session
    Running,
    /// Finished; terminal
    Completed,
    /// Abandoned; terminal
    Cancelled,
}

impl TaskStatus {
    /// Statuses that mark a task as closed out
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" | "complete" | "done" => Ok(TaskStatus::Completed),
            "cancelled" | "canceled" | "cancel" => Ok(TaskStatus::Cancelled),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid task status '{}'. Expected: pending, running, completed, cancelled",
                s
            ))),
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

// =============================================================================
// Task record
// =============================================================================

/// A trackable unit of work owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: Uuid,

    /// Owner identity
    pub user: String,

    /// Task name
    pub name: String,

    /// Optional free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Current status
    #[serde(default)]
    pub status: TaskStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last mutation
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending task
    pub fn new(user: String, name: String, description: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            name,
            description,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Registry operations
// =============================================================================

/// Lookup and mutation primitives over the task table
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskRegistry;

impl TaskRegistry {
    /// Look up a task, failing with `NotFound` if absent
    pub fn get(&self, txn: &Transaction<'_>, task_id: Uuid) -> Result<Task> {
        txn.task_by_id(task_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("task not found: {task_id}")))
    }

    /// Create a new pending task owned by `user`
    pub fn create(
        &self,
        txn: &mut Transaction<'_>,
        user: &str,
        name: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("task name cannot be empty".to_string()));
        }

        let task = Task::new(
            user.to_string(),
            name.to_string(),
            description.map(|d| d.to_string()),
            now,
        );
        txn.insert_task(task.clone())?;
        Ok(task)
    }

    /// Update a task's name and description
    pub fn update(
        &self,
        txn: &mut Transaction<'_>,
        task_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let mut task = self.get(txn, task_id)?;

        if let Some(name) = name {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidArgument("task name cannot be empty".to_string()));
            }
            task.name = name.to_string();
        }
        if let Some(description) = description {
            task.description = if description.trim().is_empty() {
                None
            } else {
                Some(description.to_string())
            };
        }

        task.updated_at = now;
        txn.update_task(task.clone())?;
        Ok(task)
    }

    /// Overwrite a task's status and bump its updated timestamp.
    ///
    /// No transition validation happens here; the lifecycle layer owns
    /// that, since validity depends on session state rather than the
    /// status alone.
    pub fn set_status(
        &self,
        txn: &mut Transaction<'_>,
        task_id: Uuid,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let mut task = self.get(txn, task_id)?;
        task.status = status;
        task.updated_at = now;
        txn.update_task(task.clone())?;
        Ok(task)
    }

    /// Delete a task; sessions and events cascade in the store.
    pub fn delete(&self, txn: &mut Transaction<'_>, task_id: Uuid) -> Result<Task> {
        txn.remove_task(task_id)
    }

    /// List tasks, optionally filtered by owner and status
    pub fn list(
        &self,
        txn: &Transaction<'_>,
        user: Option<&str>,
        status: Option<TaskStatus>,
    ) -> Vec<Task> {
        txn.tasks()
            .iter()
            .filter(|task| user.map(|u| task.user == u).unwrap_or(true))
            .filter(|task| status.map(|s| task.status == s).unwrap_or(true))
            .cloned()
            .collect()
    }
}
