//! `tw task` - task management commands

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::identity;
use crate::lifecycle::TaskView;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::registry::TaskStatus;

use super::{locate_data_dir, open_lifecycle};

// =============================================================================
// task new
// =============================================================================

pub struct NewOptions {
    pub name: String,
    pub description: Option<String>,
    pub user: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

pub fn run_new(opts: NewOptions) -> Result<()> {
    let dir = locate_data_dir(&opts.data_dir)?;
    let user = identity::resolve_user(Some(&dir), opts.user.as_deref())?;
    let lifecycle = open_lifecycle(&opts.data_dir)?;

    let task = lifecycle.create_task(&user, &opts.name, opts.description.as_deref())?;

    let mut human = HumanOutput::new(format!("Created task {}", short_id(&task)));
    human.push_summary("name", task.name.clone());
    human.push_summary("user", task.user.clone());
    human.push_summary("status", task.status.to_string());
    human.push_next_step(format!("tw start {}", short_id(&task)));

    emit_success(opts.options, "task new", &task, Some(&human))
}

// =============================================================================
// task ls
// =============================================================================

pub struct LsOptions {
    pub status: Option<String>,
    pub mine: bool,
    pub user: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

#[derive(Serialize)]
struct LsOutput {
    tasks: Vec<TaskView>,
}

pub fn run_ls(opts: LsOptions) -> Result<()> {
    let status = opts
        .status
        .as_deref()
        .map(|raw| raw.parse::<TaskStatus>())
        .transpose()?;

    let user_filter = if opts.mine {
        let dir = locate_data_dir(&opts.data_dir)?;
        Some(identity::resolve_user(Some(&dir), opts.user.as_deref())?)
    } else {
        None
    };

    let lifecycle = open_lifecycle(&opts.data_dir)?;
    let tasks = lifecycle.tasks(user_filter.as_deref(), status)?;

    let mut human = HumanOutput::new(format!("{} task(s)", tasks.len()));
    for task in &tasks {
        human.push_detail(format!(
            "{} [{}] {} ({})",
            short_id(task),
            task.status,
            task.name,
            task.user
        ));
    }

    emit_success(opts.options, "task ls", &LsOutput { tasks }, Some(&human))
}

// =============================================================================
// task show
// =============================================================================

pub struct ShowOptions {
    pub task: String,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

pub fn run_show(opts: ShowOptions) -> Result<()> {
    let lifecycle = open_lifecycle(&opts.data_dir)?;
    let task_id = lifecycle.resolve_task_id(&opts.task)?;
    let task = lifecycle.task(task_id)?;

    let mut human = HumanOutput::new(format!("Task {}", task.id));
    human.push_summary("name", task.name.clone());
    if let Some(description) = &task.description {
        human.push_summary("description", description.clone());
    }
    human.push_summary("user", task.user.clone());
    human.push_summary("status", task.status.to_string());
    human.push_summary("created", task.created_at.to_rfc3339());
    human.push_summary("updated", task.updated_at.to_rfc3339());

    emit_success(opts.options, "task show", &task, Some(&human))
}

// =============================================================================
// task edit
// =============================================================================

pub struct EditOptions {
    pub task: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

pub fn run_edit(opts: EditOptions) -> Result<()> {
    if opts.name.is_none() && opts.description.is_none() {
        return Err(Error::InvalidArgument(
            "nothing to edit: pass --name and/or --description".to_string(),
        ));
    }

    let lifecycle = open_lifecycle(&opts.data_dir)?;
    let task_id = lifecycle.resolve_task_id(&opts.task)?;
    let task = lifecycle.update_task(task_id, opts.name.as_deref(), opts.description.as_deref())?;

    let mut human = HumanOutput::new(format!("Updated task {}", short_id(&task)));
    human.push_summary("name", task.name.clone());
    if let Some(description) = &task.description {
        human.push_summary("description", description.clone());
    }

    emit_success(opts.options, "task edit", &task, Some(&human))
}

// =============================================================================
// task status
// =============================================================================

pub struct StatusOptions {
    pub task: String,
    pub status: String,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

pub fn run_status(opts: StatusOptions) -> Result<()> {
    let status: TaskStatus = opts.status.parse()?;
    if status == TaskStatus::Running {
        return Err(Error::InvalidArgument(
            "running is set by 'tw start', not 'tw task status'".to_string(),
        ));
    }

    let lifecycle = open_lifecycle(&opts.data_dir)?;
    let task_id = lifecycle.resolve_task_id(&opts.task)?;
    let change = lifecycle.change_status(task_id, status)?;

    let mut human = HumanOutput::new(format!(
        "Task {} is now {}",
        short_id(&change.task),
        change.task.status
    ));
    if let Some(open) = &change.open_session {
        human.push_warning(format!(
            "a session started {} is still running; 'tw stop {}' to close it",
            open.start_time.to_rfc3339(),
            short_id(&change.task)
        ));
    }

    emit_success(opts.options, "task status", &change, Some(&human))
}

// =============================================================================
// task rm
// =============================================================================

pub struct RmOptions {
    pub task: String,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

pub fn run_rm(opts: RmOptions) -> Result<()> {
    let lifecycle = open_lifecycle(&opts.data_dir)?;
    let task_id = lifecycle.resolve_task_id(&opts.task)?;
    let task = lifecycle.delete_task(task_id)?;

    let mut human = HumanOutput::new(format!("Deleted task {}", short_id(&task)));
    human.push_summary("name", task.name.clone());
    human.push_detail("sessions and events for this task were removed".to_string());

    emit_success(opts.options, "task rm", &task, Some(&human))
}

fn short_id(task: &TaskView) -> String {
    task.id.to_string()[..8].to_string()
}
