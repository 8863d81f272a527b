//! `tw start` / `tw stop` / `tw session` / `tw events` - session
//! lifecycle and queries

use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::events::EventKind;
use crate::lifecycle::{EventView, SessionView};
use crate::output::{emit_success, HumanOutput, OutputOptions};

use super::open_lifecycle;

// =============================================================================
// start / stop
// =============================================================================

pub struct StartStopOptions {
    pub task: String,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

pub fn run_start(opts: StartStopOptions) -> Result<()> {
    let lifecycle = open_lifecycle(&opts.data_dir)?;
    let task_id = lifecycle.resolve_task_id(&opts.task)?;
    let session = lifecycle.start(task_id)?;

    let mut human = HumanOutput::new(format!("Started timing task {}", short(task_id)));
    human.push_summary("session", short(session.id));
    human.push_summary("started", session.start_time.to_rfc3339());
    human.push_next_step(format!("tw stop {}", short(task_id)));

    emit_success(opts.options, "start", &session, Some(&human))
}

pub fn run_stop(opts: StartStopOptions) -> Result<()> {
    let lifecycle = open_lifecycle(&opts.data_dir)?;
    let task_id = lifecycle.resolve_task_id(&opts.task)?;
    let session = lifecycle.stop(task_id)?;

    let mut human = HumanOutput::new(format!("Stopped timing task {}", short(task_id)));
    human.push_summary("session", short(session.id));
    human.push_summary("duration", format_duration(session.duration_seconds));

    emit_success(opts.options, "stop", &session, Some(&human))
}

// =============================================================================
// session running
// =============================================================================

pub struct RunningOptions {
    pub task: String,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

#[derive(Serialize)]
struct RunningOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionView>,
}

pub fn run_running(opts: RunningOptions) -> Result<()> {
    let lifecycle = open_lifecycle(&opts.data_dir)?;
    let task_id = lifecycle.resolve_task_id(&opts.task)?;
    let session = lifecycle.running_session(task_id)?;

    let human = match &session {
        Some(session) => {
            let mut human = HumanOutput::new(format!("Task {} is running", short(task_id)));
            human.push_summary("session", short(session.id));
            human.push_summary("started", session.start_time.to_rfc3339());
            human.push_summary("elapsed", format_duration(session.duration_seconds));
            human
        }
        None => HumanOutput::new(format!("Task {} has no running session", short(task_id))),
    };

    emit_success(
        opts.options,
        "session running",
        &RunningOutput { session },
        Some(&human),
    )
}

// =============================================================================
// session ls
// =============================================================================

pub struct LsOptions {
    pub task: String,
    pub completed: bool,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

#[derive(Serialize)]
struct LsOutput {
    sessions: Vec<SessionView>,
}

pub fn run_ls(opts: LsOptions) -> Result<()> {
    let lifecycle = open_lifecycle(&opts.data_dir)?;
    let task_id = lifecycle.resolve_task_id(&opts.task)?;
    let sessions = if opts.completed {
        lifecycle.completed_sessions(task_id)?
    } else {
        lifecycle.sessions(task_id)?
    };

    let mut human = HumanOutput::new(format!(
        "{} session(s) for task {}",
        sessions.len(),
        short(task_id)
    ));
    for session in &sessions {
        let state = if session.is_running { "running" } else { "done" };
        human.push_detail(format!(
            "{} [{}] {} ({})",
            short(session.id),
            state,
            session.start_time.to_rfc3339(),
            format_duration(session.duration_seconds)
        ));
    }

    emit_success(
        opts.options,
        "session ls",
        &LsOutput { sessions },
        Some(&human),
    )
}

// =============================================================================
// session show
// =============================================================================

pub struct ShowOptions {
    pub session: String,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

pub fn run_show(opts: ShowOptions) -> Result<()> {
    let lifecycle = open_lifecycle(&opts.data_dir)?;
    let session_id = lifecycle.resolve_session_id(&opts.session)?;
    let session = lifecycle.session_by_id(session_id)?;

    let mut human = HumanOutput::new(format!("Session {}", session.id));
    human.push_summary("task", short(session.task_id));
    human.push_summary("started", session.start_time.to_rfc3339());
    if let Some(end) = session.end_time {
        human.push_summary("ended", end.to_rfc3339());
    }
    human.push_summary("duration", format_duration(session.duration_seconds));
    human.push_summary(
        "running",
        if session.is_running { "yes" } else { "no" },
    );

    emit_success(opts.options, "session show", &session, Some(&human))
}

// =============================================================================
// events
// =============================================================================

pub struct EventsOptions {
    pub task: String,
    pub kind: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

#[derive(Serialize)]
struct EventsOutput {
    events: Vec<EventView>,
}

pub fn run_events(opts: EventsOptions) -> Result<()> {
    let kind = opts
        .kind
        .as_deref()
        .map(|raw| raw.parse::<EventKind>())
        .transpose()?;

    let lifecycle = open_lifecycle(&opts.data_dir)?;
    let task_id = lifecycle.resolve_task_id(&opts.task)?;
    let events = lifecycle.events(task_id, kind)?;

    let mut human = HumanOutput::new(format!(
        "{} event(s) for task {}",
        events.len(),
        short(task_id)
    ));
    for event in &events {
        human.push_detail(format!("{} {}", event.occurred_at.to_rfc3339(), event.kind));
    }

    emit_success(
        opts.options,
        "events",
        &EventsOutput { events },
        Some(&human),
    )
}

fn short(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn format_duration(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h{minutes:02}m{secs:02}s")
    } else if minutes > 0 {
        format!("{minutes}m{secs:02}s")
    } else {
        format!("{secs}s")
    }
}
