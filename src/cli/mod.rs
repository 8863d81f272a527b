//! Command-line interface for tw
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand group lives in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::store::RecordStore;

mod init;
mod session;
mod task;
mod user;

/// tw - task time tracking
///
/// Records timed work sessions against tasks while guaranteeing a task
/// never has more than one running session, even under concurrent
/// starts and stops.
#[derive(Parser, Debug)]
#[command(name = "tw")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the data directory (defaults to the nearest `.tw/`)
    #[arg(long, global = true, env = "TW_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// User identity owning created tasks
    #[arg(long, global = true, env = "TW_USER")]
    pub user: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a time tracker in the current directory
    Init,

    /// Start timing a task
    Start {
        /// Task id (full or unique prefix)
        task: String,
    },

    /// Stop the running session for a task
    Stop {
        /// Task id (full or unique prefix)
        task: String,
    },

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Session queries
    #[command(subcommand)]
    Session(SessionCommands),

    /// Show lifecycle events for a task
    Events {
        /// Task id (full or unique prefix)
        task: String,

        /// Filter by event kind: start, stop, pause, resume, complete, cancel
        #[arg(long)]
        kind: Option<String>,
    },

    /// Set or show user identity
    #[command(subcommand)]
    User(UserCommands),
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a new task
    New {
        /// Task name
        name: String,

        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List tasks
    Ls {
        /// Filter by status: pending, running, completed, cancelled
        #[arg(long)]
        status: Option<String>,

        /// Only tasks owned by the current user
        #[arg(long)]
        mine: bool,
    },

    /// Show a single task
    Show {
        /// Task id (full or unique prefix)
        task: String,
    },

    /// Edit a task's name or description
    Edit {
        /// Task id (full or unique prefix)
        task: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description (empty string clears it)
        #[arg(long)]
        description: Option<String>,
    },

    /// Change a task's status (complete/cancel path)
    Status {
        /// Task id (full or unique prefix)
        task: String,

        /// New status: pending, completed, cancelled
        status: String,
    },

    /// Delete a task and its sessions and events
    Rm {
        /// Task id (full or unique prefix)
        task: String,
    },
}

/// Session subcommands
#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Show the running session for a task
    Running {
        /// Task id (full or unique prefix)
        task: String,
    },

    /// List sessions for a task
    Ls {
        /// Task id (full or unique prefix)
        task: String,

        /// Only completed sessions, most recently started first
        #[arg(long)]
        completed: bool,
    },

    /// Show a single session
    Show {
        /// Session id (full or unique prefix)
        session: String,
    },
}

/// User subcommands
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Persist the user identity for this tracker
    Set {
        /// User name
        name: String,
    },

    /// Show the resolved user identity
    Show,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let options = crate::output::OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init => init::run(init::InitOptions {
                data_dir: self.data_dir,
                options,
            }),
            Commands::Start { task } => session::run_start(session::StartStopOptions {
                task,
                data_dir: self.data_dir,
                options,
            }),
            Commands::Stop { task } => session::run_stop(session::StartStopOptions {
                task,
                data_dir: self.data_dir,
                options,
            }),
            Commands::Task(cmd) => match cmd {
                TaskCommands::New { name, description } => task::run_new(task::NewOptions {
                    name,
                    description,
                    user: self.user,
                    data_dir: self.data_dir,
                    options,
                }),
                TaskCommands::Ls { status, mine } => task::run_ls(task::LsOptions {
                    status,
                    mine,
                    user: self.user,
                    data_dir: self.data_dir,
                    options,
                }),
                TaskCommands::Show { task } => task::run_show(task::ShowOptions {
                    task,
                    data_dir: self.data_dir,
                    options,
                }),
                TaskCommands::Edit {
                    task,
                    name,
                    description,
                } => task::run_edit(task::EditOptions {
                    task,
                    name,
                    description,
                    data_dir: self.data_dir,
                    options,
                }),
                TaskCommands::Status { task, status } => {
                    task::run_status(task::StatusOptions {
                        task,
                        status,
                        data_dir: self.data_dir,
                        options,
                    })
                }
                TaskCommands::Rm { task } => task::run_rm(task::RmOptions {
                    task,
                    data_dir: self.data_dir,
                    options,
                }),
            },
            Commands::Session(cmd) => match cmd {
                SessionCommands::Running { task } => {
                    session::run_running(session::RunningOptions {
                        task,
                        data_dir: self.data_dir,
                        options,
                    })
                }
                SessionCommands::Ls { task, completed } => {
                    session::run_ls(session::LsOptions {
                        task,
                        completed,
                        data_dir: self.data_dir,
                        options,
                    })
                }
                SessionCommands::Show { session } => {
                    session::run_show(session::ShowOptions {
                        session,
                        data_dir: self.data_dir,
                        options,
                    })
                }
            },
            Commands::Events { task, kind } => session::run_events(session::EventsOptions {
                task,
                kind,
                data_dir: self.data_dir,
                options,
            }),
            Commands::User(cmd) => match cmd {
                UserCommands::Set { name } => user::run_set(user::SetOptions {
                    name,
                    data_dir: self.data_dir,
                    options,
                }),
                UserCommands::Show => user::run_show(user::ShowOptions {
                    user: self.user,
                    data_dir: self.data_dir,
                    options,
                }),
            },
        }
    }
}

/// Locate the data directory and open the orchestrator over it.
///
/// An explicit `--data-dir` is used as-is; otherwise the nearest `.tw/`
/// above the current directory wins.
pub(crate) fn open_lifecycle(data_dir: &Option<PathBuf>) -> Result<Lifecycle> {
    let dir = locate_data_dir(data_dir)?;
    let config = Config::load_from_dir(&dir)?;
    let store = RecordStore::open(dir).with_lock_timeout(config.lock_timeout_ms);
    Ok(Lifecycle::new(store))
}

/// Resolve the data directory without opening a store
pub(crate) fn locate_data_dir(data_dir: &Option<PathBuf>) -> Result<PathBuf> {
    match data_dir {
        Some(dir) => Ok(dir.clone()),
        None => {
            let cwd = std::env::current_dir()?;
            RecordStore::discover(&cwd)
        }
    }
}
