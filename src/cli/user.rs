//! `tw user` - user identity commands

use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::identity;
use crate::output::{emit_success, HumanOutput, OutputOptions};

use super::locate_data_dir;

pub struct SetOptions {
    pub name: String,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

#[derive(Serialize)]
struct UserOutput {
    user: String,
}

pub fn run_set(opts: SetOptions) -> Result<()> {
    let dir = locate_data_dir(&opts.data_dir)?;
    identity::persist_user(&dir, &opts.name)?;

    let user = opts.name.trim().to_string();
    let mut human = HumanOutput::new(format!("User set to {user}"));
    human.push_summary("data dir", dir.display().to_string());

    emit_success(opts.options, "user set", &UserOutput { user }, Some(&human))
}

pub struct ShowOptions {
    pub user: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

pub fn run_show(opts: ShowOptions) -> Result<()> {
    let dir = locate_data_dir(&opts.data_dir)?;
    let user = identity::resolve_user(Some(&dir), opts.user.as_deref())?;

    let human = HumanOutput::new(format!("User: {user}"));

    emit_success(opts.options, "user show", &UserOutput { user }, Some(&human))
}
