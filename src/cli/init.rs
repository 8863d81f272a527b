//! `tw init` - create the data directory

use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{RecordStore, DATA_DIR};

pub struct InitOptions {
    pub data_dir: Option<PathBuf>,
    pub options: OutputOptions,
}

#[derive(Serialize)]
struct InitOutput {
    data_dir: PathBuf,
    created: bool,
}

pub fn run(opts: InitOptions) -> Result<()> {
    let dir = match opts.data_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?.join(DATA_DIR),
    };

    let already = RecordStore::open(&dir).is_initialized();
    let store = RecordStore::init(&dir)?;

    let output = InitOutput {
        data_dir: store.data_dir().to_path_buf(),
        created: !already,
    };

    let mut human = HumanOutput::new(if output.created {
        "Initialized time tracker"
    } else {
        "Time tracker already initialized"
    });
    human.push_summary("data dir", store.data_dir().display().to_string());
    if output.created {
        human.push_next_step("tw task new \"<name>\"");
    }

    emit_success(opts.options, "init", &output, Some(&human))
}
