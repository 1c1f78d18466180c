#![deny(
    warnings,
    missing_debug_implementations,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
//! `permfind-pipe` - Run `permfind` through `sort` and count the matches.
//!
//! Every argument is handed to `permfind` untouched. A help flag also
//! suppresses the `Total Matches` line, since the walker then prints usage
//! instead of paths.

use std::env;
use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

use permfind::config::{PipelineConfig, requests_help};
use permfind::error::Result;
use permfind::logging::init_logging;
use permfind::pipeline::Pipeline;
use tracing::debug;

fn run(args: Vec<OsString>) -> Result<()> {
    let suppress = requests_help(&args);
    let config = PipelineConfig::from_env()?;
    debug!(walker = ?config.walker, sorter = ?config.sorter, suppress, "starting pipeline");

    let pipeline = Pipeline::new(config.stages(args)).suppress_summary(suppress);
    let result = pipeline.run(&mut io::stdout().lock())?;

    for stage in result.stages() {
        debug!(stage = %stage.name, termination = ?stage.termination(), "stage outcome");
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    match run(env::args_os().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        },
    }
}
