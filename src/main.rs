//! fsdflow CLI: run pipeline stages from a config file or one merge from flags.
//! Exits with status 2 when any task failed, so cron wrappers notice without parsing logs.

use anyhow::Result;
use clap::Parser;
use fsdflow::engine::arg_parser::Cli;
use fsdflow::engine::handle_run;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> Result<ExitCode> {
    let started = Instant::now();
    let cli = Cli::parse();
    let failed = handle_run(&cli)?;
    log::debug!("finished in {:?}", started.elapsed());
    Ok(if failed > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}
