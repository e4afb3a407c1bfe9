//! CLI command handlers

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::engine::arg_parser::{Cli, Commands, ExecArgs, MergeArgs};
use crate::pipeline::{Process, ProcessSummary, execute_processes};
use crate::stages::{CollectProcess, CollectSpec, ConcatProcess, ConcatSpec, build_processes};
use crate::task::merge::inspect_target;
use crate::types::{ProcessOpts, RunContext};
use crate::utils::fsdflow_toml::{SettingsSection, apply_file_to_opts, load_run_toml};
use crate::utils::{delete_temp_folders, setup_logging};

/// Build opts: defaults, then file settings, then CLI flags.
fn setup_opts(verbose: bool, settings: Option<&SettingsSection>, exec: &ExecArgs) -> ProcessOpts {
    let mut opts = ProcessOpts {
        verbose,
        ..ProcessOpts::default()
    };
    if let Some(settings) = settings {
        apply_file_to_opts(settings, &mut opts);
        opts.verbose |= verbose;
    }
    if let Some(s) = exec.strategy {
        opts.strategy = s.into();
    }
    if let Some(n) = exec.chunk_size {
        opts.chunk_size = n;
    }
    if exec.workers.is_some() {
        opts.workers = exec.workers;
    }
    opts.execute_serial(exec.serial)
}

/// Print/log the summaries; returns the number of failed tasks.
fn report(summaries: &[ProcessSummary], json: bool) -> Result<usize> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(summaries).context("serialize summaries")?
        );
    }
    let failed: usize = summaries.iter().map(|s| s.failed).sum();
    if failed > 0 {
        warn!("{} task(s) failed; rerun to retry them", failed);
    }
    Ok(failed)
}

fn run_single(mut process: Box<dyn Process>) -> Result<usize> {
    let summaries = execute_processes(std::slice::from_mut(&mut process))?;
    report(&summaries, false)
}

fn merge_name(kind: &str, merge: &MergeArgs) -> String {
    let target = merge
        .target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{kind}:{target}")
}

/// Dispatch the parsed command line. Returns how many tasks failed.
pub fn handle_run(cli: &Cli) -> Result<usize> {
    match &cli.command {
        Commands::Run { config, json, exec } => {
            let path = Cli::config_path(config);
            let run = load_run_toml(&path)?;
            let verbose = cli.verbose || run.settings.verbose.unwrap_or(false);
            setup_logging(verbose);
            let opts = setup_opts(cli.verbose, Some(&run.settings), exec);
            debug!("{} CONFIG: {:#?}", env!("CARGO_PKG_NAME").to_uppercase(), opts);
            if run.stages.is_empty() {
                warn!("{} defines no stages", path.display());
                return Ok(0);
            }
            let ctx = RunContext::new("run");
            info!("run {} with {} stages", ctx.run_id, run.stages.len());
            let mut processes = build_processes(&run, &opts, &ctx);
            let summaries = execute_processes(&mut processes)?;
            report(&summaries, *json)
        }
        Commands::Concat {
            merge,
            skip_header,
            skip_file,
            exec,
        } => {
            setup_logging(cli.verbose);
            let opts = setup_opts(cli.verbose, None, exec);
            let name = merge_name("concat", merge);
            let spec = ConcatSpec {
                roots: merge.roots.clone(),
                pathfilter: merge.pathfilter.clone(),
                target: merge.target.clone(),
                skip_repeated_header: *skip_header,
                skip_files: skip_file.clone(),
            };
            let ctx = RunContext::new(&name);
            run_single(Box::new(ConcatProcess::new(name, vec![spec], opts, &ctx)))
        }
        Commands::Collect { merge, exec } => {
            setup_logging(cli.verbose);
            let opts = setup_opts(cli.verbose, None, exec);
            let name = merge_name("collect", merge);
            let spec = CollectSpec {
                roots: merge.roots.clone(),
                pathfilter: merge.pathfilter.clone(),
                target: merge.target.clone(),
            };
            let ctx = RunContext::new(&name);
            run_single(Box::new(CollectProcess::new(name, vec![spec], opts, &ctx)))
        }
        Commands::Clean { root, prefix } => {
            setup_logging(cli.verbose);
            let n = delete_temp_folders(root, prefix)?;
            info!("removed {} scratch directories under {}", n, root.display());
            Ok(0)
        }
        Commands::Status { target, json } => {
            setup_logging(cli.verbose);
            let status = inspect_target(target)?;
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status).context("serialize status")?
                );
            } else {
                println!("{status}");
            }
            Ok(0)
        }
    }
}
