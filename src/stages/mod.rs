//! Built-in stages and turning a run configuration into an ordered process list.

pub mod collect;
pub mod concat;

pub use collect::{CollectProcess, CollectSpec, CopyMerge};
pub use concat::{ConcatMerge, ConcatProcess, ConcatSpec, append_file};

use crate::pipeline::Process;
use crate::types::{ProcessOpts, RunContext};
use crate::utils::fsdflow_toml::{RunToml, StageToml};

/// One process per configured stage, in file order.
pub fn build_processes(run: &RunToml, opts: &ProcessOpts, ctx: &RunContext) -> Vec<Box<dyn Process>> {
    run.stages
        .iter()
        .enumerate()
        .map(|(i, stage)| -> Box<dyn Process> {
            let name = stage
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}-{}", stage.kind(), i + 1));
            match stage {
                StageToml::Concat {
                    roots,
                    pathfilter,
                    target,
                    skip_repeated_header,
                    skip_files,
                    ..
                } => Box::new(ConcatProcess::new(
                    name,
                    vec![ConcatSpec {
                        roots: roots.clone(),
                        pathfilter: pathfilter.clone(),
                        target: target.clone(),
                        skip_repeated_header: *skip_repeated_header,
                        skip_files: skip_files.clone(),
                    }],
                    opts.clone(),
                    ctx,
                )),
                StageToml::Collect {
                    roots,
                    pathfilter,
                    target,
                    ..
                } => Box::new(CollectProcess::new(
                    name,
                    vec![CollectSpec {
                        roots: roots.clone(),
                        pathfilter: pathfilter.clone(),
                        target: target.clone(),
                    }],
                    opts.clone(),
                    ctx,
                )),
            }
        })
        .collect()
}
