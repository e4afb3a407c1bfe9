use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::types::ExecutionStrategy;
use crate::utils::config::{PackagePaths, TMP_PREFIX};

/// Incremental, crash-safe pipeline stages over a growing data corpus.
#[derive(Clone, Parser)]
#[command(name = "fsdflow")]
#[command(about = "Run incremental merge stages; targets are only ever replaced by atomic rename.")]
pub struct Cli {
    /// Verbose output (debug logs, progress bars).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Run every stage of a run configuration, in file order.
    Run {
        /// Run configuration. Default: `fsdflow.toml` in the current directory.
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Print stage summaries as JSON.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        exec: ExecArgs,
    },
    /// Concatenate matched sources into one target (rebuilt when any source changes).
    Concat {
        #[command(flatten)]
        merge: MergeArgs,

        /// Drop the first line of every file appended after the first.
        #[arg(long)]
        skip_header: bool,

        /// File names ignored when checking for changes.
        #[arg(long, num_args = 1..)]
        skip_file: Vec<String>,

        #[command(flatten)]
        exec: ExecArgs,
    },
    /// Copy each new matched entry into target/<entry-name>.
    Collect {
        #[command(flatten)]
        merge: MergeArgs,

        #[command(flatten)]
        exec: ExecArgs,
    },
    /// Delete scratch directories left behind by interrupted runs.
    Clean {
        /// Directory holding targets; only its direct `<prefix>_*` children are removed.
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Scratch directory prefix (directories named `<prefix>_*` are removed).
        #[arg(long, default_value = TMP_PREFIX)]
        prefix: String,
    },
    /// Show what a target's meta.inf says has been merged.
    Status {
        #[arg(value_name = "TARGET")]
        target: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

/// Sources and target of a single merge.
#[derive(Clone, Args)]
pub struct MergeArgs {
    /// Source root. Can specify multiple: -r a -r b
    #[arg(long = "root", short = 'r', required = true)]
    pub roots: Vec<PathBuf>,

    /// Pattern below each root with exactly one `*` segment, e.g. `*/BS`.
    #[arg(long, short = 'p', default_value = "*")]
    pub pathfilter: String,

    /// Target directory.
    #[arg(long, short = 't')]
    pub target: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyArg {
    Serial,
    Threads,
    Compute,
}

impl From<StrategyArg> for ExecutionStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Serial => ExecutionStrategy::Serial,
            StrategyArg::Threads => ExecutionStrategy::ThreadPool,
            StrategyArg::Compute => ExecutionStrategy::ComputePool,
        }
    }
}

/// Execution overrides; anything unset falls back to the config file, then defaults.
#[derive(Clone, Args)]
pub struct ExecArgs {
    /// Run tasks one after another on the main thread.
    #[arg(long)]
    pub serial: bool,

    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Tasks dispatched to the pool at once.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Pool width.
    #[arg(long, short = 'j')]
    pub workers: Option<usize>,
}

impl Cli {
    /// Config path for `run`, defaulting to the package config filename in the working directory.
    pub fn config_path(config: &Option<PathBuf>) -> PathBuf {
        config
            .clone()
            .unwrap_or_else(|| PathBuf::from(PackagePaths::get().config_filename()))
    }
}
