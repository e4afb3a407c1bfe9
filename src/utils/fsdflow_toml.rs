//! Load a run configuration (`fsdflow.toml`): `[settings]` plus an ordered `[[stages]]` list.
//! The library never reads it on its own; the CLI turns it into processes.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::types::{ExecutionStrategy, ProcessOpts};

#[derive(Debug, Default, Deserialize)]
pub struct RunToml {
    #[serde(default)]
    pub settings: SettingsSection,
    #[serde(default)]
    pub stages: Vec<StageToml>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsSection {
    pub verbose: Option<bool>,
    pub execute_serial: Option<bool>,
    pub strategy: Option<StrategyToml>,
    pub chunk_size: Option<usize>,
    pub workers: Option<usize>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyToml {
    Serial,
    Threads,
    Compute,
}

impl From<StrategyToml> for ExecutionStrategy {
    fn from(s: StrategyToml) -> Self {
        match s {
            StrategyToml::Serial => ExecutionStrategy::Serial,
            StrategyToml::Threads => ExecutionStrategy::ThreadPool,
            StrategyToml::Compute => ExecutionStrategy::ComputePool,
        }
    }
}

/// One stage, run in file order.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StageToml {
    Concat {
        name: Option<String>,
        roots: Vec<PathBuf>,
        pathfilter: String,
        target: PathBuf,
        #[serde(default)]
        skip_repeated_header: bool,
        #[serde(default)]
        skip_files: Vec<String>,
    },
    Collect {
        name: Option<String>,
        roots: Vec<PathBuf>,
        pathfilter: String,
        target: PathBuf,
    },
}

impl StageToml {
    pub fn kind(&self) -> &'static str {
        match self {
            StageToml::Concat { .. } => "concat",
            StageToml::Collect { .. } => "collect",
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            StageToml::Concat { name, .. } | StageToml::Collect { name, .. } => name.as_deref(),
        }
    }
}

pub fn parse_run_toml(s: &str) -> Result<RunToml> {
    toml::from_str(s).context("parse run configuration")
}

/// Load a run configuration from `path`.
pub fn load_run_toml(path: &Path) -> Result<RunToml> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_run_toml(&s).with_context(|| format!("in {}", path.display()))
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($idx:expr, $opts:expr, $idx_field:ident => $opts_field:ident) => {
        if let Some(v) = $idx.$idx_field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply `[settings]` to opts (only fields present in the file). Call before applying CLI flags.
pub fn apply_file_to_opts(settings: &SettingsSection, opts: &mut ProcessOpts) {
    if let Some(s) = settings.strategy {
        opts.strategy = s.into();
    }
    apply_file_opt!(settings, opts, chunk_size => chunk_size);
    apply_file_opt!(settings, opts, verbose => verbose);
    if settings.workers.is_some() {
        opts.workers = settings.workers;
    }
    if settings.execute_serial == Some(true) {
        opts.strategy = ExecutionStrategy::Serial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[settings]
verbose = true
strategy = "compute"
chunk_size = 10

[[stages]]
kind = "collect"
roots = ["data/quarters"]
pathfilter = "*"
target = "data/collected/all"

[[stages]]
kind = "concat"
name = "bs"
roots = ["data/collected/all"]
pathfilter = "*/BS"
target = "data/concat/BS"
skip_repeated_header = true
"#;

    #[test]
    fn stages_keep_file_order() {
        let run = parse_run_toml(SAMPLE).unwrap();
        let kinds: Vec<_> = run.stages.iter().map(StageToml::kind).collect();
        assert_eq!(kinds, vec!["collect", "concat"]);
        assert_eq!(run.stages[1].name(), Some("bs"));
    }

    #[test]
    fn settings_override_defaults() {
        let run = parse_run_toml(SAMPLE).unwrap();
        let mut opts = ProcessOpts::default();
        apply_file_to_opts(&run.settings, &mut opts);
        assert_eq!(opts.strategy, ExecutionStrategy::ComputePool);
        assert_eq!(opts.chunk_size, 10);
        assert!(opts.verbose);
        assert_eq!(opts.workers, None);
    }

    #[test]
    fn unknown_stage_kind_is_rejected() {
        let bad = "[[stages]]\nkind = \"explode\"\nroots = []\npathfilter = \"*\"\ntarget = \"x\"\n";
        assert!(parse_run_toml(bad).is_err());
    }
}
