//! Targets given relative to the working directory. Kept in its own test binary with a single
//! test because it changes the process-wide current directory.

mod common;

use fsdflow::pipeline::Process;
use fsdflow::stages::{CollectProcess, CollectSpec};
use fsdflow::utils::delete_temp_folders;
use fsdflow::{ProcessOpts, RunContext};
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn collect_into_all() -> CollectProcess {
    CollectProcess::new(
        "collect",
        vec![CollectSpec {
            roots: vec![PathBuf::from("src")],
            pathfilter: "*".to_string(),
            target: PathBuf::from("all"),
        }],
        ProcessOpts::default(),
        &RunContext::new("test"),
    )
}

// --- bare relative targets ---

#[test]
fn test_recovery_and_clean_work_in_the_working_directory() {
    let dir = TempDir::new().unwrap();
    let previous = env::current_dir().unwrap();
    env::set_current_dir(dir.path()).unwrap();

    common::quarters(Path::new("src"), &["A"]);
    let first = collect_into_all().process().unwrap();
    assert_eq!(first.succeeded().len(), 1);

    common::write(&Path::new("tmp_all").join("junk"), "left by a killed run");
    let rerun = collect_into_all().process().unwrap();
    assert!(rerun.is_empty());
    let scratch_left = Path::new("tmp_all").exists();

    common::write(&Path::new("tmp_other").join("junk"), "left by a killed run");
    let cleaned = delete_temp_folders(Path::new(""), "tmp").unwrap();
    let other_left = Path::new("tmp_other").exists();

    env::set_current_dir(previous).unwrap();
    assert!(!scratch_left);
    assert_eq!(cleaned, 1);
    assert!(!other_left);
}
