//! Scratch-tree helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Push a file's mtime into the future so any timestamp comparison sees it as newer.
pub fn touch_future(path: &Path) {
    let f = fs::File::options().write(true).open(path).unwrap();
    f.set_modified(SystemTime::now() + Duration::from_secs(120))
        .unwrap();
}

/// Relative path → contents for every file under `root`.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
    let mut out = BTreeMap::new();
    if !root.exists() {
        return out;
    }
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(root).unwrap().to_path_buf();
            out.insert(rel, fs::read_to_string(entry.path()).unwrap());
        }
    }
    out
}

/// Quarter folders `root/<q>/BS/num.txt` with a header line and one data row each.
pub fn quarters(root: &Path, names: &[&str]) {
    for q in names {
        write(
            &root.join(q).join("BS").join("num.txt"),
            &format!("adsh\tvalue\n{q}\t1\n"),
        );
    }
}

pub fn meta_lines(target: &Path) -> Vec<String> {
    fs::read_to_string(target.join("meta.inf"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
