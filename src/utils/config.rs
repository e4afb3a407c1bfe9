//! Application configuration constants.
//! Naming conventions and tuning in one place.

use std::sync::OnceLock;

// ---- Package / names (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!("{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Run configuration looked up in the working directory when `--config` is not given.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }
}

// ---- On-disk contract ----

/// Bookkeeping file inside every merge target.
pub const META_INF_FILENAME: &str = "meta.inf";

/// Prefix of the sibling scratch directory a merge task writes into (`tmp_<target-name>`).
pub const TMP_PREFIX: &str = "tmp";

// ---- Worker threads ----

/// Pool sizing for the task strategies.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from rayon; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available cores (from rayon); set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Default width of the I/O thread pool.
    pub io_threads: usize,
    /// Floor for any pool.
    pub floor: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            io_threads: Self::DEFAULT_IO_THREADS,
            floor: Self::FLOOR_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const DEFAULT_IO_THREADS: usize = 8;
    pub const FLOOR_THREADS: usize = 1;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }
}

// ---- Chunking ----

/// Number of tasks handed to a pool at once when the process does not say otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Fan-out executor defaults.
pub struct FanOutConsts;

impl FanOutConsts {
    /// Items per committed chunk.
    pub const CHUNK_SIZE: usize = 100;
    /// Worker threads for a parallel fan-out.
    pub const PARALLELISM: usize = 8;
}
