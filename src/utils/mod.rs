pub mod config;
pub mod fd_limit;
pub mod fsdflow_toml;
pub mod logger;
pub mod pathstar;
pub mod tempfiles;

pub use config::*;
pub use fd_limit::{FDS_PER_TASK, cap_workers, max_open_fds, max_workers_by_fd_limit};
pub use logger::{Colors, setup_logging};
pub use pathstar::{SourceEntry, matching_entries, name_at_star_position, star_position_from_end};
pub use tempfiles::{delete_temp_folders, remove_stale_scratch, tmp_path_for};
