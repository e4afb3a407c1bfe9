//! Engine module: command line surface and shared path helpers

pub mod arg_parser;
pub mod handlers;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::{Cli, Commands, ExecArgs, MergeArgs};
pub use handlers::handle_run;
pub use tools::{glob_match, is_os_hidden_file, mtime_secs, path_mtime_secs};
