use colored::{ColoredString, Colorize};
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

use crate::utils::config::PackagePaths;

/// Colors for stage summaries.
pub struct Colors;

impl Colors {
    pub const SUCCESS: &'static str = "green";
    pub const FAILED: &'static str = "red";
    pub const SKIPPED: &'static str = "yellow";

    pub fn colorize(color: &str, text: &str) -> ColoredString {
        text.color(color)
    }
}

/// Install the global logger: our crate at Info (Debug when `verbose`), dependencies at Warn.
/// `RUST_LOG` still applies on top. Calling it twice is harmless.
pub fn setup_logging(verbose: bool) {
    let pkg = PackagePaths::get().pkg_name();
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(pkg, level)
        .format(move |buf, record| {
            let tag = pkg.cyan();
            let line = match record.level() {
                Level::Error => format!(
                    "[{} {} {}] {}",
                    tag,
                    "ERROR".red(),
                    record.target().white(),
                    record.args()
                ),
                Level::Warn => format!(
                    "[{} {} {}] {}",
                    tag,
                    "WARN".yellow(),
                    record.target().white(),
                    record.args()
                ),
                Level::Debug | Level::Trace => {
                    format!("[{} {}] {}", tag, "debug".dimmed(), record.args())
                }
                Level::Info => format!("[{}] {}", tag, record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}
