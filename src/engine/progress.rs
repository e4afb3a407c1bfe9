//! Progress bar utilities for displaying task completion

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Configuration for creating a progress bar
pub struct ProgressBarConfig {
    pub total: usize,
    pub desc: String,
    pub animation: Animation,
}

impl ProgressBarConfig {
    /// Create a new progress bar configuration
    pub fn new(total: usize, desc: impl Into<String>, animation: Animation) -> Self {
        Self {
            total,
            desc: desc.into(),
            animation,
        }
    }
}

/// Create a progress bar with the given configuration
pub fn create_progress_bar(config: ProgressBarConfig) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = config.total,
        desc = config.desc,
        animation = config.animation,
        unit = " tasks"
    )))
}

/// Bar over `total` tasks when `verbose`, otherwise None.
pub fn task_bar(verbose: bool, total: usize, desc: &str) -> Option<ProgressBar> {
    (verbose && total > 0)
        .then(|| create_progress_bar(ProgressBarConfig::new(total, desc, Animation::Classic)))
}

/// Advance the bar by `n`. Blocks briefly on contention so no finished task goes uncounted.
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut pb) = pb.lock() {
        let _ = pb.update(n);
    }
}

/// Advance an optional bar by one.
pub fn tick(pb: Option<&ProgressBar>) {
    if let Some(pb) = pb {
        update_progress_bar(pb, 1);
    }
}

/// Print the final state and move the cursor past the bar.
pub fn finish_bar(pb: Option<&ProgressBar>) {
    if let Some(pb) = pb
        && let Ok(mut bar) = pb.lock()
    {
        let _ = bar.refresh();
        eprintln!();
    }
}
