//! Copy progress display
//!
//! File operations scroll above a spinner that stays on the bottom line.
//! A hidden instance prints nothing, which keeps tests and scripted runs quiet.

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};

pub struct CopyProgress {
    spinner: ProgressBar,
    start_time: Instant,
}

impl CopyProgress {
    pub fn new(visible: bool) -> Self {
        let spinner = if visible {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("  {spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
            );
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner
        } else {
            ProgressBar::hidden()
        };
        Self {
            spinner,
            start_time: Instant::now(),
        }
    }

    pub fn hidden() -> Self {
        Self::new(false)
    }

    /// Print a copied file above the spinner.
    pub fn file(&self, path: &Path) {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S%.6f");
        self.spinner
            .println(format!("[{}] Copying {}", now, path.display()));
        self.spinner.set_message(format!(
            "copying... {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
    }

    pub fn finish(&self, files: u64, bytes: u64) {
        let elapsed = self.start_time.elapsed();
        self.spinner.finish_with_message(format!(
            "copied {} files ({:.1} MB) in {:.1}s",
            files,
            bytes as f64 / 1_048_576.0,
            elapsed.as_secs_f64()
        ));
    }
}
