//! # CLI Command Implementations
//!
//! One file per subcommand. Each command module contains an `Args` struct
//! derived with `clap` and an `execute` function that calls into the
//! `yao_workshop` library to do the actual work.

pub mod compile;
pub mod get;
pub mod ls;
pub mod refresh;
pub mod remove;

/// Shared progress-bar plumbing for commands that download packages.
pub(crate) mod progress {
    use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
    use yao_workshop::{DownloadStatus, Package};

    pub fn spinner() -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            bar.set_style(style);
        }
        bar
    }

    pub fn update(bar: &ProgressBar, bytes: u64, pkg: &Package, status: DownloadStatus) {
        match status {
            DownloadStatus::Prepare => bar.set_message(format!("preparing {}", pkg.name)),
            DownloadStatus::Downloading => {
                bar.set_message(format!("downloading {} ({})", pkg.name, HumanBytes(bytes)))
            }
            DownloadStatus::Cached => bar.set_message(format!("cached {}", pkg.name)),
        }
        bar.tick();
    }
}
