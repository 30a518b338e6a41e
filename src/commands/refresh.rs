//! # Refresh Command Implementation
//!
//! Rebuilds the lockfile as the canonical projection of the direct
//! requires: every direct package is re-added and indirect dependencies
//! are rediscovered through recursion.

use anyhow::Result;
use clap::Args;
use console::style;
use std::path::PathBuf;

use yao_workshop::{DownloadStatus, Package, Workshop};

use super::progress;

/// Rebuild the lockfile from the direct requires
#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Application directory containing workshop.yao
    #[arg(short = 'C', long, default_value = ".")]
    pub app: PathBuf,
}

/// Execute the `refresh` command.
pub fn execute(args: RefreshArgs) -> Result<()> {
    let mut ws = Workshop::open(&args.app)?;

    let bar = progress::spinner();
    let mut cb = |bytes: u64, pkg: &Package, status: DownloadStatus| {
        progress::update(&bar, bytes, pkg, status)
    };
    ws.refresh(&mut cb)?;
    bar.finish_and_clear();

    println!(
        "{} refreshed {} package{}",
        style("✓").green(),
        ws.require().len(),
        if ws.require().len() == 1 { "" } else { "s" }
    );
    Ok(())
}
