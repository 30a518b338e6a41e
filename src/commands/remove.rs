//! # Remove Command Implementation
//!
//! Drops a required package and recomputes the transitive set, so indirect
//! dependencies no longer required by any direct one disappear from the
//! lockfile.

use anyhow::Result;
use clap::Args;
use console::style;
use std::path::PathBuf;

use yao_workshop::{DownloadStatus, Package, Workshop};

use super::progress;

/// Drop a required package and prune unused dependencies
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Package url or addr, e.g. github.com/yaoapp/demo
    #[arg(value_name = "URL")]
    pub url: String,

    /// Application directory containing workshop.yao
    #[arg(short = 'C', long, default_value = ".")]
    pub app: PathBuf,
}

/// Execute the `remove` command.
pub fn execute(args: RemoveArgs) -> Result<()> {
    let mut ws = Workshop::open(&args.app)?;

    let bar = progress::spinner();
    let mut cb = |bytes: u64, pkg: &Package, status: DownloadStatus| {
        progress::update(&bar, bytes, pkg, status)
    };
    ws.remove(&args.url, &mut cb)?;
    bar.finish_and_clear();

    println!("{} removed {}", style("✓").green(), args.url);
    Ok(())
}
