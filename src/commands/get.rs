//! # Get Command Implementation
//!
//! Requires a package: resolves the version when none is given (latest tag
//! or commit), downloads the package and its transitive dependencies with
//! a progress spinner, and updates the lockfile.

use anyhow::Result;
use clap::Args;
use console::style;
use std::path::PathBuf;

use yao_workshop::{DownloadStatus, Package, Workshop};

use super::progress;

/// Require a package and download its dependency graph
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Package url, e.g. github.com/yaoapp/demo@1.0.0 (version optional)
    #[arg(value_name = "URL")]
    pub url: String,

    /// Short name to register the package under
    #[arg(short, long)]
    pub alias: Option<String>,

    /// Application directory containing workshop.yao
    #[arg(short = 'C', long, default_value = ".")]
    pub app: PathBuf,
}

/// Execute the `get` command.
pub fn execute(args: GetArgs) -> Result<()> {
    let mut ws = Workshop::open(&args.app)?;

    let bar = progress::spinner();
    let mut cb = |bytes: u64, pkg: &Package, status: DownloadStatus| {
        progress::update(&bar, bytes, pkg, status)
    };
    ws.get(&args.url, args.alias.as_deref(), &mut cb)?;
    bar.finish_and_clear();

    println!(
        "{} required {} ({} package{})",
        style("✓").green(),
        args.url,
        ws.require().len(),
        if ws.require().len() == 1 { "" } else { "s" }
    );
    Ok(())
}
