//! # Ls Command Implementation
//!
//! Lists the required packages: alias, url, and whether each entry is
//! indirect or replaced by a local override.

use anyhow::Result;
use clap::Args;
use console::style;
use std::path::PathBuf;

use yao_workshop::Workshop;

/// List the required packages
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Application directory containing workshop.yao
    #[arg(short = 'C', long, default_value = ".")]
    pub app: PathBuf,
}

/// Execute the `ls` command.
pub fn execute(args: LsArgs) -> Result<()> {
    let ws = Workshop::open(&args.app)?;

    if ws.require().is_empty() {
        println!("no packages required");
        return Ok(());
    }

    let width = ws
        .require()
        .iter()
        .map(|p| p.alias.len())
        .max()
        .unwrap_or(0);
    for pkg in ws.require() {
        let mut notes = Vec::new();
        if pkg.indirect {
            notes.push("indirect".to_string());
        }
        if pkg.replaced {
            notes.push(format!("replaced -> {}", pkg.local_path.display()));
        }
        let notes = if notes.is_empty() {
            String::new()
        } else {
            format!("  ({})", notes.join(", "))
        };
        println!(
            "{:width$}  {}{}",
            style(&pkg.alias).cyan(),
            pkg.url,
            style(notes).dim(),
            width = width
        );
    }
    Ok(())
}
