//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Yao Workshop - manage DSL packages and compile DSL files
#[derive(Parser, Debug)]
#[command(name = "yao-workshop")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Require a package and download its dependency graph
    Get(commands::get::GetArgs),
    /// Drop a required package and prune unused dependencies
    Remove(commands::remove::RemoveArgs),
    /// Rebuild the lockfile from the direct requires
    Refresh(commands::refresh::RefreshArgs),
    /// List the required packages
    Ls(commands::ls::LsArgs),
    /// Compile a DSL file and print the compiled tree
    Compile(commands::compile::CompileArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(&self.log_level),
        )
        .format_timestamp(None)
        .try_init()
        .ok();

        match self.command {
            Commands::Get(args) => commands::get::execute(args),
            Commands::Remove(args) => commands::remove::execute(args),
            Commands::Refresh(args) => commands::refresh::execute(args),
            Commands::Ls(args) => commands::ls::execute(args),
            Commands::Compile(args) => commands::compile::execute(args),
        }
    }
}
