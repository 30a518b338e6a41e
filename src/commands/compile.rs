//! # Compile Command Implementation
//!
//! Compiles one DSL file against the application's workshop and prints the
//! compiled tree as pretty JSON. `--trace` additionally lists every file
//! visited during the compile on stderr.

use anyhow::Result;
use clap::Args;
use console::style;
use std::path::PathBuf;

use yao_workshop::{dsl, Compiler, Workshop};

/// Compile a DSL file and print the compiled tree
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// The DSL file to compile, e.g. models/user.mod.yao
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Application directory containing workshop.yao
    #[arg(short = 'C', long, default_value = ".")]
    pub app: PathBuf,

    /// Print the visited-file trace on stderr
    #[arg(long)]
    pub trace: bool,
}

/// Execute the `compile` command.
pub fn execute(args: CompileArgs) -> Result<()> {
    let mut ws = Workshop::open(&args.app)?;
    let file = if args.file.is_absolute() {
        args.file.clone()
    } else {
        args.app.join(&args.file)
    };

    let mut dsl = dsl::open(&file)?;
    let result = Compiler::new(&mut ws).compile(&mut dsl);

    if args.trace {
        for visited in &dsl.trace {
            eprintln!("{} {}", style("visited").dim(), visited.display());
        }
    }
    result?;

    match dsl.compiled {
        Some(tree) => println!("{}", serde_json::to_string_pretty(&tree)?),
        None => println!("null"),
    }
    Ok(())
}
