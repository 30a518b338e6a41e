//! # DSL Files
//!
//! A DSL file is a JSON / JSONC document describing a declarative
//! application fragment (model, flow, connector, template, …). The
//! filename carries the identity: `<name>.<ext>.<suffix>` where `<suffix>`
//! is `yao`, `json`, or `jsonc` and `<ext>` selects the kind through a
//! fixed table.
//!
//! Top-level reserved keys are `FROM`, `LANG`, `VERSION`, and `RUN` (the
//! head, parsed by [`head`]), plus `COPY` anywhere in the tree (expanded by
//! the [`compiler`]). All other keys are opaque to the core.

pub mod compiler;
pub mod head;
pub mod path;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use json_comments::StripComments;
use serde_json::Value;

use crate::error::{Error, Result};

pub use head::{Command, Head};

/// Accepted filename suffixes.
pub const SUFFIXES: [&str; 3] = ["yao", "json", "jsonc"];

/// The kind of a DSL file, selected by the middle filename token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Model,
    Flow,
    Http,
    MySql,
    Redis,
    Mongo,
    OpenAi,
    FastEmbed,
    Template,
}

impl Kind {
    /// Map a filename extension token to a kind.
    pub fn from_ext(ext: &str) -> Option<Kind> {
        match ext {
            "mod" => Some(Kind::Model),
            "flow" => Some(Kind::Flow),
            "http" => Some(Kind::Http),
            "mysql" => Some(Kind::MySql),
            "redis" => Some(Kind::Redis),
            "mongo" => Some(Kind::Mongo),
            "openai" => Some(Kind::OpenAi),
            "fastembed" => Some(Kind::FastEmbed),
            "tpl" => Some(Kind::Template),
            _ => None,
        }
    }

    /// The filename extension token for this kind.
    pub fn ext(&self) -> &'static str {
        match self {
            Kind::Model => "mod",
            Kind::Flow => "flow",
            Kind::Http => "http",
            Kind::MySql => "mysql",
            Kind::Redis => "redis",
            Kind::Mongo => "mongo",
            Kind::OpenAi => "openai",
            Kind::FastEmbed => "fastembed",
            Kind::Template => "tpl",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kind::Model => "model",
            Kind::Flow => "flow",
            Kind::Http => "http",
            Kind::MySql => "mysql",
            Kind::Redis => "redis",
            Kind::Mongo => "mongo",
            Kind::OpenAi => "openai",
            Kind::FastEmbed => "fastembed",
            Kind::Template => "template",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A loaded DSL file: parsed head, raw body, and (after compiling) the
/// self-contained tree plus the trace of every file visited.
#[derive(Debug, Clone)]
pub struct Dsl {
    pub head: Head,
    /// The raw parsed document.
    pub content: Value,
    /// The compiled tree; `None` until compiled.
    pub compiled: Option<Value>,
    /// Ordered list of files visited while compiling, bounded at 32.
    /// Retained even when compilation fails, to aid diagnosis.
    pub trace: Vec<PathBuf>,
}

/// Open a DSL file: read it (JSONC tolerated) and parse its head.
pub fn open(file: &Path) -> Result<Dsl> {
    let content = read_value(file)?;
    let head = Head::parse(file, &content)?;
    Ok(Dsl {
        head,
        content,
        compiled: None,
        trace: Vec::new(),
    })
}

/// Read a JSON / JSONC document.
pub fn read_value(file: &Path) -> Result<Value> {
    let raw = fs::read_to_string(file)?;
    serde_json::from_reader(StripComments::new(raw.as_bytes())).map_err(|err| Error::Shape {
        file: file.display().to_string(),
        path: String::new(),
        message: format!("invalid JSON: {}", err),
    })
}
