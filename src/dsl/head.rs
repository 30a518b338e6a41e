//! # Head Parser
//!
//! Turns a DSL file's top-level map into a typed [`Head`]: `FROM`, `LANG`,
//! `VERSION`, and the `RUN` command record. `name` and `kind` derive from
//! the filename; any shape violation is fatal with a message naming the
//! offending key and index.

use std::path::{Path, PathBuf};

use semver::Version;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::{Kind, SUFFIXES};

/// The ordered RUN command lists. All four are optional and independent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    /// Paths to remove.
    pub delete: Vec<String>,
    /// `{path: map}` shallow merges.
    pub merge: Vec<(String, Value)>,
    /// `{path: value}` assignments.
    pub replace: Vec<(String, Value)>,
    /// `{path: list}` concatenations.
    pub append: Vec<(String, Value)>,
}

impl Command {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty()
            && self.merge.is_empty()
            && self.replace.is_empty()
            && self.append.is_empty()
    }
}

/// The meta-section of a DSL file.
#[derive(Debug, Clone, PartialEq)]
pub struct Head {
    /// Absolute path of the file.
    pub file: PathBuf,
    /// Basename before the extension tokens.
    pub name: String,
    pub kind: Kind,
    /// DSL language version, default `1.0.0`.
    pub lang: Version,
    /// Document version, default `1.0.0`.
    pub version: Version,
    /// Inheritance source: `@domain/owner/repo/…` for remote, a relative
    /// file stem for local, or empty.
    pub from: String,
    pub run: Command,
}

impl Head {
    /// Parse the head out of a document. `file` supplies `name` and `kind`.
    pub fn parse(file: &Path, content: &Value) -> Result<Head> {
        let (name, kind) = parse_filename(file)?;
        let file_name = file.display().to_string();

        let object = content.as_object().ok_or_else(|| Error::Shape {
            file: file_name.clone(),
            path: String::new(),
            message: "document must be a map".to_string(),
        })?;

        let from = match object.get("FROM") {
            None => String::new(),
            Some(Value::String(from)) => from.clone(),
            Some(_) => {
                return Err(Error::Shape {
                    file: file_name,
                    path: "FROM".to_string(),
                    message: "must be a string".to_string(),
                })
            }
        };

        let lang = semver_field(object, "LANG", &file_name)?;
        let version = semver_field(object, "VERSION", &file_name)?;
        let run = parse_run(object.get("RUN"), &file_name)?;

        Ok(Head {
            file: file.to_path_buf(),
            name,
            kind,
            lang,
            version,
            from,
            run,
        })
    }
}

/// `name.<ext>.<suffix>` with the suffix in [`SUFFIXES`] and the extension
/// in the kind table. Any other shape is fatal.
fn parse_filename(file: &Path) -> Result<(String, Kind)> {
    let fail = |message: String| Error::Shape {
        file: file.display().to_string(),
        path: String::new(),
        message,
    };
    let base = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| fail("filename is not valid UTF-8".to_string()))?;
    let parts: Vec<&str> = base.split('.').collect();
    if parts.len() < 3 || parts[..parts.len() - 2].iter().any(|p| p.is_empty()) {
        return Err(fail(format!(
            "filename must look like name.<ext>.yao, got: {}",
            base
        )));
    }
    let suffix = parts[parts.len() - 1];
    if !SUFFIXES.contains(&suffix) {
        return Err(fail(format!(
            "unknown suffix .{}, expected one of: {}",
            suffix,
            SUFFIXES.join(", ")
        )));
    }
    let ext = parts[parts.len() - 2];
    let kind = Kind::from_ext(ext).ok_or_else(|| {
        fail(format!("unknown DSL kind extension: .{}.{}", ext, suffix))
    })?;
    Ok((parts[..parts.len() - 2].join("."), kind))
}

fn semver_field(object: &Map<String, Value>, key: &str, file: &str) -> Result<Version> {
    let raw = match object.get(key) {
        None => return Ok(Version::new(1, 0, 0)),
        Some(Value::String(raw)) => raw,
        Some(_) => {
            return Err(Error::Shape {
                file: file.to_string(),
                path: key.to_string(),
                message: "must be a semver string".to_string(),
            })
        }
    };
    let stripped = raw.strip_prefix('v').unwrap_or(raw);
    Version::parse(stripped).map_err(|err| Error::Shape {
        file: file.to_string(),
        path: key.to_string(),
        message: format!("invalid semver {}: {}", raw, err),
    })
}

fn parse_run(value: Option<&Value>, file: &str) -> Result<Command> {
    let object = match value {
        None => return Ok(Command::default()),
        Some(Value::Object(object)) => object,
        Some(_) => {
            return Err(Error::Shape {
                file: file.to_string(),
                path: "RUN".to_string(),
                message: "must be a map of DELETE / MERGE / REPLACE / APPEND".to_string(),
            })
        }
    };

    let mut command = Command::default();
    for (key, value) in object {
        match key.as_str() {
            "DELETE" => command.delete = delete_list(value, file)?,
            "MERGE" => command.merge = entry_list(value, "MERGE", file, check_merge)?,
            "REPLACE" => command.replace = entry_list(value, "REPLACE", file, check_any)?,
            "APPEND" => command.append = entry_list(value, "APPEND", file, check_append)?,
            other => {
                return Err(Error::Shape {
                    file: file.to_string(),
                    path: format!("RUN.{}", other),
                    message: "unknown command, expected DELETE, MERGE, REPLACE, or APPEND"
                        .to_string(),
                })
            }
        }
    }
    Ok(command)
}

fn delete_list(value: &Value, file: &str) -> Result<Vec<String>> {
    let items = value.as_array().ok_or_else(|| Error::Shape {
        file: file.to_string(),
        path: "RUN.DELETE".to_string(),
        message: "must be a list of path strings".to_string(),
    })?;
    let mut paths = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let path = item.as_str().ok_or_else(|| Error::Shape {
            file: file.to_string(),
            path: format!("RUN.DELETE[{}]", index),
            message: "must be a path string".to_string(),
        })?;
        paths.push(path.to_string());
    }
    Ok(paths)
}

/// Parse a command list of `{path: value}` maps, validating each value
/// with `check`. Entries keep their file order.
fn entry_list(
    value: &Value,
    command: &str,
    file: &str,
    check: fn(&Value) -> Option<&'static str>,
) -> Result<Vec<(String, Value)>> {
    let items = value.as_array().ok_or_else(|| Error::Shape {
        file: file.to_string(),
        path: format!("RUN.{}", command),
        message: "must be a list of {path: value} maps".to_string(),
    })?;
    let mut entries = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let map = item.as_object().ok_or_else(|| Error::Shape {
            file: file.to_string(),
            path: format!("RUN.{}[{}]", command, index),
            message: "must be a {path: value} map".to_string(),
        })?;
        for (path, value) in map {
            if let Some(message) = check(value) {
                return Err(Error::Shape {
                    file: file.to_string(),
                    path: format!("RUN.{}[{}].{}", command, index, path),
                    message: message.to_string(),
                });
            }
            entries.push((path.clone(), value.clone()));
        }
    }
    Ok(entries)
}

fn is_new_ref(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.starts_with("$new."))
}

fn check_any(_value: &Value) -> Option<&'static str> {
    None
}

fn check_merge(value: &Value) -> Option<&'static str> {
    if value.is_object() || is_new_ref(value) {
        None
    } else {
        Some("must be a map or a $new reference")
    }
}

fn check_append(value: &Value) -> Option<&'static str> {
    if value.is_array() || is_new_ref(value) {
        None
    } else {
        Some("must be a list or a $new reference")
    }
}
