//! # Compiler
//!
//! Turns a freshly parsed DSL file into a self-contained compiled tree.
//!
//! Given a loaded DSL file, the compiler resolves `FROM` (local sibling or
//! remote package, possibly triggering a workshop fetch), recursively
//! compiles the parent, merges the parent's compiled tree with the child
//! through the RUN pipeline (REPLACE, MERGE, APPEND, deep merge, DELETE),
//! expands `COPY` template pointers anywhere in the tree, and substitutes
//! `$env.NAME` string values. Every file visited lands in the trace, which
//! is bounded at 32 entries to stop runaway inheritance chains.
//!
//! Template compilation is memoized process-wide, keyed by absolute path:
//! templates are considered immutable for the duration of the process. A
//! second multimap records which files reference each template, for
//! tooling.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use serde_json::Value;

use crate::defaults::MAX_LAYERS;
use crate::dsl::{self, head::Head, path, Dsl, Kind, SUFFIXES};
use crate::error::{Error, Result};
use crate::package::{DownloadStatus, Package};
use crate::types;
use crate::workshop::Workshop;

/// Compiles DSL files against a workshop.
pub struct Compiler<'w> {
    workshop: &'w mut Workshop,
    depth: usize,
}

impl<'w> Compiler<'w> {
    pub fn new(workshop: &'w mut Workshop) -> Compiler<'w> {
        Compiler { workshop, depth: 0 }
    }

    /// Compile a DSL file in place, setting `compiled` and `trace`.
    ///
    /// The trace is retained on the DSL record even when compilation
    /// fails. No partial compiled tree is ever produced.
    pub fn compile(&mut self, dsl: &mut Dsl) -> Result<()> {
        if self.depth > MAX_LAYERS {
            return Err(Error::TooManyLayers { max: MAX_LAYERS });
        }
        let mut trace = vec![dsl.head.file.clone()];
        let result = self.compile_inner(dsl, &mut trace);
        dsl.trace = trace;
        let mut tree = result?;

        // the compiled tree retains no syntactic commands
        if let Value::Object(map) = &mut tree {
            map.remove("FROM");
            map.remove("RUN");
        }

        if let Some(handler) = types::resolve(dsl.head.kind) {
            handler.compile(self.workshop.root(), &dsl.head.file, &tree)?;
        }
        dsl.compiled = Some(tree);
        Ok(())
    }

    fn compile_inner(&mut self, dsl: &Dsl, trace: &mut Vec<PathBuf>) -> Result<Value> {
        if let Some(handler) = types::resolve(dsl.head.kind) {
            handler.check(&dsl.content)?;
        }
        let mut tree = match self.compile_from(dsl, trace)? {
            Some(parent) => apply_pipeline(parent, &dsl.content, &dsl.head)?,
            None => dsl.content.clone(),
        };
        self.expand_copy(&mut tree, &dsl.head.file, trace)?;
        substitute_env(&mut tree);
        Ok(tree)
    }

    /// Resolve and compile the `FROM` parent, returning its compiled tree
    /// as the merge seed. Returns `None` when the file inherits nothing.
    fn compile_from(&mut self, dsl: &Dsl, trace: &mut Vec<PathBuf>) -> Result<Option<Value>> {
        let from = dsl.head.from.trim();
        if from.is_empty() {
            return Ok(None);
        }

        if let Some(remote) = from.strip_prefix('@') {
            let segments: Vec<&str> = remote.split('/').filter(|s| !s.is_empty()).collect();
            if segments.len() < 4 {
                return Err(Error::Resolve {
                    message: format!(
                        "remote FROM requires @domain/owner/repo/file, got: {}",
                        from
                    ),
                });
            }
            let addr = segments[..3].join("/");
            let rest = segments[3..].join("/");

            let mut progress = |_: u64, _: &Package, _: DownloadStatus| {};
            let pkg = self.workshop.ensure(&addr, &mut progress)?;
            let parent_file = locate(&pkg.local_path, &rest, dsl.head.kind)?;

            let mut sub = Workshop::open_with(
                &pkg.local_path,
                self.workshop.storage(),
                self.workshop.cache().map(Path::to_path_buf),
                self.workshop.config().clone(),
            )?;
            let mut parent = dsl::open(&parent_file)?;
            Compiler {
                workshop: &mut sub,
                depth: self.depth + 1,
            }
            .compile(&mut parent)?;
            extend_trace(trace, parent.trace)?;
            return Ok(parent.compiled);
        }

        // a local FROM names a sibling DSL file of the same kind
        let dir = dsl.head.file.parent().unwrap_or_else(|| Path::new("."));
        let parent_file = locate(dir, from, dsl.head.kind)?;
        let mut parent = dsl::open(&parent_file)?;
        self.depth += 1;
        let compiled = self.compile(&mut parent);
        self.depth -= 1;
        compiled?;
        extend_trace(trace, parent.trace)?;
        Ok(parent.compiled)
    }

    /// Walk the tree expanding `COPY` template pointers. At any map node
    /// holding `COPY: "dir/template.var.path"`, the referenced template
    /// value becomes the new base and the node's other keys overlay it.
    fn expand_copy(
        &mut self,
        node: &mut Value,
        file: &Path,
        trace: &mut Vec<PathBuf>,
    ) -> Result<()> {
        match node {
            Value::Object(_) => {
                let copy = match node {
                    Value::Object(map) => {
                        map.get("COPY").and_then(Value::as_str).map(str::to_string)
                    }
                    _ => None,
                };
                if let Some(name) = copy {
                    let merged = self.expand_one(&name, &*node, file, trace)?;
                    *node = merged;
                }
                if let Value::Object(map) = node {
                    for value in map.values_mut() {
                        self.expand_copy(value, file, trace)?;
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.expand_copy(item, file, trace)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn expand_one(
        &mut self,
        name: &str,
        node: &Value,
        file: &Path,
        trace: &mut Vec<PathBuf>,
    ) -> Result<Value> {
        let (template_path, var_path) = parse_copy(name, self.workshop.storage())?;
        let (compiled, template_trace) = self.template(name, &template_path)?;
        extend_trace(trace, template_trace)?;

        let base = path::get(&compiled, &var_path).ok_or_else(|| Error::Template {
            name: name.to_string(),
            message: format!(
                "{} has no value at {}",
                template_path.display(),
                var_path
            ),
        })?;
        let mut merged = base
            .as_object()
            .ok_or_else(|| Error::Template {
                name: name.to_string(),
                message: format!("{} at {} is not a map", template_path.display(), var_path),
            })?
            .clone();

        if let Value::Object(map) = node {
            for (key, value) in map {
                if key != "COPY" {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }

        record_reference(&template_path, file);
        Ok(Value::Object(merged))
    }

    /// Compile a template with process-wide memoization: write-once per
    /// absolute path, double-checked on read.
    fn template(&mut self, name: &str, template_path: &Path) -> Result<(Value, Vec<PathBuf>)> {
        if let Some(entry) = lock_recover(template_cache()).get(template_path).cloned() {
            return Ok(entry);
        }
        if !template_path.is_file() {
            return Err(Error::Template {
                name: name.to_string(),
                message: format!("template not found: {}", template_path.display()),
            });
        }
        let mut template = dsl::open(template_path)?;
        Compiler {
            workshop: &mut *self.workshop,
            depth: self.depth + 1,
        }
        .compile(&mut template)?;
        let compiled = template.compiled.unwrap_or(Value::Null);
        let entry = (compiled, template.trace);

        let mut cache = lock_recover(template_cache());
        let entry = cache
            .entry(template_path.to_path_buf())
            .or_insert(entry)
            .clone();
        Ok(entry)
    }
}

/// Apply the merge pipeline: the parent's compiled tree is the seed, the
/// child's raw content supplies `$new.<path>` values and the deep-merge
/// source. Order: REPLACE, MERGE, APPEND, deep merge, DELETE.
pub fn apply_pipeline(parent: Value, new: &Value, head: &Head) -> Result<Value> {
    let file = head.file.display().to_string();
    let mut content = parent;

    for (target, value) in &head.run.replace {
        let value = resolve_new(value, new).map_err(|err| err.at_file(&file))?;
        path::set(&mut content, target, value).map_err(|err| err.at_file(&file))?;
    }

    for (target, value) in &head.run.merge {
        let value = resolve_new(value, new).map_err(|err| err.at_file(&file))?;
        let source = value
            .as_object()
            .ok_or_else(|| Error::shape(target.clone(), "MERGE value must be a map").at_file(&file))?;
        match path::get_mut(&mut content, target) {
            Some(Value::Object(existing)) => {
                for (key, value) in source {
                    existing.insert(key.clone(), value.clone());
                }
            }
            Some(_) => {
                return Err(
                    Error::shape(target.clone(), "MERGE target is not a map").at_file(&file)
                )
            }
            None => {
                path::set(&mut content, target, Value::Object(source.clone()))
                    .map_err(|err| err.at_file(&file))?;
            }
        }
    }

    for (target, value) in &head.run.append {
        let value = resolve_new(value, new).map_err(|err| err.at_file(&file))?;
        let items = value.as_array().ok_or_else(|| {
            Error::shape(target.clone(), "APPEND value must be a list").at_file(&file)
        })?;
        match path::get_mut(&mut content, target) {
            Some(Value::Array(existing)) => existing.extend(items.iter().cloned()),
            Some(_) => {
                return Err(
                    Error::shape(target.clone(), "APPEND target is not a list").at_file(&file)
                )
            }
            None => {
                path::set(&mut content, target, Value::Array(items.clone()))
                    .map_err(|err| err.at_file(&file))?;
            }
        }
    }

    deep_merge(&mut content, new);

    for target in &head.run.delete {
        path::delete(&mut content, target).map_err(|err| err.at_file(&file))?;
    }

    Ok(content)
}

/// Recursively merge `source` into `target`: map + map recurse, list + list
/// concatenate (source items after existing), anything else overwrites.
/// The keys `FROM` and `RUN` are preserved verbatim at every level.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                if key == "FROM" || key == "RUN" {
                    continue;
                }
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => {
            target.extend(source.iter().cloned());
        }
        (target, source) => *target = source.clone(),
    }
}

/// Replace every string value of the form `$env.NAME` with the named
/// environment variable, or the empty string when unset.
pub fn substitute_env(node: &mut Value) {
    match node {
        Value::Object(map) => {
            for value in map.values_mut() {
                substitute_env(value);
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_env(item);
            }
        }
        Value::String(s) => {
            if let Some(name) = s.strip_prefix("$env.") {
                *s = std::env::var(name).unwrap_or_default();
            }
        }
        _ => {}
    }
}

/// A `$new.<path>` string resolves through a dotted lookup on the child's
/// raw content; anything else passes through.
fn resolve_new(value: &Value, new: &Value) -> Result<Value> {
    if let Value::String(s) = value {
        if let Some(target) = s.strip_prefix("$new.") {
            return path::get(new, target).cloned().ok_or_else(|| {
                Error::shape(target, "no such value in the child content")
            });
        }
    }
    Ok(value.clone())
}

/// Find `<dir>/<stem>.<ext>.<suffix>` for the first suffix that exists.
fn locate(dir: &Path, stem: &str, kind: Kind) -> Result<PathBuf> {
    for suffix in SUFFIXES {
        let candidate = dir.join(format!("{}.{}.{}", stem, kind.ext(), suffix));
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(Error::Resolve {
        message: format!(
            "cannot find {}.{}.yao under {}",
            stem,
            kind.ext(),
            dir.display()
        ),
    })
}

/// `dir1/dir2/template.var.sub.path` names
/// `<storage>/templates/dir1/dir2/template.tpl.yao` and the dotted
/// variable path inside its compiled tree.
fn parse_copy(name: &str, storage: &Path) -> Result<(PathBuf, String)> {
    let invalid = || Error::Template {
        name: name.to_string(),
        message: "COPY must look like dir/template.variable.path".to_string(),
    };
    let mut dirs: Vec<&str> = name.split('/').filter(|s| !s.is_empty()).collect();
    let last = dirs.pop().ok_or_else(invalid)?;
    let mut tokens = last.split('.');
    let stem = tokens.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let var: Vec<&str> = tokens.collect();
    if var.is_empty() || var.iter().any(|s| s.is_empty()) {
        return Err(invalid());
    }

    let mut path = storage.join("templates");
    for dir in dirs {
        path = path.join(dir);
    }
    path = path.join(format!("{}.tpl.yao", stem));
    Ok((path, var.join(".")))
}

fn extend_trace(trace: &mut Vec<PathBuf>, entries: Vec<PathBuf>) -> Result<()> {
    trace.extend(entries);
    if trace.len() > MAX_LAYERS {
        return Err(Error::TooManyLayers { max: MAX_LAYERS });
    }
    Ok(())
}

/// Which files reference each template, for diagnostics.
pub fn template_references() -> HashMap<PathBuf, Vec<PathBuf>> {
    lock_recover(template_refs()).clone()
}

fn record_reference(template: &Path, file: &Path) {
    let mut refs = lock_recover(template_refs());
    let entry = refs.entry(template.to_path_buf()).or_default();
    if !entry.iter().any(|f| f == file) {
        entry.push(file.to_path_buf());
    }
}

fn template_cache() -> &'static Mutex<HashMap<PathBuf, (Value, Vec<PathBuf>)>> {
    static CACHE: OnceLock<Mutex<HashMap<PathBuf, (Value, Vec<PathBuf>)>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn template_refs() -> &'static Mutex<HashMap<PathBuf, Vec<PathBuf>>> {
    static REFS: OnceLock<Mutex<HashMap<PathBuf, Vec<PathBuf>>>> = OnceLock::new();
    REFS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn workshop(dir: &TempDir) -> Workshop {
        let app = dir.path().join("app");
        fs::create_dir_all(&app).unwrap();
        Workshop::open_with(&app, &dir.path().join("storage"), None, Config::default()).unwrap()
    }

    fn write_dsl(dir: &TempDir, name: &str, content: &Value) -> PathBuf {
        let file = dir.path().join("app").join(name);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, serde_json::to_string_pretty(content).unwrap()).unwrap();
        file
    }

    fn compile(ws: &mut Workshop, file: &Path) -> Result<Dsl> {
        let mut dsl = dsl::open(file)?;
        Compiler::new(ws).compile(&mut dsl)?;
        Ok(dsl)
    }

    fn head_for(run: Value) -> Head {
        Head::parse(
            Path::new("/app/user.mod.yao"),
            &json!({"RUN": run}),
        )
        .unwrap()
    }

    #[test]
    fn test_pipeline_replace_append_delete() {
        let parent = json!({
            "table": "users",
            "columns": [{"name": "id"}, {"name": "name"}, {"name": "tmp"}]
        });
        let new = json!({
            "table": "users_v2",
            "extra": [{"name": "created_at"}]
        });
        let head = head_for(json!({
            "REPLACE": [{"table": "$new.table"}],
            "APPEND": [{"columns": "$new.extra"}],
            "DELETE": ["columns[2]"]
        }));

        let result = apply_pipeline(parent, &new, &head).unwrap();
        assert_eq!(result["table"], json!("users_v2"));
        assert_eq!(
            result["columns"],
            json!([{"name": "id"}, {"name": "name"}, {"name": "created_at"}])
        );
    }

    #[test]
    fn test_pipeline_merge_shallow() {
        let parent = json!({"option": {"timestamps": true, "soft_deletes": false}});
        let new = json!({});
        let head = head_for(json!({
            "MERGE": [{"option": {"soft_deletes": true, "permission": "admin"}}]
        }));

        let result = apply_pipeline(parent, &new, &head).unwrap();
        assert_eq!(
            result["option"],
            json!({"timestamps": true, "soft_deletes": true, "permission": "admin"})
        );
    }

    #[test]
    fn test_pipeline_merge_onto_missing_path_creates_map() {
        let head = head_for(json!({"MERGE": [{"option": {"timestamps": true}}]}));
        let result = apply_pipeline(json!({}), &json!({}), &head).unwrap();
        assert_eq!(result["option"], json!({"timestamps": true}));
    }

    #[test]
    fn test_pipeline_merge_onto_scalar_is_fatal() {
        let head = head_for(json!({"MERGE": [{"table": {"a": 1}}]}));
        let err = apply_pipeline(json!({"table": "users"}), &json!({}), &head).unwrap_err();
        let display = format!("{}", err);
        assert!(display.contains("user.mod.yao"));
        assert!(display.contains("MERGE target is not a map"));
    }

    #[test]
    fn test_pipeline_append_creates_missing_list() {
        let head = head_for(json!({"APPEND": [{"indexes": [{"name": "idx"}]}]}));
        let result = apply_pipeline(json!({}), &json!({}), &head).unwrap();
        assert_eq!(result["indexes"], json!([{"name": "idx"}]));
    }

    #[test]
    fn test_pipeline_append_onto_scalar_is_fatal() {
        let head = head_for(json!({"APPEND": [{"table": ["x"]}]}));
        let err = apply_pipeline(json!({"table": "users"}), &json!({}), &head).unwrap_err();
        assert!(format!("{}", err).contains("APPEND target is not a list"));
    }

    #[test]
    fn test_pipeline_replace_missing_array_index_is_fatal() {
        let head = head_for(json!({"REPLACE": [{"columns[5]": "x"}]}));
        let err =
            apply_pipeline(json!({"columns": ["a"]}), &json!({}), &head).unwrap_err();
        assert!(format!("{}", err).contains("out of range"));
    }

    #[test]
    fn test_pipeline_unresolved_new_reference_is_fatal() {
        let head = head_for(json!({"REPLACE": [{"table": "$new.missing"}]}));
        let err = apply_pipeline(json!({}), &json!({}), &head).unwrap_err();
        assert!(format!("{}", err).contains("missing"));
    }

    #[test]
    fn test_pipeline_new_reference_matches_dotted_lookup() {
        let new = json!({"meta": {"names": ["first", "second"]}});
        let head = head_for(json!({"REPLACE": [{"title": "$new.meta.names[1]"}]}));
        let result = apply_pipeline(json!({}), &new, &head).unwrap();
        assert_eq!(result["title"], json!("second"));
    }

    #[test]
    fn test_deep_merge_preserves_from_and_run() {
        let mut target = json!({"FROM": "@x/y/z/a", "settings": {"a": 1}});
        let source = json!({"FROM": "@x/y/z/b", "RUN": {"DELETE": []}, "settings": {"b": 2}});

        deep_merge(&mut target, &source);

        assert_eq!(target["settings"], json!({"a": 1, "b": 2}));
        assert_eq!(target["FROM"], json!("@x/y/z/a"));
        assert!(target.get("RUN").is_none());
    }

    #[test]
    fn test_deep_merge_lists_concatenate_child_after_parent() {
        let mut target = json!({"columns": [1, 2]});
        deep_merge(&mut target, &json!({"columns": [3]}));
        assert_eq!(target["columns"], json!([1, 2, 3]));
    }

    #[test]
    fn test_deep_merge_scalar_overwrites() {
        let mut target = json!({"a": {"deep": true}, "b": 1});
        deep_merge(&mut target, &json!({"a": "flat", "b": 2}));
        assert_eq!(target, json!({"a": "flat", "b": 2}));
    }

    #[test]
    fn test_compile_without_from_is_deep_copy_minus_commands() {
        let dir = TempDir::new().unwrap();
        let mut ws = workshop(&dir);
        let file = write_dsl(
            &dir,
            "user.mod.yao",
            &json!({"RUN": {"DELETE": ["x"]}, "table": "users"}),
        );

        let dsl = compile(&mut ws, &file).unwrap();
        let compiled = dsl.compiled.unwrap();
        assert_eq!(compiled["table"], json!("users"));
        assert!(compiled.get("RUN").is_none());
        assert!(compiled.get("FROM").is_none());
        assert_eq!(dsl.trace, vec![file]);
    }

    #[test]
    fn test_compile_local_from_chain() {
        let dir = TempDir::new().unwrap();
        let mut ws = workshop(&dir);
        let base = write_dsl(
            &dir,
            "base.mod.yao",
            &json!({
                "table": "users",
                "columns": [{"name": "id"}, {"name": "name"}, {"name": "tmp"}]
            }),
        );
        let child = write_dsl(
            &dir,
            "user.mod.yao",
            &json!({
                "FROM": "base",
                "RUN": {
                    "REPLACE": [{"table": "$new.table"}],
                    "APPEND": [{"columns": "$new.extra"}],
                    "DELETE": ["columns[2]"]
                },
                "table": "users_v2",
                "extra": [{"name": "created_at"}]
            }),
        );

        let dsl = compile(&mut ws, &child).unwrap();
        let compiled = dsl.compiled.unwrap();
        assert_eq!(compiled["table"], json!("users_v2"));
        assert_eq!(
            compiled["columns"],
            json!([{"name": "id"}, {"name": "name"}, {"name": "created_at"}])
        );
        assert!(compiled.get("FROM").is_none());
        assert!(compiled.get("RUN").is_none());
        assert_eq!(dsl.trace, vec![child, base]);
    }

    #[test]
    fn test_compile_missing_local_parent_is_resolve_error() {
        let dir = TempDir::new().unwrap();
        let mut ws = workshop(&dir);
        let file = write_dsl(&dir, "user.mod.yao", &json!({"FROM": "absent"}));

        let err = compile(&mut ws, &file).unwrap_err();
        assert!(format!("{}", err).contains("absent.mod.yao"));
    }

    #[test]
    fn test_compile_remote_from_requires_four_segments() {
        let dir = TempDir::new().unwrap();
        let mut ws = workshop(&dir);
        let file = write_dsl(
            &dir,
            "user.mod.yao",
            &json!({"FROM": "@github.com/yaoapp/demo"}),
        );

        let err = compile(&mut ws, &file).unwrap_err();
        assert!(format!("{}", err).contains("remote FROM"));
    }

    fn write_template(dir: &TempDir, name: &str, content: &Value) -> PathBuf {
        let file = dir.path().join("storage/templates").join(name);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, serde_json::to_string_pretty(content).unwrap()).unwrap();
        file
    }

    #[test]
    fn test_copy_expansion_with_overrides() {
        let dir = TempDir::new().unwrap();
        let mut ws = workshop(&dir);
        let template = write_template(
            &dir,
            "user.tpl.yao",
            &json!({"user": {"name": "phone", "validations": [{"message": "old"}]}}),
        );
        let file = write_dsl(
            &dir,
            "form.mod.yao",
            &json!({
                "fields": {
                    "phone": {"COPY": "user.user", "validations": [{"message": "new"}]}
                }
            }),
        );

        let dsl = compile(&mut ws, &file).unwrap();
        let compiled = dsl.compiled.unwrap();
        assert_eq!(
            compiled["fields"]["phone"],
            json!({"name": "phone", "validations": [{"message": "new"}]})
        );
        assert!(dsl.trace.contains(&template));
        let refs = template_references();
        assert!(refs.get(&template).is_some_and(|files| files.contains(&file)));
    }

    #[test]
    fn test_copy_expands_inside_arrays() {
        let dir = TempDir::new().unwrap();
        let mut ws = workshop(&dir);
        write_template(
            &dir,
            "col.tpl.yao",
            &json!({"column": {"type": "string", "length": 80}}),
        );
        let file = write_dsl(
            &dir,
            "list.mod.yao",
            &json!({"columns": [{"COPY": "col.column", "name": "email"}]}),
        );

        let compiled = compile(&mut ws, &file).unwrap().compiled.unwrap();
        assert_eq!(
            compiled["columns"][0],
            json!({"type": "string", "length": 80, "name": "email"})
        );
    }

    #[test]
    fn test_copy_unknown_template_is_template_error() {
        let dir = TempDir::new().unwrap();
        let mut ws = workshop(&dir);
        let file = write_dsl(
            &dir,
            "broken.mod.yao",
            &json!({"field": {"COPY": "nowhere.user"}}),
        );

        let err = compile(&mut ws, &file).unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
        assert!(format!("{}", err).contains("template not found"));
    }

    #[test]
    fn test_copy_non_map_target_is_template_error() {
        let dir = TempDir::new().unwrap();
        let mut ws = workshop(&dir);
        write_template(&dir, "scalar.tpl.yao", &json!({"value": 42}));
        let file = write_dsl(
            &dir,
            "bad.mod.yao",
            &json!({"field": {"COPY": "scalar.value"}}),
        );

        let err = compile(&mut ws, &file).unwrap_err();
        assert!(format!("{}", err).contains("is not a map"));
    }

    #[test]
    fn test_copy_without_variable_path_is_template_error() {
        let dir = TempDir::new().unwrap();
        let mut ws = workshop(&dir);
        let file = write_dsl(&dir, "bad.mod.yao", &json!({"field": {"COPY": "user"}}));

        let err = compile(&mut ws, &file).unwrap_err();
        assert!(format!("{}", err).contains("COPY must look like"));
    }

    #[test]
    fn test_template_compiled_once_per_process() {
        let dir = TempDir::new().unwrap();
        let mut ws = workshop(&dir);
        let template = write_template(&dir, "memo.tpl.yao", &json!({"v": {"n": 1}}));
        let first = write_dsl(&dir, "a.mod.yao", &json!({"field": {"COPY": "memo.v"}}));
        let second = write_dsl(&dir, "b.mod.yao", &json!({"field": {"COPY": "memo.v"}}));

        let compiled = compile(&mut ws, &first).unwrap().compiled.unwrap();
        assert_eq!(compiled["field"]["n"], json!(1));

        // the template is immutable for the process: edits are not observed
        fs::write(&template, serde_json::to_string(&json!({"v": {"n": 2}})).unwrap()).unwrap();
        let compiled = compile(&mut ws, &second).unwrap().compiled.unwrap();
        assert_eq!(compiled["field"]["n"], json!(1));
    }

    #[test]
    #[serial_test::serial]
    fn test_env_substitution() {
        let dir = TempDir::new().unwrap();
        let mut ws = workshop(&dir);
        let file = write_dsl(
            &dir,
            "conn.mysql.yao",
            &json!({"table": {"name": "$env.MY_TABLE"}, "hosts": [{"db": "$env.MY_TABLE"}]}),
        );

        std::env::set_var("MY_TABLE", "test_env");
        let compiled = compile(&mut ws, &file).unwrap().compiled.unwrap();
        assert_eq!(compiled["table"]["name"], json!("test_env"));
        assert_eq!(compiled["hosts"][0]["db"], json!("test_env"));

        std::env::remove_var("MY_TABLE");
        let compiled = compile(&mut ws, &file).unwrap().compiled.unwrap();
        assert_eq!(compiled["table"]["name"], json!(""));
    }

    #[test]
    fn test_parse_copy_shapes() {
        let storage = Path::new("/srv/workshop");
        let (path, var) = parse_copy("user.user", storage).unwrap();
        assert_eq!(path, storage.join("templates/user.tpl.yao"));
        assert_eq!(var, "user");

        let (path, var) = parse_copy("forms/admin/user.fields.phone", storage).unwrap();
        assert_eq!(path, storage.join("templates/forms/admin/user.tpl.yao"));
        assert_eq!(var, "fields.phone");

        assert!(parse_copy("user", storage).is_err());
        assert!(parse_copy("", storage).is_err());
        assert!(parse_copy("user.", storage).is_err());
    }
}
