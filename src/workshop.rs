//! # Workshop
//!
//! The dependency resolver and lockfile manager.
//!
//! A workshop is opened from an application directory containing a
//! `workshop.yao` lockfile. It materializes the require list and replace
//! overrides, recursively fetches transitive dependencies (marking indirect
//! ones), deduplicates by `addr@rel`, and serializes back to disk
//! deterministically. Mutating operations are guarded by an on-disk lock
//! file `workshop.yao.lock`: a second concurrent process must fail fast
//! rather than block; staleness detection is deliberately not attempted.
//!
//! The lookup `mapping` (keyed redundantly by alias, unique, addr, and
//! name) is a projection rebuilt from the require list, never a source of
//! truth.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use json_comments::StripComments;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::defaults;
use crate::error::{Error, Result};
use crate::package::{self, DownloadOptions, Package, Progress};
use crate::repo;

/// The project-local index of external dependencies.
#[derive(Debug)]
pub struct Workshop {
    root: PathBuf,
    file: PathBuf,
    storage: PathBuf,
    cache: Option<PathBuf>,
    cfg: Config,
    require: Vec<Package>,
    replace: Vec<(String, String)>,
    mapping: HashMap<String, usize>,
}

impl Workshop {
    /// Open the workshop of an application directory, using the default
    /// storage and cache roots and the user's credentials configuration.
    pub fn open(root: &Path) -> Result<Workshop> {
        Self::open_with(
            root,
            &defaults::workshop_root(),
            Some(defaults::cache_root()),
            Config::load()?,
        )
    }

    /// Open a workshop with explicit storage/cache roots and credentials.
    /// A missing `workshop.yao` yields an empty workshop.
    pub fn open_with(
        root: &Path,
        storage: &Path,
        cache: Option<PathBuf>,
        cfg: Config,
    ) -> Result<Workshop> {
        let root = root.to_path_buf();
        let file = root.join(defaults::WORKSHOP_FILE);
        let mut ws = Workshop {
            root,
            file,
            storage: storage.to_path_buf(),
            cache,
            cfg,
            require: Vec::new(),
            replace: Vec::new(),
            mapping: HashMap::new(),
        };
        if ws.file.is_file() {
            ws.load()?;
        }
        Ok(ws)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn storage(&self) -> &Path {
        &self.storage
    }

    pub fn cache(&self) -> Option<&Path> {
        self.cache.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn require(&self) -> &[Package] {
        &self.require
    }

    pub fn replace(&self) -> &[(String, String)] {
        &self.replace
    }

    /// Look up a package by alias, unique, addr, or name.
    pub fn find(&self, key: &str) -> Option<&Package> {
        self.mapping.get(key).map(|&idx| &self.require[idx])
    }

    /// Create a package record for this workshop: parsed against the
    /// storage root, aliased, and marked by any matching replace override.
    pub fn package(&self, url: &str, alias: Option<&str>) -> Result<Package> {
        let mut pkg = Package::parse(url, &self.storage)?;
        if let Some(alias) = alias {
            pkg.alias = alias.to_string();
        }
        self.apply_replace(&mut pkg)?;
        Ok(pkg)
    }

    /// Require a package, downloading it and its transitive dependencies.
    ///
    /// A url without `@rel` is resolved to the host's latest tag (or
    /// commit) first. Getting an already-required package clears its
    /// `indirect` flag and optionally updates the alias.
    pub fn get(&mut self, url: &str, alias: Option<&str>, progress: Progress<'_>) -> Result<()> {
        let _guard = self.lock()?;
        let url = self.resolve_rel(url)?;
        let pkg = self.package(&url, alias)?;

        if let Some(&idx) = self.mapping.get(&pkg.unique()) {
            self.require[idx].indirect = false;
            if let Some(alias) = alias {
                if self
                    .require
                    .iter()
                    .enumerate()
                    .any(|(i, p)| i != idx && p.alias == alias)
                {
                    return Err(Error::Config {
                        message: format!("duplicate alias: {}", alias),
                        hint: None,
                    });
                }
                self.require[idx].alias = alias.to_string();
            }
            self.rebuild_mapping();
            return self.save();
        }

        self.add(pkg, &mut *progress, "", 1)?;
        self.save()
    }

    /// Drop a required package, then recompute the transitive set so that
    /// indirect dependencies no longer required by any direct one are
    /// dropped too.
    pub fn remove(&mut self, url: &str, progress: Progress<'_>) -> Result<()> {
        let _guard = self.lock()?;
        let key = if url.contains('@') {
            Package::parse(url, &self.storage)?.unique()
        } else {
            let (domain, owner, repo, _) = package::split_addr(url)?;
            format!("{}/{}/{}", domain, owner, repo)
        };
        let idx = match self.mapping.get(&key) {
            Some(&idx) => idx,
            None => {
                return Err(Error::Resolve {
                    message: format!("package not required: {}", url),
                })
            }
        };
        let unique = self.require[idx].unique();
        self.require.retain(|p| p.unique() != unique);
        self.rebuild_mapping();
        self.refresh_inner(progress)?;
        self.save()
    }

    /// Rebuild the require list from the direct packages, rediscovering
    /// indirect dependencies through recursion, and save. The lockfile is
    /// the canonical projection of the direct requires.
    pub fn refresh(&mut self, progress: Progress<'_>) -> Result<()> {
        let _guard = self.lock()?;
        self.refresh_inner(progress)?;
        self.save()
    }

    /// Look up a package, requiring and downloading it on demand. Used by
    /// the compiler to resolve remote `FROM` targets.
    pub fn ensure(&mut self, key: &str, progress: Progress<'_>) -> Result<Package> {
        if self.find(key).is_none() {
            self.get(key, None, &mut *progress)?;
        }
        let idx = *self.mapping.get(key).ok_or_else(|| Error::Resolve {
            message: format!("package not available: {}", key),
        })?;
        let options = DownloadOptions {
            cache: self.cache.clone(),
            cancel: None,
        };
        let cfg = self.cfg.clone();
        let pkg = &mut self.require[idx];
        if !pkg.replaced && !pkg.downloaded {
            pkg.download(&cfg, &options, progress)?;
        }
        Ok(pkg.clone())
    }

    /// Serialize the lockfile: `{ "require": […], "replace": {…} }` with
    /// direct packages first (insertion order), indirect after, replace
    /// keys sorted. Re-running with no changes produces byte-identical
    /// output.
    pub fn save(&self) -> Result<()> {
        let mut require = Vec::new();
        for pkg in self.require.iter().filter(|p| !p.indirect) {
            require.push(encode_entry(pkg));
        }
        for pkg in self.require.iter().filter(|p| p.indirect) {
            require.push(encode_entry(pkg));
        }

        let mut pairs = self.replace.clone();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let mut replace = Map::new();
        for (key, dir) in pairs {
            replace.insert(key, Value::String(dir));
        }

        let mut doc = Map::new();
        doc.insert("require".to_string(), Value::Array(require));
        doc.insert("replace".to_string(), Value::Object(replace));

        let mut out = serde_json::to_string_pretty(&Value::Object(doc))?;
        out.push('\n');
        fs::create_dir_all(&self.root)?;
        fs::write(&self.file, out)?;
        Ok(())
    }

    fn load(&mut self) -> Result<()> {
        let raw = fs::read_to_string(&self.file)?;
        let value: Value = serde_json::from_reader(StripComments::new(raw.as_bytes()))
            .map_err(|err| Error::Config {
                message: format!("{}: {}", self.file.display(), err),
                hint: None,
            })?;
        let object = value.as_object().ok_or_else(|| Error::Config {
            message: format!("{}: expected a JSON object", self.file.display()),
            hint: None,
        })?;

        self.replace = match object.get("replace") {
            None => Vec::new(),
            Some(Value::Object(map)) => {
                let mut pairs = Vec::new();
                for (key, value) in map {
                    let dir = value.as_str().ok_or_else(|| Error::Config {
                        message: format!("replace.{} must be a directory path string", key),
                        hint: None,
                    })?;
                    pairs.push((key.clone(), dir.to_string()));
                }
                pairs
            }
            Some(_) => {
                return Err(Error::Config {
                    message: "replace must be a map of addr to directory".to_string(),
                    hint: None,
                })
            }
        };

        let entries = match object.get("require") {
            None => &[] as &[Value],
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                return Err(Error::Config {
                    message: "require must be a list".to_string(),
                    hint: None,
                })
            }
        };

        let mut aliases = HashSet::new();
        for (index, entry) in entries.iter().enumerate() {
            let (url, alias, indirect) = decode_entry(entry, index)?;
            let mut pkg = Package::parse(&url, &self.storage)?;
            if let Some(alias) = alias {
                pkg.alias = alias;
            }
            pkg.indirect = indirect;
            self.apply_replace(&mut pkg)?;
            if !aliases.insert(pkg.alias.clone()) {
                return Err(Error::Config {
                    message: format!("duplicate alias: {}", pkg.alias),
                    hint: Some("give one of the requires an explicit alias".to_string()),
                });
            }
            self.require.push(pkg);
        }
        self.rebuild_mapping();
        Ok(())
    }

    /// Mark a package replaced when `addr[/subpath]` matches an override.
    /// The override directory must exist and contain `app.yao`.
    fn apply_replace(&self, pkg: &mut Package) -> Result<()> {
        let key = if pkg.subpath == "/" {
            pkg.addr.clone()
        } else {
            format!("{}{}", pkg.addr, pkg.subpath)
        };
        let dir = match self.replace.iter().find(|(k, _)| *k == key) {
            Some((_, dir)) => dir,
            None => return Ok(()),
        };
        let path = if Path::new(dir).is_absolute() {
            PathBuf::from(dir)
        } else {
            self.root.join(dir)
        };
        let path = fs::canonicalize(&path).map_err(|_| Error::Config {
            message: format!("replace path does not exist: {}", dir),
            hint: None,
        })?;
        if !path.join(defaults::APP_FILE).is_file() {
            return Err(Error::Config {
                message: format!("replace path is not an app: {}", dir),
                hint: Some(format!("the directory must contain {}", defaults::APP_FILE)),
            });
        }
        pkg.replaced = true;
        pkg.local_path = path;
        Ok(())
    }

    fn add(
        &mut self,
        mut pkg: Package,
        progress: Progress<'_>,
        parent: &str,
        depth: usize,
    ) -> Result<()> {
        if depth > defaults::MAX_LAYERS {
            return Err(Error::TooManyLayers {
                max: defaults::MAX_LAYERS,
            });
        }
        let options = DownloadOptions {
            cache: self.cache.clone(),
            cancel: None,
        };
        pkg.download(&self.cfg, &options, &mut *progress)?;

        if !parent.is_empty() {
            pkg.parents = vec![parent.to_string()];
        }
        // transitive aliases may collide with entries already present
        if self.require.iter().any(|p| p.alias == pkg.alias) {
            let fallback = if self.require.iter().any(|p| p.alias == pkg.name) {
                pkg.unique()
            } else {
                pkg.name.clone()
            };
            log::warn!("alias {} already taken, using {}", pkg.alias, fallback);
            pkg.alias = fallback;
        }

        let unique = pkg.unique();
        let deps = pkg.dependencies(&self.storage, self.cache.as_deref(), &self.cfg)?;
        self.require.push(pkg);
        self.rebuild_mapping();

        for mut dep in deps {
            if let Some(&idx) = self.mapping.get(&dep.unique()) {
                if !self.require[idx].parents.contains(&unique) {
                    self.require[idx].parents.push(unique.clone());
                }
                continue;
            }
            dep.indirect = true;
            self.apply_replace(&mut dep)?;
            self.add(dep, &mut *progress, &unique, depth + 1)?;
        }
        Ok(())
    }

    fn refresh_inner(&mut self, progress: Progress<'_>) -> Result<()> {
        let snapshot = std::mem::take(&mut self.require);
        self.mapping.clear();
        for prev in snapshot.into_iter().filter(|p| !p.indirect) {
            let alias = if prev.alias != prev.name {
                Some(prev.alias.clone())
            } else {
                None
            };
            let pkg = self.package(&prev.url, alias.as_deref())?;
            if let Some(&idx) = self.mapping.get(&pkg.unique()) {
                // already rediscovered through an earlier direct require
                self.require[idx].indirect = false;
                self.require[idx].alias = pkg.alias;
                self.rebuild_mapping();
                continue;
            }
            self.add(pkg, &mut *progress, "", 1)?;
        }
        Ok(())
    }

    fn resolve_rel(&self, url: &str) -> Result<String> {
        if url.contains('@') {
            return Ok(url.to_string());
        }
        let (domain, owner, repo, _) = package::split_addr(url)?;
        let client = repo::connect(&domain, &owner, &repo, &self.cfg)?;
        let rel = client.latest()?;
        log::info!("resolved {} to {}", url, rel);
        Ok(format!("{}@{}", url, rel))
    }

    fn rebuild_mapping(&mut self) {
        self.mapping.clear();
        for (idx, pkg) in self.require.iter().enumerate() {
            self.mapping.insert(pkg.alias.clone(), idx);
            self.mapping.insert(pkg.unique(), idx);
            self.mapping.insert(pkg.addr.clone(), idx);
            self.mapping.insert(pkg.name.clone(), idx);
        }
    }

    /// Acquire the on-disk lock. The lock is a presence-only file: a second
    /// writer must not block, it errors and instructs the user to remove
    /// the file by hand.
    fn lock(&self) -> Result<LockGuard> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(format!("{}.lock", defaults::WORKSHOP_FILE));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(LockGuard { path }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::Lock { path })
            }
            Err(err) => Err(err.into()),
        }
    }
}

struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn encode_entry(pkg: &Package) -> Value {
    if pkg.alias == pkg.name && !pkg.indirect {
        return Value::String(pkg.url.clone());
    }
    let mut entry = Map::new();
    entry.insert(pkg.alias.clone(), Value::String(pkg.url.clone()));
    if pkg.indirect {
        entry.insert("indirect".to_string(), Value::Bool(true));
    }
    Value::Object(entry)
}

/// Decode one require entry: a bare url string, an `{alias: url}` map
/// (optionally carrying `indirect`), or an explicit record with `repo`,
/// `alias`, and `indirect` keys.
fn decode_entry(entry: &Value, index: usize) -> Result<(String, Option<String>, bool)> {
    match entry {
        Value::String(url) => Ok((url.clone(), None, false)),
        Value::Object(map) => {
            let indirect = map
                .get("indirect")
                .map(|v| {
                    v.as_bool().ok_or_else(|| Error::Config {
                        message: format!("require[{}].indirect must be a boolean", index),
                        hint: None,
                    })
                })
                .transpose()?
                .unwrap_or(false);

            if let Some(repo) = map.get("repo") {
                let url = repo.as_str().ok_or_else(|| Error::Config {
                    message: format!("require[{}].repo must be a url string", index),
                    hint: None,
                })?;
                let alias = map
                    .get("alias")
                    .map(|v| {
                        v.as_str().map(str::to_string).ok_or_else(|| Error::Config {
                            message: format!("require[{}].alias must be a string", index),
                            hint: None,
                        })
                    })
                    .transpose()?;
                return Ok((url.to_string(), alias, indirect));
            }

            let mut named: Vec<(&String, &Value)> =
                map.iter().filter(|(k, _)| *k != "indirect").collect();
            if named.len() != 1 {
                return Err(Error::Config {
                    message: format!(
                        "require[{}] must name exactly one package, got {} keys",
                        index,
                        named.len()
                    ),
                    hint: None,
                });
            }
            let (alias, url) = named.pop().unwrap_or_else(|| unreachable!());
            let url = url.as_str().ok_or_else(|| Error::Config {
                message: format!("require[{}].{} must be a url string", index, alias),
                hint: None,
            })?;
            Ok((url.to_string(), Some(alias.clone()), indirect))
        }
        _ => Err(Error::Config {
            message: format!("require[{}] must be a string or a map", index),
            hint: None,
        }),
    }
}
