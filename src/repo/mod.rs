//! # Repo Client
//!
//! One-call abstractions over a Git host. The `RepoClient` trait defines the
//! capability set the workshop needs: read a file, list a directory,
//! enumerate tags and commits, resolve the latest release, and download a
//! repository archive. GitHub is the only implemented backend; every other
//! domain gets a client whose operations fail with an explicit error.
//!
//! The trait-based design mirrors the rest of the fetching layer: tests
//! inject mock clients to simulate hosts without touching the network.

pub mod github;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};

/// A cooperative cancellation token checked between download chunks.
///
/// Cancellation aborts the current step and unwinds; partial temp files are
/// left for the caller to clean up.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Read-only access to a Git host for a single repository.
pub trait RepoClient: Send + Sync {
    /// Fetch the raw contents of a file at a repo-relative path.
    fn content(&self, path: &str) -> Result<Vec<u8>>;

    /// List a directory, returning each child's full repo-relative path.
    fn dir(&self, path: &str) -> Result<Vec<String>>;

    /// Enumerate tag names, newest first, one page at a time.
    fn tags(&self, page: usize, per_page: usize) -> Result<Vec<String>>;

    /// Enumerate commit SHAs (12 characters), newest first.
    fn commits(&self, page: usize, per_page: usize) -> Result<Vec<String>>;

    /// The most recent tag name, falling back to the latest commit SHA for
    /// repositories without tags.
    fn latest(&self) -> Result<String>;

    /// Download the repository archive for a ref into a temp zip file,
    /// reporting accumulated bytes through `progress`.
    fn download(
        &self,
        rel: &str,
        cancel: Option<&CancelToken>,
        progress: &mut dyn FnMut(u64),
    ) -> Result<std::path::PathBuf>;
}

/// Create a client for a repository on the given host domain.
///
/// `github.com` gets the REST backend; any other domain gets a client that
/// fails every operation.
pub fn connect(domain: &str, owner: &str, repo: &str, cfg: &Config) -> Result<Box<dyn RepoClient>> {
    match domain {
        "github.com" => Ok(Box::new(github::GithubClient::new(
            owner,
            repo,
            cfg.token(domain)?,
        ))),
        _ => Ok(Box::new(Unsupported {
            domain: domain.to_string(),
        })),
    }
}

/// Extract a repository archive into `dest`.
///
/// GitHub zipballs wrap every entry in a single `<owner>-<repo>-<sha>/`
/// directory; when all entries share one top-level directory it is stripped
/// so the repository contents land directly under `dest`. A failed
/// extraction removes any partial destination before returning the error.
pub fn unzip(src: &Path, dest: &Path) -> Result<()> {
    match extract(src, dest) {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = fs::remove_dir_all(dest);
            Err(err)
        }
    }
}

fn extract(src: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(src)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let prefix = common_prefix(&mut archive)?;

    fs::create_dir_all(dest)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = match entry.enclosed_name() {
            Some(name) => name.to_path_buf(),
            // entries escaping the destination are skipped
            None => continue,
        };
        let rel = match &prefix {
            Some(prefix) => match name.strip_prefix(prefix) {
                Ok(rel) if rel.as_os_str().is_empty() => continue,
                Ok(rel) => rel.to_path_buf(),
                Err(_) => name,
            },
            None => name,
        };
        let out = dest.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut target = fs::File::create(&out)?;
            std::io::copy(&mut entry, &mut target)?;
        }
    }
    Ok(())
}

/// The first path component shared by every entry, when the whole archive
/// is nested under a single directory.
fn common_prefix<R: std::io::Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<Option<String>> {
    let mut prefix: Option<String> = None;
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let name = entry.name();
        if !name.contains('/') {
            return Ok(None);
        }
        let first = name.split('/').next().unwrap_or("").to_string();
        match &prefix {
            None => prefix = Some(first),
            Some(existing) if *existing == first => {}
            Some(_) => return Ok(None),
        }
    }
    Ok(prefix)
}

struct Unsupported {
    domain: String,
}

impl Unsupported {
    fn err<T>(&self) -> Result<T> {
        Err(Error::NotImplemented {
            feature: format!("self-hosted git is not supported yet: {}", self.domain),
        })
    }
}

impl RepoClient for Unsupported {
    fn content(&self, _path: &str) -> Result<Vec<u8>> {
        self.err()
    }

    fn dir(&self, _path: &str) -> Result<Vec<String>> {
        self.err()
    }

    fn tags(&self, _page: usize, _per_page: usize) -> Result<Vec<String>> {
        self.err()
    }

    fn commits(&self, _page: usize, _per_page: usize) -> Result<Vec<String>> {
        self.err()
    }

    fn latest(&self) -> Result<String> {
        self.err()
    }

    fn download(
        &self,
        _rel: &str,
        _cancel: Option<&CancelToken>,
        _progress: &mut dyn FnMut(u64),
    ) -> Result<std::path::PathBuf> {
        self.err()
    }
}
