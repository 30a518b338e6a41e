//! # Package
//!
//! The identity and lifecycle record of one external dependency.
//!
//! A package is addressed as `domain/owner/repo[/subpath]@rel`, where `rel`
//! is a semver tag, a branch/tag name, or a commit SHA. The canonical
//! identity key is `unique` (`addr@rel`): two packages with an equal unique
//! are the same package. Each package knows its checkout location under the
//! workshop root, how to download itself (via the zip cache when present),
//! and how to enumerate its own sub-dependencies by reading its inner
//! `workshop.yao`.

use std::fs;
use std::path::{Path, PathBuf};

use semver::{BuildMetadata, Prerelease, Version};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::repo::{self, CancelToken};

/// Longest accepted version/ref token.
const MAX_REL_LEN: usize = 32;

/// Download phase reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Prepare,
    Downloading,
    Cached,
}

/// Options for a package download.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Zip cache root; archives are reused from and saved to
    /// `<cache>/<domain>/<owner>/<repo>/@<rel>.zip`.
    pub cache: Option<PathBuf>,
    /// Cooperative cancellation for the network phase.
    pub cancel: Option<CancelToken>,
}

/// Progress callback: accumulated bytes, the package, and the phase.
pub type Progress<'a> = &'a mut dyn FnMut(u64, &Package, DownloadStatus);

/// One external dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    /// Canonical url: `addr[subpath]@rel`.
    pub url: String,
    /// `domain/owner/repo`.
    pub addr: String,
    /// Human name: `addr` plus subpath when not `/`.
    pub name: String,
    /// Caller-assigned short name; defaults to `name`.
    pub alias: String,
    pub domain: String,
    pub owner: String,
    pub repo: String,
    /// Path inside the repository, `/` when the whole repo is the package.
    pub subpath: String,
    /// Parsed version; refs are encoded as `0.0.0-<ref>` pre-releases.
    pub version: Version,
    /// Git ref as given: a semver tag, branch/tag name, or commit SHA.
    pub rel: String,
    /// Checkout location: `<root>/<domain>/<owner>/<repo>@<rel>/<subpath>`.
    pub local_path: PathBuf,
    pub downloaded: bool,
    /// True when a workshop `replace` override points this package at a
    /// local directory; replaced packages never download.
    pub replaced: bool,
    /// True iff pulled in only by another require.
    pub indirect: bool,
    /// Unique ids of the packages that require this one.
    pub parents: Vec<String>,
}

impl Package {
    /// Parse `domain/owner/repo[/subpath]@rel` into a package record rooted
    /// under `root`.
    pub fn parse(url: &str, root: &Path) -> Result<Package> {
        let (addr_part, rel_part) = url.split_once('@').ok_or_else(|| Error::Resolve {
            message: format!("package url missing version: {}", url),
        })?;
        let (domain, owner, repo, subpath) = split_addr(addr_part)?;
        let (version, rel) = parse_version(rel_part)?;

        let addr = format!("{}/{}/{}", domain, owner, repo);
        let name = if subpath == "/" {
            addr.clone()
        } else {
            format!("{}{}", addr, subpath)
        };
        let local_path = root
            .join(&domain)
            .join(&owner)
            .join(format!("{}@{}", repo, rel))
            .join(subpath.trim_start_matches('/'));

        Ok(Package {
            url: format!("{}@{}", name, rel),
            addr,
            alias: name.clone(),
            name,
            domain,
            owner,
            repo,
            subpath,
            version,
            rel,
            local_path,
            downloaded: false,
            replaced: false,
            indirect: false,
            parents: Vec::new(),
        })
    }

    /// Canonical identity key: `addr@rel`.
    pub fn unique(&self) -> String {
        format!("{}@{}", self.addr, self.rel)
    }

    /// Download the package checkout, reusing the zip cache when possible.
    ///
    /// Phases reported through `progress`: `Prepare` once, `Downloading`
    /// per received chunk, `Cached` when the checkout came from the cache
    /// (or already existed). Flips `downloaded` on success. Replaced
    /// packages are a no-op.
    pub fn download(
        &mut self,
        cfg: &Config,
        options: &DownloadOptions,
        progress: Progress<'_>,
    ) -> Result<()> {
        if self.replaced {
            return Ok(());
        }
        progress(0, self, DownloadStatus::Prepare);

        if self.local_path.is_dir() {
            self.downloaded = true;
            progress(0, self, DownloadStatus::Cached);
            return Ok(());
        }

        let cache_zip = options.cache.as_ref().map(|cache| {
            cache
                .join(&self.domain)
                .join(&self.owner)
                .join(&self.repo)
                .join(format!("@{}.zip", self.rel))
        });

        if let Some(zip) = cache_zip.as_ref().filter(|zip| zip.is_file()) {
            repo::unzip(zip, &self.local_path)?;
            self.downloaded = true;
            let bytes = fs::metadata(zip).map(|m| m.len()).unwrap_or(0);
            progress(bytes, self, DownloadStatus::Cached);
            return Ok(());
        }

        let client = repo::connect(&self.domain, &self.owner, &self.repo, cfg)?;
        let tmp = {
            let this = &*self;
            client.download(&this.rel, options.cancel.as_ref(), &mut |bytes| {
                progress(bytes, this, DownloadStatus::Downloading)
            })?
        };

        if self.local_path.exists() {
            fs::remove_dir_all(&self.local_path)?;
        }
        repo::unzip(&tmp, &self.local_path)?;

        if let Some(zip) = cache_zip {
            if let Some(parent) = zip.parent() {
                fs::create_dir_all(parent)?;
            }
            // rename fails across filesystems, fall back to copy
            if fs::rename(&tmp, &zip).is_err() {
                fs::copy(&tmp, &zip)?;
                fs::remove_file(&tmp)?;
            }
        } else {
            fs::remove_file(&tmp)?;
        }

        self.downloaded = true;
        log::info!("downloaded {}", self.url);
        Ok(())
    }

    /// The package's own sub-dependencies, read from its inner
    /// `workshop.yao`. Empty when the package has none.
    pub fn dependencies(
        &self,
        storage: &Path,
        cache: Option<&Path>,
        cfg: &Config,
    ) -> Result<Vec<Package>> {
        let ws = crate::workshop::Workshop::open_with(
            &self.local_path,
            storage,
            cache.map(Path::to_path_buf),
            cfg.clone(),
        )?;
        Ok(ws.require().to_vec())
    }
}

/// Split `domain/owner/repo[/subpath…]` into its components. The address
/// requires at least three segments; `subpath` defaults to `/`.
pub fn split_addr(addr: &str) -> Result<(String, String, String, String)> {
    let segments: Vec<&str> = addr.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 3 {
        return Err(Error::Resolve {
            message: format!("package url requires domain/owner/repo, got: {}", addr),
        });
    }
    let subpath = if segments.len() > 3 {
        format!("/{}", segments[3..].join("/"))
    } else {
        "/".to_string()
    };
    Ok((
        segments[0].to_string(),
        segments[1].to_string(),
        segments[2].to_string(),
        subpath,
    ))
}

/// Interpret a version token.
///
/// A parseable semver (leading `v` tolerated) is kept as-is. Any other
/// token of at most 32 characters is a git ref (branch, tag, or commit
/// SHA), encoded as a `0.0.0-<ref>` pre-release with the raw ref kept in
/// `rel`. A token already in the encoded form canonicalises `rel` back to
/// the trailing ref. Longer unparseable tokens are fatal.
fn parse_version(raw: &str) -> Result<(Version, String)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::Resolve {
            message: "package version is empty".to_string(),
        });
    }
    let stripped = raw.strip_prefix('v').unwrap_or(raw);
    if let Ok(version) = Version::parse(stripped) {
        let encoded_ref = version.major == 0
            && version.minor == 0
            && version.patch == 0
            && !version.pre.is_empty()
            && stripped == format!("0.0.0-{}", version.pre);
        let rel = if encoded_ref {
            version.pre.to_string()
        } else {
            raw.to_string()
        };
        return Ok((version, rel));
    }
    if raw.len() > MAX_REL_LEN {
        return Err(Error::Resolve {
            message: format!("unparseable version or ref too long (max {}): {}", MAX_REL_LEN, raw),
        });
    }
    let version = Version {
        major: 0,
        minor: 0,
        patch: 0,
        pre: Prerelease::new(&prerelease_safe(raw))?,
        build: BuildMetadata::EMPTY,
    };
    Ok((version, raw.to_string()))
}

/// Make a ref usable as a semver pre-release identifier.
fn prerelease_safe(rel: &str) -> String {
    let mapped: String = rel
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let parts: Vec<String> = mapped
        .split('.')
        .filter(|s| !s.is_empty())
        .map(|part| {
            // numeric pre-release identifiers must not have leading zeros
            if part.len() > 1 && part.starts_with('0') && part.chars().all(|c| c.is_ascii_digit())
            {
                format!("r{}", part)
            } else {
                part.to_string()
            }
        })
        .collect();
    if parts.is_empty() {
        "ref".to_string()
    } else {
        parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root() -> PathBuf {
        PathBuf::from("/tmp/workshop-root")
    }

    #[test]
    fn test_parse_semver_package() {
        let pkg = Package::parse("github.com/yaoapp/workshop-tests-erp@1.0.0", &root()).unwrap();
        assert_eq!(pkg.domain, "github.com");
        assert_eq!(pkg.owner, "yaoapp");
        assert_eq!(pkg.repo, "workshop-tests-erp");
        assert_eq!(pkg.subpath, "/");
        assert_eq!(pkg.addr, "github.com/yaoapp/workshop-tests-erp");
        assert_eq!(pkg.name, "github.com/yaoapp/workshop-tests-erp");
        assert_eq!(pkg.alias, pkg.name);
        assert_eq!(pkg.rel, "1.0.0");
        assert_eq!(pkg.version, Version::parse("1.0.0").unwrap());
        assert_eq!(pkg.unique(), "github.com/yaoapp/workshop-tests-erp@1.0.0");
        assert_eq!(pkg.url, "github.com/yaoapp/workshop-tests-erp@1.0.0");
        assert_eq!(
            pkg.local_path,
            root().join("github.com/yaoapp/workshop-tests-erp@1.0.0")
        );
    }

    #[test]
    fn test_parse_subpath_package() {
        let pkg = Package::parse("github.com/yaoapp/demo/widgets/table@2.1.0", &root()).unwrap();
        assert_eq!(pkg.subpath, "/widgets/table");
        assert_eq!(pkg.addr, "github.com/yaoapp/demo");
        assert_eq!(pkg.name, "github.com/yaoapp/demo/widgets/table");
        assert_eq!(pkg.url, "github.com/yaoapp/demo/widgets/table@2.1.0");
        assert_eq!(
            pkg.local_path,
            root().join("github.com/yaoapp/demo@2.1.0/widgets/table")
        );
    }

    #[test]
    fn test_version_leading_v_normalises_equal() {
        let a = Package::parse("github.com/a/b@v1.2.3", &root()).unwrap();
        let b = Package::parse("github.com/a/b@1.2.3", &root()).unwrap();
        assert_eq!(a.version, b.version);
    }

    #[test]
    fn test_branch_ref_encoded_as_prerelease() {
        let pkg = Package::parse("github.com/a/b@main", &root()).unwrap();
        assert_eq!(pkg.rel, "main");
        assert_eq!(pkg.version, Version::parse("0.0.0-main").unwrap());
        assert_eq!(pkg.unique(), "github.com/a/b@main");
    }

    #[test]
    fn test_encoded_form_canonicalises_rel() {
        let pkg = Package::parse("github.com/a/b@0.0.0-develop", &root()).unwrap();
        assert_eq!(pkg.rel, "develop");
        assert_eq!(pkg.version, Version::parse("0.0.0-develop").unwrap());
    }

    #[test]
    fn test_commit_sha_refs() {
        // 7 and 32 characters pass, longer is rejected
        let pkg = Package::parse("github.com/a/b@abc1234", &root()).unwrap();
        assert_eq!(pkg.rel, "abc1234");

        let sha32 = "a".repeat(32);
        let pkg = Package::parse(&format!("github.com/a/b@{}", sha32), &root()).unwrap();
        assert_eq!(pkg.rel, sha32);

        let sha33 = "a".repeat(33);
        let err = Package::parse(&format!("github.com/a/b@{}", sha33), &root()).unwrap_err();
        assert!(format!("{}", err).contains("too long"));
    }

    #[test]
    fn test_too_few_segments_rejected() {
        let err = Package::parse("github.com/yaoapp@1.0.0", &root()).unwrap_err();
        assert!(format!("{}", err).contains("domain/owner/repo"));
    }

    #[test]
    fn test_missing_version_rejected() {
        let err = Package::parse("github.com/yaoapp/demo", &root()).unwrap_err();
        assert!(format!("{}", err).contains("missing version"));
    }

    #[test]
    fn test_url_round_trip() {
        let pkg = Package::parse("github.com/yaoapp/demo/widgets@main", &root()).unwrap();
        let again = Package::parse(&pkg.url, &root()).unwrap();
        assert_eq!(pkg, again);
    }

    #[test]
    fn test_prerelease_safe() {
        assert_eq!(prerelease_safe("feature/login"), "feature-login");
        assert_eq!(prerelease_safe("release_2"), "release-2");
        assert_eq!(prerelease_safe("..."), "ref");
        assert_eq!(prerelease_safe("007"), "r007");
        assert_eq!(prerelease_safe("0a1b2c3"), "0a1b2c3");
    }

    #[test]
    fn test_replaced_package_never_downloads() {
        let dir = TempDir::new().unwrap();
        let mut pkg = Package::parse("github.com/a/b@1.0.0", dir.path()).unwrap();
        pkg.replaced = true;

        let mut calls = 0;
        pkg.download(&Config::default(), &DownloadOptions::default(), &mut |_, _, _| calls += 1)
            .unwrap();
        assert_eq!(calls, 0);
        assert!(!pkg.downloaded);
    }

    #[test]
    fn test_existing_checkout_reports_cached() {
        let dir = TempDir::new().unwrap();
        let mut pkg = Package::parse("github.com/a/b@1.0.0", dir.path()).unwrap();
        fs::create_dir_all(&pkg.local_path).unwrap();

        let mut phases = Vec::new();
        pkg.download(&Config::default(), &DownloadOptions::default(), &mut |_, _, s| {
            phases.push(s)
        })
        .unwrap();

        assert!(pkg.downloaded);
        assert_eq!(phases, vec![DownloadStatus::Prepare, DownloadStatus::Cached]);
    }

    #[test]
    fn test_download_from_zip_cache() {
        use std::io::Write;
        use zip::write::FileOptions;

        let dir = TempDir::new().unwrap();
        let storage = dir.path().join("storage");
        let cache = dir.path().join("cache");

        let mut pkg = Package::parse("github.com/yaoapp/demo@1.0.0", &storage).unwrap();

        // seed the cache with a zipball-shaped archive
        let zip_path = cache.join("github.com/yaoapp/demo").join("@1.0.0.zip");
        fs::create_dir_all(zip_path.parent().unwrap()).unwrap();
        let file = fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("yaoapp-demo-abcdef/app.yao", FileOptions::default())
            .unwrap();
        writer.write_all(b"{}").unwrap();
        writer.finish().unwrap();

        let options = DownloadOptions {
            cache: Some(cache),
            cancel: None,
        };
        let mut phases = Vec::new();
        pkg.download(&Config::default(), &options, &mut |_, _, s| phases.push(s))
            .unwrap();

        assert!(pkg.downloaded);
        assert!(pkg.local_path.join("app.yao").exists());
        assert_eq!(phases, vec![DownloadStatus::Prepare, DownloadStatus::Cached]);
    }

    #[test]
    fn test_download_unsupported_domain_fails() {
        let dir = TempDir::new().unwrap();
        let mut pkg = Package::parse("git.example.com/a/b@1.0.0", dir.path()).unwrap();
        let err = pkg
            .download(&Config::default(), &DownloadOptions::default(), &mut |_, _, _| {})
            .unwrap_err();
        assert!(format!("{}", err).contains("not supported"));
    }
}
