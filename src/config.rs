//! # Host Credentials Configuration
//!
//! Per-domain Git host credentials, loaded from `<config_root>/workshop.yao`:
//!
//! ```json
//! {
//!     "github.com": { "token": "~/.github/token" }
//! }
//! ```
//!
//! A token value beginning with `~` or `/` names a file holding the actual
//! token. The file's permissions must be exactly `0400` or `0600`; its
//! contents are read, trimmed, and substituted in. Any other value is used
//! literally.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::defaults;
use crate::error::{Error, Result};

/// Credentials for a single Git host domain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostConfig {
    /// Raw token value as written: a literal token or a `~`/`/` file path.
    pub token: Option<String>,
}

/// Per-domain host credentials.
#[derive(Debug, Clone, Default)]
pub struct Config {
    hosts: HashMap<String, HostConfig>,
}

impl Config {
    /// Load the credentials file from the default config root. A missing
    /// file yields an empty configuration.
    pub fn load() -> Result<Config> {
        Self::open(&defaults::config_root().join(defaults::WORKSHOP_FILE))
    }

    /// Load a credentials file from an explicit path. A missing file yields
    /// an empty configuration.
    pub fn open(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let raw = fs::read_to_string(path)?;
        let stripped = json_comments::StripComments::new(raw.as_bytes());
        let hosts: HashMap<String, HostConfig> =
            serde_json::from_reader(stripped).map_err(|err| Error::Config {
                message: format!("{}: {}", path.display(), err),
                hint: Some("expected a map of domain to { \"token\": ... }".to_string()),
            })?;
        Ok(Config { hosts })
    }

    /// Build a configuration from in-memory entries. Used by tests and by
    /// embedders that manage credentials themselves.
    pub fn with_hosts(hosts: HashMap<String, HostConfig>) -> Config {
        Config { hosts }
    }

    /// Resolve the token for a domain, reading token files as needed.
    /// Returns `Ok(None)` when the domain has no credentials configured.
    pub fn token(&self, domain: &str) -> Result<Option<String>> {
        let raw = match self.hosts.get(domain).and_then(|h| h.token.as_deref()) {
            Some(raw) => raw,
            None => return Ok(None),
        };
        if raw.starts_with('~') || raw.starts_with('/') {
            return read_token_file(&expand_home(raw)).map(Some);
        }
        Ok(Some(raw.to_string()))
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

fn read_token_file(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|_| Error::Config {
        message: format!("token file not found: {}", path.display()),
        hint: None,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode() & 0o777;
        if mode != 0o400 && mode != 0o600 {
            return Err(Error::Config {
                message: format!(
                    "token file {} has mode {:o}, expected 0400 or 0600",
                    path.display(),
                    mode
                ),
                hint: Some(format!("run: chmod 600 {}", path.display())),
            });
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    Ok(fs::read_to_string(path)?.trim().to_string())
}
