//! Default locations and limits for the workshop.
//!
//! This module provides centralized default values used across the library
//! and the CLI, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// The shared depth bound: maximum dependency recursion depth and maximum
/// compile trace length.
pub const MAX_LAYERS: usize = 32;

/// Name of the workshop lockfile inside an application directory, and of
/// the per-domain credentials file inside the config root.
pub const WORKSHOP_FILE: &str = "workshop.yao";

/// Marker file that a `replace` override directory must contain.
pub const APP_FILE: &str = "app.yao";

/// Returns the configuration root directory.
///
/// Uses `$YAO_PATH` when set, otherwise `~/yao`. Falls back to a relative
/// `yao` directory if the home directory cannot be determined.
pub fn config_root() -> PathBuf {
    if let Ok(path) = std::env::var("YAO_PATH") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("yao")
}

/// Returns the workshop root directory, where package checkouts live as
/// `<domain>/<owner>/<repo>@<rel>/[subpath]`.
pub fn workshop_root() -> PathBuf {
    config_root().join("workshop")
}

/// Returns the zip cache root, one archive per
/// `<domain>/<owner>/<repo>/@<rel>.zip`.
pub fn cache_root() -> PathBuf {
    workshop_root().join("cache")
}
