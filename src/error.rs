//! # Error Handling
//!
//! Centralized error handling for the workshop and DSL compiler. The main
//! `Error` enum uses `thiserror` and covers all anticipated failure modes:
//!
//! - Configuration errors (malformed `workshop.yao`, duplicate aliases,
//!   token files with wrong permissions, invalid replace overrides).
//! - Resolution errors (malformed package urls, unparseable versions,
//!   missing tags or commits).
//! - Network errors (non-2xx responses from the Git host, transport
//!   failures, wrapped verbatim).
//! - Lock errors (a second writer finding `workshop.yao.lock` present).
//! - Shape errors (DSL heads or RUN commands of the wrong type, path
//!   expressions hitting a value of the wrong kind, array indices out of
//!   range).
//! - Template errors (unknown `COPY` targets, non-map template values).
//! - The depth bound shared by the dependency resolver and the compiler
//!   trace.
//!
//! All errors are propagated to the caller unchanged; the core never
//! swallows them.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for workshop operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error occurred while parsing a `workshop.yao` file or the host
    /// credentials configuration.
    ///
    /// This error includes the specific parsing issue and optionally a hint
    /// about how to fix it.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A package url, version, or git reference could not be resolved.
    #[error("Resolve error: {message}")]
    Resolve { message: String },

    /// An error occurred during a network operation. Non-2xx responses from
    /// the Git host surface their body verbatim in `message`.
    #[error("Network error: {url} - {message}")]
    Network { url: String, message: String },

    /// A mutating workshop operation found the lock file already present.
    #[error("Workshop is locked: {} exists; remove it if no other process is running", path.display())]
    Lock { path: PathBuf },

    /// A DSL document or RUN command did not have the expected shape, or a
    /// path expression hit a value of the wrong kind.
    #[error("{file}: invalid shape{}: {message}", if path.is_empty() { String::new() } else { format!(" at {}", path) })]
    Shape {
        file: String,
        path: String,
        message: String,
    },

    /// A `COPY` directive referenced an unknown template or a non-map value.
    #[error("Template error: {name} - {message}")]
    Template { name: String, message: String },

    /// The dependency resolver or the compile trace exceeded the depth bound.
    #[error("Too many layers, the max layer count is {max}")]
    TooManyLayers { max: usize },

    /// An error for a feature that has not yet been implemented.
    #[error("Feature not implemented: {feature}")]
    NotImplemented { feature: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// An archive extraction error, wrapped from `zip::result::ZipError`.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Shape errors raised by the path helpers carry an empty `file`; the
    /// compiler fills it in with the DSL file at fault.
    pub(crate) fn at_file(self, file: &str) -> Error {
        match self {
            Error::Shape { file: f, path, message } if f.is_empty() => Error::Shape {
                file: file.to_string(),
                path,
                message,
            },
            other => other,
        }
    }

    pub(crate) fn shape(path: impl Into<String>, message: impl Into<String>) -> Error {
        Error::Shape {
            file: String::new(),
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
