//! # Yao Workshop Library
//!
//! This library provides the core functionality for managing declarative
//! application packages ("DSL files") and compiling them into self-contained
//! trees. It is designed to be used by the `yao-workshop` command-line tool
//! but can also be embedded into applications that load DSL-driven models,
//! flows, and connectors.
//!
//! ## Core Concepts
//!
//! The library is built around a few key concepts:
//!
//! - **Package (`package`)**: one external dependency, identified by
//!   `domain/owner/repo[/subpath]@rel`, with a deterministic checkout
//!   location under the workshop root.
//! - **Workshop (`workshop`)**: the project-local index of external
//!   dependencies, stored as `workshop.yao`. It resolves the transitive
//!   dependency graph, applies `replace` overrides, and persists a
//!   deterministic lockfile guarded by an on-disk lock.
//! - **Repo Client (`repo`)**: read-only access to a Git host. GitHub is the
//!   only implemented backend; it speaks the REST contents/archive API and
//!   downloads repository zipballs into a local cache.
//! - **DSL files (`dsl`)**: JSON/JSONC documents with a reserved meta
//!   section (`FROM`, `LANG`, `VERSION`, `RUN`) parsed by the head parser.
//! - **Compiler (`dsl::compiler`)**: resolves the `FROM` inheritance chain,
//!   applies the REPLACE/MERGE/APPEND/DEEP-MERGE/DELETE pipeline, expands
//!   `COPY` template references, and substitutes `$env.NAME` values, while
//!   bounding the visited-file trace at 32 entries.
//!
//! ## Execution Flow
//!
//! Compiling a DSL file runs through the following high-level steps:
//!
//! 1.  **Open**: read the file (JSONC tolerated) and parse its head.
//! 2.  **Resolve FROM**: locate the parent file, locally or through the
//!     workshop (downloading the owning package if needed), and compile it
//!     recursively.
//! 3.  **Merge**: apply the child's RUN pipeline onto the parent's tree,
//!     then deep-merge the remaining child content.
//! 4.  **Expand**: replace `COPY` references with compiled template values
//!     and substitute environment variables.
//!
//! Workshop mutation (`get`/`remove`/`refresh`) is single-writer: it is
//! guarded by a `workshop.yao.lock` presence file and is not safe for
//! concurrent use from multiple threads of one process. Reads of an opened
//! workshop and compiles of distinct files are safe to run concurrently.

pub mod config;
pub mod connector;
pub mod defaults;
pub mod dsl;
pub mod error;
pub mod package;
pub mod repo;
pub mod types;
pub mod workshop;

pub use config::Config;
pub use dsl::compiler::Compiler;
pub use dsl::Dsl;
pub use error::{Error, Result};
pub use package::{DownloadOptions, DownloadStatus, Package};
pub use repo::CancelToken;
pub use workshop::Workshop;
