//! # Connector Contract
//!
//! The interface later binding layers implement for backing services
//! (databases, caches, LLMs, embedders). The core never calls it; it only
//! preserves enough of a compiled DSL body for a connector subsystem to
//! register against.

use std::path::Path;

use serde_json::{Map, Value};

use crate::dsl::Kind;
use crate::error::Result;

/// A backing-service binding created from a compiled DSL body.
pub trait Connector: Send {
    /// Bind the connector from the DSL bytes of `file` under the id.
    fn register(&mut self, file: &Path, id: &str, dsl: &[u8]) -> Result<()>;

    /// The connector's registered id.
    fn id(&self) -> String;

    /// Whether this connector is of the given kind.
    fn is(&self, kind: Kind) -> bool;

    /// Release the underlying resources.
    fn close(&mut self) -> Result<()>;

    /// The connector's resolved settings map.
    fn setting(&self) -> Map<String, Value>;
}
