//! # DSL Type Interface
//!
//! The contract between the compiler and the subsystems that interpret
//! compiled trees (models, flows, connectors, …). Implementations are
//! supplied externally and registered by kind; the compiler resolves the
//! handler for a file's kind and, when one exists, invokes `check` on the
//! raw document and `compile` on the finished tree.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};

use serde_json::Value;

use crate::dsl::Kind;
use crate::error::Result;

/// Externally-implemented lifecycle hooks for one DSL kind.
pub trait DslType: Send + Sync {
    /// Validate a raw document before compilation.
    fn check(&self, source: &Value) -> Result<()>;

    /// Materialize a compiled tree (register a model, bind a connector…).
    fn compile(&self, root: &Path, file: &Path, source: &Value) -> Result<()>;

    /// Re-materialize after the underlying file changed.
    fn refresh(&self, root: &Path, file: &Path, source: &Value) -> Result<()>;

    /// Tear down whatever `compile` materialized.
    fn remove(&self, root: &Path, file: &Path) -> Result<()>;
}

fn registry() -> &'static RwLock<HashMap<Kind, Arc<dyn DslType>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<Kind, Arc<dyn DslType>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register the handler for a kind, replacing any previous one.
pub fn register(kind: Kind, handler: Arc<dyn DslType>) {
    let mut map = match registry().write() {
        Ok(map) => map,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.insert(kind, handler);
}

/// The registered handler for a kind, if any.
pub fn resolve(kind: Kind) -> Option<Arc<dyn DslType>> {
    let map = match registry().read() {
        Ok(map) => map,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.get(&kind).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        checks: AtomicUsize,
        compiles: AtomicUsize,
    }

    impl DslType for Recorder {
        fn check(&self, _source: &Value) -> Result<()> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn compile(&self, _root: &Path, _file: &Path, _source: &Value) -> Result<()> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn refresh(&self, _root: &Path, _file: &Path, _source: &Value) -> Result<()> {
            Ok(())
        }

        fn remove(&self, _root: &Path, _file: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_resolve() {
        // the registry is process-wide; use a kind no other test registers
        let handler = Arc::new(Recorder {
            checks: AtomicUsize::new(0),
            compiles: AtomicUsize::new(0),
        });
        register(Kind::FastEmbed, handler.clone());

        let resolved = resolve(Kind::FastEmbed).unwrap();
        resolved.check(&Value::Null).unwrap();
        assert_eq!(handler.checks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolve_unregistered_kind() {
        assert!(resolve(Kind::Mongo).is_none());
    }
}
