//! Rhai Scripting Engine for Components
//!
//! Component logic is written in Rhai. A component file defines one or more
//! classes; a class is a zero-argument function returning the instance, an
//! object map with an `outports` property and its methods.
//!
//! ## Methods
//!
//! `configure` (optional) and `run` (required) are resolved on the instance:
//!
//! 1. a property of that name holding a function pointer (`Fn("name")`,
//!    curried arguments are passed along), called with `this` bound to the
//!    instance, or
//! 2. a zero-parameter function of that name in the file, called the same way.
//!
//! ## Example Component
//!
//! ```rhai
//! fn Abc() {
//!     #{
//!         outports: #{
//!             x: #{ "type": "float", "value": 1.0 },
//!         },
//!         run: Fn("abc_run"),
//!     }
//! }
//!
//! fn abc_run() {
//!     this.outports.x.value += 10.0;
//! }
//! ```
//!
//! Methods may `import` files next to the component (`import "helpers" as h;`
//! inside the function body) unless the host disables imports.

mod backend;
pub mod convert;
mod engine;

pub use backend::RhaiBackend;
pub use engine::{
    MethodRef, ScriptEngine, SharedStepContext, StepClock, StepContext, SCRIPT_LOG_TARGET,
};

use crate::error::{ComponentError, Result};
use rhai::{Engine, AST};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// A compiled component module that can be instantiated efficiently
#[derive(Clone)]
pub struct CompiledModule {
    /// The compiled AST
    ast: AST,
    /// The original source code
    source: String,
    /// Module identifier
    name: String,
}

impl CompiledModule {
    pub fn ast(&self) -> &AST {
        &self.ast
    }

    /// Get the source code of this module
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the name of this module
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag the AST with the file it was read from. Error positions name it,
    /// and relative `import` paths resolve against its directory.
    pub(crate) fn set_origin(&mut self, path: &Path) {
        self.ast.set_source(path.to_string_lossy().as_ref());
    }

    /// Whether the module defines a script function `name` taking `arity`
    /// parameters
    pub fn has_function(&self, name: &str, arity: usize) -> bool {
        self.ast
            .iter_functions()
            .any(|f| f.name == name && f.params.len() == arity)
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("name", &self.name)
            .field("source_len", &self.source.len())
            .finish()
    }
}

/// Cache for compiled modules to avoid recompilation.
///
/// Holds one entry per module name: compiling a new source for a name drops
/// the entry for its previous source.
#[derive(Debug, Default)]
pub struct ModuleCache {
    /// Map from (module name, source) to compiled module
    cache: HashMap<(String, String), CompiledModule>,
}

impl ModuleCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Get a cached module or compile and cache it
    pub fn get_or_compile(
        &mut self,
        engine: &Engine,
        name: &str,
        source: &str,
    ) -> Result<CompiledModule> {
        let key = (name.to_string(), source.to_string());
        if let Some(module) = self.cache.get(&key) {
            return Ok(module.clone());
        }

        let ast = engine
            .compile(source)
            .map_err(|e| ComponentError::Load(format!("Compilation error: {}", e)))?;

        let module = CompiledModule {
            ast,
            source: source.to_string(),
            name: name.to_string(),
        };

        tracing::debug!("Compiled module '{}' ({} bytes)", name, source.len());
        self.cache.retain(|(cached, _), _| cached != name);
        self.cache.insert(key, module.clone());
        Ok(module)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// Thread-safe module cache wrapper
pub type SharedModuleCache = Arc<RwLock<ModuleCache>>;

/// Create a new shared module cache
pub fn create_shared_cache() -> SharedModuleCache {
    Arc::new(RwLock::new(ModuleCache::new()))
}

/// Whether `name` can be used as a module identifier
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_cache() {
        let engine = Engine::new();
        let mut cache = ModuleCache::new();

        let script = "fn Abc() { #{} }";
        let first = cache.get_or_compile(&engine, "module", script).unwrap();
        let second = cache.get_or_compile(&engine, "module", script).unwrap();
        assert_eq!(first.source(), second.source());
        assert_eq!(cache.len(), 1);

        // Same source under another module name is a separate entry
        cache.get_or_compile(&engine, "other", script).unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_edited_source_replaces_entry() {
        let engine = Engine::new();
        let mut cache = ModuleCache::new();

        for step in 0..5 {
            let script = format!("fn Abc() {{ #{{ step: {} }} }}", step);
            cache.get_or_compile(&engine, "module", &script).unwrap();
        }
        cache.get_or_compile(&engine, "other", "fn Abc() { #{} }").unwrap();
        assert_eq!(cache.len(), 2);

        // The latest source is still served from the cache
        let latest = "fn Abc() { #{ step: 4 } }";
        cache.get_or_compile(&engine, "module", latest).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_compile_error_is_load_failure() {
        let engine = Engine::new();
        let mut cache = ModuleCache::new();
        let err = cache
            .get_or_compile(&engine, "module", "fn Abc( {")
            .unwrap_err();
        assert!(matches!(err, ComponentError::Load(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_has_function() {
        let engine = Engine::new();
        let mut cache = ModuleCache::new();
        let module = cache
            .get_or_compile(&engine, "m", "fn Abc() { #{} } fn step_by(n) { n }")
            .unwrap();
        assert!(module.has_function("Abc", 0));
        assert!(module.has_function("step_by", 1));
        assert!(!module.has_function("step_by", 0));
        assert!(!module.has_function("missing", 0));
        assert_eq!(module.ast().source(), None);
    }

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("module"));
        assert!(is_valid_identifier("_private2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("has-dash"));
        assert!(!is_valid_identifier("dotted.name"));
    }
}
