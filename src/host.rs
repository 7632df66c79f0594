//! The component host
//!
//! A [`Host`] binds the component operations to the Rhai backend. It carries
//! the configuration every component is created with and the compiled-module
//! cache they share. Hosts are independent of each other.

use crate::component::{Component, ComponentHandle, ComponentSource};
use crate::config::HostConfig;
use crate::error::Result;
use crate::scripting::{create_shared_cache, RhaiBackend, SharedModuleCache};
use std::path::PathBuf;

/// Creates components from script files
#[derive(Debug, Clone)]
pub struct Host {
    config: HostConfig,
    cache: SharedModuleCache,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            cache: create_shared_cache(),
        }
    }

    /// A host using [`HostConfig::load_or_default`]
    pub fn from_default_config() -> Self {
        Self::new(HostConfig::load_or_default())
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Load `class_name` from `file_name`, registered as `module_name`.
    ///
    /// The component starts in `Created`.
    pub fn create(
        &self,
        file_name: impl Into<PathBuf>,
        module_name: &str,
        class_name: &str,
    ) -> Result<Component> {
        let source = ComponentSource::new(file_name, module_name, class_name);
        let backend = RhaiBackend::load(&self.config, &self.cache, &source).inspect_err(|e| {
            tracing::warn!("Failed to create {}: {}", source, e);
        })?;
        Ok(Component::new(source, Box::new(backend)))
    }

    /// Like [`Host::create`], wrapped for shared use
    pub fn create_handle(
        &self,
        file_name: impl Into<PathBuf>,
        module_name: &str,
        class_name: &str,
    ) -> Result<ComponentHandle> {
        self.create(file_name, module_name, class_name)
            .map(ComponentHandle::new)
    }

    /// Number of compiled modules held
    pub fn cached_modules(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Drop every compiled module. Existing components are unaffected.
    ///
    /// The cache keeps one module per module name, so it grows with the
    /// number of distinct names a long-lived host loads.
    pub fn clear_cache(&self) {
        match self.cache.write() {
            Ok(mut cache) => cache.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::LifecycleState;
    use crate::error::ErrorKind;
    use crate::port::PortValue;

    const SCRIPT: &str = r#"
        fn Abc() {
            #{
                outports: #{ x: #{ "type": "float", "value": 1.0 } },
                run: Fn("abc_run"),
            }
        }
        fn abc_run() { this.outports.x.value += 10.0; }
    "#;

    #[test]
    fn test_create_shares_compiled_module() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("module.rhai");
        std::fs::write(&path, SCRIPT).unwrap();

        let host = Host::default();
        let mut first = host.create(&path, "module", "Abc").unwrap();
        let second = host.create(&path, "module", "Abc").unwrap();
        assert_eq!(host.cached_modules(), 1);

        // Instances are independent
        first.configure().unwrap();
        first.run().unwrap();
        assert_eq!(first.get().unwrap().value("x"), Some(PortValue::Float(11.0)));
        assert_eq!(second.state(), LifecycleState::Created);

        host.clear_cache();
        assert_eq!(host.cached_modules(), 0);
        first.run().unwrap();
    }

    #[test]
    fn test_create_failure_is_load() {
        let host = Host::default();
        let err = host
            .create_handle("/nonexistent/module.rhai", "module", "Abc")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Load);
    }
}
