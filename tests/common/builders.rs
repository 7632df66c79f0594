//! Builders for component scripts on disk

use portbridge::{Host, HostConfig};
use std::path::PathBuf;
use tempfile::TempDir;

/// Builder for a temporary directory of component scripts and the host that
/// loads them
pub struct ScriptFixture {
    files: Vec<(String, String)>,
    config: HostConfig,
}

impl ScriptFixture {
    pub fn new() -> Self {
        let mut config = HostConfig::default();
        config.logging.script_output = false;
        Self {
            files: Vec::new(),
            config,
        }
    }

    /// Add a script with inline source
    pub fn file(mut self, name: &str, source: &str) -> Self {
        self.files.push((name.to_string(), source.to_string()));
        self
    }

    /// Copy a script from `tests/fixtures`
    pub fn fixture(self, name: &str) -> Self {
        let source = std::fs::read_to_string(super::fixture_path(name))
            .unwrap_or_else(|e| panic!("missing fixture {}: {}", name, e));
        self.file(name, &source)
    }

    pub fn max_operations(mut self, max_operations: u64) -> Self {
        self.config.engine.max_operations = max_operations;
        self
    }

    pub fn allow_imports(mut self, allow: bool) -> Self {
        self.config.engine.allow_imports = allow;
        self
    }

    pub fn build(self) -> ScriptDir {
        let dir = tempfile::tempdir().expect("create temp dir");
        for (name, source) in &self.files {
            std::fs::write(dir.path().join(name), source).expect("write script");
        }
        ScriptDir {
            dir,
            host: Host::new(self.config),
        }
    }
}

impl Default for ScriptFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Scripts written by [`ScriptFixture`]. Removed on drop.
pub struct ScriptDir {
    dir: TempDir,
    pub host: Host,
}

impl ScriptDir {
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_builder() {
        let scripts = ScriptFixture::new()
            .file("inline.rhai", "fn Empty() { #{} }")
            .max_operations(10)
            .build();

        assert!(scripts.path("inline.rhai").exists());
        assert_eq!(scripts.host.config().engine.max_operations, 10);
        assert!(!scripts.host.config().logging.script_output);
    }
}
