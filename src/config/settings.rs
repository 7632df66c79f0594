//! Settings sections of the host configuration
//!
//! - [`EngineConfig`] - Safety limits and module loading for the script engine
//! - [`LoggingConfig`] - Log filter, destination, and script output routing

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default maximum number of engine operations per call
pub const DEFAULT_MAX_OPERATIONS: u64 = 1_000_000;

/// Limits and options applied to every component's script engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum operations per engine call (0 = unlimited)
    pub max_operations: u64,

    /// Maximum function call nesting
    pub max_call_levels: usize,

    /// Maximum expression nesting at global level
    pub max_expr_depth: usize,

    /// Maximum expression nesting inside functions
    pub max_function_expr_depth: usize,

    /// Maximum string length in bytes
    pub max_string_size: usize,

    /// Maximum array length
    pub max_array_size: usize,

    /// Maximum object map size
    pub max_map_size: usize,

    /// Whether component scripts may `import` sibling files
    pub allow_imports: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_operations: DEFAULT_MAX_OPERATIONS,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
            max_string_size: 1_000_000,
            max_array_size: 100_000,
            max_map_size: 10_000,
            allow_imports: true,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is not set
    pub filter: String,

    /// Route script `print` / `debug` output into the log
    pub script_output: bool,

    /// Optional log file, written in addition to stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            script_output: true,
            file: None,
        }
    }
}
