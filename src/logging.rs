//! Log subscriber setup
//!
//! Components log through `tracing`. A host process that already installs a
//! subscriber keeps it; otherwise [`init`] installs one writing to stderr and,
//! optionally, to a file.

use crate::config::LoggingConfig;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.filter`. Returns `false` when a
/// global subscriber was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, file_error) = match config.file.as_deref().map(file_appender) {
        Some(Ok(appender)) => (
            Some(fmt::layer().with_ansi(false).with_writer(appender)),
            None,
        ),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .is_ok();

    if let (Some(path), Some(e)) = (&config.file, file_error) {
        tracing::warn!("Cannot log to {}: {}", path.display(), e);
    }
    installed
}

/// A non-rotating appender writing to exactly `path`
fn file_appender(path: &Path) -> Result<RollingFileAppender, String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| "not a file path".to_string())?;
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_only_once() {
        let config = LoggingConfig::default();
        init(&config);
        assert!(!init(&config));
    }

    #[test]
    fn test_file_appender() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_appender(&dir.path().join("host.log")).is_ok());
        assert!(file_appender(Path::new("/")).is_err());
    }
}
