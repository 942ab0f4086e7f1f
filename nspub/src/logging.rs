use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use ontopages::error::{Chainable, Error, Result};

/// The configuration used when none is given or the given one is unusable.
const DEFAULT: &str = include_str!("../logging.yaml");

/// Logging configuration, read from YAML.
///
/// ```yaml
/// level: info
/// targets:
///   ontopages::compose: debug
/// ansi: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Level for every target not listed in `targets`.
    pub level: String,
    /// Levels of individual targets.
    pub targets: BTreeMap<String, String>,
    /// Colorize output.
    pub ansi: bool,
    /// Print each event's target.
    pub target: bool,
    pub compact: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".into(),
            targets: BTreeMap::new(),
            ansi: false,
            target: false,
            compact: true,
        }
    }
}

impl LogConfig {
    pub fn from_yaml(yaml: &str) -> Result<LogConfig> {
        serde_yaml::from_str(yaml).map_err(Error::from_std)
    }

    pub fn read(path: &Path) -> Result<LogConfig> {
        let yaml = std::fs::read_to_string(path).chain_with(|| ontopages::error! {
            "failed to read logging configuration",
            "path" => path.display(),
        })?;

        LogConfig::from_yaml(&yaml).chain_with(|| ontopages::error! {
            "invalid logging configuration",
            "path" => path.display(),
        })
    }

    /// The embedded default.
    pub fn builtin() -> LogConfig {
        LogConfig::from_yaml(DEFAULT).unwrap_or_default()
    }

    /// `level,target=level,...`, in `EnvFilter` syntax.
    pub fn directives(&self) -> String {
        let mut directives = vec![self.level.clone()];
        directives.extend(self.targets.iter().map(|(target, level)| format!("{target}={level}")));
        directives.join(",")
    }
}

/// Installs the global subscriber, writing to stderr. Configured from `path`
/// if given and readable, else from the embedded default. `RUST_LOG`
/// overrides the configured levels.
pub fn init(path: Option<&Path>) {
    let (config, problem) = match path.map(LogConfig::read) {
        Some(Ok(config)) => (config, None),
        Some(Err(e)) => (LogConfig::builtin(), Some(e)),
        None => (LogConfig::builtin(), None),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .with_target(config.target);

    let _ = match config.compact {
        true => builder.compact().try_init(),
        false => builder.try_init(),
    };

    if let Some(e) = problem {
        tracing::warn!("using the default logging configuration: {}", e.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_parses() {
        let config = LogConfig::from_yaml(DEFAULT).unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config, LogConfig::builtin());
        assert!(config.directives().starts_with("info,"));
    }

    #[test]
    fn partial_configs_keep_defaults() {
        let config = LogConfig::from_yaml("targets:\n  ontopages: debug\n").unwrap();
        assert_eq!(config.directives(), "info,ontopages=debug");
        assert!(config.compact);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(LogConfig::from_yaml("levle: debug").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LogConfig::read(&dir.path().join("nope.yaml")).is_err());
    }
}
