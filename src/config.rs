//! Engine configuration loaded from TOML.
//!
//! ```toml
//! [history]
//! max_size = 50
//!
//! [paths]
//! protected_prefix = "/.system/"
//!
//! [matching]
//! whitespace_tolerant = true
//! ```
//!
//! Every key is optional; an empty document yields the defaults.

use crate::history::DEFAULT_MAX_SIZE;
use crate::paths::DEFAULT_PROTECTED_PREFIX;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    #[serde(default = "default_protected_prefix")]
    pub protected_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            protected_prefix: default_protected_prefix(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    #[serde(default = "default_true")]
    pub whitespace_tolerant: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            whitespace_tolerant: true,
        }
    }
}

fn default_max_size() -> usize {
    DEFAULT_MAX_SIZE
}

fn default_protected_prefix() -> String {
    DEFAULT_PROTECTED_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.history.max_size == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "history.max_size",
                message: "must be at least 1".to_string(),
            });
        }
        if !self.paths.protected_prefix.starts_with('/') {
            issues.push(ValidationIssue::OutOfRange {
                field: "paths.protected_prefix",
                message: format!(
                    "'{}' must start with '/'",
                    self.paths.protected_prefix
                ),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    OutOfRange {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::OutOfRange { field, message } => {
                write!(f, "config field '{field}' {message}")
            }
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.history.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(config.paths.protected_prefix, "/.system/");
        assert!(config.matching.whitespace_tolerant);
    }

    #[test]
    fn test_full_document() {
        let config = load_from_str(
            r#"
[history]
max_size = 5

[paths]
protected_prefix = "/vendor/"

[matching]
whitespace_tolerant = false
"#,
        )
        .unwrap();
        assert_eq!(config.history.max_size, 5);
        assert_eq!(config.paths.protected_prefix, "/vendor/");
        assert!(!config.matching.whitespace_tolerant);
    }

    #[test]
    fn test_validation_collects_issues() {
        let err = load_from_str(
            r#"
[history]
max_size = 0

[paths]
protected_prefix = "vendor/"
"#,
        )
        .unwrap_err();
        match err {
            ConfigError::Validation { source, .. } => assert_eq!(source.issues.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = load_from_str("[history]\nmax = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn test_load_from_path_attributes_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("engine.toml");
        fs::write(&path, "[history]\nmax_size = 0\n").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("engine.toml"));

        let missing = load_from_path(temp_dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
