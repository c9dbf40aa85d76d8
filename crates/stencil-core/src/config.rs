//! Compiler configuration.
//!
//! Loaded from YAML, from the environment, or built in code:
//!
//! ```yaml
//! cache_path: storage/views
//! compiled_extension: php
//! echo_format: "e(%s)"
//! tags:
//!   content: { open: "[[", close: "]]" }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::DEFAULT_EXTENSION;
use crate::echo::{validate_echo_format, DEFAULT_ECHO_FORMAT};
use crate::error::CompilerError;
use crate::tags::TagConfig;

/// Env var naming a YAML config file.
pub const CONFIG_ENV: &str = "STENCIL_CONFIG";

/// Env var overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "STENCIL_CACHE_DIR";

/// Configuration for the template compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Directory holding compiled artifacts. Required to build a compiler.
    pub cache_path: Option<PathBuf>,
    /// Extension of compiled artifacts.
    pub compiled_extension: String,
    /// Wrapper applied to content echoes; `%s` marks the expression.
    pub echo_format: String,
    /// Echo tag markers.
    pub tags: TagConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            cache_path: None,
            compiled_extension: DEFAULT_EXTENSION.to_string(),
            echo_format: DEFAULT_ECHO_FORMAT.to_string(),
            tags: TagConfig::default(),
        }
    }
}

impl CompilerConfig {
    /// Default configuration writing to `cache_path`.
    pub fn with_cache_path(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: Some(cache_path.into()),
            ..Self::default()
        }
    }

    /// Echo content verbatim instead of escaping it.
    pub fn unescaped(mut self) -> Self {
        self.echo_format = "%s".to_string();
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CompilerError> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| CompilerError::InvalidConfig(format!("failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CompilerError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| CompilerError::storage(path, e))?;
        let config = Self::from_yaml_str(&yaml)?;
        info!(
            "Loaded compiler config from {} (cache: {:?})",
            path.display(),
            config.cache_path
        );
        Ok(config)
    }

    /// Build from the environment.
    ///
    /// 1. `STENCIL_CONFIG` names a YAML file to load; otherwise defaults.
    /// 2. `STENCIL_CACHE_DIR`, when set, overrides `cache_path`.
    pub fn from_env() -> Result<Self, CompilerError> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::load(path)?,
            _ => Self::default(),
        };
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            if !dir.is_empty() {
                config.cache_path = Some(PathBuf::from(dir));
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CompilerError> {
        self.tags.validate()?;
        if self.compiled_extension.is_empty() {
            return Err(CompilerError::InvalidConfig(
                "compiled_extension must not be empty".into(),
            ));
        }
        validate_echo_format(&self.echo_format)?;
        if matches!(&self.cache_path, Some(p) if p.as_os_str().is_empty()) {
            return Err(CompilerError::MissingCachePath);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagPair;

    #[test]
    fn defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.cache_path, None);
        assert_eq!(config.compiled_extension, "php");
        assert_eq!(config.echo_format, "e(%s)");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = CompilerConfig::from_yaml_str(
            "cache_path: /tmp/views\ntags:\n  content: { open: '[[', close: ']]' }\n",
        )
        .unwrap();
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/views")));
        assert_eq!(config.tags.content, TagPair::new("[[", "]]"));
        assert_eq!(config.tags.raw, TagPair::new("{!!", "!!}"));
        assert_eq!(config.echo_format, "e(%s)");
    }

    #[test]
    fn invalid_yaml() {
        let err = CompilerConfig::from_yaml_str("cache_path: [unclosed").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn format_without_placeholder_is_rejected() {
        let err = CompilerConfig::from_yaml_str("echo_format: htmlspecialchars").unwrap_err();
        assert!(matches!(err, CompilerError::InvalidConfig(_)));
    }

    #[test]
    fn unescaped_preset() {
        let config = CompilerConfig::with_cache_path("cache").unescaped();
        assert_eq!(config.echo_format, "%s");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stencil.yaml");
        std::fs::write(&path, "compiled_extension: tpl\n").unwrap();
        let config = CompilerConfig::load(&path).unwrap();
        assert_eq!(config.compiled_extension, "tpl");

        let missing = CompilerConfig::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, CompilerError::Storage { .. }));
    }
}
