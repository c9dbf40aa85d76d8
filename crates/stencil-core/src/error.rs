//! Compiler error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring the compiler or persisting artifacts.
///
/// Malformed directives are not represented here: they degrade to literal
/// text inside the compiled output.
#[derive(Debug, Error)]
pub enum CompilerError {
    /// No cache directory was supplied at construction time.
    #[error("invalid argument: a cache path is required to build a template compiler")]
    MissingCachePath,

    /// `compile` was called without a path and none was set before.
    #[error("invalid state: no template path given and none set on the compiler")]
    MissingTemplatePath,

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The storage collaborator failed.
    #[error("storage error for {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CompilerError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompilerError::Storage {
            path: path.into(),
            source,
        }
    }

    /// Check if this error was raised while setting the compiler up.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CompilerError::MissingCachePath | CompilerError::InvalidConfig(_)
        )
    }
}
