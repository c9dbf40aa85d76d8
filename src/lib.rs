//! Stencil - template directive compiler.
//!
//! The compiler itself lives in [`stencil_core`]; this crate adds on-disk
//! batch compilation and the `stencil_cli` binary.
//!
//! ```ignore
//! use stencil::{batch::compile_templates, CompilerConfig, LocalFilesystem, TemplateCompiler};
//!
//! let config = CompilerConfig::from_env()?;
//! let mut compiler = TemplateCompiler::from_config(LocalFilesystem, &config)?;
//! let report = compile_templates(&mut compiler, ["views/home.blade.php"], false);
//! ```

pub mod batch;

pub use stencil_core::*;

use anyhow::Context;
use std::path::PathBuf;

/// Resolve configuration for command-line use.
///
/// An explicit config file wins over `STENCIL_CONFIG`; an explicit cache
/// directory wins over whatever the config or `STENCIL_CACHE_DIR` supplied.
pub fn resolve_config(
    config_file: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
) -> anyhow::Result<CompilerConfig> {
    let mut config = match config_file {
        Some(path) => CompilerConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CompilerConfig::from_env().context("loading config from environment")?,
    };
    if let Some(dir) = cache_dir {
        config.cache_path = Some(dir);
    }
    config.validate()?;
    Ok(config)
}

/// Build a compiler over the local disk.
pub fn local_compiler(config: &CompilerConfig) -> anyhow::Result<TemplateCompiler<LocalFilesystem>> {
    TemplateCompiler::from_config(LocalFilesystem, config)
        .context("building template compiler (is --cache-dir or STENCIL_CACHE_DIR set?)")
}
