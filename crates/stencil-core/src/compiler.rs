//! Template compiler orchestration.
//!
//! ```text
//! source ──► verbatim store ──► Scanner ──► extensions ──► verbatim restore ──► footer
//!                                  │
//!                                  ├── directives (custom, built-in)
//!                                  ├── comments
//!                                  └── echo tags
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cache::{ArtifactCache, DEFAULT_EXTENSION};
use crate::config::CompilerConfig;
use crate::echo::{validate_echo_format, DEFAULT_ECHO_FORMAT};
use crate::error::CompilerError;
use crate::registry::{CustomDirective, DirectiveRegistry};
use crate::scanner::Scanner;
use crate::session::Session;
use crate::storage::Filesystem;
use crate::tags::{TagConfig, TagPair};
use crate::verbatim;

/// Compiles templates into host scripts and manages their cached artifacts.
#[derive(Debug)]
pub struct TemplateCompiler<F: Filesystem> {
    files: F,
    cache: ArtifactCache,
    path: Option<String>,
    registry: DirectiveRegistry,
    tags: TagConfig,
    echo_format: String,
}

impl<F: Filesystem> TemplateCompiler<F> {
    /// Create a compiler writing artifacts under `cache_path`.
    pub fn new(files: F, cache_path: impl Into<PathBuf>) -> Result<Self, CompilerError> {
        let cache_path = cache_path.into();
        if cache_path.as_os_str().is_empty() {
            return Err(CompilerError::MissingCachePath);
        }
        Ok(Self {
            files,
            cache: ArtifactCache::new(cache_path, DEFAULT_EXTENSION),
            path: None,
            registry: DirectiveRegistry::new(),
            tags: TagConfig::default(),
            echo_format: DEFAULT_ECHO_FORMAT.to_string(),
        })
    }

    pub fn from_config(files: F, config: &CompilerConfig) -> Result<Self, CompilerError> {
        config.validate()?;
        let cache_path = config
            .cache_path
            .clone()
            .ok_or(CompilerError::MissingCachePath)?;
        let mut compiler = Self::new(files, cache_path.clone())?;
        compiler.cache = ArtifactCache::new(cache_path, config.compiled_extension.clone());
        compiler.tags = config.tags.clone();
        compiler.echo_format = config.echo_format.clone();
        Ok(compiler)
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Compile the template at `path` (or the current path) and write its
    /// artifact. Returns the artifact path.
    pub fn compile(&mut self, path: Option<&str>) -> Result<PathBuf, CompilerError> {
        if let Some(path) = path {
            self.set_path(path);
        }
        let id = self.path.clone().ok_or(CompilerError::MissingTemplatePath)?;

        let source = self
            .files
            .get(Path::new(&id))
            .map_err(|e| CompilerError::storage(&id, e))?;
        let compiled = self.compile_string(&source);

        let target = self.compiled_path(&id);
        self.files
            .put(&target, &compiled)
            .map_err(|e| CompilerError::storage(&target, e))?;

        info!(
            "Compiled {} -> {} ({} bytes)",
            id,
            target.display(),
            compiled.len()
        );
        Ok(target)
    }

    /// Compile template text. Never touches storage.
    pub fn compile_string(&self, value: &str) -> String {
        let mut session = Session::new();
        let stored = verbatim::store_blocks(value, &mut session.verbatim_blocks);

        let scanner = Scanner::new(&self.tags, &self.echo_format, &self.registry);
        let scanned = scanner.compile(&stored, &mut session);
        let extended = self.registry.apply_extensions(scanned);
        let restored = verbatim::restore_blocks(extended, &session.verbatim_blocks);

        session.finish(restored)
    }

    pub fn is_expired(&self, id: &str) -> Result<bool, CompilerError> {
        self.cache.is_expired(&self.files, id)
    }

    pub fn compiled_path(&self, id: &str) -> PathBuf {
        let path = self.cache.compiled_path(id);
        debug!("{} compiles to {}", id, path.display());
        path
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = Some(path.into());
    }

    /// Register a transform run over every compiled document.
    pub fn extend(&mut self, extension: impl Fn(&str) -> String + Send + Sync + 'static) {
        self.registry.extend(Box::new(extension));
    }

    /// Register a custom directive. Custom directives shadow built-ins.
    pub fn directive(
        &mut self,
        name: impl Into<String>,
        handler: impl Fn(&str) -> String + Send + Sync + 'static,
    ) {
        self.registry.register(name, Box::new(handler));
    }

    pub fn custom_directives(&self) -> &[CustomDirective] {
        self.registry.directives()
    }

    /// Set the wrapper for content echoes. It must contain `%s`.
    pub fn set_echo_format(&mut self, format: impl Into<String>) -> Result<(), CompilerError> {
        let format = format.into();
        validate_echo_format(&format)?;
        self.echo_format = format;
        Ok(())
    }

    pub fn echo_format(&self) -> &str {
        &self.echo_format
    }

    /// Set the content tags, or the escaped tags when `escaped` is true.
    pub fn set_content_tags(
        &mut self,
        open: impl Into<String>,
        close: impl Into<String>,
        escaped: bool,
    ) -> Result<(), CompilerError> {
        let pair = TagPair::new(open, close);
        if escaped {
            pair.validate("escaped")?;
            self.tags.escaped = pair;
        } else {
            pair.validate("content")?;
            self.tags.content = pair;
        }
        Ok(())
    }

    pub fn content_tags(&self) -> (&str, &str) {
        self.tags.content.as_tuple()
    }

    pub fn escaped_content_tags(&self) -> (&str, &str) {
        self.tags.escaped.as_tuple()
    }

    pub fn set_raw_tags(
        &mut self,
        open: impl Into<String>,
        close: impl Into<String>,
    ) -> Result<(), CompilerError> {
        let pair = TagPair::new(open, close);
        pair.validate("raw")?;
        self.tags.raw = pair;
        Ok(())
    }

    pub fn raw_tags(&self) -> (&str, &str) {
        self.tags.raw.as_tuple()
    }

    pub fn tags(&self) -> &TagConfig {
        &self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryFilesystem;

    fn compiler() -> TemplateCompiler<MemoryFilesystem> {
        TemplateCompiler::new(MemoryFilesystem::new(), "/cache").unwrap()
    }

    #[test]
    fn empty_cache_path_is_rejected() {
        let err = TemplateCompiler::new(MemoryFilesystem::new(), "").unwrap_err();
        assert!(matches!(err, CompilerError::MissingCachePath));

        let err =
            TemplateCompiler::from_config(MemoryFilesystem::new(), &CompilerConfig::default())
                .unwrap_err();
        assert!(matches!(err, CompilerError::MissingCachePath));
    }

    #[test]
    fn from_config_applies_settings() {
        let mut config = CompilerConfig::with_cache_path("/views").unescaped();
        config.compiled_extension = "tpl".into();
        config.tags.content = TagPair::new("[[", "]]");
        let compiler = TemplateCompiler::from_config(MemoryFilesystem::new(), &config).unwrap();

        assert_eq!(compiler.echo_format(), "%s");
        assert_eq!(compiler.content_tags(), ("[[", "]]"));
        assert_eq!(compiler.cache().extension(), "tpl");
        assert_eq!(compiler.compile_string("[[ $a ]]"), "<?php echo $a; ?>");
    }

    #[test]
    fn compile_without_any_path_fails() {
        let mut compiler = compiler();
        assert!(matches!(
            compiler.compile(None),
            Err(CompilerError::MissingTemplatePath)
        ));
    }

    #[test]
    fn missing_source_surfaces_storage_error() {
        let mut compiler = compiler();
        let err = compiler.compile(Some("nope.blade")).unwrap_err();
        match err {
            CompilerError::Storage { path, source } => {
                assert_eq!(path, PathBuf::from("nope.blade"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_tags_are_rejected() {
        let mut compiler = compiler();
        assert!(compiler.set_content_tags("", "}}", false).is_err());
        assert!(compiler.set_raw_tags("{!!", "").is_err());
        assert_eq!(compiler.content_tags(), ("{{", "}}"));
    }
}
