//! Template directive compiler.
//!
//! Translates templates written in a directive superset (echo tags, `@`
//! directives, comments, verbatim blocks) into host scripts of interleaved
//! literal text and `<?php ... ?>` code runs, and keeps compiled artifacts in
//! a content-addressed cache with staleness checks.
//!
//! # Architecture
//!
//! ```text
//! Template ──► TemplateCompiler ──► compiled script ──► Filesystem
//!                    │
//!                    ├── verbatim blocks (stored / restored)
//!                    ├── Scanner: directives, comments, echo tags
//!                    ├── DirectiveRegistry: custom directives, extensions
//!                    └── ArtifactCache: sha256 paths, expiry
//! ```
//!
//! # Key Concepts
//!
//! - **TemplateCompiler**: Orchestrates compilation and artifact persistence
//! - **Filesystem**: Storage collaborator (`LocalFilesystem`, `MemoryFilesystem`)
//! - **Builtin**: The built-in directive table
//! - **Session**: Per-call state (forelse ordinals, layout footer)
//!
//! # Example
//!
//! ```
//! use stencil_core::{MemoryFilesystem, TemplateCompiler};
//!
//! let mut compiler = TemplateCompiler::new(MemoryFilesystem::new(), "/cache").unwrap();
//! compiler.directive("datetime", |args| {
//!     format!("<?php echo {}->format('m/d/Y H:i'); ?>", args)
//! });
//!
//! assert_eq!(
//!     compiler.compile_string("@if($user) {{ $user->name }} @endif"),
//!     "<?php if($user): ?> <?php echo e($user->name); ?> <?php endif; ?>"
//! );
//! assert_eq!(
//!     compiler.compile_string("@datetime($when)"),
//!     "<?php echo ($when)->format('m/d/Y H:i'); ?>"
//! );
//! ```

mod balanced;
mod cache;
mod comments;
mod compiler;
mod config;
mod directives;
mod echo;
mod error;
mod registry;
mod scanner;
mod session;
mod statements;
mod storage;
mod tags;
mod verbatim;

pub use balanced::{extract_balanced, extract_parenthesized, Unbalanced};
pub use cache::{ArtifactCache, DEFAULT_EXTENSION};
pub use compiler::TemplateCompiler;
pub use config::{CompilerConfig, CACHE_DIR_ENV, CONFIG_ENV};
pub use directives::Builtin;
pub use echo::{compile_echo_defaults, DEFAULT_ECHO_FORMAT};
pub use error::CompilerError;
pub use registry::{CustomDirective, DirectiveHandler, DirectiveRegistry, Extension};
pub use session::Session;
pub use statements::{parse_header, DirectiveHeader, HeaderError};
pub use storage::{Filesystem, LocalFilesystem, MemoryFilesystem};
pub use tags::{EchoKind, TagConfig, TagPair};

/// Result alias for compiler operations.
pub type Result<T> = std::result::Result<T, CompilerError>;
