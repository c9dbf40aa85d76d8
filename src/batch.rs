//! Staleness-aware batch compilation.
//!
//! Each template is compiled only when its artifact is expired, unless the
//! batch is forced. One failing template does not stop the rest.

use std::path::PathBuf;

use serde::Serialize;
use stencil_core::{CompilerError, Filesystem, TemplateCompiler};
use tracing::{debug, warn};

/// What happened to one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// The template was compiled and its artifact written.
    Compiled { template: String, artifact: PathBuf },
    /// The artifact was newer than the template; nothing was done.
    Fresh { template: String, artifact: PathBuf },
    /// Reading, compiling or writing failed.
    Failed { template: String, error: String },
}

impl BatchOutcome {
    pub fn template(&self) -> &str {
        match self {
            BatchOutcome::Compiled { template, .. }
            | BatchOutcome::Fresh { template, .. }
            | BatchOutcome::Failed { template, .. } => template,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, BatchOutcome::Failed { .. })
    }
}

/// Outcomes of a batch, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn compiled(&self) -> usize {
        self.count(|o| matches!(o, BatchOutcome::Compiled { .. }))
    }

    pub fn fresh(&self) -> usize {
        self.count(|o| matches!(o, BatchOutcome::Fresh { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(BatchOutcome::is_failure)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, predicate: impl Fn(&BatchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|&o| predicate(o)).count()
    }
}

/// Compile every template in `templates`, skipping fresh artifacts unless
/// `force` is set.
pub fn compile_templates<F, I, S>(
    compiler: &mut TemplateCompiler<F>,
    templates: I,
    force: bool,
) -> BatchReport
where
    F: Filesystem,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let outcomes = templates
        .into_iter()
        .map(|template| compile_one(compiler, template.as_ref(), force))
        .collect();
    BatchReport { outcomes }
}

fn compile_one<F: Filesystem>(
    compiler: &mut TemplateCompiler<F>,
    template: &str,
    force: bool,
) -> BatchOutcome {
    match try_compile(compiler, template, force) {
        Ok(Some(artifact)) => BatchOutcome::Compiled {
            template: template.to_string(),
            artifact,
        },
        Ok(None) => {
            debug!("{} is fresh, skipping", template);
            BatchOutcome::Fresh {
                template: template.to_string(),
                artifact: compiler.compiled_path(template),
            }
        }
        Err(e) => {
            warn!("Failed to compile {}: {}", template, e);
            BatchOutcome::Failed {
                template: template.to_string(),
                error: e.to_string(),
            }
        }
    }
}

fn try_compile<F: Filesystem>(
    compiler: &mut TemplateCompiler<F>,
    template: &str,
    force: bool,
) -> Result<Option<PathBuf>, CompilerError> {
    if !force && !compiler.is_expired(template)? {
        return Ok(None);
    }
    compiler.compile(Some(template)).map(Some)
}
