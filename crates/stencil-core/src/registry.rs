//! Custom directives and extension transforms.
//!
//! Both are plain closures held for the lifetime of the compiler. Custom
//! directives are consulted before the built-in table; extensions run over
//! the whole compiled document, in registration order, after every built-in
//! rewrite.

use std::fmt;

/// Handler for a custom directive.
///
/// Receives the argument span with its parentheses (`"(10, $foo)"`), `"()"`
/// for empty parentheses, or `""` when the directive had none. The returned
/// text is emitted as is.
pub type DirectiveHandler = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Whole-document transform.
pub type Extension = Box<dyn Fn(&str) -> String + Send + Sync>;

/// A registered custom directive.
pub struct CustomDirective {
    name: String,
    handler: DirectiveHandler,
}

impl CustomDirective {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expand(&self, args: &str) -> String {
        (self.handler)(args)
    }
}

impl fmt::Debug for CustomDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomDirective")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registered custom directives and extensions.
#[derive(Default)]
pub struct DirectiveRegistry {
    directives: Vec<CustomDirective>,
    extensions: Vec<Extension>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directive. A name already registered (ignoring ASCII case)
    /// has its handler replaced in place.
    pub fn register(&mut self, name: impl Into<String>, handler: DirectiveHandler) {
        let name = name.into();
        match self
            .directives
            .iter_mut()
            .find(|d| d.name.eq_ignore_ascii_case(&name))
        {
            Some(existing) => {
                existing.name = name;
                existing.handler = handler;
            }
            None => self.directives.push(CustomDirective { name, handler }),
        }
    }

    /// Look a directive up, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&CustomDirective> {
        self.directives
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn directives(&self) -> &[CustomDirective] {
        &self.directives
    }

    pub fn extend(&mut self, extension: Extension) {
        self.extensions.push(extension);
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    /// Run every extension over `value`, in registration order.
    pub fn apply_extensions(&self, value: String) -> String {
        self.extensions
            .iter()
            .fold(value, |current, extension| extension(&current))
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("directives", &self.directives)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}
