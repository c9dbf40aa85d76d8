//! Directive header parsing and dispatch.
//!
//! A header is `name`, optional spaces or tabs, then an optional balanced
//! argument span:
//!
//! ```text
//! @foreach ($users as $user)
//!  ^^^^^^^ ^^^^^^^^^^^^^^^^^
//!  name    args (parentheses included)
//! ```
//!
//! Dispatch order is custom directive, then built-in. Names nobody claims
//! are left to the caller to emit literally.

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    combinator::{opt, recognize},
    sequence::pair,
    IResult,
};

use crate::balanced::{extract_parenthesized, Unbalanced};
use crate::directives::Builtin;
use crate::registry::DirectiveRegistry;
use crate::session::Session;

/// A parsed directive header, borrowed from the template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveHeader<'a> {
    pub name: &'a str,
    /// Argument span with its parentheses.
    pub args: Option<&'a str>,
    /// Bytes covered: the name, plus the whitespace and argument span when
    /// arguments are present.
    pub len: usize,
}

/// Why a header could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// No word character follows the `@`.
    NoName,
    /// The name parsed but its argument span is malformed.
    MalformedArgs { name_len: usize, reason: Unbalanced },
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn word(input: &str) -> IResult<&str, &str> {
    take_while1(is_word_char)(input)
}

/// `name` or `name::member`.
fn directive_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(word, opt(pair(tag("::"), word))))(input)
}

fn inline_space(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c == ' ' || c == '\t')(input)
}

/// Parse the header at the start of `input` (the text after the `@`).
pub fn parse_header(input: &str) -> Result<DirectiveHeader<'_>, HeaderError> {
    parse_header_with(input, extract_parenthesized)
}

/// [`parse_header`] with the argument span located by `extract_args`, which
/// receives the text starting at the `(`.
pub(crate) fn parse_header_with<'a>(
    input: &'a str,
    extract_args: impl FnOnce(&'a str) -> Result<&'a str, Unbalanced>,
) -> Result<DirectiveHeader<'a>, HeaderError> {
    let (after_name, name) = directive_name(input).map_err(|_| HeaderError::NoName)?;
    let (after_space, space) = match inline_space(after_name) {
        Ok(parsed) => parsed,
        Err(_) => (after_name, ""),
    };

    if !after_space.starts_with('(') {
        return Ok(DirectiveHeader {
            name,
            args: None,
            len: name.len(),
        });
    }

    match extract_args(after_space) {
        Ok(args) => Ok(DirectiveHeader {
            name,
            args: Some(args),
            len: name.len() + space.len() + args.len(),
        }),
        Err(reason) => Err(HeaderError::MalformedArgs {
            name_len: name.len(),
            reason,
        }),
    }
}

/// Expands directives against the registry and the built-in table.
#[derive(Debug, Clone, Copy)]
pub struct StatementCompiler<'a> {
    registry: &'a DirectiveRegistry,
}

impl<'a> StatementCompiler<'a> {
    pub fn new(registry: &'a DirectiveRegistry) -> Self {
        Self { registry }
    }

    /// Whether `name` is claimed by a custom directive.
    pub fn is_custom(&self, name: &str) -> bool {
        self.registry.get(name).is_some()
    }

    /// Expand one directive, or `None` when the name is unknown.
    pub fn compile(&self, name: &str, args: Option<&str>, session: &mut Session) -> Option<String> {
        if let Some(custom) = self.registry.get(name) {
            return Some(custom.expand(args.unwrap_or("")));
        }
        Builtin::lookup(name).map(|builtin| builtin.compile(args, session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_without_args() {
        let header = parse_header("endforeach\n").unwrap();
        assert_eq!(header.name, "endforeach");
        assert_eq!(header.args, None);
        assert_eq!(header.len, 10);
    }

    #[test]
    fn whitespace_before_args_is_covered() {
        let header = parse_header("unset \t($x) rest").unwrap();
        assert_eq!(header.name, "unset");
        assert_eq!(header.args, Some("($x)"));
        assert_eq!(header.len, "unset \t($x)".len());
    }

    #[test]
    fn whitespace_without_args_is_not_covered() {
        let header = parse_header("else  text").unwrap();
        assert_eq!(header.len, 4);
    }

    #[test]
    fn namespaced_names() {
        assert_eq!(parse_header("foo::bar(1)").unwrap().name, "foo::bar");
        assert_eq!(parse_header("foo::").unwrap().name, "foo");
    }

    #[test]
    fn non_ascii_does_not_start_a_name() {
        assert_eq!(parse_header("é"), Err(HeaderError::NoName));
        assert_eq!(parse_header(" if"), Err(HeaderError::NoName));
    }

    #[test]
    fn malformed_args() {
        assert_eq!(
            parse_header("if($a"),
            Err(HeaderError::MalformedArgs {
                name_len: 2,
                reason: Unbalanced::Unclosed { depth: 1 },
            })
        );
    }

    #[test]
    fn custom_directive_wins() {
        let mut registry = DirectiveRegistry::new();
        registry.register("foreach", Box::new(|_| "custom".into()));
        let statements = StatementCompiler::new(&registry);
        let mut session = Session::new();
        assert_eq!(
            statements.compile("foreach", Some("($a as $b)"), &mut session),
            Some("custom".into())
        );
        assert_eq!(
            statements.compile("endforeach", None, &mut session),
            Some("<?php endforeach; ?>".into())
        );
        assert_eq!(statements.compile("media", None, &mut session), None);
    }

    #[test]
    fn custom_directive_gets_empty_args_when_absent() {
        let mut registry = DirectiveRegistry::new();
        registry.register("args", Box::new(|a| format!("[{}]", a)));
        let statements = StatementCompiler::new(&registry);
        let mut session = Session::new();
        assert_eq!(statements.compile("args", None, &mut session).unwrap(), "[]");
        assert_eq!(statements.compile("args", Some("()"), &mut session).unwrap(), "[()]");
    }
}
