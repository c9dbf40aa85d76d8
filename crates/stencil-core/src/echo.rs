//! Echo tag compilation.
//!
//! ```text
//! {!! $html !!}          ->  <?php echo $html; ?>
//! {{ $name }}            ->  <?php echo e($name); ?>        (echo format)
//! {{{ $name }}}          ->  <?php echo e($name); ?>        (always escaped)
//! {{ $name or 'anon' }}  ->  <?php echo e(isset($name) ? $name : 'anon'); ?>
//! @{{ $name }}           ->  {{ $name }}
//! ```

use std::borrow::Cow;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace1},
    combinator::{opt, recognize},
    multi::many0,
    sequence::{pair, preceded, tuple},
    IResult,
};

use crate::balanced::extract_balanced;
use crate::error::CompilerError;
use crate::tags::{EchoKind, TagConfig};

/// Default echo format: every content echo goes through the HTML escaper.
pub const DEFAULT_ECHO_FORMAT: &str = "e(%s)";

/// Format used by the escaped family regardless of the configured format.
const ESCAPE_FORMAT: &str = "e(%s)";

/// A compiled echo tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoMatch {
    pub output: String,
    /// Bytes of source consumed, including a trailing line ending.
    pub consumed: usize,
}

/// Rewrites echo tags into code runs.
#[derive(Debug)]
pub struct EchoCompiler<'a> {
    tags: &'a TagConfig,
    format: &'a str,
    order: [EchoKind; 3],
}

impl<'a> EchoCompiler<'a> {
    pub fn new(tags: &'a TagConfig, format: &'a str) -> Self {
        Self {
            tags,
            format,
            order: tags.echo_order(),
        }
    }

    /// Compile the echo tag starting at the beginning of `rest`.
    ///
    /// `find_close(from, marker)` returns the byte offset in `rest` of the
    /// first `marker` at or after `from`.
    pub fn compile_at(
        &self,
        rest: &str,
        mut find_close: impl FnMut(usize, &str) -> Option<usize>,
    ) -> Option<EchoMatch> {
        for kind in self.order {
            let pair = self.tags.pair(kind);
            if !rest.starts_with(&pair.open) {
                continue;
            }
            let Some(close_at) = first_close(rest, pair.open.len(), &pair.close, &mut find_close)
            else {
                continue;
            };

            let expression = rest[pair.open.len()..close_at].trim();
            if expression.is_empty() {
                continue;
            }

            let mut consumed = close_at + pair.close.len();
            let line_ending = line_ending_at(&rest[consumed..]);
            consumed += line_ending.len();

            let mut output = self.echo(kind, &compile_echo_defaults(expression));
            output.push_str(line_ending);
            output.push_str(line_ending);
            return Some(EchoMatch { output, consumed });
        }
        None
    }

    /// Handle `@` followed by an echo or comment tag: the tag text itself is
    /// reproduced without the `@`. `rest` starts just after the `@`.
    ///
    /// Returns the literal text and the bytes of `rest` consumed.
    pub fn escaped_at<'r>(
        &self,
        rest: &'r str,
        comment_open: &str,
        comment_close: &str,
        mut find_close: impl FnMut(usize, &str) -> Option<usize>,
    ) -> Option<&'r str> {
        if rest.starts_with(comment_open) {
            if let Some(close_at) = find_close(comment_open.len(), comment_close) {
                return Some(&rest[..close_at + comment_close.len()]);
            }
        }
        for kind in self.order {
            let pair = self.tags.pair(kind);
            if !rest.starts_with(&pair.open) {
                continue;
            }
            if let Some(close_at) = first_close(rest, pair.open.len(), &pair.close, &mut find_close)
            {
                return Some(&rest[..close_at + pair.close.len()]);
            }
        }
        None
    }

    fn echo(&self, kind: EchoKind, expression: &str) -> String {
        let wrapped = match kind {
            EchoKind::Raw => expression.to_string(),
            EchoKind::Content => apply_format(self.format, expression),
            EchoKind::Escaped => apply_format(ESCAPE_FORMAT, expression),
        };
        format!("<?php echo {}; ?>", wrapped)
    }
}

/// Locate the closing marker, leaving at least one character of expression.
fn first_close(
    rest: &str,
    open_len: usize,
    close: &str,
    find_close: &mut impl FnMut(usize, &str) -> Option<usize>,
) -> Option<usize> {
    let first_char = rest[open_len..].chars().next()?;
    find_close(open_len + first_char.len_utf8(), close)
}

fn line_ending_at(rest: &str) -> &str {
    if rest.starts_with("\r\n") {
        &rest[..2]
    } else if rest.starts_with('\n') {
        &rest[..1]
    } else {
        ""
    }
}

/// Reject an echo format with no `%s`; it would drop the echoed expression.
pub(crate) fn validate_echo_format(format: &str) -> Result<(), CompilerError> {
    if format.contains("%s") {
        Ok(())
    } else {
        Err(CompilerError::InvalidConfig(format!(
            "echo_format {:?} has no %s placeholder",
            format
        )))
    }
}

/// Substitute the expression for the first `%s` of `format`.
pub fn apply_format(format: &str, expression: &str) -> String {
    format.replacen("%s", expression, 1)
}

/// Rewrite `$var or default` into a presence-checked ternary.
///
/// Only a bare variable path on the left of a free-standing `or` triggers
/// the rewrite; everything else is returned unchanged.
pub fn compile_echo_defaults(expression: &str) -> Cow<'_, str> {
    match or_default(expression) {
        Ok(("", (variable, default)))
            if !default.is_empty() && !contains_free_standing_or(default) =>
        {
            Cow::Owned(format!("isset({0}) ? {0} : {1}", variable, default))
        }
        _ => Cow::Borrowed(expression),
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_identifier_char),
    ))(input)
}

fn index_access(input: &str) -> IResult<&str, &str> {
    match extract_balanced(input, '[', ']') {
        Ok(span) => Ok((&input[span.len()..], span)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        ))),
    }
}

/// `$user`, `$user->name`, `$items[0]['id']`, `$class::$registry`.
fn variable_path(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        char('$'),
        identifier,
        many0(alt((
            preceded(tag("->"), identifier),
            preceded(tag("::"), recognize(pair(opt(char('$')), identifier))),
            index_access,
        ))),
    )))(input)
}

fn or_default(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, variable) = variable_path(input)?;
    let (input, _) = tuple((multispace1, tag("or"), multispace1))(input)?;
    Ok(("", (variable, input)))
}

/// Whether `text` contains `or` as a whitespace-delimited word at the top
/// level: outside string literals and outside any bracket pair.
fn contains_free_standing_or(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b'o' if depth == 0
                    && bytes.get(i + 1) == Some(&b'r')
                    && i > 0
                    && bytes[i - 1].is_ascii_whitespace()
                    && bytes.get(i + 2).is_some_and(|n| n.is_ascii_whitespace()) =>
                {
                    return true;
                }
                _ => {}
            },
        }
        i += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Option<EchoMatch> {
        let tags = TagConfig::default();
        EchoCompiler::new(&tags, DEFAULT_ECHO_FORMAT)
            .compile_at(source, |from, close| source[from..].find(close).map(|i| from + i))
    }

    fn output(source: &str) -> String {
        compile(source).expect("echo should compile").output
    }

    #[test]
    fn the_three_families() {
        assert_eq!(output("{!! $name !!}"), "<?php echo $name; ?>");
        assert_eq!(output("{{ $name }}"), "<?php echo e($name); ?>");
        assert_eq!(output("{{{ $name }}}"), "<?php echo e($name); ?>");
    }

    #[test]
    fn consumed_includes_one_line_ending() {
        let m = compile("{{ $a }}\r\nnext").unwrap();
        assert_eq!(m.output, "<?php echo e($a); ?>\r\n\r\n");
        assert_eq!(m.consumed, "{{ $a }}\r\n".len());
    }

    #[test]
    fn close_marker_needs_an_expression() {
        assert_eq!(compile("{{}}"), None);
        assert_eq!(compile("{{   }}"), None);
        assert_eq!(compile("{{ $a"), None);
    }

    #[test]
    fn no_escape_format_behaves_like_raw() {
        let tags = TagConfig::default();
        let source = "{{ $name }}";
        let m = EchoCompiler::new(&tags, "%s")
            .compile_at(source, |from, close| source[from..].find(close).map(|i| from + i))
            .unwrap();
        assert_eq!(m.output, "<?php echo $name; ?>");
    }

    #[test]
    fn or_defaults_on_bare_variables() {
        assert_eq!(
            compile_echo_defaults("$name or 'foo'"),
            "isset($name) ? $name : 'foo'"
        );
        assert_eq!(
            compile_echo_defaults("$user->name or \"foo\""),
            "isset($user->name) ? $user->name : \"foo\""
        );
        assert_eq!(
            compile_echo_defaults("$items['a b'][0] or 90"),
            "isset($items['a b'][0]) ? $items['a b'][0] : 90"
        );
        assert_eq!(
            compile_echo_defaults("$age\n  or\n 90"),
            "isset($age) ? $age : 90"
        );
    }

    #[test]
    fn or_inside_other_expressions_is_left_alone() {
        for expression in [
            "$foo + $or + $baz",
            "\"Hello world or foo\"",
            "'Hello world or foo'",
            "myfunc('foo or bar')",
            "myfunc(\"$name or 'foo'\")",
            "$a + $b or 'c'",
            "$a or $b or 'c'",
            "$name or ",
            "$orange",
        ] {
            assert_eq!(compile_echo_defaults(expression), expression);
        }
    }

    #[test]
    fn nested_or_in_default_is_allowed() {
        assert_eq!(
            compile_echo_defaults("$a or foo(1 or 2)"),
            "isset($a) ? $a : foo(1 or 2)"
        );
        assert_eq!(
            compile_echo_defaults("$a or [$b or $c]"),
            "isset($a) ? $a : [$b or $c]"
        );
        assert_eq!(compile_echo_defaults("$a or f(x) or 'c'"), "$a or f(x) or 'c'");
    }

    #[test]
    fn quoted_or_in_default_is_allowed() {
        assert_eq!(
            compile_echo_defaults("$title or 'this or that'"),
            "isset($title) ? $title : 'this or that'"
        );
    }

    #[test]
    fn escaped_tags_are_reproduced() {
        let tags = TagConfig::default();
        let compiler = EchoCompiler::new(&tags, DEFAULT_ECHO_FORMAT);
        let rest = "{{ $name }}\n tail";
        let literal = compiler
            .escaped_at(rest, "{{--", "--}}", |from, close| {
                rest[from..].find(close).map(|i| from + i)
            })
            .unwrap();
        assert_eq!(literal, "{{ $name }}");
    }
}
