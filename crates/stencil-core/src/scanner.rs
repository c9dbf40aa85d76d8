//! Single-pass template scanner.
//!
//! Walks the template left to right. At each interesting position it tries,
//! in order:
//!
//! 1. `@` forms: tag escapes (`@{{ ... }}`), directive escapes (`@@if`),
//!    `@php ... @endphp` blocks and directives;
//! 2. host code already in the template (`<?php ... ?>`, `<?= ... ?>`),
//!    copied untouched;
//! 3. comments;
//! 4. echo tags.
//!
//! Everything else is copied as literal text. Compiled fragments go straight
//! to the output and are never scanned again.

use std::collections::HashMap;

use tracing::debug;

use crate::balanced::{ParenMatcher, Unbalanced};
use crate::comments::CommentMarkers;
use crate::echo::EchoCompiler;
use crate::registry::DirectiveRegistry;
use crate::session::Session;
use crate::statements::{is_word_char, parse_header_with, HeaderError, StatementCompiler};
use crate::tags::TagConfig;

const HOST_CODE_CLOSE: &str = "?>";
const END_PHP: &str = "@endphp";

/// Closing-delimiter search over the template that remembers its work.
///
/// Once `needle` is known to be absent from some offset onwards, later
/// searches at or past that offset return immediately. Directive argument
/// spans go through a shared [`ParenMatcher`]. Both keep many unmatched
/// openers linear.
struct CloseFinder<'s> {
    source: &'s str,
    exhausted: HashMap<String, usize>,
    parens: ParenMatcher,
}

impl<'s> CloseFinder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            exhausted: HashMap::new(),
            parens: ParenMatcher::new(),
        }
    }

    fn find(&mut self, from: usize, needle: &str) -> Option<usize> {
        if from > self.source.len() {
            return None;
        }
        if let Some(&absent_from) = self.exhausted.get(needle) {
            if from >= absent_from {
                return None;
            }
        }
        match self.source[from..].find(needle) {
            Some(offset) => Some(from + offset),
            None => {
                let entry = self.exhausted.entry(needle.to_string()).or_insert(from);
                *entry = (*entry).min(from);
                None
            }
        }
    }

    /// Argument span at the start of `rest`, which must be a suffix of the
    /// template.
    fn parenthesized<'t>(&mut self, rest: &'t str) -> Result<&'t str, Unbalanced> {
        let open = self.source.len() - rest.len();
        let span = self.parens.extract(self.source, open)?;
        Ok(&rest[..span.len()])
    }

    /// Search relative to `base`, returning an offset relative to `base`.
    fn find_from(&mut self, base: usize, from: usize, needle: &str) -> Option<usize> {
        self.find(base + from, needle).map(|at| at - base)
    }
}

/// Compiles template text with one scanner pass.
pub struct Scanner<'a> {
    echo: EchoCompiler<'a>,
    comments: CommentMarkers,
    statements: StatementCompiler<'a>,
    interesting: Vec<char>,
}

impl<'a> Scanner<'a> {
    pub fn new(tags: &'a TagConfig, echo_format: &'a str, registry: &'a DirectiveRegistry) -> Self {
        let mut interesting = tags.leading_chars();
        interesting.extend(['@', '<']);
        Self {
            echo: EchoCompiler::new(tags, echo_format),
            comments: CommentMarkers::from_tags(tags),
            statements: StatementCompiler::new(registry),
            interesting,
        }
    }

    pub fn compile(&self, source: &str, session: &mut Session) -> String {
        let mut out = String::with_capacity(source.len() + source.len() / 4);
        let mut finder = CloseFinder::new(source);
        let mut pos = 0;

        while pos < source.len() {
            let Some(offset) = source[pos..].find(|c: char| self.interesting.contains(&c)) else {
                out.push_str(&source[pos..]);
                break;
            };
            out.push_str(&source[pos..pos + offset]);
            pos += offset;

            match self.step(source, pos, &mut finder, session, &mut out) {
                Some(consumed) => pos += consumed,
                None => {
                    let ch_len = source[pos..].chars().next().map_or(1, char::len_utf8);
                    out.push_str(&source[pos..pos + ch_len]);
                    pos += ch_len;
                }
            }
        }

        out
    }

    /// Compile whatever starts at `pos`. Returns the bytes consumed, or
    /// `None` (with nothing written) when the position is plain text.
    fn step(
        &self,
        source: &str,
        pos: usize,
        finder: &mut CloseFinder<'_>,
        session: &mut Session,
        out: &mut String,
    ) -> Option<usize> {
        let rest = &source[pos..];

        if rest.starts_with('@') {
            return self.at_sign(source, pos, finder, session, out);
        }

        if let Some(consumed) = host_code_at(rest, |from, needle| finder.find_from(pos, from, needle)) {
            out.push_str(&rest[..consumed]);
            return Some(consumed);
        }

        if let Some((comment, consumed)) = self
            .comments
            .compile_at(rest, |from, needle| finder.find_from(pos, from, needle))
        {
            out.push_str(&comment);
            return Some(consumed);
        }

        let echo = self
            .echo
            .compile_at(rest, |from, needle| finder.find_from(pos, from, needle))?;
        out.push_str(&echo.output);
        Some(echo.consumed)
    }

    fn at_sign(
        &self,
        source: &str,
        pos: usize,
        finder: &mut CloseFinder<'_>,
        session: &mut Session,
        out: &mut String,
    ) -> Option<usize> {
        let after = &source[pos + 1..];

        if let Some(literal) = self.echo.escaped_at(
            after,
            &self.comments.open,
            &self.comments.close,
            |from, needle| finder.find_from(pos + 1, from, needle),
        ) {
            out.push_str(literal);
            return Some(1 + literal.len());
        }

        if source[..pos].chars().next_back().is_some_and(is_word_char) {
            return None;
        }

        if let Some(escaped) = after.strip_prefix('@') {
            return match parse_header_with(escaped, |rest| finder.parenthesized(rest)) {
                Ok(header) => {
                    out.push_str(&after[..1 + header.len]);
                    Some(2 + header.len)
                }
                Err(HeaderError::MalformedArgs { name_len, .. }) => {
                    out.push_str(&after[..1 + name_len]);
                    Some(2 + name_len)
                }
                Err(HeaderError::NoName) => None,
            };
        }

        let header = match parse_header_with(after, |rest| finder.parenthesized(rest)) {
            Ok(header) => header,
            Err(HeaderError::NoName) => return None,
            Err(HeaderError::MalformedArgs { name_len, reason }) => {
                debug!(
                    "leaving @{} literal: malformed arguments ({:?})",
                    &after[..name_len],
                    reason
                );
                out.push('@');
                out.push_str(&after[..name_len]);
                return Some(1 + name_len);
            }
        };

        if header.args.is_none()
            && header.name.eq_ignore_ascii_case("php")
            && !self.statements.is_custom(header.name)
        {
            let body_start = pos + 1 + header.len;
            if let Some(end) = finder.find(body_start, END_PHP) {
                out.push_str("<?php");
                out.push_str(&source[body_start..end]);
                out.push_str(HOST_CODE_CLOSE);
                return Some(end + END_PHP.len() - pos);
            }
        }

        match self.statements.compile(header.name, header.args, session) {
            Some(expanded) => out.push_str(&expanded),
            None => {
                out.push('@');
                out.push_str(header.name);
                return Some(1 + header.name.len());
            }
        }
        Some(1 + header.len)
    }
}

/// Length of the host code run starting at `rest`, through its `?>` (or to
/// the end of input when unterminated).
fn host_code_at(rest: &str, find_close: impl FnOnce(usize, &str) -> Option<usize>) -> Option<usize> {
    let opener = if rest.starts_with("<?=") {
        3
    } else if let Some(after) = rest.strip_prefix("<?php") {
        if !after.is_empty() && !after.starts_with(|c: char| c.is_ascii_whitespace()) {
            return None;
        }
        5
    } else {
        return None;
    };

    Some(match find_close(opener, HOST_CODE_CLOSE) {
        Some(close_at) => close_at + HOST_CODE_CLOSE.len(),
        None => rest.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> String {
        let tags = TagConfig::default();
        let registry = DirectiveRegistry::new();
        let scanner = Scanner::new(&tags, crate::echo::DEFAULT_ECHO_FORMAT, &registry);
        scanner.compile(source, &mut Session::new())
    }

    #[test]
    fn plain_text_is_copied() {
        assert_eq!(scan("hello <b>world</b> { } @ <"), "hello <b>world</b> { } @ <");
    }

    #[test]
    fn multibyte_text_is_copied() {
        assert_eq!(scan("naïve café ✓ {{ $a }}"), "naïve café ✓ <?php echo e($a); ?>");
    }

    #[test]
    fn email_addresses_are_not_directives() {
        assert_eq!(scan("mail user@if.com"), "mail user@if.com");
    }

    #[test]
    fn host_code_is_left_untouched() {
        assert_eq!(
            scan("@if($test) <?php @show('test'); ?> @endif"),
            "<?php if($test): ?> <?php @show('test'); ?> <?php endif; ?>"
        );
        assert_eq!(scan("<?= $a ?>{{ $b }}"), "<?= $a ?><?php echo e($b); ?>");
        assert_eq!(scan("<?xml version=\"1.0\"?>"), "<?xml version=\"1.0\"?>");
    }

    #[test]
    fn unknown_directive_resumes_after_name() {
        assert_eq!(
            scan("@media (min-width: {{ $w }}px)"),
            "@media (min-width: <?php echo e($w); ?>px)"
        );
    }

    #[test]
    fn malformed_arguments_stay_literal() {
        assert_eq!(scan("@if($a {{ $b }}"), "@if($a <?php echo e($b); ?>");
    }

    #[test]
    fn php_blocks_copy_their_body() {
        assert_eq!(
            scan("@php\n$a = '{{ x }}';\n@endphp done"),
            "<?php\n$a = '{{ x }}';\n?> done"
        );
    }

    #[test]
    fn many_unmatched_openers() {
        let source = "{{ ".repeat(2000);
        assert_eq!(scan(&source), source);
    }

    #[test]
    fn many_unclosed_directive_arguments() {
        let source = "@if(".repeat(100_000);
        assert_eq!(scan(&source), source);

        let quoted = "@if('".repeat(100_000);
        assert_eq!(scan(&quoted), quoted);

        let escaped = "@foreach(\\'".repeat(50_000);
        assert_eq!(scan(&escaped), escaped);
    }

    #[test]
    fn arguments_after_unclosed_openers_still_compile() {
        assert_eq!(
            scan("@if( @if( @if($a) x @endif"),
            "@if( @if( <?php if($a): ?> x <?php endif; ?>"
        );
    }

    #[test]
    fn close_finder_remembers_misses() {
        let mut finder = CloseFinder::new("ab }} cd");
        assert_eq!(finder.find(0, "}}"), Some(3));
        assert_eq!(finder.find(4, "}}"), None);
        assert_eq!(finder.find(6, "}}"), None);
        assert_eq!(finder.find(0, "}}"), Some(3));
    }
}
