//! Balanced-delimiter extraction.
//!
//! Directive arguments are opaque expressions; the only structure the
//! compiler needs is where the argument span ends. The scan is a single
//! forward pass with a depth counter and skips delimiters inside single- or
//! double-quoted string literals (backslash escapes honoured).
//! [`ParenMatcher`] answers the same question for many openers in one
//! template without rescanning.

use std::collections::HashMap;

/// Why a balanced span could not be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unbalanced {
    /// The input does not start with the opening delimiter.
    NotOpen,
    /// A string literal starting at this byte offset is never closed.
    UnterminatedString { start: usize },
    /// Input ended with delimiters still open.
    Unclosed { depth: usize },
}

/// Extract the span from `input`'s leading `open` through its matching
/// `close`, both included.
pub fn extract_balanced(input: &str, open: char, close: char) -> Result<&str, Unbalanced> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if c == open => {}
        _ => return Err(Unbalanced::NotOpen),
    }

    let mut depth = 1usize;
    while let Some((i, c)) = chars.next() {
        if c == '\'' || c == '"' {
            let mut terminated = false;
            while let Some((_, inner)) = chars.next() {
                if inner == '\\' {
                    chars.next();
                } else if inner == c {
                    terminated = true;
                    break;
                }
            }
            if !terminated {
                return Err(Unbalanced::UnterminatedString { start: i });
            }
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Ok(&input[..i + c.len_utf8()]);
            }
        }
    }

    Err(Unbalanced::Unclosed { depth })
}

/// [`extract_balanced`] for parentheses.
pub fn extract_parenthesized(input: &str) -> Result<&str, Unbalanced> {
    extract_balanced(input, '(', ')')
}

/// Parenthesis matching over one template that remembers every span it has
/// resolved.
///
/// Results are keyed by absolute byte offset, so a nested `(` seen while
/// scanning one argument list is never rescanned when a later directive
/// starts there. Failures are remembered too, which keeps a run of
/// unclosed `@name(` openers linear. Scanning works on bytes; every
/// delimiter is ASCII, so offsets always land on char boundaries.
#[derive(Debug, Default)]
pub(crate) struct ParenMatcher {
    /// Offset just past a `(` to the offset just past its matching `)`.
    closes: HashMap<usize, Result<usize, Unbalanced>>,
    /// Offset of an opening quote to the offset just past its closing quote.
    strings: HashMap<usize, Option<usize>>,
}

impl ParenMatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Like [`extract_parenthesized`] for the span starting at `open`.
    /// Error offsets are relative to `open`.
    pub(crate) fn extract<'s>(&mut self, source: &'s str, open: usize) -> Result<&'s str, Unbalanced> {
        if source.as_bytes().get(open) != Some(&b'(') {
            return Err(Unbalanced::NotOpen);
        }
        match self.close_after(source.as_bytes(), open + 1) {
            Ok(end) => Ok(&source[open..end]),
            Err(Unbalanced::UnterminatedString { start }) => {
                Err(Unbalanced::UnterminatedString { start: start - open })
            }
            Err(other) => Err(other),
        }
    }

    /// Offset just past the `)` closing the group whose body starts at
    /// `start`. Nested groups are explicit frames, not recursion.
    fn close_after(&mut self, bytes: &[u8], start: usize) -> Result<usize, Unbalanced> {
        if let Some(known) = self.closes.get(&start) {
            return *known;
        }

        // (body start, cursor)
        let mut frames: Vec<(usize, usize)> = vec![(start, start)];
        loop {
            let Some(&(_, cursor)) = frames.last() else {
                return Err(Unbalanced::NotOpen);
            };

            let outcome = match bytes.get(cursor) {
                None => Err(Unbalanced::Unclosed { depth: 1 }),
                Some(b')') => Ok(cursor + 1),
                Some(&quote @ (b'\'' | b'"')) => match self.string_end(bytes, cursor, quote) {
                    Some(after) => {
                        advance(&mut frames, after);
                        continue;
                    }
                    None => Err(Unbalanced::UnterminatedString { start: cursor }),
                },
                Some(b'(') => match self.closes.get(&(cursor + 1)) {
                    Some(Ok(after)) => {
                        advance(&mut frames, *after);
                        continue;
                    }
                    Some(Err(inner)) => Err(enclose(*inner)),
                    None => {
                        frames.push((cursor + 1, cursor + 1));
                        continue;
                    }
                },
                Some(_) => {
                    advance(&mut frames, cursor + 1);
                    continue;
                }
            };

            // The innermost frame is resolved; settle it and hand the result
            // to its parent. A failure fails every enclosing frame.
            let mut outcome = outcome;
            while let Some((body, _)) = frames.pop() {
                self.closes.insert(body, outcome);
                match outcome {
                    Ok(after) => {
                        if frames.is_empty() {
                            return Ok(after);
                        }
                        advance(&mut frames, after);
                        break;
                    }
                    Err(err) => outcome = Err(enclose(err)),
                }
            }
            if frames.is_empty() {
                return outcome.map_err(|err| match err {
                    Unbalanced::Unclosed { depth } => Unbalanced::Unclosed { depth: depth - 1 },
                    other => other,
                });
            }
        }
    }

    /// Offset just past the quote closing the literal opened at `open`.
    fn string_end(&mut self, bytes: &[u8], open: usize, quote: u8) -> Option<usize> {
        if let Some(known) = self.strings.get(&open) {
            return *known;
        }

        // Escaped quotes of the same kind end at the same place as a literal
        // opened on them would.
        let mut escaped_quotes = Vec::new();
        let mut i = open + 1;
        let end = loop {
            match bytes.get(i) {
                None => break None,
                Some(b'\\') => {
                    if bytes.get(i + 1) == Some(&quote) {
                        escaped_quotes.push(i + 1);
                    }
                    i += 2;
                }
                Some(&b) if b == quote => break Some(i + 1),
                Some(_) => i += 1,
            }
        };

        self.strings.insert(open, end);
        for at in escaped_quotes {
            self.strings.insert(at, end);
        }
        end
    }
}

fn advance(frames: &mut [(usize, usize)], to: usize) {
    if let Some(frame) = frames.last_mut() {
        frame.1 = to;
    }
}

/// A failure seen from one group further out.
fn enclose(err: Unbalanced) -> Unbalanced {
    match err {
        Unbalanced::Unclosed { depth } => Unbalanced::Unclosed { depth: depth + 1 },
        other => other,
    }
}

/// Strip one pair of outer parentheses, if present.
pub fn strip_parens(expression: &str) -> &str {
    expression
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(expression)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_span() {
        assert_eq!(extract_parenthesized("($foo) rest"), Ok("($foo)"));
        assert_eq!(extract_parenthesized("()"), Ok("()"));
    }

    #[test]
    fn nested_parentheses() {
        assert_eq!(
            extract_parenthesized("(foo(bar(baz(qux(breeze()))))) space () x"),
            Ok("(foo(bar(baz(qux(breeze())))))")
        );
    }

    #[test]
    fn parentheses_inside_strings_are_ignored() {
        assert_eq!(
            extract_parenthesized("(function_call('foo(blah)')) bar"),
            Ok("(function_call('foo(blah)'))")
        );
        assert_eq!(
            extract_parenthesized(r#"(say("smile :)")) tail"#),
            Ok(r#"(say("smile :)"))"#)
        );
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        assert_eq!(
            extract_parenthesized(r"('it\'s (fine)')!"),
            Ok(r"('it\'s (fine)')")
        );
    }

    #[test]
    fn multibyte_content() {
        assert_eq!(extract_parenthesized("('héllo') ✓"), Ok("('héllo')"));
    }

    #[test]
    fn failures() {
        assert_eq!(extract_parenthesized("foo()"), Err(Unbalanced::NotOpen));
        assert_eq!(
            extract_parenthesized("(foo(bar)"),
            Err(Unbalanced::Unclosed { depth: 1 })
        );
        assert_eq!(
            extract_parenthesized("('open)"),
            Err(Unbalanced::UnterminatedString { start: 1 })
        );
    }

    #[test]
    fn square_brackets() {
        assert_eq!(extract_balanced("['a]'][0]", '[', ']'), Ok("['a]']"));
    }

    #[test]
    fn matcher_agrees_with_single_extraction() {
        let cases = [
            "($foo) rest",
            "(foo(bar(baz(qux(breeze()))))) space () x",
            "(function_call('foo(blah)')) bar",
            r"('it\'s (fine)')!",
            "('héllo') ✓",
            "(foo(bar)",
            "(foo(bar",
            "('open)",
        ];
        for case in cases {
            let mut matcher = ParenMatcher::new();
            assert_eq!(matcher.extract(case, 0), extract_parenthesized(case), "{case}");
        }
    }

    #[test]
    fn matcher_reuses_nested_spans() {
        let source = "x(a(b)c) (d";
        let mut matcher = ParenMatcher::new();
        assert_eq!(matcher.extract(source, 1), Ok("(a(b)c)"));
        assert_eq!(matcher.extract(source, 3), Ok("(b)"));
        assert_eq!(matcher.extract(source, 9), Err(Unbalanced::Unclosed { depth: 1 }));
        assert_eq!(matcher.extract(source, 0), Err(Unbalanced::NotOpen));
    }

    #[test]
    fn matcher_reports_offsets_relative_to_opener() {
        let source = "@if(f('x) @if(g(";
        let mut matcher = ParenMatcher::new();
        assert_eq!(
            matcher.extract(source, 3),
            Err(Unbalanced::UnterminatedString { start: 3 })
        );
        assert_eq!(matcher.extract(source, 13), Err(Unbalanced::Unclosed { depth: 2 }));
    }

    #[test]
    fn matcher_shares_escaped_quote_ends() {
        let source = r"(f('\'(x\'')) (\'";
        let mut matcher = ParenMatcher::new();
        assert_eq!(matcher.extract(source, 0), Ok(r"(f('\'(x\''))"));
        assert_eq!(matcher.extract(source, 6), Ok(r"(x\'')"));
        assert_eq!(
            matcher.extract(source, 14),
            Err(Unbalanced::UnterminatedString { start: 2 })
        );
    }

    #[test]
    fn strip_outer_parens() {
        assert_eq!(strip_parens("('foo')"), "'foo'");
        assert_eq!(strip_parens("name(foo)"), "name(foo)");
        assert_eq!(strip_parens(""), "");
    }
}
