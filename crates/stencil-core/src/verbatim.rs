//! Verbatim blocks.
//!
//! `@verbatim ... @endverbatim` bodies are lifted out before any other
//! rewriting, replaced by numbered placeholders, and put back once the
//! document is otherwise complete.
//!
//! A placeholder reads `@__verbatim_<nonce>_<index>__`. The nonce is chosen
//! per call so that the prefix appears nowhere in the template, which keeps
//! author text that merely looks like a placeholder untouched. Placeholders
//! never end in a tag or marker character, so an adjacent `@{{` escape
//! cannot swallow them.

use std::borrow::Cow;
use std::collections::HashSet;

use tracing::trace;

const OPEN: &str = "@verbatim";
const CLOSE: &str = "@endverbatim";
const PLACEHOLDER_PREFIX: &str = "@__verbatim_";
const PLACEHOLDER_SUFFIX: &str = "__";

/// Bodies lifted out of one template, and the placeholder prefix chosen for
/// it.
#[derive(Debug, Default)]
pub struct VerbatimBlocks {
    prefix: String,
    bodies: Vec<String>,
}

impl VerbatimBlocks {
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    fn placeholder(&self, index: usize) -> String {
        format!("{}{}{}", self.prefix, index, PLACEHOLDER_SUFFIX)
    }
}

/// `@__verbatim_<n>_` for the smallest `n` whose prefix `value` lacks.
fn unused_prefix(value: &str) -> String {
    let taken: HashSet<usize> = value
        .match_indices(PLACEHOLDER_PREFIX)
        .filter_map(|(at, _)| {
            let after = &value[at + PLACEHOLDER_PREFIX.len()..];
            let digits = after.bytes().take_while(u8::is_ascii_digit).count();
            after[digits..]
                .starts_with('_')
                .then(|| after[..digits].parse::<usize>().ok())
                .flatten()
        })
        .collect();
    let nonce = (0..=taken.len()).find(|n| !taken.contains(n)).unwrap_or(taken.len());
    format!("{}{}_", PLACEHOLDER_PREFIX, nonce)
}

/// Replace every verbatim block with a placeholder, pushing the bodies onto
/// `blocks`. An `@verbatim` preceded by `@` is an escape and is skipped; one
/// without a closing `@endverbatim` is left as it is.
pub fn store_blocks<'a>(value: &'a str, blocks: &mut VerbatimBlocks) -> Cow<'a, str> {
    if !value.contains(OPEN) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut pos = 0;
    let mut search = 0;

    while let Some(found) = value[search..].find(OPEN) {
        let start = search + found;
        if value[..start].ends_with('@') {
            search = start + OPEN.len();
            continue;
        }

        let body_start = start + OPEN.len();
        let Some(end) = value[body_start..].find(CLOSE) else {
            break;
        };
        let body_end = body_start + end;

        if blocks.prefix.is_empty() {
            blocks.prefix = unused_prefix(value);
        }
        out.push_str(&value[pos..start]);
        out.push_str(&blocks.placeholder(blocks.bodies.len()));
        blocks.bodies.push(value[body_start..body_end].to_string());

        pos = body_end + CLOSE.len();
        search = pos;
    }

    if blocks.is_empty() {
        return Cow::Borrowed(value);
    }

    trace!("stored {} verbatim block(s)", blocks.len());
    out.push_str(&value[pos..]);
    Cow::Owned(out)
}

/// Put stored verbatim bodies back in place of their placeholders.
pub fn restore_blocks(value: String, blocks: &VerbatimBlocks) -> String {
    if blocks.is_empty() {
        return value;
    }

    let prefix = blocks.prefix.as_str();
    let mut out = String::with_capacity(value.len() + blocks.bodies.iter().map(String::len).sum::<usize>());
    let mut rest = value.as_str();

    while let Some(found) = rest.find(prefix) {
        out.push_str(&rest[..found]);
        let after = &rest[found + prefix.len()..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();

        let block = after[..digits]
            .parse::<usize>()
            .ok()
            .filter(|_| after[digits..].starts_with(PLACEHOLDER_SUFFIX))
            .and_then(|index| blocks.bodies.get(index));

        match block {
            Some(body) => {
                out.push_str(body);
                rest = &after[digits + PLACEHOLDER_SUFFIX.len()..];
            }
            None => {
                out.push_str(prefix);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(value: &str) -> (String, VerbatimBlocks) {
        let mut blocks = VerbatimBlocks::default();
        let stored = store_blocks(value, &mut blocks).into_owned();
        (stored, blocks)
    }

    #[test]
    fn text_without_blocks_is_borrowed() {
        let mut blocks = VerbatimBlocks::default();
        assert!(matches!(
            store_blocks("{{ $a }}", &mut blocks),
            Cow::Borrowed(_)
        ));
        assert!(blocks.is_empty());
    }

    #[test]
    fn blocks_are_numbered_in_order() {
        let (stored, blocks) =
            store("@verbatim {{ $a }} @endverbatim {{ $b }} @verbatim {{ $c }} @endverbatim");
        assert_eq!(stored, "@__verbatim_0_0__ {{ $b }} @__verbatim_0_1__");
        assert_eq!(blocks.bodies, vec![" {{ $a }} ", " {{ $c }} "]);
    }

    #[test]
    fn escaped_open_marker_is_skipped() {
        let (stored, blocks) = store("@@verbatim x @endverbatim");
        assert_eq!(stored, "@@verbatim x @endverbatim");
        assert!(blocks.is_empty());
    }

    #[test]
    fn unterminated_block_is_left_alone() {
        let (stored, blocks) = store("@verbatim {{ $a }}");
        assert_eq!(stored, "@verbatim {{ $a }}");
        assert_eq!(blocks.len(), 0);
    }

    #[test]
    fn restore_round_trip() {
        let (stored, blocks) = store("a @verbatim @if($x) @endverbatim b");
        assert_eq!(restore_blocks(stored, &blocks), "a  @if($x)  b");
    }

    #[test]
    fn nonce_avoids_placeholder_lookalikes_in_the_template() {
        let source = "@verbatim x @endverbatim @__verbatim_0_0__ @__verbatim_2_0__";
        let (stored, blocks) = store(source);
        assert_eq!(blocks.prefix, "@__verbatim_1_");
        assert_eq!(
            restore_blocks(stored, &blocks),
            " x  @__verbatim_0_0__ @__verbatim_2_0__"
        );
    }

    #[test]
    fn unknown_placeholders_survive_restore() {
        let (_, blocks) = store("@verbatim x @endverbatim");
        assert_eq!(
            restore_blocks("@__verbatim_0_7__ @__verbatim_0_0__".into(), &blocks),
            "@__verbatim_0_7__ x"
        );
    }
}
