//! Template comments.
//!
//! `{{-- text --}}` becomes `<?php /* text */ ?>`. The closing marker is
//! located with one forward substring search, so very long comments cost
//! time linear in their length.

use crate::tags::TagConfig;

/// Comment open/close markers derived from the content tags.
#[derive(Debug, Clone)]
pub struct CommentMarkers {
    pub open: String,
    pub close: String,
}

impl CommentMarkers {
    pub fn from_tags(tags: &TagConfig) -> Self {
        Self {
            open: tags.comment_open(),
            close: tags.comment_close(),
        }
    }

    /// Compile the comment starting at the beginning of `rest`.
    ///
    /// `find_close` locates the closing marker at or after a byte offset of
    /// `rest`. Returns the host comment and the number of bytes consumed.
    pub fn compile_at(
        &self,
        rest: &str,
        find_close: impl FnOnce(usize, &str) -> Option<usize>,
    ) -> Option<(String, usize)> {
        if !rest.starts_with(&self.open) {
            return None;
        }
        let inner_start = self.open.len();
        let close_at = find_close(inner_start, &self.close)?;
        let inner = &rest[inner_start..close_at];
        Some((
            format!("<?php /*{}*/ ?>", inner),
            close_at + self.close.len(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(rest: &str) -> Option<(String, usize)> {
        let markers = CommentMarkers::from_tags(&TagConfig::default());
        markers.compile_at(rest, |from, close| rest[from..].find(close).map(|i| from + i))
    }

    #[test]
    fn single_line() {
        assert_eq!(
            compile("{{--this is a comment--}} tail"),
            Some(("<?php /*this is a comment*/ ?>".to_string(), 25))
        );
    }

    #[test]
    fn multi_line() {
        let (out, _) = compile("{{--\nthis is a comment\n--}}").unwrap();
        assert_eq!(out, "<?php /*\nthis is a comment\n*/ ?>");
    }

    #[test]
    fn unterminated_comment_is_not_compiled() {
        assert_eq!(compile("{{-- dangling"), None);
        assert_eq!(compile("{{ $x }}"), None);
    }

    #[test]
    fn custom_content_tags_move_comment_markers() {
        let tags = TagConfig {
            content: crate::tags::TagPair::new("[[", "]]"),
            ..TagConfig::default()
        };
        let markers = CommentMarkers::from_tags(&tags);
        assert_eq!(markers.open, "[[--");
        assert_eq!(markers.close, "--]]");
    }
}
