//! Echo tag configuration.
//!
//! Three echo families share the template text:
//!
//! | family    | default       | output                         |
//! |-----------|---------------|--------------------------------|
//! | raw       | `{!!` `!!}`   | printed as is                  |
//! | content   | `{{` `}}`     | wrapped in the echo format     |
//! | escaped   | `{{{` `}}}`   | always HTML-escaped            |
//!
//! Comment markers are derived from the content tags (`{{--` / `--}}`).

use serde::{Deserialize, Serialize};

use crate::error::CompilerError;

/// An opening and closing marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagPair {
    pub open: String,
    pub close: String,
}

impl TagPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Borrow the pair as a tuple.
    pub fn as_tuple(&self) -> (&str, &str) {
        (&self.open, &self.close)
    }

    pub(crate) fn validate(&self, family: &str) -> Result<(), CompilerError> {
        if self.open.is_empty() || self.close.is_empty() {
            return Err(CompilerError::InvalidConfig(format!(
                "{} tags must have non-empty open and close markers",
                family
            )));
        }
        Ok(())
    }
}

/// Echo tag family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EchoKind {
    /// Unescaped output.
    Raw,
    /// Output wrapped in the configurable echo format.
    Content,
    /// Output that is always HTML-escaped.
    Escaped,
}

/// Active open/close markers for every echo family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub raw: TagPair,
    pub content: TagPair,
    pub escaped: TagPair,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            raw: TagPair::new("{!!", "!!}"),
            content: TagPair::new("{{", "}}"),
            escaped: TagPair::new("{{{", "}}}"),
        }
    }
}

impl TagConfig {
    pub fn pair(&self, kind: EchoKind) -> &TagPair {
        match kind {
            EchoKind::Raw => &self.raw,
            EchoKind::Content => &self.content,
            EchoKind::Escaped => &self.escaped,
        }
    }

    /// Families in matching order: longest opening marker first, ties going
    /// to raw, then escaped, then content.
    pub fn echo_order(&self) -> [EchoKind; 3] {
        let mut kinds = [EchoKind::Raw, EchoKind::Escaped, EchoKind::Content];
        kinds.sort_by(|a, b| {
            let a_len = self.pair(*a).open.chars().count();
            let b_len = self.pair(*b).open.chars().count();
            b_len.cmp(&a_len)
        });
        kinds
    }

    pub fn comment_open(&self) -> String {
        format!("{}--", self.content.open)
    }

    pub fn comment_close(&self) -> String {
        format!("--{}", self.content.close)
    }

    /// First characters of every opening marker, used by the scanner to skip
    /// plain text quickly.
    pub(crate) fn leading_chars(&self) -> Vec<char> {
        let mut chars: Vec<char> = [&self.raw, &self.content, &self.escaped]
            .iter()
            .filter_map(|pair| pair.open.chars().next())
            .collect();
        chars.sort_unstable();
        chars.dedup();
        chars
    }

    pub fn validate(&self) -> Result<(), CompilerError> {
        self.raw.validate("raw")?;
        self.content.validate("content")?;
        self.escaped.validate("escaped")
    }
}
