//! Per-call compilation state.
//!
//! A `Session` lives for exactly one `compile_string` call, so nothing a
//! template does (forelse ordinals, `@extends` footers, verbatim blocks) can
//! leak into the next compilation.

use crate::verbatim::VerbatimBlocks;

/// Mutable state for one compilation.
#[derive(Debug, Default)]
pub struct Session {
    /// Last forelse ordinal handed out.
    forelse_counter: usize,
    /// Ordinals of the `@forelse` loops still waiting for their `@empty`.
    open_forelse: Vec<usize>,
    /// Deferred parent-view render calls.
    footer: Vec<String>,
    /// Verbatim block bodies, indexed by placeholder number.
    pub(crate) verbatim_blocks: VerbatimBlocks,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the flag ordinal for a new `@forelse`.
    pub fn open_forelse(&mut self) -> usize {
        self.forelse_counter += 1;
        self.open_forelse.push(self.forelse_counter);
        self.forelse_counter
    }

    /// Ordinal of the innermost open `@forelse`, closing it.
    ///
    /// A stray `@empty` refers to the most recently allocated ordinal.
    pub fn close_forelse(&mut self) -> usize {
        self.open_forelse.pop().unwrap_or(self.forelse_counter)
    }

    pub fn push_footer(&mut self, code: String) {
        self.footer.push(code);
    }

    pub fn has_footer(&self) -> bool {
        !self.footer.is_empty()
    }

    /// Append the footer to the compiled document.
    ///
    /// Leading line breaks are dropped, trailing ones collapse to a single
    /// `\n`, and footer entries follow in reverse registration order.
    pub fn finish(self, compiled: String) -> String {
        if self.footer.is_empty() {
            return compiled;
        }

        let body = compiled
            .trim_start_matches(['\r', '\n'])
            .trim_end_matches(['\r', '\n']);

        let mut result = String::with_capacity(body.len() + 1 + self.footer.len() * 96);
        result.push_str(body);
        result.push('\n');
        let footer: Vec<&str> = self.footer.iter().rev().map(String::as_str).collect();
        result.push_str(&footer.join("\n"));
        result
    }
}
