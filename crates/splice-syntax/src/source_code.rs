//! Immutable token snapshots with their span forest.

use std::sync::Arc;

use crate::span_tree::SpanTree;
use crate::token::Token;

/// An ordered token sequence overlaid with a [`SpanTree`].
///
/// The token list is shared behind an [`Arc`]; an editor publishes a new
/// list when it applies staged changes, so readers holding the previous
/// list never observe a partial edit.
#[derive(Debug, Clone, Default)]
pub struct SourceCode {
    tokens: Arc<[Token]>,
    spans: SpanTree,
    trailing_trivia: String,
}

impl SourceCode {
    /// Pairs tokens with a span tree.
    #[must_use]
    pub fn new(tokens: Vec<Token>, spans: SpanTree, trailing_trivia: impl Into<String>) -> Self {
        Self {
            tokens: tokens.into(),
            spans,
            trailing_trivia: trailing_trivia.into(),
        }
    }

    /// Creates a span-less snapshot, as produced by lexical analysis.
    #[must_use]
    pub fn from_tokens(tokens: Vec<Token>, trailing_trivia: impl Into<String>) -> Self {
        Self::new(tokens, SpanTree::new(), trailing_trivia)
    }

    /// The shared token list.
    #[must_use]
    pub const fn tokens(&self) -> &Arc<[Token]> {
        &self.tokens
    }

    /// The token at `index`.
    #[must_use]
    pub fn token(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` when there is no token.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The span forest.
    #[must_use]
    pub const fn spans(&self) -> &SpanTree {
        &self.spans
    }

    /// Whitespace and comments after the last token.
    #[must_use]
    pub fn trailing_trivia(&self) -> &str {
        &self.trailing_trivia
    }

    /// Reassembles the source text.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for token in self.tokens.iter() {
            token.write_to(&mut out);
        }
        out.push_str(&self.trailing_trivia);
        out
    }

    /// Concatenated text of the tokens in `[beg, end)`, trivia of the
    /// first token excluded.
    #[must_use]
    pub fn text_of(&self, beg: usize, end: usize) -> String {
        let mut out = String::new();
        let slice = self.tokens.get(beg..end).unwrap_or_default();
        for (offset, token) in slice.iter().enumerate() {
            if offset > 0 {
                out.push_str(token.leading_trivia());
            }
            out.push_str(token.text());
        }
        out
    }

    pub(crate) fn set_tokens(&mut self, tokens: Arc<[Token]>) {
        self.tokens = tokens;
    }

    pub(crate) const fn spans_mut(&mut self) -> &mut SpanTree {
        &mut self.spans
    }
}
