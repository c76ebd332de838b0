//! Lexical tokens.

use std::fmt;

/// A lexical unit produced by an [`Analyzer`](crate::Analyzer).
///
/// Tokens keep the whitespace and comments that precede them as leading
/// trivia, so concatenating every token's trivia and text reproduces the
/// analysed source exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    kind: String,
    text: String,
    leading_trivia: String,
}

impl Token {
    /// Creates a token without leading trivia.
    #[must_use]
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
            leading_trivia: String::new(),
        }
    }

    /// Attaches leading trivia to the token.
    #[must_use]
    pub fn with_leading_trivia(mut self, trivia: impl Into<String>) -> Self {
        self.leading_trivia = trivia.into();
        self
    }

    /// Analyzer-specific token kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Token text, without trivia.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whitespace and comments preceding the token.
    #[must_use]
    pub fn leading_trivia(&self) -> &str {
        &self.leading_trivia
    }

    /// Replaces the leading trivia.
    pub fn set_leading_trivia(&mut self, trivia: impl Into<String>) {
        self.leading_trivia = trivia.into();
    }

    /// Writes trivia followed by text into `out`.
    pub fn write_to(&self, out: &mut String) {
        out.push_str(&self.leading_trivia);
        out.push_str(&self.text);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
