//! The analyzer seam between raw text and [`SourceCode`].

use crate::error::SyntaxError;
use crate::source_code::SourceCode;

/// Turns text into tokens and spans.
///
/// Both operations must be lossless: the returned
/// [`SourceCode::to_text`] equals the input.
pub trait Analyzer {
    /// Identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Lexes `text` into a span-less snapshot.
    ///
    /// Tokenization is tolerant: text that does not parse still yields
    /// tokens.
    ///
    /// # Errors
    ///
    /// Fails only when the analyzer itself cannot run.
    fn tokenize(&self, text: &str) -> Result<SourceCode, SyntaxError>;

    /// Parses `text` into tokens and a span tree.
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError::ParseError`] when the text is not valid for
    /// the analyzer's language.
    fn try_parse(&self, text: &str) -> Result<SourceCode, SyntaxError>;
}
