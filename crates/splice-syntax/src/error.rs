//! Error types for analysis, span tree and editing operations.
//!
//! Analysis failures ([`SyntaxError`]) are data errors reported by the
//! analyzers. Span tree and editor failures ([`SpanTreeError`],
//! [`EditError`]) are precondition violations: they abort the operation that
//! raised them and leave the receiver untouched.

use thiserror::Error;

use crate::language::SupportedLanguage;
use crate::span::TokenSpan;

/// Errors from analyzing source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SyntaxError {
    /// Failed to initialise the Tree-sitter parser for a language.
    #[error("failed to initialise parser for {language}: {message}")]
    ParserInitError {
        /// The language that failed to initialise.
        language: SupportedLanguage,
        /// Description of the failure.
        message: String,
    },

    /// The source text is not valid for the analyzer's language.
    #[error("failed to parse {language} at {line}:{column}: {message}")]
    ParseError {
        /// Name of the language that failed to parse.
        language: String,
        /// One-based line of the first error.
        line: u32,
        /// One-based column of the first error.
        column: u32,
        /// Description of the failure.
        message: String,
    },

    /// Internal error indicating a bug or system failure.
    #[error("internal error: {message}")]
    InternalError {
        /// Description of the internal error.
        message: String,
    },
}

impl SyntaxError {
    /// Creates a parser initialisation error.
    #[must_use]
    pub fn parser_init(language: SupportedLanguage, message: impl Into<String>) -> Self {
        Self::ParserInitError {
            language,
            message: message.into(),
        }
    }

    /// Creates a parse error located at a one-based line and column.
    #[must_use]
    pub fn parse(
        language: impl Into<String>,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        Self::ParseError {
            language: language.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Errors raised by [`SpanTree`](crate::SpanTree) mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpanTreeError {
    /// Empty spans cannot be added to a tree.
    #[error("cannot add an empty span")]
    EmptySpan,

    /// The new span partially overlaps an existing one.
    #[error("span {span} intersects existing span {existing}")]
    Intersects {
        /// The rejected span.
        span: TokenSpan,
        /// The span it collides with.
        existing: TokenSpan,
    },

    /// A span covering exactly the same tokens already exists at this level.
    #[error("span {span} duplicates an existing span")]
    Duplicate {
        /// The rejected span.
        span: TokenSpan,
    },

    /// The handle does not refer to a span attached to this tree.
    #[error("span is detached or belongs to another tree")]
    UnknownSpan,
}

/// Errors raised by [`SourceCodeEditor`](crate::SourceCodeEditor) staging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// The range collides with an already staged modification.
    #[error("span {span} intersects an already modified span {existing}")]
    SpanIntersects {
        /// The rejected range.
        span: TokenSpan,
        /// The staged range it collides with.
        existing: TokenSpan,
    },

    /// An insertion point falls inside a range that is already replaced.
    #[error("insertion at {index} falls inside the replaced span {replaced}")]
    InsertionInsideReplacement {
        /// The rejected insertion point.
        index: usize,
        /// The staged replacement.
        replaced: TokenSpan,
    },

    /// The range exceeds the token sequence.
    #[error("range {index}+{count} exceeds the {len} available tokens")]
    OutOfRange {
        /// Start of the rejected range.
        index: usize,
        /// Length of the rejected range.
        count: usize,
        /// Number of tokens in the working buffer.
        len: usize,
    },

    /// Adding a span to the tree failed.
    #[error(transparent)]
    SpanTree(#[from] SpanTreeError),
}

impl EditError {
    /// Creates a collision error.
    #[must_use]
    pub const fn span_intersects(span: TokenSpan, existing: TokenSpan) -> Self {
        Self::SpanIntersects { span, existing }
    }

    /// Creates an ambiguous insertion error.
    #[must_use]
    pub const fn insertion_inside(index: usize, replaced: TokenSpan) -> Self {
        Self::InsertionInsideReplacement { index, replaced }
    }

    /// Creates a range error.
    #[must_use]
    pub const fn out_of_range(index: usize, count: usize, len: usize) -> Self {
        Self::OutOfRange { index, count, len }
    }
}
