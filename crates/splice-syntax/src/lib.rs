//! Token and span model for the splice transformation engine.
//!
//! Source text is modelled as an ordered [`Token`] sequence overlaid with a
//! forest of typed spans ([`SpanTree`]). The crate provides:
//!
//! - **Span algebra** via [`TokenSpan::relationship`], the single primitive
//!   used for nesting checks and for edit collision checks
//! - **Span trees** stored in a generation-checked [`Arena`]
//! - **Staged editing** via [`SourceCodeEditor`], which rejects colliding
//!   edits and applies the rest atomically
//! - **Analysis** via the [`Analyzer`] trait and the Tree-sitter backed
//!   [`TreeSitterAnalyzer`]
//!
//! # Supported Languages
//!
//! - Rust (`.rs`)
//! - Python (`.py`, `.pyi`)
//! - TypeScript (`.ts`, `.tsx`, `.mts`, `.cts`)

mod analyzer;
mod arena;
mod editor;
mod error;
mod language;
mod parser;
mod source_code;
mod span;
mod span_tree;
mod token;

pub use analyzer::Analyzer;
pub use arena::{Arena, Id};
pub use editor::SourceCodeEditor;
pub use error::{EditError, SpanTreeError, SyntaxError};
pub use language::{LanguageParseError, SupportedLanguage};
pub use parser::TreeSitterAnalyzer;
pub use source_code::SourceCode;
pub use span::{SpanRelation, SpanRelationship, TokenSpan};
pub use span_tree::{PreOrder, Siblings, SpanId, SpanKind, SpanNode, SpanTree};
pub use token::Token;

#[cfg(test)]
mod tests;
