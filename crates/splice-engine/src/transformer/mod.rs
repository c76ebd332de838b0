//! The transformer-function language.
//!
//! A transformer source declares one or more functions, each a list of
//! [`Statement`]s applied to the function's target:
//!
//! ```text
//! create [<language>] transformer [<name>] [on "<target>"]
//! begin
//!     replace "<old>" with "<new>";
//!     insert "<text>" before "<anchor>";
//! end
//! ```

mod lexer;
mod parser;
mod statement;

use splice_syntax::{Analyzer, SourceCode, SourceCodeEditor, SpanKind, SpanTree, SyntaxError};

pub use lexer::{PUNCT, SEMICOLON, STRING, UNTERMINATED, WORD, quote};
pub use parser::Declaration;
pub use statement::{FRAGMENT, Placement, Statement};

use crate::error::TransformError;

/// Span kind of a whole declaration.
pub const TRANSFORMER_SPAN: SpanKind = SpanKind::from_static("transformer");
/// Span kind of one statement.
pub const STATEMENT_SPAN: SpanKind = SpanKind::from_static("statement");

/// Result of parsing a transformer source.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    /// Tokens with one span per declaration and statement.
    pub code: SourceCode,
    /// Declarations in source order.
    pub declarations: Vec<Declaration>,
}

/// [`Analyzer`] for transformer sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformerAnalyzer;

impl TransformerAnalyzer {
    /// Creates the analyzer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses `text` into tokens, spans and declarations.
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError::ParseError`] for lexical or grammatical
    /// errors, located at the first offending token.
    pub fn parse(&self, text: &str) -> Result<ParsedSource, SyntaxError> {
        let lexed = lexer::lex(text);
        if let Some(offset) = lexed.error {
            let (line, column) = lexer::line_column(text, offset);
            return Err(SyntaxError::parse(
                self.name(),
                line,
                column,
                "unterminated string",
            ));
        }
        let declarations = parser::parse_declarations(&lexed.tokens, text)?;
        let mut spans = SpanTree::new();
        for declaration in &declarations {
            spans.add(TRANSFORMER_SPAN, declaration.span())
                .map_err(|e| SyntaxError::internal_error(e.to_string()))?;
            for statement in declaration.statement_spans() {
                spans.add(STATEMENT_SPAN, *statement)
                    .map_err(|e| SyntaxError::internal_error(e.to_string()))?;
            }
        }
        Ok(ParsedSource {
            code: SourceCode::new(lexed.tokens, spans, lexed.trailing_trivia),
            declarations,
        })
    }
}

impl Analyzer for TransformerAnalyzer {
    fn name(&self) -> &str {
        "transformer"
    }

    fn tokenize(&self, text: &str) -> Result<SourceCode, SyntaxError> {
        let lexed = lexer::lex(text);
        Ok(SourceCode::from_tokens(lexed.tokens, lexed.trailing_trivia))
    }

    fn try_parse(&self, text: &str) -> Result<SourceCode, SyntaxError> {
        self.parse(text).map(|parsed| parsed.code)
    }
}

/// Applies one function's statements to `code` and returns the new text.
///
/// Every statement is staged before any is applied, so the function is a
/// single atomic edit.
///
/// # Errors
///
/// Fails on a missing anchor or on conflicting statements.
pub fn apply_statements(
    code: SourceCode,
    statements: &[Statement],
    function: &str,
    target: &str,
) -> Result<String, TransformError> {
    let mut editor = SourceCodeEditor::new(code);
    for statement in statements {
        statement.stage(&mut editor, function, target)?;
    }
    editor.apply_changes();
    Ok(editor.source().to_text())
}
