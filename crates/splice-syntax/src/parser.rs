//! Tree-sitter backed [`Analyzer`].
//!
//! Leaves of the concrete syntax tree become tokens; the text between two
//! leaves (whitespace and comment nodes) becomes the leading trivia of the
//! next token. Nodes whose kind is listed in
//! [`SupportedLanguage::span_node_kinds`] become spans.

use tracing::debug;

use crate::analyzer::Analyzer;
use crate::error::SyntaxError;
use crate::language::SupportedLanguage;
use crate::source_code::SourceCode;
use crate::span::TokenSpan;
use crate::span_tree::{SpanKind, SpanTree};
use crate::token::Token;

/// Analyzer for one [`SupportedLanguage`].
#[derive(Debug, Clone, Copy)]
pub struct TreeSitterAnalyzer {
    language: SupportedLanguage,
}

impl TreeSitterAnalyzer {
    /// Creates an analyzer, checking that the grammar loads.
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError::ParserInitError`] if the grammar is
    /// incompatible with the linked Tree-sitter runtime.
    pub fn new(language: SupportedLanguage) -> Result<Self, SyntaxError> {
        new_parser(language)?;
        Ok(Self { language })
    }

    /// The analyzed language.
    #[must_use]
    pub const fn language(&self) -> SupportedLanguage {
        self.language
    }

    fn parse_tree(&self, text: &str) -> Result<tree_sitter::Tree, SyntaxError> {
        new_parser(self.language)?
            .parse(text, None)
            .ok_or_else(|| SyntaxError::internal_error("tree-sitter produced no tree"))
    }

    fn collect(&self, tree: &tree_sitter::Tree, text: &str, with_spans: bool) -> SourceCode {
        let mut collector = Collector {
            source: text,
            cursor: 0,
            tokens: Vec::new(),
            spans: Vec::new(),
            span_kinds: if with_spans {
                self.language.span_node_kinds()
            } else {
                &[]
            },
        };
        collector.visit(tree.root_node());
        let trailing = text.get(collector.cursor..).unwrap_or_default();

        let mut tree = SpanTree::new();
        for (kind, span) in collector.spans {
            // Nodes covering the same tokens as a child collapse into it.
            let _ = tree.try_add(kind, span);
        }
        SourceCode::new(collector.tokens, tree, trailing)
    }
}

impl Analyzer for TreeSitterAnalyzer {
    fn name(&self) -> &str {
        self.language.as_str()
    }

    fn tokenize(&self, text: &str) -> Result<SourceCode, SyntaxError> {
        let tree = self.parse_tree(text)?;
        Ok(self.collect(&tree, text, false))
    }

    fn try_parse(&self, text: &str) -> Result<SourceCode, SyntaxError> {
        let tree = self.parse_tree(text)?;
        if let Some(node) = first_error_node(tree.root_node()) {
            let (line, column) = point_to_one_based(node.start_position());
            let message = if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                "syntax error".to_owned()
            };
            debug!(
                target: "splice::syntax",
                language = %self.language,
                line,
                column,
                "source failed to parse"
            );
            return Err(SyntaxError::parse(
                self.language.as_str(),
                line,
                column,
                message,
            ));
        }
        Ok(self.collect(&tree, text, true))
    }
}

fn new_parser(language: SupportedLanguage) -> Result<tree_sitter::Parser, SyntaxError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .map_err(|e| SyntaxError::parser_init(language, e.to_string()))?;
    Ok(parser)
}

struct Collector<'s> {
    source: &'s str,
    cursor: usize,
    tokens: Vec<Token>,
    spans: Vec<(SpanKind, TokenSpan)>,
    span_kinds: &'static [&'static str],
}

impl Collector<'_> {
    fn visit(&mut self, node: tree_sitter::Node<'_>) {
        if is_comment(node) {
            return;
        }
        if node.child_count() == 0 {
            self.push_leaf(node);
            return;
        }
        let first = self.tokens.len();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
        let kind = node.kind();
        if self.span_kinds.contains(&kind) {
            self.spans
                .push((SpanKind::from_static(kind), TokenSpan::new(first, self.tokens.len())));
        }
    }

    fn push_leaf(&mut self, node: tree_sitter::Node<'_>) {
        let range = node.byte_range();
        if range.is_empty() || range.start < self.cursor {
            return;
        }
        let trivia = self.source.get(self.cursor..range.start).unwrap_or_default();
        let text = self.source.get(range.clone()).unwrap_or_default();
        self.tokens
            .push(Token::new(node.kind(), text).with_leading_trivia(trivia));
        self.cursor = range.end;
    }
}

fn is_comment(node: tree_sitter::Node<'_>) -> bool {
    node.is_extra() && node.kind().contains("comment")
}

fn first_error_node(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find_map(first_error_node);
    found
}

/// Converts a zero-based Tree-sitter point to one-based line and column.
fn point_to_one_based(pos: tree_sitter::Point) -> (u32, u32) {
    let line = u32::try_from(pos.row.saturating_add(1)).unwrap_or(u32::MAX);
    let column = u32::try_from(pos.column.saturating_add(1)).unwrap_or(u32::MAX);
    (line, column)
}
