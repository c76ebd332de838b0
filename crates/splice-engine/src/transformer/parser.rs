//! Recursive-descent parser for transformer declarations.
//!
//! ```text
//! create [<language>] transformer [<name>] [on "<target>"]
//! begin
//!     <statement>*
//! end
//! ```

use splice_syntax::{SyntaxError, Token, TokenSpan};

use super::lexer::{SEMICOLON, STRING, UNTERMINATED, WORD, line_column, unquote};
use super::statement::{Placement, Statement};
use crate::language::Language;

const LANGUAGE_NAME: &str = "transformer";

/// One `create ... end` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    language: Option<Language>,
    name: Option<String>,
    target: Option<String>,
    statements: Vec<Statement>,
    statement_spans: Vec<TokenSpan>,
    span: TokenSpan,
    text: String,
}

impl Declaration {
    /// Language named in the header, if any.
    #[must_use]
    pub const fn language(&self) -> Option<Language> {
        self.language
    }

    /// Explicit function name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declared target string, if any.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Statements in source order.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Token range of the whole declaration.
    #[must_use]
    pub const fn span(&self) -> TokenSpan {
        self.span
    }

    /// Token ranges of the statements.
    #[must_use]
    pub fn statement_spans(&self) -> &[TokenSpan] {
        &self.statement_spans
    }

    /// Source text of the declaration.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Parses every declaration in `tokens`.
///
/// `text` is the source the tokens were lexed from; it locates errors.
pub(crate) fn parse_declarations(
    tokens: &[Token],
    text: &str,
) -> Result<Vec<Declaration>, SyntaxError> {
    let mut parser = Parser {
        tokens,
        text,
        pos: 0,
    };
    let mut declarations = Vec::new();
    while parser.pos < tokens.len() {
        declarations.push(parser.declaration()?);
    }
    Ok(declarations)
}

struct Parser<'a> {
    tokens: &'a [Token],
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn declaration(&mut self) -> Result<Declaration, SyntaxError> {
        let start = self.pos;
        self.keyword("create")?;
        let language = self.language_clause()?;
        self.keyword("transformer")?;
        let name = match self.peek_word() {
            Some(word) if word != "on" && word != "begin" => {
                self.pos += 1;
                Some(word.to_owned())
            }
            _ => None,
        };
        let target = if self.peek_word() == Some("on") {
            self.pos += 1;
            Some(self.string()?)
        } else {
            None
        };
        self.keyword("begin")?;

        let mut statements = Vec::new();
        let mut statement_spans = Vec::new();
        while self.peek_word() != Some("end") {
            let statement_start = self.pos;
            statements.push(self.statement()?);
            statement_spans.push(TokenSpan::new(statement_start, self.pos));
        }
        self.keyword("end")?;

        let span = TokenSpan::new(start, self.pos);
        Ok(Declaration {
            language,
            name,
            target,
            statements,
            statement_spans,
            span,
            text: self.text_of(span),
        })
    }

    fn language_clause(&mut self) -> Result<Option<Language>, SyntaxError> {
        let Some(word) = self.peek_word() else {
            return Err(self.error("expected a language or `transformer`"));
        };
        // `transformer` is the keyword unless another one follows it.
        if word == "transformer" && self.word_at(self.pos + 1) != Some("transformer") {
            return Ok(None);
        }
        let language = word
            .parse::<Language>()
            .map_err(|e| self.error(&e.to_string()))?;
        self.pos += 1;
        Ok(Some(language))
    }

    fn statement(&mut self) -> Result<Statement, SyntaxError> {
        let Some(verb) = self.peek_word() else {
            return Err(self.error("expected a statement or `end`"));
        };
        let statement = match verb {
            "replace" => {
                self.pos += 1;
                let old = self.string()?;
                self.keyword("with")?;
                let new = self.string()?;
                Statement::Replace { old, new }
            }
            "remove" => {
                self.pos += 1;
                Statement::Remove {
                    text: self.string()?,
                }
            }
            "insert" => {
                self.pos += 1;
                let text = self.string()?;
                let placement = match self.peek_word() {
                    Some("before") => Placement::Before,
                    Some("after") => Placement::After,
                    _ => return Err(self.error("expected `before` or `after`")),
                };
                self.pos += 1;
                let anchor = self.string()?;
                Statement::Insert {
                    text,
                    anchor,
                    placement,
                }
            }
            "prepend" => {
                self.pos += 1;
                Statement::Prepend {
                    text: self.string()?,
                }
            }
            "append" => {
                self.pos += 1;
                Statement::Append {
                    text: self.string()?,
                }
            }
            _ => return Err(self.error("unknown statement")),
        };
        self.expect_kind(SEMICOLON, "expected `;`")?;
        Ok(statement)
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), SyntaxError> {
        if self.peek_word() == Some(keyword) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected `{keyword}`")))
        }
    }

    fn string(&mut self) -> Result<String, SyntaxError> {
        let token = self.tokens.get(self.pos);
        match token {
            Some(t) if t.kind() == UNTERMINATED => Err(self.error("unterminated string")),
            Some(t) if t.kind() == STRING => {
                let value = unquote(t.text()).ok_or_else(|| self.error("malformed string"))?;
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.error("expected a quoted string")),
        }
    }

    fn expect_kind(&mut self, kind: &str, message: &str) -> Result<(), SyntaxError> {
        if self.tokens.get(self.pos).is_some_and(|t| t.kind() == kind) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn peek_word(&self) -> Option<&'a str> {
        self.word_at(self.pos)
    }

    fn word_at(&self, index: usize) -> Option<&'a str> {
        self.tokens
            .get(index)
            .filter(|t| t.kind() == WORD)
            .map(Token::text)
    }

    fn text_of(&self, span: TokenSpan) -> String {
        let mut out = String::new();
        for (offset, token) in self
            .tokens
            .get(span.beg()..span.end())
            .unwrap_or_default()
            .iter()
            .enumerate()
        {
            if offset > 0 {
                out.push_str(token.leading_trivia());
            }
            out.push_str(token.text());
        }
        out
    }

    /// Byte offset where the current token's text starts.
    fn offset(&self) -> usize {
        let mut offset = 0;
        for token in self.tokens.get(..self.pos).unwrap_or_default() {
            offset += token.leading_trivia().len() + token.text().len();
        }
        let trivia = self
            .tokens
            .get(self.pos)
            .map_or(self.text.len().saturating_sub(offset), |t| {
                t.leading_trivia().len()
            });
        offset + trivia
    }

    fn error(&self, message: &str) -> SyntaxError {
        let (line, column) = line_column(self.text, self.offset());
        let found = self
            .tokens
            .get(self.pos)
            .map_or_else(|| "end of input".to_owned(), |t| format!("`{}`", t.text()));
        SyntaxError::parse(LANGUAGE_NAME, line, column, format!("{message}, found {found}"))
    }
}
