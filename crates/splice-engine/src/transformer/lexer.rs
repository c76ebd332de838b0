//! Lexer for transformer sources.
//!
//! Whitespace and `//` comments become leading trivia. Words, quoted
//! strings and `;` become tokens; any other character is a one-character
//! punctuation token.

use splice_syntax::Token;

/// Kind of identifier and keyword tokens.
pub const WORD: &str = "word";
/// Kind of quoted string tokens, text including the quotes.
pub const STRING: &str = "string";
/// Kind of the statement terminator.
pub const SEMICOLON: &str = ";";
/// Kind of any other single character.
pub const PUNCT: &str = "punct";
/// Kind of an unterminated string running to the end of the text.
pub const UNTERMINATED: &str = "unterminated";

#[derive(Debug)]
pub(crate) struct Lexed {
    pub(crate) tokens: Vec<Token>,
    pub(crate) trailing_trivia: String,
    /// Byte offset of the first lexical error.
    pub(crate) error: Option<usize>,
}

pub(crate) fn lex(text: &str) -> Lexed {
    let mut lexer = Lexer {
        text,
        pos: 0,
        error: None,
    };
    let mut tokens = Vec::new();
    loop {
        let trivia_start = lexer.pos;
        lexer.skip_trivia();
        let trivia = lexer.slice(trivia_start, lexer.pos);
        let Some(next) = lexer.peek() else {
            return Lexed {
                tokens,
                trailing_trivia: trivia.to_owned(),
                error: lexer.error,
            };
        };
        let start = lexer.pos;
        let kind = lexer.lex_token(next);
        tokens.push(Token::new(kind, lexer.slice(start, lexer.pos)).with_leading_trivia(trivia));
    }
}

pub(crate) const fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

/// Decodes a quoted string token, returning `None` when it is not quoted.
pub(crate) fn unquote(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(escaped @ ('"' | '\\')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Some(out)
}

/// Quotes `text` so that [`unquote`] returns it unchanged.
#[must_use]
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// One-based line and column of a byte offset.
pub(crate) fn line_column(text: &str, offset: usize) -> (u32, u32) {
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count().saturating_add(1);
    let column = before
        .rsplit('\n')
        .next()
        .map_or(0, |last| last.chars().count())
        .saturating_add(1);
    (
        u32::try_from(line).unwrap_or(u32::MAX),
        u32::try_from(column).unwrap_or(u32::MAX),
    )
}

struct Lexer<'t> {
    text: &'t str,
    pos: usize,
    error: Option<usize>,
}

impl<'t> Lexer<'t> {
    fn slice(&self, beg: usize, end: usize) -> &'t str {
        self.text.get(beg..end).unwrap_or_default()
    }

    fn rest(&self) -> &'t str {
        self.text.get(self.pos..).unwrap_or_default()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            if rest.starts_with("//") {
                self.pos += rest.find('\n').unwrap_or(rest.len());
                continue;
            }
            match self.peek() {
                Some(c) if c.is_whitespace() => self.bump(c),
                _ => return,
            }
        }
    }

    fn lex_token(&mut self, first: char) -> &'static str {
        self.bump(first);
        match first {
            ';' => SEMICOLON,
            '"' => self.lex_string_tail(),
            c if is_word_char(c) => {
                while let Some(c) = self.peek().filter(|c| is_word_char(*c)) {
                    self.bump(c);
                }
                WORD
            }
            _ => PUNCT,
        }
    }

    fn lex_string_tail(&mut self) -> &'static str {
        let start = self.pos.saturating_sub(1);
        while let Some(c) = self.peek() {
            self.bump(c);
            match c {
                '"' => return STRING,
                '\\' => {
                    if let Some(escaped) = self.peek() {
                        self.bump(escaped);
                    }
                }
                _ => {}
            }
        }
        if self.error.is_none() {
            self.error = Some(start);
        }
        UNTERMINATED
    }
}
