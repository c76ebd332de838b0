//! Transformer statements and how they are staged on a target.

use std::fmt;

use splice_syntax::{SourceCodeEditor, Token, TokenSpan};

use super::lexer::quote;
use crate::error::TransformError;

/// Kind of the opaque tokens carrying inserted or replacement text.
pub const FRAGMENT: &str = "fragment";

/// Where inserted text goes relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Directly before the anchor's first token, after the preceding
    /// token's text.
    Before,
    /// Directly after the anchor's last token.
    After,
}

/// One edit of a transformer function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `replace "<old>" with "<new>";`
    Replace {
        /// Anchor text to replace.
        old: String,
        /// Replacement text.
        new: String,
    },
    /// `remove "<text>";`
    Remove {
        /// Anchor text to remove.
        text: String,
    },
    /// `insert "<text>" before|after "<anchor>";`
    Insert {
        /// Inserted text.
        text: String,
        /// Anchor text.
        anchor: String,
        /// Side of the anchor.
        placement: Placement,
    },
    /// `prepend "<text>";`
    Prepend {
        /// Inserted text.
        text: String,
    },
    /// `append "<text>";`
    Append {
        /// Inserted text.
        text: String,
    },
}

impl Statement {
    /// Stages the statement on `editor`.
    ///
    /// Anchors are located in the editor's current (unapplied) tokens, so
    /// statements of one function never see each other's edits.
    ///
    /// # Errors
    ///
    /// Fails when an anchor does not occur or when the edit conflicts with
    /// one already staged.
    pub fn stage(
        &self,
        editor: &mut SourceCodeEditor,
        function: &str,
        target: &str,
    ) -> Result<(), TransformError> {
        let edit_error = |source| TransformError::Edit {
            function: function.to_owned(),
            source,
        };
        match self {
            Self::Replace { old, new } => {
                for found in anchor_spans(editor, old, function, target)? {
                    let trivia = editor
                        .source()
                        .token(found.beg())
                        .map(|t| t.leading_trivia().to_owned())
                        .unwrap_or_default();
                    let tokens = if new.is_empty() {
                        Vec::new()
                    } else {
                        vec![fragment(new).with_leading_trivia(trivia)]
                    };
                    editor
                        .replace(found.beg(), found.len(), tokens)
                        .map_err(edit_error)?;
                }
            }
            Self::Remove { text } => {
                for found in anchor_spans(editor, text, function, target)? {
                    editor
                        .remove_range(found.beg(), found.len())
                        .map_err(edit_error)?;
                }
            }
            Self::Insert {
                text,
                anchor,
                placement,
            } => {
                for found in anchor_spans(editor, anchor, function, target)? {
                    let index = match placement {
                        Placement::Before => found.beg(),
                        Placement::After => found.end(),
                    };
                    editor
                        .insert_before(index, vec![fragment(text)])
                        .map_err(edit_error)?;
                }
            }
            Self::Prepend { text } => {
                editor
                    .insert_before(0, vec![fragment(text)])
                    .map_err(edit_error)?;
            }
            Self::Append { text } => {
                let end = editor.source().len();
                editor
                    .insert_before(end, vec![fragment(text)])
                    .map_err(edit_error)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace { old, new } => write!(f, "replace {} with {};", quote(old), quote(new)),
            Self::Remove { text } => write!(f, "remove {};", quote(text)),
            Self::Insert {
                text,
                anchor,
                placement,
            } => {
                let side = match placement {
                    Placement::Before => "before",
                    Placement::After => "after",
                };
                write!(f, "insert {} {side} {};", quote(text), quote(anchor))
            }
            Self::Prepend { text } => write!(f, "prepend {};", quote(text)),
            Self::Append { text } => write!(f, "append {};", quote(text)),
        }
    }
}

fn fragment(text: &str) -> Token {
    Token::new(FRAGMENT, text)
}

fn anchor_spans(
    editor: &SourceCodeEditor,
    anchor: &str,
    function: &str,
    target: &str,
) -> Result<Vec<TokenSpan>, TransformError> {
    let found = find_anchor(editor.source().tokens(), anchor);
    if found.is_empty() {
        return Err(TransformError::AnchorNotFound {
            function: function.to_owned(),
            anchor: anchor.to_owned(),
            target: target.to_owned(),
        });
    }
    Ok(found)
}

/// Non-overlapping token ranges whose texts, whitespace removed, spell
/// `anchor` with whitespace removed.
pub(crate) fn find_anchor(tokens: &[Token], anchor: &str) -> Vec<TokenSpan> {
    let wanted = squeeze(anchor);
    let mut found = Vec::new();
    if wanted.is_empty() {
        return found;
    }
    let mut start = 0;
    while start < tokens.len() {
        match match_at(tokens, start, &wanted) {
            Some(end) => {
                found.push(TokenSpan::new(start, end));
                start = end;
            }
            None => start += 1,
        }
    }
    found
}

fn match_at(tokens: &[Token], start: usize, wanted: &str) -> Option<usize> {
    let first = tokens.get(start).map(|t| squeeze(t.text()))?;
    if first.is_empty() {
        return None;
    }
    let mut matched = String::new();
    for (offset, token) in tokens.get(start..)?.iter().enumerate() {
        matched.push_str(&squeeze(token.text()));
        if matched == wanted {
            return Some(start + offset + 1);
        }
        if !wanted.starts_with(&matched) {
            return None;
        }
    }
    None
}

fn squeeze(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
