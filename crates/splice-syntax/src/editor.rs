//! Staged, conflict-checked editing of a [`SourceCode`].
//!
//! Every operation is validated against the modifications already staged
//! and queued in position order. Nothing is visible through
//! [`SourceCodeEditor::source`] until [`SourceCodeEditor::apply_changes`]
//! runs, which replays the whole queue at once and shifts the span tree.

use std::sync::Arc;

use tracing::trace;

use crate::analyzer::Analyzer;
use crate::error::{EditError, SyntaxError};
use crate::source_code::SourceCode;
use crate::span::{SpanRelationship, TokenSpan};
use crate::span_tree::{SpanId, SpanKind};
use crate::token::Token;

/// One staged modification: replace `count` tokens at `index` with `tokens`.
///
/// A zero `count` is a pure insertion; `insert_before` then keeps the new
/// tokens outside spans starting at `index`.
#[derive(Debug, Clone)]
struct Mod {
    index: usize,
    count: usize,
    tokens: Vec<Token>,
    insert_before: bool,
}

impl Mod {
    const fn range(&self) -> TokenSpan {
        TokenSpan::with_len(self.index, self.count)
    }

    const fn is_insertion(&self) -> bool {
        self.count == 0
    }

    /// Queue order: insert-before, then insert-at, then replacements.
    const fn order_key(&self) -> (usize, u8) {
        let rank = match (self.is_insertion(), self.insert_before) {
            (true, true) => 0,
            (true, false) => 1,
            (false, _) => 2,
        };
        (self.index, rank)
    }
}

/// Staging buffer over a [`SourceCode`].
#[derive(Debug, Clone, Default)]
pub struct SourceCodeEditor {
    source: SourceCode,
    pending: Vec<Mod>,
}

impl SourceCodeEditor {
    /// Starts editing `source`.
    #[must_use]
    pub const fn new(source: SourceCode) -> Self {
        Self {
            source,
            pending: Vec::new(),
        }
    }

    /// The current snapshot; staged modifications are not reflected.
    #[must_use]
    pub const fn source(&self) -> &SourceCode {
        &self.source
    }

    /// Consumes the editor, discarding anything still staged.
    #[must_use]
    pub fn into_source(self) -> SourceCode {
        self.source
    }

    /// Number of staged modifications.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` when modifications are waiting for
    /// [`apply_changes`](Self::apply_changes).
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Stages the replacement of `count` tokens at `index`.
    ///
    /// Replacing exactly the range of an earlier replacement appends
    /// `tokens` to that replacement.
    ///
    /// # Errors
    ///
    /// Fails when the range exceeds the tokens, intersects a staged range,
    /// or would swallow a staged insertion.
    pub fn replace(
        &mut self,
        index: usize,
        count: usize,
        tokens: Vec<Token>,
    ) -> Result<(), EditError> {
        self.stage(Mod {
            index,
            count,
            tokens,
            insert_before: false,
        })
    }

    /// Stages an insertion that becomes part of any span starting at
    /// `index`.
    ///
    /// # Errors
    ///
    /// Fails when `index` is past the end or inside a staged replacement.
    pub fn insert_at(&mut self, index: usize, tokens: Vec<Token>) -> Result<(), EditError> {
        self.stage(Mod {
            index,
            count: 0,
            tokens,
            insert_before: false,
        })
    }

    /// Stages an insertion that stays outside spans starting at `index`.
    ///
    /// This is the only insertion allowed at the start of a staged
    /// replacement.
    ///
    /// # Errors
    ///
    /// Fails when `index` is past the end or strictly inside a staged
    /// replacement.
    pub fn insert_before(&mut self, index: usize, tokens: Vec<Token>) -> Result<(), EditError> {
        self.stage(Mod {
            index,
            count: 0,
            tokens,
            insert_before: true,
        })
    }

    /// Stages the removal of the token at `index`.
    ///
    /// # Errors
    ///
    /// See [`replace`](Self::replace).
    pub fn remove_at(&mut self, index: usize) -> Result<(), EditError> {
        self.remove_range(index, 1)
    }

    /// Stages the removal of `count` tokens at `index`.
    ///
    /// # Errors
    ///
    /// See [`replace`](Self::replace).
    pub fn remove_range(&mut self, index: usize, count: usize) -> Result<(), EditError> {
        self.replace(index, count, Vec::new())
    }

    /// Applies every staged modification and publishes the new token list.
    ///
    /// With nothing staged the current list is returned unchanged (the
    /// same allocation).
    pub fn apply_changes(&mut self) -> Arc<[Token]> {
        if self.pending.is_empty() {
            return Arc::clone(self.source.tokens());
        }
        let mut tokens = self.source.tokens().to_vec();
        // Replaying from the back keeps every queued index valid.
        for change in std::mem::take(&mut self.pending).into_iter().rev() {
            let added = change.tokens.len();
            let Mod {
                index,
                count,
                tokens: new_tokens,
                insert_before,
            } = change;
            let end = (index + count).min(tokens.len());
            tokens.splice(index..end, new_tokens);

            let spans = self.source.spans_mut();
            if count == 0 {
                spans.on_insert_tokens(index, added, insert_before);
            } else if added > count {
                // Extra tokens land inside the replaced range.
                spans.on_insert_tokens(index + count - 1, added - count, false);
            } else if added < count {
                spans.on_remove_tokens(TokenSpan::new(index + added, index + count));
            }
            trace!(
                target: "splice::syntax",
                index,
                removed = count,
                added,
                "applied token modification"
            );
        }
        let published: Arc<[Token]> = tokens.into();
        self.source.set_tokens(Arc::clone(&published));
        published
    }

    /// Re-analyzes the current tokens and replaces the snapshot.
    ///
    /// On success any staged modification is discarded. On failure nothing
    /// changes.
    ///
    /// # Errors
    ///
    /// Propagates the analyzer's parse failure.
    pub fn reparse(&mut self, analyzer: &dyn Analyzer) -> Result<(), SyntaxError> {
        let reparsed = analyzer.try_parse(&self.source.to_text())?;
        self.source = reparsed;
        self.pending.clear();
        Ok(())
    }

    /// Flushes staged modifications, then adds a span to the live tree.
    ///
    /// # Errors
    ///
    /// Fails when the span cannot nest in the tree.
    pub fn add_source_span(
        &mut self,
        kind: SpanKind,
        span: TokenSpan,
    ) -> Result<SpanId, EditError> {
        self.apply_changes();
        Ok(self.source.spans_mut().add(kind, span)?)
    }

    fn stage(&mut self, change: Mod) -> Result<(), EditError> {
        let len = self.source.len();
        if change.index.saturating_add(change.count) > len {
            return Err(EditError::out_of_range(change.index, change.count, len));
        }
        if change.is_insertion() {
            self.stage_insertion(change)
        } else {
            self.stage_replacement(change)
        }
    }

    fn stage_replacement(&mut self, change: Mod) -> Result<(), EditError> {
        let range = change.range();
        let mut merge_into = None;
        for (position, staged) in self.pending.iter().enumerate() {
            if staged.is_insertion() {
                let point = staged.index;
                let swallowed = range.beg() < point && point < range.end();
                let ambiguous_start = point == range.beg() && !staged.insert_before;
                if swallowed || ambiguous_start {
                    return Err(EditError::insertion_inside(point, range));
                }
                continue;
            }
            let relation = range.relationship(staged.range());
            if relation.kind() == SpanRelationship::Equal {
                merge_into = Some(position);
                break;
            }
            if !relation.is_disjoint() {
                return Err(EditError::span_intersects(range, staged.range()));
            }
        }
        if let Some(position) = merge_into
            && let Some(staged) = self.pending.get_mut(position)
        {
            staged.tokens.extend(change.tokens);
            return Ok(());
        }
        self.enqueue(change);
        Ok(())
    }

    fn stage_insertion(&mut self, change: Mod) -> Result<(), EditError> {
        let point = change.index;
        let mut merge_into = None;
        for (position, staged) in self.pending.iter().enumerate() {
            if staged.is_insertion() {
                if staged.index == point && staged.insert_before == change.insert_before {
                    merge_into = Some(position);
                    break;
                }
                continue;
            }
            let replaced = staged.range();
            let inside = replaced.beg() < point && point < replaced.end();
            let ambiguous_start = point == replaced.beg() && !change.insert_before;
            if inside || ambiguous_start {
                return Err(EditError::insertion_inside(point, replaced));
            }
        }
        if let Some(position) = merge_into
            && let Some(staged) = self.pending.get_mut(position)
        {
            staged.tokens.extend(change.tokens);
            return Ok(());
        }
        self.enqueue(change);
        Ok(())
    }

    fn enqueue(&mut self, change: Mod) {
        let key = change.order_key();
        let position = self.pending.partition_point(|staged| staged.order_key() <= key);
        self.pending.insert(position, change);
    }
}
