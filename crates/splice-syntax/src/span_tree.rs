//! Typed span forest over token indices.
//!
//! Nodes live in an [`Arena`] and reference each other through [`SpanId`]
//! handles: every node knows its parent, its first and last child and its
//! previous and next sibling. Siblings are ordered and never overlap; a
//! child's span is strictly contained in its parent's span.

use std::borrow::Cow;
use std::fmt;

use crate::arena::{Arena, Id};
use crate::error::SpanTreeError;
use crate::span::{SpanRelationship, TokenSpan};

/// Handle to a span stored in a [`SpanTree`].
pub type SpanId = Id<SpanNode>;

/// The type tag of a span (for example `function_item` or `transformer`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpanKind(Cow<'static, str>);

impl SpanKind {
    /// Creates a kind from a static name.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a kind from an owned name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The kind name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed node of the span tree.
#[derive(Debug, Clone)]
pub struct SpanNode {
    kind: SpanKind,
    span: TokenSpan,
    parent: Option<SpanId>,
    first_child: Option<SpanId>,
    last_child: Option<SpanId>,
    prev_sibling: Option<SpanId>,
    next_sibling: Option<SpanId>,
}

impl SpanNode {
    const fn detached(kind: SpanKind, span: TokenSpan) -> Self {
        Self {
            kind,
            span,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }

    /// The span's type tag.
    #[must_use]
    pub const fn kind(&self) -> &SpanKind {
        &self.kind
    }

    /// The covered token range.
    #[must_use]
    pub const fn span(&self) -> TokenSpan {
        self.span
    }

    /// The enclosing span, `None` for a root.
    #[must_use]
    pub const fn parent(&self) -> Option<SpanId> {
        self.parent
    }

    /// The first nested span.
    #[must_use]
    pub const fn first_child(&self) -> Option<SpanId> {
        self.first_child
    }

    /// The last nested span.
    #[must_use]
    pub const fn last_child(&self) -> Option<SpanId> {
        self.last_child
    }

    /// The preceding sibling.
    #[must_use]
    pub const fn prev_sibling(&self) -> Option<SpanId> {
        self.prev_sibling
    }

    /// The following sibling.
    #[must_use]
    pub const fn next_sibling(&self) -> Option<SpanId> {
        self.next_sibling
    }
}

/// A forest of typed spans.
#[derive(Debug, Clone, Default)]
pub struct SpanTree {
    nodes: Arena<SpanNode>,
    first_root: Option<SpanId>,
    last_root: Option<SpanId>,
}

impl SpanTree {
    /// Creates an empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            first_root: None,
            last_root: None,
        }
    }

    /// Number of attached spans.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when the tree holds no span.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrows an attached span.
    #[must_use]
    pub fn get(&self, id: SpanId) -> Option<&SpanNode> {
        self.nodes.get(id)
    }

    /// Returns `true` when `id` no longer belongs to this tree.
    #[must_use]
    pub fn is_detached(&self, id: SpanId) -> bool {
        !self.nodes.contains(id)
    }

    /// Iterates over the top-level spans in document order.
    pub fn roots(&self) -> Siblings<'_> {
        Siblings {
            tree: self,
            next: self.first_root,
        }
    }

    /// Iterates over the direct children of `id` in document order.
    pub fn children(&self, id: SpanId) -> Siblings<'_> {
        Siblings {
            tree: self,
            next: self.get(id).and_then(SpanNode::first_child),
        }
    }

    /// Iterates over every span in pre-order (parents before children).
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            next: self.first_root,
            stop: None,
        }
    }

    /// Iterates over `id` and its descendants in pre-order.
    pub fn subtree(&self, id: SpanId) -> PreOrder<'_> {
        let next = self.get(id).map(|_| id);
        PreOrder {
            tree: self,
            next,
            stop: next,
        }
    }

    /// Returns the deepest span containing token `index`.
    #[must_use]
    pub fn span_at(&self, index: usize) -> Option<SpanId> {
        let mut found = None;
        let mut cursor = self.first_root;
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get(id) else {
                break;
            };
            if node.span.contains_index(index) {
                found = Some(id);
                cursor = node.first_child;
            } else if node.span.beg() > index {
                break;
            } else {
                cursor = node.next_sibling;
            }
        }
        found
    }

    /// Inserts a new span wherever it nests.
    ///
    /// Existing spans strictly contained in the new one become its children.
    ///
    /// # Errors
    ///
    /// Fails when `span` is empty, duplicates a span at its level, or
    /// partially overlaps an existing span.
    pub fn add(&mut self, kind: SpanKind, span: TokenSpan) -> Result<SpanId, SpanTreeError> {
        if span.is_empty() {
            return Err(SpanTreeError::EmptySpan);
        }
        let mut parent = None;
        'descend: loop {
            let mut cursor = self.first_in(parent);
            let mut absorbed: Vec<SpanId> = Vec::new();
            let mut before = None;
            while let Some(id) = cursor {
                let node = self.node(id)?;
                let relation = span.relationship(node.span);
                match relation.kind() {
                    SpanRelationship::Equal => return Err(SpanTreeError::Duplicate { span }),
                    SpanRelationship::Overlapped => {
                        return Err(SpanTreeError::Intersects {
                            span,
                            existing: node.span,
                        });
                    }
                    _ if relation.argument_contains() => {
                        parent = Some(id);
                        continue 'descend;
                    }
                    _ if relation.receiver_contains() => absorbed.push(id),
                    _ => {
                        if node.span.beg() >= span.end() {
                            before = Some(id);
                            break;
                        }
                    }
                }
                cursor = node.next_sibling;
            }
            return Ok(self.link_new(kind, span, parent, &absorbed, before));
        }
    }

    /// Like [`add`](Self::add) but reports failure as `None`.
    pub fn try_add(&mut self, kind: SpanKind, span: TokenSpan) -> Option<SpanId> {
        self.add(kind, span).ok()
    }

    /// Removes a span from the tree.
    ///
    /// With `with_children` the whole subtree is discarded; otherwise the
    /// children are lifted into the span's place among its siblings.
    ///
    /// # Errors
    ///
    /// Fails when `id` is not attached to this tree.
    pub fn detach(&mut self, id: SpanId, with_children: bool) -> Result<(), SpanTreeError> {
        let node = self.node(id)?.clone();
        self.detach_node(id, &node, with_children);
        Ok(())
    }

    /// Shifts spans after `count` tokens were inserted at `index`.
    ///
    /// Spans after the insertion point move by `count`; spans strictly
    /// around it grow. A span starting exactly at `index` grows to include
    /// the new tokens unless `insert_before` is set, in which case it moves.
    pub fn on_insert_tokens(&mut self, index: usize, count: usize, insert_before: bool) {
        if count == 0 {
            return;
        }
        let ids: Vec<SpanId> = self.nodes.ids().collect();
        for id in ids {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            let (beg, end) = (node.span.beg(), node.span.end());
            node.span = if beg > index || (beg == index && insert_before) {
                TokenSpan::new(beg + count, end + count)
            } else if end > index {
                TokenSpan::new(beg, end + count)
            } else {
                node.span
            };
        }
    }

    /// Shifts, truncates or drops spans after the tokens in `removed` were
    /// deleted.
    ///
    /// Fully consumed spans are detached with their children. A child left
    /// covering exactly its parent's tokens is merged into the parent.
    pub fn on_remove_tokens(&mut self, removed: TokenSpan) {
        if removed.is_empty() {
            return;
        }
        let (cut_beg, cut_end, count) = (removed.beg(), removed.end(), removed.len());
        let mut consumed = Vec::new();
        let ids: Vec<SpanId> = self.nodes.ids().collect();
        for id in ids {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            let (beg, end) = (node.span.beg(), node.span.end());
            if end <= cut_beg {
                continue;
            }
            if beg >= cut_end {
                node.span = TokenSpan::new(beg - count, end - count);
            } else if cut_beg <= beg && end <= cut_end {
                consumed.push(id);
            } else {
                let new_beg = beg.min(cut_beg);
                let new_end = if end > cut_end { end - count } else { cut_beg };
                node.span = TokenSpan::new(new_beg, new_end);
            }
        }
        for id in consumed {
            if let Some(node) = self.nodes.get(id).cloned() {
                self.detach_node(id, &node, true);
            }
        }
        self.collapse_equal_children();
    }

    fn collapse_equal_children(&mut self) {
        let collapsing: Vec<SpanId> = self
            .iter()
            .filter(|&id| {
                self.get(id)
                    .and_then(|node| node.parent.map(|parent| (node.span, parent)))
                    .and_then(|(span, parent)| self.get(parent).map(|p| p.span == span))
                    .unwrap_or(false)
            })
            .collect();
        for id in collapsing {
            if let Some(node) = self.nodes.get(id).cloned() {
                self.detach_node(id, &node, false);
            }
        }
    }

    fn detach_node(&mut self, id: SpanId, node: &SpanNode, with_children: bool) {
        let lifted = if with_children {
            None
        } else {
            node.first_child.zip(node.last_child)
        };
        let Some((first, last)) = lifted else {
            let doomed: Vec<SpanId> = self.subtree(id).collect();
            self.relink(node.parent, node.prev_sibling, node.next_sibling);
            for victim in doomed {
                self.nodes.remove(victim);
            }
            return;
        };
        let children: Vec<SpanId> = self.children(id).collect();
        for child in children {
            if let Some(child_node) = self.nodes.get_mut(child) {
                child_node.parent = node.parent;
            }
        }
        if let Some(first_node) = self.nodes.get_mut(first) {
            first_node.prev_sibling = node.prev_sibling;
        }
        if let Some(last_node) = self.nodes.get_mut(last) {
            last_node.next_sibling = node.next_sibling;
        }
        self.relink(node.parent, node.prev_sibling, Some(first));
        self.relink(node.parent, Some(last), node.next_sibling);
        self.nodes.remove(id);
    }

    fn node(&self, id: SpanId) -> Result<&SpanNode, SpanTreeError> {
        self.nodes.get(id).ok_or(SpanTreeError::UnknownSpan)
    }

    fn first_in(&self, parent: Option<SpanId>) -> Option<SpanId> {
        parent.map_or(self.first_root, |id| {
            self.get(id).and_then(SpanNode::first_child)
        })
    }

    fn last_in(&self, parent: Option<SpanId>) -> Option<SpanId> {
        parent.map_or(self.last_root, |id| {
            self.get(id).and_then(SpanNode::last_child)
        })
    }

    /// Makes `prev` and `next` adjacent siblings under `parent`.
    fn relink(&mut self, parent: Option<SpanId>, prev: Option<SpanId>, next: Option<SpanId>) {
        if let Some(id) = prev {
            if let Some(node) = self.nodes.get_mut(id) {
                node.next_sibling = next;
            }
        } else {
            self.set_first(parent, next);
        }
        if let Some(id) = next {
            if let Some(node) = self.nodes.get_mut(id) {
                node.prev_sibling = prev;
            }
        } else {
            self.set_last(parent, prev);
        }
    }

    fn set_first(&mut self, parent: Option<SpanId>, first: Option<SpanId>) {
        if let Some(id) = parent {
            if let Some(node) = self.nodes.get_mut(id) {
                node.first_child = first;
            }
        } else {
            self.first_root = first;
        }
    }

    fn set_last(&mut self, parent: Option<SpanId>, last: Option<SpanId>) {
        if let Some(id) = parent {
            if let Some(node) = self.nodes.get_mut(id) {
                node.last_child = last;
            }
        } else {
            self.last_root = last;
        }
    }

    fn link_new(
        &mut self,
        kind: SpanKind,
        span: TokenSpan,
        parent: Option<SpanId>,
        absorbed: &[SpanId],
        before: Option<SpanId>,
    ) -> SpanId {
        let (prev, next) = match (absorbed.first(), absorbed.last()) {
            (Some(&first), Some(&last)) => (
                self.get(first).and_then(SpanNode::prev_sibling),
                self.get(last).and_then(SpanNode::next_sibling),
            ),
            _ => before.map_or_else(
                || (self.last_in(parent), None),
                |id| (self.get(id).and_then(SpanNode::prev_sibling), Some(id)),
            ),
        };
        let mut node = SpanNode::detached(kind, span);
        node.parent = parent;
        node.prev_sibling = prev;
        node.next_sibling = next;
        let id = self.nodes.insert(node);

        if let (Some(&first), Some(&last)) = (absorbed.first(), absorbed.last()) {
            for &child in absorbed {
                if let Some(child_node) = self.nodes.get_mut(child) {
                    child_node.parent = Some(id);
                }
            }
            if let Some(first_node) = self.nodes.get_mut(first) {
                first_node.prev_sibling = None;
            }
            if let Some(last_node) = self.nodes.get_mut(last) {
                last_node.next_sibling = None;
            }
            if let Some(new_node) = self.nodes.get_mut(id) {
                new_node.first_child = Some(first);
                new_node.last_child = Some(last);
            }
        }
        self.relink(parent, prev, Some(id));
        self.relink(parent, Some(id), next);
        id
    }
}

/// Iterator over a run of siblings.
#[derive(Debug, Clone)]
pub struct Siblings<'a> {
    tree: &'a SpanTree,
    next: Option<SpanId>,
}

impl Iterator for Siblings<'_> {
    type Item = SpanId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.get(current).and_then(SpanNode::next_sibling);
        Some(current)
    }
}

/// Pre-order iterator over a tree or subtree.
#[derive(Debug, Clone)]
pub struct PreOrder<'a> {
    tree: &'a SpanTree,
    next: Option<SpanId>,
    stop: Option<SpanId>,
}

impl Iterator for PreOrder<'_> {
    type Item = SpanId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let node = self.tree.get(current)?;
        self.next = node.first_child.or_else(|| self.following(current));
        Some(current)
    }
}

impl PreOrder<'_> {
    /// Next node after `id`'s subtree, never leaving the `stop` subtree.
    fn following(&self, id: SpanId) -> Option<SpanId> {
        let mut cursor = id;
        loop {
            if Some(cursor) == self.stop {
                return None;
            }
            let node = self.tree.get(cursor)?;
            if let Some(next) = node.next_sibling {
                return Some(next);
            }
            cursor = node.parent?;
        }
    }
}
