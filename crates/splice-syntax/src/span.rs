//! Half-open token ranges and their pairwise relationship classifier.
//!
//! [`TokenSpan::relationship`] is the single primitive used both by the span
//! tree (nesting checks) and by the editor (collision checks between staged
//! modifications).

use std::fmt;

/// A half-open `[beg, end)` range over token indices.
///
/// The default value (`end == 0`) is the empty span. Constructing a span
/// whose end does not exceed its start yields the empty span, so a non-empty
/// span always satisfies `beg < end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TokenSpan {
    beg: usize,
    end: usize,
}

impl TokenSpan {
    /// Creates the span `[beg, end)`, or the empty span when `end <= beg`.
    #[must_use]
    pub const fn new(beg: usize, end: usize) -> Self {
        if end <= beg {
            Self { beg: 0, end: 0 }
        } else {
            Self { beg, end }
        }
    }

    /// Creates the span starting at `beg` and covering `count` tokens.
    #[must_use]
    pub const fn with_len(beg: usize, count: usize) -> Self {
        Self::new(beg, beg.saturating_add(count))
    }

    /// The empty span.
    #[must_use]
    pub const fn empty() -> Self {
        Self { beg: 0, end: 0 }
    }

    /// Inclusive start index.
    #[must_use]
    pub const fn beg(self) -> usize {
        self.beg
    }

    /// Exclusive end index.
    #[must_use]
    pub const fn end(self) -> usize {
        self.end
    }

    /// Number of covered tokens.
    #[must_use]
    pub const fn len(self) -> usize {
        self.end - self.beg
    }

    /// Returns `true` for the empty span.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.end == 0
    }

    /// Returns `true` when `index` falls inside the span.
    #[must_use]
    pub const fn contains_index(self, index: usize) -> bool {
        self.beg <= index && index < self.end
    }

    /// Classifies how `self` relates to `other`.
    ///
    /// The pair is first put in canonical order (the span that starts first,
    /// or the longer one when both start together); the returned
    /// [`SpanRelation::swapped`] flag records whether that reordering
    /// exchanged the arguments.
    #[must_use]
    pub fn relationship(self, other: Self) -> SpanRelation {
        if self.beg == other.beg {
            if self.is_empty() {
                return SpanRelation::new(SpanRelationship::Independent, false);
            }
            if other.is_empty() {
                return SpanRelation::new(SpanRelationship::Independent, false);
            }
            return match self.end.cmp(&other.end) {
                std::cmp::Ordering::Equal => SpanRelation::new(SpanRelationship::Equal, false),
                std::cmp::Ordering::Greater => {
                    SpanRelation::new(SpanRelationship::SameStart, false)
                }
                std::cmp::Ordering::Less => SpanRelation::new(SpanRelationship::SameStart, true),
            };
        }
        let (first, second, swapped) = if self.beg < other.beg {
            (self, other, false)
        } else {
            (other, self, true)
        };
        if first.is_empty() || second.is_empty() {
            return SpanRelation::new(SpanRelationship::Independent, swapped);
        }
        let kind = if first.end == second.end {
            SpanRelationship::SameEnd
        } else if first.end == second.beg {
            SpanRelationship::Contiguous
        } else if first.end < second.beg {
            SpanRelationship::Independent
        } else if first.end > second.end {
            SpanRelationship::Contained
        } else {
            SpanRelationship::Overlapped
        };
        SpanRelation::new(kind, swapped)
    }
}

impl fmt::Display for TokenSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})", self.beg, self.end)
    }
}

/// Relationship kinds between two token spans in canonical order.
///
/// In canonical order the first span starts no later than the second; when
/// both start at the same index the first one is the longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanRelationship {
    /// Both spans cover exactly the same tokens.
    Equal,
    /// Both spans end at the same index; the first one starts earlier.
    SameEnd,
    /// Both spans start at the same index; the first one is longer.
    SameStart,
    /// The first span ends exactly where the second one starts.
    Contiguous,
    /// The spans are separated by at least one token, or one is empty.
    Independent,
    /// The spans share tokens without either containing the other.
    Overlapped,
    /// The second span lies strictly inside the first one.
    Contained,
}

/// The outcome of [`TokenSpan::relationship`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanRelation {
    kind: SpanRelationship,
    swapped: bool,
}

impl SpanRelation {
    /// Creates a relation.
    #[must_use]
    pub const fn new(kind: SpanRelationship, swapped: bool) -> Self {
        Self { kind, swapped }
    }

    /// The relationship kind.
    #[must_use]
    pub const fn kind(self) -> SpanRelationship {
        self.kind
    }

    /// `true` when the arguments were exchanged before classification.
    #[must_use]
    pub const fn swapped(self) -> bool {
        self.swapped
    }

    /// `true` when one span nests inside the other without being equal.
    #[must_use]
    pub const fn is_nesting(self) -> bool {
        matches!(
            self.kind,
            SpanRelationship::SameStart | SpanRelationship::SameEnd | SpanRelationship::Contained
        )
    }

    /// `true` when the spans share no token.
    #[must_use]
    pub const fn is_disjoint(self) -> bool {
        matches!(
            self.kind,
            SpanRelationship::Independent | SpanRelationship::Contiguous
        )
    }

    /// `true` when the receiver of `relationship` strictly contains the
    /// argument.
    #[must_use]
    pub const fn receiver_contains(self) -> bool {
        self.is_nesting() && !self.swapped
    }

    /// `true` when the argument of `relationship` strictly contains the
    /// receiver.
    #[must_use]
    pub const fn argument_contains(self) -> bool {
        self.is_nesting() && self.swapped
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn span(beg: usize, end: usize) -> TokenSpan {
        TokenSpan::new(beg, end)
    }

    #[rstest]
    #[case::equal(span(2, 5), span(2, 5), SpanRelationship::Equal, false)]
    #[case::same_start_longer_first(span(2, 6), span(2, 4), SpanRelationship::SameStart, false)]
    #[case::same_start_longer_second(span(2, 4), span(2, 6), SpanRelationship::SameStart, true)]
    #[case::same_end(span(1, 5), span(3, 5), SpanRelationship::SameEnd, false)]
    #[case::same_end_swapped(span(3, 5), span(1, 5), SpanRelationship::SameEnd, true)]
    #[case::contiguous(span(1, 3), span(3, 6), SpanRelationship::Contiguous, false)]
    #[case::contiguous_swapped(span(3, 6), span(1, 3), SpanRelationship::Contiguous, true)]
    #[case::independent(span(1, 2), span(4, 6), SpanRelationship::Independent, false)]
    #[case::contained(span(1, 9), span(3, 5), SpanRelationship::Contained, false)]
    #[case::contained_swapped(span(3, 5), span(1, 9), SpanRelationship::Contained, true)]
    #[case::overlapped(span(1, 5), span(3, 8), SpanRelationship::Overlapped, false)]
    #[case::overlapped_swapped(span(3, 8), span(1, 5), SpanRelationship::Overlapped, true)]
    fn classifies_pairs(
        #[case] first: TokenSpan,
        #[case] second: TokenSpan,
        #[case] kind: SpanRelationship,
        #[case] swapped: bool,
    ) {
        assert_eq!(first.relationship(second), SpanRelation::new(kind, swapped));
    }

    #[rstest]
    #[case(TokenSpan::empty(), span(0, 4))]
    #[case(span(0, 4), TokenSpan::empty())]
    #[case(TokenSpan::empty(), span(3, 4))]
    #[case(span(3, 4), TokenSpan::empty())]
    #[case(TokenSpan::empty(), TokenSpan::empty())]
    fn empty_spans_are_always_independent(#[case] first: TokenSpan, #[case] second: TokenSpan) {
        assert_eq!(
            first.relationship(second).kind(),
            SpanRelationship::Independent
        );
    }

    #[test]
    fn degenerate_ranges_normalise_to_empty() {
        assert!(span(4, 4).is_empty());
        assert!(span(5, 2).is_empty());
        assert_eq!(span(5, 2), TokenSpan::default());
        assert_eq!(TokenSpan::with_len(3, 2), span(3, 5));
    }

    #[test]
    fn relationship_is_symmetric_modulo_swap() {
        let mut spans = vec![TokenSpan::empty()];
        for beg in 0..6 {
            for end in (beg + 1)..7 {
                spans.push(span(beg, end));
            }
        }
        for &a in &spans {
            for &b in &spans {
                let forward = a.relationship(b);
                let backward = b.relationship(a);
                assert_eq!(forward.kind(), backward.kind(), "{a} vs {b}");
                if a != b && !a.is_empty() && !b.is_empty() {
                    assert_ne!(forward.swapped(), backward.swapped(), "{a} vs {b}");
                }
            }
        }
    }

    #[test]
    fn nesting_helpers_follow_canonical_order() {
        let outer = span(0, 10);
        let inner = span(2, 4);
        assert!(outer.relationship(inner).receiver_contains());
        assert!(inner.relationship(outer).argument_contains());
        assert!(!outer.relationship(outer).is_nesting());
        assert!(span(0, 2).relationship(span(2, 3)).is_disjoint());
    }
}
