//! Unit tests for splice-syntax.

use std::sync::Arc;

use insta::assert_snapshot;
use rstest::{fixture, rstest};

use crate::{
    Analyzer, EditError, SourceCode, SourceCodeEditor, SpanId, SpanKind, SpanTree, SpanTreeError,
    SupportedLanguage, Token, TokenSpan, TreeSitterAnalyzer,
};

fn span(beg: usize, end: usize) -> TokenSpan {
    TokenSpan::new(beg, end)
}

fn kind() -> SpanKind {
    SpanKind::from_static("block")
}

fn word(text: &str) -> Token {
    Token::new("word", text).with_leading_trivia(" ")
}

fn words(texts: &[&str]) -> Vec<Token> {
    texts.iter().map(|text| word(text)).collect()
}

fn texts(code: &SourceCode) -> Vec<String> {
    code.tokens().iter().map(|t| t.text().to_owned()).collect()
}

fn spans_of(tree: &SpanTree) -> Vec<TokenSpan> {
    tree.iter().filter_map(|id| tree.get(id)).map(|n| n.span()).collect()
}

fn child_spans(tree: &SpanTree, id: SpanId) -> Vec<TokenSpan> {
    tree.children(id)
        .filter_map(|child| tree.get(child))
        .map(|n| n.span())
        .collect()
}

/// Checks parent, sibling and containment links of every span.
fn assert_well_formed(tree: &SpanTree) {
    let mut previous: Option<TokenSpan> = None;
    for id in tree.roots() {
        let node = tree.get(id).expect("root attached");
        assert!(node.parent().is_none());
        if let Some(prev) = previous {
            assert!(prev.end() <= node.span().beg(), "roots out of order");
        }
        previous = Some(node.span());
    }
    for id in tree.iter() {
        let node = tree.get(id).expect("attached");
        let mut last_end = node.span().beg();
        for child in tree.children(id) {
            let child_node = tree.get(child).expect("child attached");
            assert_eq!(child_node.parent(), Some(id));
            assert!(node.span().relationship(child_node.span()).receiver_contains());
            assert!(child_node.span().beg() >= last_end, "children out of order");
            last_end = child_node.span().end();
        }
    }
}

// =============================================================================
// Span Tree Tests
// =============================================================================

#[fixture]
fn nested_tree() -> SpanTree {
    let mut tree = SpanTree::new();
    tree.add(kind(), span(2, 4)).expect("first leaf");
    tree.add(kind(), span(5, 7)).expect("second leaf");
    tree.add(kind(), span(1, 8)).expect("parent absorbs leaves");
    tree.add(kind(), span(9, 12)).expect("sibling");
    tree
}

#[rstest]
fn add_absorbs_contained_siblings(nested_tree: SpanTree) {
    let roots: Vec<_> = nested_tree.roots().collect();
    assert_eq!(roots.len(), 2);
    let parent = roots.first().copied().expect("root");
    assert_eq!(child_spans(&nested_tree, parent), vec![span(2, 4), span(5, 7)]);
    assert_well_formed(&nested_tree);
}

#[rstest]
#[case::overlap(span(3, 6), SpanTreeError::Intersects { span: span(3, 6), existing: span(2, 4) })]
#[case::duplicate(span(5, 7), SpanTreeError::Duplicate { span: span(5, 7) })]
#[case::empty(TokenSpan::empty(), SpanTreeError::EmptySpan)]
fn add_rejects_non_nesting_spans(
    mut nested_tree: SpanTree,
    #[case] rejected: TokenSpan,
    #[case] expected: SpanTreeError,
) {
    let before = spans_of(&nested_tree);
    assert_eq!(nested_tree.add(kind(), rejected), Err(expected));
    assert_eq!(spans_of(&nested_tree), before);
    assert!(nested_tree.try_add(kind(), rejected).is_none());
}

#[rstest]
#[case(0, None)]
#[case(1, Some(span(1, 8)))]
#[case(3, Some(span(2, 4)))]
#[case(4, Some(span(1, 8)))]
#[case(11, Some(span(9, 12)))]
#[case(12, None)]
fn span_at_returns_deepest_match(
    nested_tree: SpanTree,
    #[case] index: usize,
    #[case] expected: Option<TokenSpan>,
) {
    let found = nested_tree
        .span_at(index)
        .and_then(|id| nested_tree.get(id))
        .map(|n| n.span());
    assert_eq!(found, expected);
}

#[rstest]
#[case::grows(false, span(2, 8))]
#[case::stays_outside(true, span(5, 8))]
fn insertion_at_span_start_honours_insert_before(
    #[case] insert_before: bool,
    #[case] expected: TokenSpan,
) {
    let mut tree = SpanTree::new();
    tree.add(kind(), span(0, 2)).expect("before");
    let target = tree.add(kind(), span(2, 5)).expect("target");
    tree.add(kind(), span(6, 9)).expect("after");

    tree.on_insert_tokens(2, 3, insert_before);

    assert_eq!(tree.get(target).map(|n| n.span()), Some(expected));
    assert_eq!(spans_of(&tree), vec![span(0, 2), expected, span(9, 12)]);
    assert_well_formed(&tree);
}

#[rstest]
fn removal_drops_consumed_spans_and_shifts_the_rest(mut nested_tree: SpanTree) {
    let leaf = nested_tree.span_at(5).expect("leaf");
    nested_tree.on_remove_tokens(span(5, 7));

    assert!(nested_tree.is_detached(leaf));
    assert_eq!(spans_of(&nested_tree), vec![span(1, 6), span(2, 4), span(7, 10)]);
    assert_well_formed(&nested_tree);
}

#[test]
fn removal_truncates_straddling_spans() {
    let mut tree = SpanTree::new();
    tree.add(kind(), span(2, 8)).expect("add");
    tree.on_remove_tokens(span(5, 10));
    assert_eq!(spans_of(&tree), vec![span(2, 5)]);
}

#[test]
fn removal_collapses_child_equal_to_parent() {
    let mut tree = SpanTree::new();
    tree.add(kind(), span(0, 3)).expect("child");
    let parent = tree.add(kind(), span(0, 6)).expect("parent");
    tree.on_remove_tokens(span(3, 6));

    assert_eq!(tree.len(), 1);
    assert_eq!(tree.get(parent).map(|n| n.span()), Some(span(0, 3)));
}

#[rstest]
fn detach_without_children_lifts_them(mut nested_tree: SpanTree) {
    let parent = nested_tree.roots().next().expect("root");
    nested_tree.detach(parent, false).expect("detach");

    let roots: Vec<_> = nested_tree
        .roots()
        .filter_map(|id| nested_tree.get(id))
        .map(|n| n.span())
        .collect();
    assert_eq!(roots, vec![span(2, 4), span(5, 7), span(9, 12)]);
    assert_well_formed(&nested_tree);
}

#[rstest]
fn detach_with_children_discards_subtree(mut nested_tree: SpanTree) {
    let parent = nested_tree.roots().next().expect("root");
    let leaf = nested_tree.span_at(2).expect("leaf");
    nested_tree.detach(parent, true).expect("detach");

    assert!(nested_tree.is_detached(leaf));
    assert_eq!(spans_of(&nested_tree), vec![span(9, 12)]);
    assert_eq!(
        nested_tree.detach(parent, true),
        Err(SpanTreeError::UnknownSpan)
    );
}

// =============================================================================
// Editor Tests
// =============================================================================

#[fixture]
fn editor() -> SourceCodeEditor {
    let tokens = words(&["a", "b", "c", "d", "e"]);
    let mut tree = SpanTree::new();
    tree.add(kind(), span(2, 4)).expect("span");
    SourceCodeEditor::new(SourceCode::new(tokens, tree, "\n"))
}

fn first_span(editor: &SourceCodeEditor) -> Option<TokenSpan> {
    let spans = editor.source().spans();
    spans.roots().next().and_then(|id| spans.get(id)).map(|n| n.span())
}

#[rstest]
fn applying_nothing_returns_the_same_tokens(mut editor: SourceCodeEditor) {
    let before = Arc::clone(editor.source().tokens());
    let after = editor.apply_changes();
    assert!(Arc::ptr_eq(&before, &after));
}

#[rstest]
fn disjoint_replacements_apply_in_index_order(mut editor: SourceCodeEditor) {
    editor.replace(3, 1, words(&["X", "Y"])).expect("later range");
    editor.replace(0, 1, words(&["Z"])).expect("earlier range");
    assert_eq!(texts(editor.source()), vec!["a", "b", "c", "d", "e"]);

    editor.apply_changes();

    assert_eq!(texts(editor.source()), vec!["Z", "b", "c", "X", "Y", "e"]);
    assert_eq!(first_span(&editor), Some(span(2, 5)));
    assert!(!editor.has_pending());
}

#[rstest]
fn overlapping_replacements_are_rejected(mut editor: SourceCodeEditor) {
    editor.replace(1, 2, words(&["X"])).expect("first");
    let err = editor.replace(2, 2, words(&["Y"])).expect_err("overlap");
    assert_eq!(err, EditError::span_intersects(span(2, 4), span(1, 3)));
    assert_snapshot!(err.to_string(), @"span [2,4) intersects an already modified span [1,3)");
    assert_eq!(editor.pending_len(), 1);
}

#[rstest]
fn identical_replacements_merge(mut editor: SourceCodeEditor) {
    editor.replace(1, 1, words(&["X"])).expect("first");
    editor.replace(1, 1, words(&["Y"])).expect("merged");
    assert_eq!(editor.pending_len(), 1);

    editor.apply_changes();
    assert_eq!(texts(editor.source()), vec!["a", "X", "Y", "c", "d", "e"]);
}

#[rstest]
fn insertion_inside_replacement_is_rejected(mut editor: SourceCodeEditor) {
    editor.replace(1, 3, words(&["X"])).expect("replace");
    assert_eq!(
        editor.insert_at(2, words(&["I"])),
        Err(EditError::insertion_inside(2, span(1, 4)))
    );
    assert_eq!(
        editor.insert_at(1, words(&["I"])),
        Err(EditError::insertion_inside(1, span(1, 4)))
    );
    editor
        .insert_before(1, words(&["B"]))
        .expect("insert before a replacement start");
    editor.insert_at(4, words(&["E"])).expect("insert at replacement end");

    editor.apply_changes();
    assert_eq!(texts(editor.source()), vec!["a", "B", "X", "E", "e"]);
}

#[rstest]
fn replacement_swallowing_staged_insertion_is_rejected(mut editor: SourceCodeEditor) {
    editor.insert_at(3, words(&["I"])).expect("insert");
    assert_eq!(
        editor.replace(2, 2, words(&["X"])),
        Err(EditError::insertion_inside(3, span(2, 4)))
    );
}

#[rstest]
#[case::insert_at(false, span(2, 6))]
#[case::insert_before(true, span(4, 6))]
fn insertion_at_span_start(
    mut editor: SourceCodeEditor,
    #[case] before: bool,
    #[case] expected: TokenSpan,
) {
    let tokens = words(&["P", "Q"]);
    if before {
        editor.insert_before(2, tokens).expect("insert");
    } else {
        editor.insert_at(2, tokens).expect("insert");
    }
    editor.apply_changes();
    assert_eq!(texts(editor.source()), vec!["a", "b", "P", "Q", "c", "d", "e"]);
    assert_eq!(first_span(&editor), Some(expected));
}

#[rstest]
fn same_point_insertions_concatenate(mut editor: SourceCodeEditor) {
    editor.insert_at(5, words(&["X"])).expect("first");
    editor.insert_at(5, words(&["Y"])).expect("second");
    editor.insert_before(5, words(&["W"])).expect("before");
    assert_eq!(editor.pending_len(), 2);

    editor.apply_changes();
    assert_eq!(
        texts(editor.source()),
        vec!["a", "b", "c", "d", "e", "W", "X", "Y"]
    );
}

#[rstest]
fn removal_shrinks_spans(mut editor: SourceCodeEditor) {
    editor.remove_at(3).expect("remove");
    editor.remove_range(0, 2).expect("remove range");
    editor.apply_changes();
    assert_eq!(texts(editor.source()), vec!["c", "e"]);
    assert_eq!(first_span(&editor), Some(span(0, 1)));
}

#[rstest]
fn out_of_range_edits_are_rejected(mut editor: SourceCodeEditor) {
    assert_eq!(
        editor.remove_range(4, 2),
        Err(EditError::out_of_range(4, 2, 5))
    );
    assert!(editor.insert_at(5, words(&["end"])).is_ok());
    assert_eq!(
        editor.insert_at(6, words(&["past"])),
        Err(EditError::out_of_range(6, 0, 5))
    );
}

#[rstest]
fn add_source_span_flushes_pending_changes(mut editor: SourceCodeEditor) {
    editor.insert_at(0, words(&["x", "y"])).expect("insert");
    let id = editor
        .add_source_span(SpanKind::new("prefix"), span(0, 2))
        .expect("span");
    assert!(!editor.has_pending());
    let node = editor.source().spans().get(id).expect("attached");
    assert_eq!(node.kind().as_str(), "prefix");
    assert_eq!(texts(editor.source()).len(), 7);
}

#[test]
fn reparse_failure_leaves_source_untouched() {
    let analyzer = TreeSitterAnalyzer::new(SupportedLanguage::Rust).expect("analyzer");
    let source = analyzer.try_parse("fn a() {}\n").expect("parse");
    let mut editor = SourceCodeEditor::new(source);

    let last = editor.source().len() - 1;
    editor.remove_at(last).expect("remove closing brace");
    editor.apply_changes();
    let broken = editor.source().to_text();
    assert_eq!(broken, "fn a() {\n");

    assert!(editor.reparse(&analyzer).is_err());
    assert_eq!(editor.source().to_text(), broken);

    editor
        .insert_at(last, vec![Token::new("}", "}")])
        .expect("restore brace");
    editor.apply_changes();
    editor.reparse(&analyzer).expect("valid again");
    assert_eq!(editor.source().to_text(), "fn a() {}\n");
    assert_eq!(editor.source().spans().len(), 1);
}
