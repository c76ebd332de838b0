//! Change tracking and batched application after a build.

use rstest::rstest;

use super::support::{HOME_T, HOME_TS, Harness, app_package};
use crate::{
    ChangeEvent, DiagnosticCode, ErrorScope, InstallableItem, PackageGraph, PackageResources,
    Severity, TargetRef,
};

fn paths(items: &[InstallableItem]) -> Vec<&str> {
    items.iter().map(|item| item.target_path.as_str()).collect()
}

fn built_home() -> Harness {
    let harness = Harness::app(&[("pages/home.ts", HOME_TS), ("home.t", HOME_T)]).build();
    assert!(harness.take_codes().is_empty());
    harness
}

#[test]
fn new_files_are_registered_and_returned_once() {
    let mut harness = built_home();
    harness.write("pages/about.ts", "export const about = 1;\n");

    assert!(harness.touch("pages/about.ts"));
    let installed = harness.environment.apply_changes();

    assert_eq!(paths(&installed), vec!["app/pages/about.ts"]);
    assert_eq!(
        installed.first().map(|item| item.text.as_str()),
        Some("export const about = 1;\n")
    );
    assert!(harness.environment.item_by_path("app/pages/about.ts").is_some());
    assert!(harness.environment.apply_changes().is_empty());
}

#[test]
fn edited_items_are_reparsed_and_retransformed() {
    let mut harness = built_home();
    harness.write(
        "pages/home.ts",
        "export const greeting = 'hi';\nexport const x = 1;\n",
    );

    assert!(harness.touch("pages/home.ts"));
    let installed = harness.environment.apply_changes();

    assert_eq!(paths(&installed), vec!["app/pages/home.ts"]);
    assert_eq!(
        installed.first().map(|item| item.text.as_str()),
        Some("export const greeting = 'hello';\nexport const x = 1;\n")
    );
}

#[test]
fn unchanged_text_installs_nothing() {
    let mut harness = built_home();

    assert!(harness.touch("pages/home.ts"));
    assert!(harness.environment.apply_changes().is_empty());
    assert!(harness.take_codes().is_empty());
}

#[test]
fn edited_function_sources_are_redeclared() {
    let mut harness = built_home();
    harness.write(
        "home.t",
        "create typescript transformer\nbegin\n    replace \"'hi'\" with \"'hey'\";\nend\n",
    );

    assert!(harness.touch("home.t"));
    let installed = harness.environment.apply_changes();

    assert_eq!(paths(&installed), vec!["app/pages/home.ts"]);
    assert_eq!(harness.text_of("app/pages/home.ts"), "export const greeting = 'hey';\n");
    assert!(harness.environment.function_by_name("home").is_some());
    assert!(harness.take_codes().is_empty());
}

#[test]
fn directory_changes_cover_every_input_below() {
    let mut harness = Harness::app(&[
        ("pages/a.ts", "export const a = 1;\n"),
        ("pages/b.ts", "export const b = 1;\n"),
        ("other.ts", "export const other = 1;\n"),
    ])
    .build();
    harness.write("pages/a.ts", "export const a = 2;\n");
    harness.write("pages/b.ts", "export const b = 2;\n");
    harness.write("other.ts", "export const other = 2;\n");

    assert!(harness.touch("pages"));
    let installed = harness.environment.apply_changes();

    assert_eq!(paths(&installed), vec!["app/pages/a.ts", "app/pages/b.ts"]);
}

#[test]
fn removed_items_orphan_their_functions() {
    let mut harness = built_home();
    harness.delete("pages/home.ts");

    assert!(harness.touch("pages/home.ts"));
    let installed = harness.environment.apply_changes();

    assert!(installed.is_empty());
    let reported = harness.sink.take();
    let codes: Vec<_> = reported.iter().map(|d| (d.code(), d.severity())).collect();
    assert_eq!(
        codes,
        vec![
            (DiagnosticCode::ESpliceInputRemoved, Severity::Info),
            (DiagnosticCode::ESpliceTargetNotFound, Severity::Error),
        ]
    );
    assert!(harness.environment.item_by_path("app/pages/home.ts").is_none());
    let target = harness
        .environment
        .function_by_name("home")
        .and_then(|id| harness.environment.function(id))
        .and_then(|f| f.target());
    assert_eq!(target, None);
}

#[test]
fn removed_function_sources_restore_the_original_text() {
    let mut harness = built_home();
    harness.delete("home.t");

    assert!(harness.touch("home.t"));
    let installed = harness.environment.apply_changes();

    assert_eq!(
        installed,
        vec![InstallableItem {
            target_path: "app/pages/home.ts".to_owned(),
            text: HOME_TS.to_owned(),
        }]
    );
    assert!(harness.environment.function_by_name("home").is_none());
    assert_eq!(
        harness.take_codes(),
        vec![DiagnosticCode::ESpliceInputRemoved]
    );
}

#[test]
fn new_items_satisfy_unresolved_functions_quietly() {
    let mut harness = Harness::app(&[(
        "about.t",
        "create typescript transformer\nbegin\n    replace \"1\" with \"2\";\nend\n",
    )])
    .build();
    assert_eq!(
        harness.take_codes(),
        vec![DiagnosticCode::ESpliceTargetNotFound]
    );

    harness.write("about.ts", "export const about = 1;\n");
    assert!(harness.touch("about.ts"));
    let installed = harness.environment.apply_changes();

    assert_eq!(
        installed.first().map(|item| item.text.as_str()),
        Some("export const about = 2;\n")
    );
    assert!(harness.take_codes().is_empty());
}

#[test]
fn sources_and_their_items_arriving_together_resolve_without_errors() {
    let mut harness = Harness::app(&[]).build();
    harness.write(
        "about.t",
        "create typescript transformer\nbegin\n    replace \"1\" with \"2\";\nend\n",
    );
    harness.write("about.ts", "export const about = 1;\n");
    let scope = ErrorScope::open(harness.sink.as_ref());

    assert!(harness.touch("about.t"));
    assert!(harness.touch("about.ts"));
    let installed = harness.environment.apply_changes();

    assert_eq!(
        installed,
        vec![InstallableItem {
            target_path: "app/about.ts".to_owned(),
            text: "export const about = 2;\n".to_owned(),
        }]
    );
    assert!(!scope.has_errors(harness.sink.as_ref()));
    assert!(harness.take_codes().is_empty());
}

fn k_patch() -> &'static str {
    "create typescript transformer on \"k\"\nbegin\n    replace \"1\" with \"2\";\nend\n"
}

#[test]
fn new_items_making_a_target_ambiguous_are_reported_like_a_build() {
    let mut harness = Harness::app(&[
        ("a/k.ts", "export const k = 1;\n"),
        ("patch.t", k_patch()),
    ])
    .build();
    assert!(harness.take_codes().is_empty());

    harness.write("b/k.ts", "export const k = 1;\n");
    assert!(harness.touch("b/k.ts"));
    let installed = harness.environment.apply_changes();

    assert_eq!(paths(&installed), vec!["app/a/k.ts", "app/b/k.ts"]);
    assert!(
        installed
            .iter()
            .all(|item| item.text == "export const k = 1;\n")
    );
    let live_codes = harness.take_codes();
    assert_eq!(live_codes, vec![DiagnosticCode::ESpliceAmbiguousTarget]);
    let target = harness
        .environment
        .function_by_name("patch:k")
        .and_then(|id| harness.environment.function(id))
        .and_then(|f| f.target());
    assert_eq!(target, None);

    let rebuilt = Harness::app(&[
        ("a/k.ts", "export const k = 1;\n"),
        ("b/k.ts", "export const k = 1;\n"),
        ("patch.t", k_patch()),
    ])
    .build();
    assert_eq!(rebuilt.take_codes(), live_codes);
}

#[test]
fn unrelated_new_items_keep_existing_targets() {
    let mut harness = Harness::app(&[
        ("a/k.ts", "export const k = 1;\n"),
        ("patch.t", k_patch()),
    ])
    .build();
    let bound = harness.environment.item_by_path("app/a/k.ts");

    harness.write("b/other.ts", "export const other = 1;\n");
    assert!(harness.touch("b/other.ts"));
    let installed = harness.environment.apply_changes();

    assert_eq!(paths(&installed), vec!["app/b/other.ts"]);
    let target = harness
        .environment
        .function_by_name("patch:k")
        .and_then(|id| harness.environment.function(id))
        .and_then(|f| f.target());
    assert_eq!(target, bound.map(TargetRef::Item));
    assert!(harness.take_codes().is_empty());
}

#[rstest]
#[case::unknown_extension(&[], "notes.md", false)]
#[case::recognised_extension(&[], "pages/home.ts", true)]
#[case::filtered_out(&["t"], "pages/home.ts", false)]
#[case::listed(&["t"], "home.t", true)]
#[case::listed_with_dot(&[".ts"], "pages/home.ts", true)]
fn watch_configuration_filters_changes(
    #[case] extensions: &[&str],
    #[case] path: &str,
    #[case] recorded: bool,
) {
    let mut harness = Harness::app(&[("pages/home.ts", HOME_TS), ("home.t", HOME_T)])
        .with_watch(extensions)
        .build();

    assert_eq!(harness.touch(path), recorded);
}

#[test]
fn stable_packages_ignore_changes() {
    let mut graph = PackageGraph::new();
    graph
        .add(PackageResources::stable("core", "core"), &[])
        .and_then(|g| g.add(app_package(), &["core".into()]))
        .expect("graph");
    let mut harness = Harness::with_graph(
        graph,
        &[("core", "util.ts", "export const util = 1;\n")],
    )
    .build();

    let event = ChangeEvent::new("core", "/work/core/util.ts", "util.ts");
    assert!(!harness.environment.on_change(&event));
    let unknown = ChangeEvent::new("missing", "/work/missing/a.ts", "a.ts");
    assert!(!harness.environment.on_change(&unknown));
    assert!(harness.environment.apply_changes().is_empty());
}

#[test]
fn live_external_references_without_resolver_only_warn() {
    let mut harness = built_home();
    harness.write(
        "ext.t",
        "create typescript transformer on \"../core/util\"\nbegin\nend\n",
    );

    assert!(harness.touch("ext.t"));
    let installed = harness.environment.apply_changes();

    assert!(installed.is_empty());
    let reported = harness.sink.take();
    let codes: Vec<_> = reported.iter().map(|d| (d.code(), d.severity())).collect();
    assert_eq!(
        codes,
        vec![(
            DiagnosticCode::ESpliceMissingExternalResolver,
            Severity::Warning
        )]
    );
}

#[test]
fn fixing_a_parse_failure_reparses_the_item() {
    let mut harness = Harness::app(&[("bad.ts", "function broken( {\n")]).build();
    assert_eq!(
        harness.take_codes(),
        vec![DiagnosticCode::ESpliceParseFailed]
    );
    let id = harness
        .environment
        .item_by_path("app/bad.ts")
        .expect("unparsed items are kept");
    assert!(!harness.environment.item(id).expect("item").is_parsed());

    harness.write("bad.ts", "function fixed() {}\n");
    assert!(harness.touch("bad.ts"));
    let installed = harness.environment.apply_changes();

    assert_eq!(paths(&installed), vec!["app/bad.ts"]);
    assert!(harness.environment.item(id).expect("item").is_parsed());
}
