//! Registration, resolution and transformation during a full build.

use insta::assert_snapshot;
use rstest::rstest;
use splice_syntax::SupportedLanguage;

use super::support::{HOME_T, HOME_TS, Harness, app_package};
use crate::{
    BuildSummary, DiagnosticCode, ExternalItemResolver, InputId, Language, PackageGraph,
    PackageResources, ResourceLocator, TargetRef,
};

fn typescript(target: &str, statements: &str) -> String {
    format!("create typescript transformer on \"{target}\"\nbegin\n{statements}end\n")
}

#[test]
fn implicit_target_resolves_by_source_name() {
    let harness = Harness::app(&[("pages/home.ts", HOME_TS), ("home.t", HOME_T)]).build();

    assert!(harness.take_codes().is_empty());
    let item = harness
        .environment
        .item_by_path("app/pages/home.ts")
        .expect("item registered");
    let function = harness
        .environment
        .function_by_name("home")
        .expect("function registered");
    let chain: Vec<_> = harness.environment.functions_of(TargetRef::Item(item)).collect();
    assert_eq!(chain, vec![function]);
    assert_eq!(
        harness
            .environment
            .function(function)
            .and_then(|f| f.target()),
        Some(TargetRef::Item(item))
    );
    assert_eq!(
        harness.text_of("app/pages/home.ts"),
        "export const greeting = 'hello';\n"
    );
}

#[test]
fn build_summary_counts_entities() {
    let mut harness = Harness::app(&[
        ("pages/home.ts", HOME_TS),
        ("home.t", HOME_T),
        ("notes.md", "ignored"),
    ]);
    let summary = harness.environment.build();
    assert_eq!(
        summary,
        BuildSummary {
            items: 1,
            sources: 1,
            functions: 1,
            errors: 0,
        }
    );
}

#[test]
fn ambiguous_target_names_every_match() {
    let patch = typescript("k", "");
    let harness = Harness::app(&[
        ("a/k.ts", "export const k = 1;\n"),
        ("b/k.ts", "export const k = 2;\n"),
        ("patch.t", patch.as_str()),
    ])
    .build();

    let errors = harness.take_errors();
    let [error] = errors.as_slice() else {
        panic!("expected one error, got {errors:?}");
    };
    assert_eq!(error.code(), DiagnosticCode::ESpliceAmbiguousTarget);
    assert_snapshot!(error.message(), @"target `k` of `patch:k` is ambiguous: app/a/k.ts, app/b/k.ts");
    assert!(harness.environment.function_by_name("patch:k").is_some());
}

#[test]
fn missing_target_lists_reachable_candidates() {
    let patch = typescript("sub/x", "");
    let harness = Harness::app(&[
        ("pages/x.ts", "export const x = 1;\n"),
        ("patch.t", patch.as_str()),
    ])
    .build();

    assert_snapshot!(harness.sink.render(), @r#"
    error[E_SPLICE_TARGET_NOT_FOUND]: target `sub/x` of `patch:sub/x` not found
      --> app:patch.t
      = note: reachable candidates: app/pages/x.ts
      = note: transformer:
    create typescript transformer on "sub/x"
    begin
    end
    "#);
}

#[rstest]
#[case::directory("pages/x", true)]
#[case::leading_slash("/pages/x", true)]
#[case::full_directory("app/pages/x", true)]
#[case::exact_file("pages/x.ts", true)]
#[case::bare_exact_file("x.ts", true)]
#[case::wrong_directory("sub/x", false)]
#[case::partial_directory("ages/x", false)]
#[case::other_extension("pages/x.py", false)]
#[case::partial_extension("pages/x.t", false)]
fn declared_targets_match_paths_and_names(#[case] target: &str, #[case] resolves: bool) {
    let patch = typescript(target, "");
    let harness = Harness::app(&[
        ("pages/x.ts", "export const x = 1;\n"),
        ("pages/xy.ts", "export const xy = 1;\n"),
        ("patch.t", patch.as_str()),
    ])
    .build();

    let name = format!("patch:{target}");
    let function = harness
        .environment
        .function_by_name(&name)
        .expect("function declared");
    let linked = harness
        .environment
        .function(function)
        .and_then(|f| f.target())
        .is_some();
    assert_eq!(linked, resolves);
    assert_eq!(harness.take_errors().is_empty(), resolves);
}

fn three_packages() -> PackageGraph {
    let mut graph = PackageGraph::new();
    graph
        .add(PackageResources::stable("core", "core"), &[])
        .and_then(|g| g.add(app_package(), &["core".into()]))
        .and_then(|g| {
            g.add(
                PackageResources::local("other", "other"),
                &["core".into()],
            )
        })
        .expect("graph");
    graph
}

#[test]
fn resolution_is_scoped_to_reachable_packages() {
    let patch = typescript("home", "");
    let harness = Harness::with_graph(
        three_packages(),
        &[
            ("core", "lib/util.ts", "export const util = 1;\n"),
            ("app", "home.ts", HOME_TS),
            ("app", "util.t", "create typescript transformer begin end\n"),
            ("other", "patch.t", patch.as_str()),
        ],
    )
    .build();

    let util = harness
        .environment
        .function_by_name("util")
        .and_then(|id| harness.environment.function(id))
        .and_then(|f| f.target());
    assert_eq!(
        util,
        harness.environment.item_by_path("core/lib/util.ts").map(TargetRef::Item)
    );

    let errors = harness.take_errors();
    let [error] = errors.as_slice() else {
        panic!("expected one error, got {errors:?}");
    };
    assert_eq!(error.code(), DiagnosticCode::ESpliceTargetNotFound);
    assert_eq!(
        error.notes().first().map(String::as_str),
        Some("reachable candidates: core/lib/util.ts")
    );
}

#[test]
fn duplicate_target_paths_are_rejected() {
    let mut graph = PackageGraph::new();
    graph
        .add(PackageResources::stable("core", "shared"), &[])
        .and_then(|g| {
            g.add(
                PackageResources::local("app", "shared"),
                &["core".into()],
            )
        })
        .expect("graph");
    let harness = Harness::with_graph(
        graph,
        &[
            ("core", "a.ts", "export const a = 1;\n"),
            ("app", "a.ts", "export const a = 2;\n"),
        ],
    )
    .build();

    assert_eq!(
        harness.take_codes(),
        vec![DiagnosticCode::ESpliceDuplicateTargetPath]
    );
    assert_eq!(harness.text_of("shared/a.ts"), "export const a = 1;\n");
}

#[test]
fn duplicate_function_names_are_rejected() {
    let harness = Harness::app(&[
        ("a.ts", "export const a = 1;\n"),
        ("b.ts", "export const b = 1;\n"),
        ("a.t", "create typescript transformer same begin end\n"),
        ("b.t", "create typescript transformer same begin end\n"),
    ])
    .build();

    assert_eq!(
        harness.take_codes(),
        vec![DiagnosticCode::ESpliceDuplicateFunctionName]
    );
}

#[rstest]
#[case::no_hint("home.t", None)]
#[case::hint("home.ts.t", Some(SupportedLanguage::TypeScript))]
fn language_falls_back_to_the_file_hint(
    #[case] file: &str,
    #[case] expected: Option<SupportedLanguage>,
) {
    let harness = Harness::app(&[
        ("home.ts", HOME_TS),
        (file, "create transformer begin end\n"),
    ])
    .build();

    let language = harness
        .environment
        .function_by_name("home")
        .and_then(|id| harness.environment.function(id))
        .map(|f| f.language());
    assert_eq!(language, expected.map(Language::Target));
    let codes = harness.take_codes();
    if expected.is_none() {
        assert_eq!(codes, vec![DiagnosticCode::ESpliceMissingLanguage]);
    } else {
        assert!(codes.is_empty(), "unexpected diagnostics: {codes:?}");
    }
}

#[test]
fn chains_apply_in_resource_order() {
    let second = typescript("home", "    append \"\\nexport const c = 3;\";\n");
    let first = typescript("home", "    append \"\\nexport const b = 2;\";\n");
    let harness = Harness::app(&[
        ("home.ts", "export const a = 1;\n"),
        ("b.t", second.as_str()),
        ("a.t", first.as_str()),
    ])
    .build();

    assert!(harness.take_codes().is_empty());
    let item = harness.environment.item_by_path("app/home.ts").expect("item");
    let names: Vec<_> = harness
        .environment
        .functions_of(TargetRef::Item(item))
        .filter_map(|id| harness.environment.function(id))
        .map(|f| f.name().to_owned())
        .collect();
    assert_eq!(names, vec!["a:home", "b:home"]);
    assert_eq!(
        harness.text_of("app/home.ts"),
        "export const a = 1;\nexport const b = 2;\nexport const c = 3;\n"
    );
}

#[test]
fn functions_can_rewrite_other_functions() {
    let harness = Harness::app(&[
        ("home.ts", "export const a = 1;\n"),
        (
            "home.t",
            "create typescript transformer base\nbegin\n    replace \"1\" with \"2\";\nend\n",
        ),
        (
            "meta.t",
            r#"create transformer transformer on "base"
begin
    replace "\"2\"" with "\"3\"";
end
"#,
        ),
    ])
    .build();

    assert!(harness.take_codes().is_empty());
    let base = harness.environment.function_by_name("base").expect("base");
    let meta = harness.environment.function_by_name("meta:base").expect("meta");
    let chain: Vec<_> = harness
        .environment
        .functions_of(TargetRef::Function(base))
        .collect();
    assert_eq!(chain, vec![meta]);
    assert_eq!(
        harness
            .environment
            .transformed_function_text(base)
            .expect("rewrites"),
        "create typescript transformer base\nbegin\n    replace \"1\" with \"3\";\nend"
    );
    assert_eq!(harness.text_of("app/home.ts"), "export const a = 3;\n");
}

#[rstest]
#[case::missing_name(
    &[("meta.t", "create transformer transformer begin end\n")],
    DiagnosticCode::ESpliceMissingTargetName
)]
#[case::unknown_name(
    &[("meta.t", "create transformer transformer on \"nope\" begin end\n")],
    DiagnosticCode::ESpliceTargetNotFound
)]
#[case::cycle(
    &[
        ("a.t", "create transformer transformer alpha on \"beta\" begin end\n"),
        ("b.t", "create transformer transformer beta on \"alpha\" begin end\n"),
    ],
    DiagnosticCode::ESpliceCyclicTarget
)]
fn function_targets_fail_distinctly(
    #[case] files: &[(&str, &str)],
    #[case] expected: DiagnosticCode,
) {
    let harness = Harness::app(files).build();
    assert_eq!(harness.take_codes(), vec![expected]);
}

#[test]
fn function_targets_must_be_reachable() {
    let harness = Harness::with_graph(
        three_packages(),
        &[
            ("app", "home.ts", HOME_TS),
            ("app", "home.t", "create typescript transformer base begin end\n"),
            (
                "other",
                "meta.t",
                "create transformer transformer on \"base\" begin end\n",
            ),
        ],
    )
    .build();

    assert_eq!(
        harness.take_codes(),
        vec![DiagnosticCode::ESpliceUnreachableTarget]
    );
}

struct FixedResolver;

impl ExternalItemResolver for FixedResolver {
    fn resolve(&self, reference: &str, from: &PackageResources) -> Option<String> {
        (reference == "../core/util" && from.id().as_str() == "app")
            .then(|| "core/util.ts".to_owned())
    }
}

#[rstest]
#[case::resolved("../core/util", true, None)]
#[case::unknown_reference("../core/nope", true, Some(DiagnosticCode::ESpliceTargetNotFound))]
#[case::no_resolver(
    "../core/util",
    false,
    Some(DiagnosticCode::ESpliceMissingExternalResolver)
)]
fn external_references_use_the_resolver(
    #[case] reference: &str,
    #[case] with_resolver: bool,
    #[case] expected: Option<DiagnosticCode>,
) {
    let mut graph = PackageGraph::new();
    graph
        .add(PackageResources::stable("core", "core"), &[])
        .and_then(|g| g.add(app_package(), &["core".into()]))
        .expect("graph");
    let patch = typescript(reference, "    replace \"1\" with \"2\";\n");
    let mut harness = Harness::with_graph(
        graph,
        &[
            ("core", "util.ts", "export const util = 1;\n"),
            ("app", "patch.t", patch.as_str()),
        ],
    );
    if with_resolver {
        harness.environment = harness
            .environment
            .with_external_resolver(Box::new(FixedResolver));
    }
    let harness = harness.build();

    assert_eq!(harness.take_codes(), expected.into_iter().collect::<Vec<_>>());
    let expected_text = if expected.is_none() {
        "export const util = 2;\n"
    } else {
        "export const util = 1;\n"
    };
    assert_eq!(harness.text_of("core/util.ts"), expected_text);
}

#[test]
fn parse_failures_depend_on_package_stability() {
    let mut graph = PackageGraph::new();
    graph
        .add(PackageResources::stable("core", "core"), &[])
        .and_then(|g| g.add(app_package(), &["core".into()]))
        .expect("graph");
    let harness = Harness::with_graph(
        graph,
        &[
            ("core", "bad.ts", "function broken( {"),
            ("app", "bad.ts", "function broken( {"),
        ],
    )
    .build();

    assert_eq!(
        harness.take_codes(),
        vec![
            DiagnosticCode::ESpliceParseFailed,
            DiagnosticCode::ESpliceParseFailed,
        ]
    );
    assert!(harness.environment.item_by_path("core/bad.ts").is_none());
    let local = harness
        .environment
        .item_by_path("app/bad.ts")
        .and_then(|id| harness.environment.item(id))
        .expect("local item kept");
    assert!(!local.is_parsed());
    assert_eq!(harness.text_of("app/bad.ts"), "function broken( {");
}

#[test]
fn register_adds_resources_after_the_build() {
    let mut harness = Harness::app(&[("pages/home.ts", HOME_TS)]).build();
    harness.write("home.t", HOME_T);

    let input = harness
        .environment
        .register(&"app".into(), Language::Transformer, &ResourceLocator::new("home.t"))
        .expect("registers");

    assert!(matches!(input, InputId::Source(_)));
    assert!(harness.take_codes().is_empty());
    assert_eq!(
        harness.text_of("app/pages/home.ts"),
        "export const greeting = 'hello';\n"
    );
    assert_eq!(harness.environment.inputs_of(&"app".into()).len(), 2);
}

#[test]
fn installable_items_are_sorted_by_target_path() {
    let harness = Harness::app(&[
        ("pages/home.ts", HOME_TS),
        ("home.t", HOME_T),
        ("a.ts", "export const a = 1;\n"),
    ])
    .build();

    let installable = harness.environment.installable_items();
    let paths: Vec<_> = installable.iter().map(|i| i.target_path.as_str()).collect();
    assert_eq!(paths, vec!["app/a.ts", "app/pages/home.ts"]);
    assert_eq!(
        installable.last().map(|i| i.text.as_str()),
        Some("export const greeting = 'hello';\n")
    );
}

#[test]
fn missing_anchors_are_reported_at_install_time() {
    let patch = typescript("home", "    remove \"absent\";\n");
    let harness = Harness::app(&[("home.ts", HOME_TS), ("home.t", patch.as_str())])
    .build();
    assert!(harness.take_codes().is_empty());

    assert!(harness.environment.installable_items().is_empty());
    assert_eq!(
        harness.take_codes(),
        vec![DiagnosticCode::ESpliceTransformFailed]
    );
}
