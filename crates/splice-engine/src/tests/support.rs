//! Shared fixtures for the environment suites.

use std::sync::Arc;

use splice_config::WatchConfig;

use crate::{
    ChangeEvent, CollectingSink, Diagnostic, DiagnosticCode, LanguageRegistry, MemoryResourceStore,
    PackageGraph, PackageId, PackageResources, ResourceStore, Severity, TransformEnvironment,
};

/// Root directory the local test package pretends to live in.
pub const APP_ROOT: &str = "/work/app";

/// A one-line TypeScript item.
pub const HOME_TS: &str = "export const greeting = 'hi';\n";

/// A transformer rewriting [`HOME_TS`].
pub const HOME_T: &str = "create typescript transformer\nbegin\n    replace \"'hi'\" with \"'hello'\";\nend\n";

/// Environment over an in-memory store with every diagnostic collected.
pub struct Harness {
    pub store: Arc<MemoryResourceStore>,
    pub sink: Arc<CollectingSink>,
    pub environment: TransformEnvironment,
}

impl Harness {
    /// One local package `app` installed under `app/`.
    pub fn app(files: &[(&str, &str)]) -> Self {
        let mut graph = PackageGraph::new();
        graph.add(app_package(), &[]).expect("graph");
        let scoped: Vec<_> = files.iter().map(|(path, text)| ("app", *path, *text)).collect();
        Self::with_graph(graph, &scoped)
    }

    /// Any graph, with files given as `(package, path, text)`.
    pub fn with_graph(graph: PackageGraph, files: &[(&str, &str, &str)]) -> Self {
        let store = Arc::new(MemoryResourceStore::new());
        for (package, path, text) in files {
            store.insert(&PackageId::from(*package), path, *text);
        }
        let sink = Arc::new(CollectingSink::new());
        let resources: Arc<dyn ResourceStore> = store.clone();
        let environment = TransformEnvironment::new(
            graph,
            LanguageRegistry::new("t").expect("grammars load"),
            resources,
            sink.clone(),
        );
        Self {
            store,
            sink,
            environment,
        }
    }

    pub fn with_watch(mut self, extensions: &[&str]) -> Self {
        self.environment = self.environment.with_watch_config(WatchConfig {
            extensions: extensions.iter().map(|ext| (*ext).to_owned()).collect(),
        });
        self
    }

    pub fn build(mut self) -> Self {
        self.environment.build();
        self
    }

    /// Codes of everything reported so far, draining the sink.
    pub fn take_codes(&self) -> Vec<DiagnosticCode> {
        self.sink.take().iter().map(Diagnostic::code).collect()
    }

    /// Error diagnostics reported so far, draining the sink.
    pub fn take_errors(&self) -> Vec<Diagnostic> {
        self.sink
            .take()
            .into_iter()
            .filter(|d| d.severity() == Severity::Error)
            .collect()
    }

    /// Transformed text of the item at `target_path`.
    pub fn text_of(&self, target_path: &str) -> String {
        let id = self
            .environment
            .item_by_path(target_path)
            .unwrap_or_else(|| panic!("no item at {target_path}"));
        self.environment
            .transformed_text(id)
            .expect("transformation applies")
    }

    pub fn write(&self, path: &str, text: &str) {
        self.store.insert(&PackageId::from("app"), path, text);
    }

    pub fn delete(&self, path: &str) {
        assert!(self.store.remove(&PackageId::from("app"), path));
    }

    /// Feeds a change of `path` in package `app`.
    pub fn touch(&mut self, path: &str) -> bool {
        self.environment
            .on_change(&ChangeEvent::new("app", format!("{APP_ROOT}/{path}"), path))
    }
}

pub fn app_package() -> PackageResources {
    PackageResources::local("app", "app").with_root(APP_ROOT)
}
