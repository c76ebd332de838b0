//! Registration of items and transformer functions, and the queries over
//! them.
//!
//! The environment owns every entity. A full [`build`](TransformEnvironment::build)
//! registers each package in topological order; afterwards
//! [`on_change`](TransformEnvironment::on_change) and
//! [`apply_changes`](TransformEnvironment::apply_changes) keep the entities
//! in step with the local packages.
//!
//! Data problems (duplicates, parse failures, unresolved targets) are
//! reported to the [`DiagnosticSink`] and registration carries on with the
//! next resource.

mod live;
mod resolve;
mod text;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use splice_config::WatchConfig;
use splice_syntax::{SourceCode, SupportedLanguage, SyntaxError};
use tracing::{debug, info, trace};

pub use live::ChangeEvent;
pub use resolve::ExternalItemResolver;

use crate::diagnostics::{DiagnosticSink, ErrorScope};
use crate::entities::{
    ChainIter, ChainOrder, Entities, FunctionId, FunctionSource, InputId, Item, ItemId, Origin,
    SourceId, TFunction, TargetRef,
};
use crate::error::{RegistrationError, ResourceError};
use crate::graph::PackageGraph;
use crate::language::{Language, LanguageRegistry};
use crate::resources::{PackageId, PackageResources, ResourceLocator, ResourceStore};
use crate::tracker::Tracker;
use crate::transformer::Declaration;

/// Whether resolution runs in the initial build or in live mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Build,
    Live,
}

/// Counts of a [`build`](TransformEnvironment::build).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Registered items.
    pub items: usize,
    /// Registered function sources.
    pub sources: usize,
    /// Declared transformer functions.
    pub functions: usize,
    /// Errors reported during the build.
    pub errors: usize,
}

/// Registry of items and transformer functions with target resolution.
pub struct TransformEnvironment {
    graph: PackageGraph,
    languages: LanguageRegistry,
    resources: Arc<dyn ResourceStore>,
    sink: Arc<dyn DiagnosticSink>,
    external: Option<Box<dyn ExternalItemResolver>>,
    watch: WatchConfig,
    entities: Entities,
    items_by_path: HashMap<String, ItemId>,
    functions_by_name: HashMap<String, FunctionId>,
    package_items: HashMap<PackageId, Vec<ItemId>>,
    tracker: Tracker,
    built: bool,
}

impl fmt::Debug for TransformEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformEnvironment")
            .field("packages", &self.graph.packages().len())
            .field("items", &self.entities.items.len())
            .field("sources", &self.entities.sources.len())
            .field("functions", &self.entities.functions.len())
            .field("external_resolver", &self.external.is_some())
            .finish_non_exhaustive()
    }
}

impl TransformEnvironment {
    /// Creates an empty environment over `graph`.
    #[must_use]
    pub fn new(
        graph: PackageGraph,
        languages: LanguageRegistry,
        resources: Arc<dyn ResourceStore>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let tracker = Tracker::new(graph.packages());
        Self {
            graph,
            languages,
            resources,
            sink,
            external: None,
            watch: WatchConfig::default(),
            entities: Entities::default(),
            items_by_path: HashMap::new(),
            functions_by_name: HashMap::new(),
            package_items: HashMap::new(),
            tracker,
            built: false,
        }
    }

    /// Installs the resolver for `../` targets.
    #[must_use]
    pub fn with_external_resolver(mut self, resolver: Box<dyn ExternalItemResolver>) -> Self {
        self.external = Some(resolver);
        self
    }

    /// Sets which changed extensions trigger re-tracking.
    #[must_use]
    pub fn with_watch_config(mut self, watch: WatchConfig) -> Self {
        self.watch = watch;
        self
    }

    /// The package graph.
    #[must_use]
    pub const fn graph(&self) -> &PackageGraph {
        &self.graph
    }

    /// The language registry.
    #[must_use]
    pub const fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    /// Registers every resource of every package, in topological order.
    ///
    /// Within a package, items are registered first, then every function
    /// source declares its functions, then every function is resolved, so
    /// a function may target an item or function declared later in the
    /// same package. Failures are reported and skipped.
    pub fn build(&mut self) -> BuildSummary {
        let scope = ErrorScope::open(self.sink.as_ref());
        let packages = self.graph.packages().to_vec();
        for package in &packages {
            self.build_package(package);
        }
        self.built = true;
        let summary = BuildSummary {
            items: self.entities.items.len(),
            sources: self.entities.sources.len(),
            functions: self.entities.functions.len(),
            errors: scope.errors_since(self.sink.as_ref()),
        };
        info!(
            target: "splice::environment",
            items = summary.items,
            sources = summary.sources,
            functions = summary.functions,
            errors = summary.errors,
            "environment built"
        );
        summary
    }

    fn build_package(&mut self, package: &PackageResources) {
        let locators = match self.resources.list(package) {
            Ok(locators) => locators,
            Err(error) => {
                let label = package.id().to_string();
                self.sink
                    .report(RegistrationError::from(error).to_diagnostic(&label));
                return;
            }
        };
        let mut source_locators = Vec::new();
        for locator in locators {
            match self.languages.language_of(locator.resource_name()) {
                Some(Language::Target(language)) => {
                    if let Err(error) = self.register_item(package, language, &locator) {
                        self.report_registration(package, &locator, &error);
                    }
                }
                Some(Language::Transformer) => source_locators.push(locator),
                None => trace!(
                    target: "splice::environment",
                    package = %package.id(),
                    resource = %locator,
                    "skipping resource in no known language"
                ),
            }
        }
        let mut declared = Vec::new();
        for locator in source_locators {
            match self.declare_source(package, &locator) {
                Ok(source) => declared.push(source),
                Err(error) => self.report_registration(package, &locator, &error),
            }
        }
        for source in declared {
            self.resolve_source(source, Mode::Build, true);
        }
    }

    /// Registers one resource: items are parsed and indexed by target path;
    /// function sources declare their functions, which are resolved at
    /// once. Resolution failures are reported, not returned.
    ///
    /// # Errors
    ///
    /// Fails when the resource cannot be read, duplicates a target path or
    /// does not parse in a stable package.
    pub fn register(
        &mut self,
        package: &PackageId,
        language: Language,
        locator: &ResourceLocator,
    ) -> Result<InputId, RegistrationError> {
        let Some(resources) = self.graph.get(package).cloned() else {
            return Err(RegistrationError::Resource(ResourceError::NotFound {
                package: package.clone(),
                resource: locator.full_resource_name().to_owned(),
            }));
        };
        match language {
            Language::Target(target) => self
                .register_item(&resources, target, locator)
                .map(InputId::Item),
            Language::Transformer => {
                let source = self.declare_source(&resources, locator)?;
                self.resolve_source(source, self.mode(), true);
                Ok(InputId::Source(source))
            }
        }
    }

    const fn mode(&self) -> Mode {
        if self.built { Mode::Live } else { Mode::Build }
    }

    fn register_item(
        &mut self,
        package: &PackageResources,
        language: SupportedLanguage,
        locator: &ResourceLocator,
    ) -> Result<ItemId, RegistrationError> {
        let text = self.resources.read(package, locator)?;
        let target_path = package.target_path_of(locator);
        if let Some(existing) = self
            .items_by_path
            .get(&target_path)
            .and_then(|id| self.entities.items.get(*id))
        {
            return Err(RegistrationError::DuplicateTargetPath {
                path: target_path,
                existing: existing.origin().label(),
            });
        }
        let origin = Origin::new(package, locator.clone(), text);
        let (code, parsed) = self.analyse_item(&origin, language)?;
        let id = self.entities.items.insert(Item::new(
            origin,
            language,
            target_path.clone(),
            code,
            parsed,
        ));
        self.items_by_path.insert(target_path, id);
        self.package_items
            .entry(package.id().clone())
            .or_default()
            .push(id);
        self.tracker
            .add(&mut self.entities, package.id(), InputId::Item(id));
        debug!(
            target: "splice::environment",
            package = %package.id(),
            resource = %locator,
            parsed,
            "registered item"
        );
        Ok(id)
    }

    /// Parses an item's text. Local items that fail to parse fall back to
    /// a lexical token stream after the failure is reported.
    fn analyse_item(
        &self,
        origin: &Origin,
        language: SupportedLanguage,
    ) -> Result<(SourceCode, bool), RegistrationError> {
        let label = origin.label();
        let Some(analyzer) = self.languages.analyzer(Language::Target(language)) else {
            return Err(RegistrationError::parse(
                label,
                SyntaxError::internal_error(format!("no analyzer for {language}")),
            ));
        };
        match analyzer.try_parse(origin.text()) {
            Ok(code) => Ok((code, true)),
            Err(error) if origin.is_local() => {
                self.sink
                    .report(RegistrationError::parse(label.clone(), error).to_diagnostic(&label));
                let code = analyzer
                    .tokenize(origin.text())
                    .unwrap_or_else(|_| SourceCode::from_tokens(Vec::new(), origin.text()));
                Ok((code, false))
            }
            Err(error) => Err(RegistrationError::parse(label, error)),
        }
    }

    /// Registers a function source and declares its functions without
    /// resolving them.
    fn declare_source(
        &mut self,
        package: &PackageResources,
        locator: &ResourceLocator,
    ) -> Result<SourceId, RegistrationError> {
        let text = self.resources.read(package, locator)?;
        let file_name = locator.resource_name();
        let source_name = self.languages.source_name(file_name).to_owned();
        let hint = self.languages.hint_of(file_name);
        let origin = Origin::new(package, locator.clone(), text);
        let label = origin.label();

        let parsed = match self.languages.transformer().parse(origin.text()) {
            Ok(source) => Some(source.declarations),
            Err(error) if package.is_local() => {
                self.sink
                    .report(RegistrationError::parse(label.clone(), error).to_diagnostic(&label));
                None
            }
            Err(error) => return Err(RegistrationError::parse(label, error)),
        };

        let id = self
            .entities
            .sources
            .insert(FunctionSource::new(origin, source_name, hint));
        self.tracker
            .add(&mut self.entities, package.id(), InputId::Source(id));
        if let Some(declarations) = parsed {
            if let Some(source) = self.entities.sources.get_mut(id) {
                source.parsed = true;
            }
            self.declare_functions(id, declarations);
        }
        debug!(
            target: "splice::environment",
            package = %package.id(),
            resource = %locator,
            "registered function source"
        );
        Ok(id)
    }

    /// Creates one function per declaration, reporting those without a
    /// language or with a name already in use.
    pub(crate) fn declare_functions(&mut self, id: SourceId, declarations: Vec<Declaration>) {
        let Some(source) = self.entities.sources.get(id) else {
            return;
        };
        let package = source.origin().package().clone();
        let label = source.origin().label();
        let resource = source.origin().locator().full_resource_name().to_owned();
        let source_name = source.source_name().to_owned();
        let hint = source.hint();
        let rank = self.graph.rank(&package).unwrap_or(usize::MAX);

        for (index, declaration) in declarations.into_iter().enumerate() {
            let name = function_name(&source_name, &declaration);
            let Some(language) = declaration.language().or_else(|| hint.map(Language::Target)) else {
                self.sink.report(
                    RegistrationError::MissingLanguage { function: name }.to_diagnostic(&label),
                );
                continue;
            };
            if let Some(existing) = self
                .functions_by_name
                .get(&name)
                .and_then(|f| self.entities.functions.get(*f))
                .and_then(|f| self.entities.sources.get(f.source()))
            {
                let error = RegistrationError::DuplicateFunctionName {
                    name,
                    existing: existing.origin().label(),
                };
                self.sink.report(error.to_diagnostic(&label));
                continue;
            }
            let function = self.entities.functions.insert(TFunction::new(
                id,
                package.clone(),
                name.clone(),
                language,
                declaration,
                ChainOrder::new(rank, resource.clone(), index),
            ));
            self.functions_by_name.insert(name, function);
            if let Some(entry) = self.entities.sources.get_mut(id) {
                entry.functions.push(function);
            }
        }
    }

    fn report_registration(
        &self,
        package: &PackageResources,
        locator: &ResourceLocator,
        error: &RegistrationError,
    ) {
        let label = format!("{}:{}", package.id(), locator);
        self.sink.report(error.to_diagnostic(&label));
    }

    /// An item by handle.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.entities.items.get(id)
    }

    /// The item installed at `target_path`.
    #[must_use]
    pub fn item_by_path(&self, target_path: &str) -> Option<ItemId> {
        self.items_by_path.get(target_path).copied()
    }

    /// A function by handle.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&TFunction> {
        self.entities.functions.get(id)
    }

    /// The function named `name`.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.functions_by_name.get(name).copied()
    }

    /// A function source by handle.
    #[must_use]
    pub fn function_source(&self, id: SourceId) -> Option<&FunctionSource> {
        self.entities.sources.get(id)
    }

    /// Functions chained on `target`, in application order.
    #[must_use]
    pub fn functions_of(&self, target: TargetRef) -> ChainIter<'_> {
        self.entities.chain_of(target)
    }

    /// Every item.
    pub fn items(&self) -> impl Iterator<Item = (ItemId, &Item)> {
        self.entities.items.iter()
    }

    /// Every function source.
    pub fn function_sources(&self) -> impl Iterator<Item = (SourceId, &FunctionSource)> {
        self.entities.sources.iter()
    }

    /// Inputs tracked for a package, in registration order.
    #[must_use]
    pub fn inputs_of(&self, package: &PackageId) -> Vec<InputId> {
        self.tracker.inputs(&self.entities, package)
    }
}

/// Explicit name, else the source name, qualified by the declared target
/// when there is one.
fn function_name(source_name: &str, declaration: &Declaration) -> String {
    if let Some(name) = declaration.name() {
        return name.to_owned();
    }
    declaration
        .target()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map_or_else(
            || source_name.to_owned(),
            |target| format!("{source_name}:{target}"),
        )
}
