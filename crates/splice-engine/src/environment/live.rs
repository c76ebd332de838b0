//! Live mode: recording file-system changes and applying them in batches.

use std::collections::{BTreeSet, HashMap};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, trace, warn};

use super::resolve::Resolution;
use super::{Mode, TransformEnvironment};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Severity};
use crate::entities::{FunctionId, InputId, ItemId, SourceId, TargetRef};
use crate::error::{RegistrationError, ResourceError};
use crate::install::InstallableItem;
use crate::language::{Language, extension_of};
use crate::resources::{PackageId, PackageResources, ResourceLocator};
use crate::tracker::PendingChange;

/// A file-system change inside a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Package owning the path.
    pub package: PackageId,
    /// Absolute path of the changed file or directory.
    pub full_path: Utf8PathBuf,
    /// Path relative to the package root.
    pub sub_path: String,
}

impl ChangeEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(
        package: impl Into<PackageId>,
        full_path: impl Into<Utf8PathBuf>,
        sub_path: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            full_path: full_path.into(),
            sub_path: sub_path.into(),
        }
    }
}

/// Bookkeeping of one [`apply_changes`](TransformEnvironment::apply_changes)
/// call.
#[derive(Debug, Default)]
struct LivePass {
    /// Items whose transformed text may have changed.
    affected: BTreeSet<ItemId>,
    /// Functions unlinked because their target went away.
    orphans: Vec<FunctionId>,
    /// New text of inputs that changed on disk.
    fresh: HashMap<InputId, String>,
    /// Items registered from new files.
    new_items: Vec<ItemId>,
    registered_any: bool,
}

impl TransformEnvironment {
    /// Records a change for the next [`apply_changes`](Self::apply_changes).
    ///
    /// Files whose extension is filtered out by the watch configuration are
    /// ignored. Returns `false` when the change was ignored.
    pub fn on_change(&mut self, event: &ChangeEvent) -> bool {
        if let Some(extension) = extension_of(&event.sub_path)
            && !self
                .watch
                .triggers(extension, self.languages.recognises_extension(extension))
        {
            trace!(
                target: "splice::environment",
                path = %event.full_path,
                "ignoring change to unwatched extension"
            );
            return false;
        }
        self.tracker.on_change(
            &self.entities,
            &event.package,
            &event.full_path,
            &event.sub_path,
        )
    }

    /// Applies every recorded change and returns the items to install.
    ///
    /// Changed inputs are re-read first; missing ones are removed. Within
    /// each package, items are then re-parsed or registered before any
    /// function source is re-declared or registered, so a source resolves
    /// against the items of the same batch. Functions that a new item makes
    /// ambiguous, and functions orphaned by a removal, are resolved again.
    /// Returns an empty list when nothing was pending.
    pub fn apply_changes(&mut self) -> Vec<InstallableItem> {
        if !self.tracker.has_changes() {
            return Vec::new();
        }
        let mut pass = LivePass::default();
        let packages: Vec<PackageResources> = self.graph.local_packages().cloned().collect();

        let mut work = Vec::with_capacity(packages.len());
        for package in packages {
            let mut kept = Vec::new();
            for change in self.tracker.take_changes(package.id()) {
                let keep = match &change {
                    PendingChange::Input(input) => self.revalidate(&package, *input, &mut pass),
                    PendingChange::NewFile { .. } => true,
                };
                if keep {
                    kept.push(change);
                }
            }
            work.push((package, kept));
        }

        for (package, changes) in work {
            let (sources, items): (Vec<_>, Vec<_>) = changes
                .into_iter()
                .partition(|change| self.declares_functions(change));
            for change in items.into_iter().chain(sources) {
                match change {
                    PendingChange::Input(InputId::Item(id)) => self.reparse_item(id, &mut pass),
                    PendingChange::Input(InputId::Source(id)) => self.reapply_source(id, &mut pass),
                    PendingChange::NewFile {
                        full_path,
                        sub_path,
                    } => self.register_new_file(&package, &full_path, &sub_path, &mut pass),
                }
            }
        }

        self.recheck_linked_targets(&mut pass);
        self.relink_orphans(&mut pass);
        if pass.registered_any {
            self.retry_unresolved(&mut pass);
        }

        let installable = self.installable(&pass.affected);
        info!(
            target: "splice::environment",
            affected = pass.affected.len(),
            installable = installable.len(),
            "applied changes"
        );
        installable
    }

    /// Re-reads a changed input. Returns `true` when its text differs and
    /// the change must be processed.
    fn revalidate(&mut self, package: &PackageResources, input: InputId, pass: &mut LivePass) -> bool {
        let Some(origin) = self.entities.origin(input) else {
            return false;
        };
        let locator = origin.locator().clone();
        let label = origin.label();
        match self.resources.read(package, &locator) {
            Ok(text) => {
                let unchanged = self
                    .entities
                    .origin(input)
                    .is_some_and(|current| current.text() == text);
                if unchanged {
                    trace!(target: "splice::environment", resource = label, "text unchanged");
                    return false;
                }
                pass.fresh.insert(input, text);
                true
            }
            Err(ResourceError::NotFound { .. }) => {
                self.remove_input(package.id(), input, pass);
                self.sink.report(
                    Diagnostic::new(
                        Severity::Info,
                        DiagnosticCode::ESpliceInputRemoved,
                        format!("`{locator}` was removed"),
                    )
                    .with_resource(label),
                );
                false
            }
            Err(error) => {
                self.sink
                    .report(RegistrationError::from(error).to_diagnostic(&label));
                false
            }
        }
    }

    fn remove_input(&mut self, package: &PackageId, input: InputId, pass: &mut LivePass) {
        match input {
            InputId::Item(id) => {
                let dependants: Vec<_> = self.entities.chain_of(TargetRef::Item(id)).collect();
                for dependant in dependants {
                    self.entities.unlink(dependant);
                    pass.orphans.push(dependant);
                }
                self.tracker.remove(&mut self.entities, package, input);
                if let Some(item) = self.entities.items.remove(id) {
                    if self.items_by_path.get(item.target_path()) == Some(&id) {
                        self.items_by_path.remove(item.target_path());
                    }
                    if let Some(items) = self.package_items.get_mut(package) {
                        items.retain(|other| *other != id);
                    }
                }
            }
            InputId::Source(id) => {
                self.remove_functions(id, pass);
                self.tracker.remove(&mut self.entities, package, input);
                self.entities.sources.remove(id);
            }
        }
        debug!(
            target: "splice::environment",
            package = %package,
            "removed input"
        );
    }

    /// Drops every function of a source. Their old roots become affected
    /// and the functions targeting them become orphans.
    fn remove_functions(&mut self, id: SourceId, pass: &mut LivePass) {
        let functions = self
            .entities
            .sources
            .get_mut(id)
            .map(|source| std::mem::take(&mut source.functions))
            .unwrap_or_default();
        for function in functions {
            let dependants: Vec<_> = self.entities.chain_of(TargetRef::Function(function)).collect();
            if let Some(target) = self.entities.unlink(function) {
                pass.affected.extend(self.entities.root_item(target));
            }
            for dependant in dependants {
                self.entities.unlink(dependant);
                pass.orphans.push(dependant);
            }
            if let Some(removed) = self.entities.functions.remove(function)
                && self.functions_by_name.get(removed.name()) == Some(&function)
            {
                self.functions_by_name.remove(removed.name());
            }
        }
    }

    fn reparse_item(&mut self, id: ItemId, pass: &mut LivePass) {
        let Some(text) = pass.fresh.remove(&InputId::Item(id)) else {
            return;
        };
        let Some(item) = self.entities.items.get(id) else {
            return;
        };
        let language = item.language();
        let mut origin = item.origin().clone();
        origin.set_text(text.clone());
        match self.analyse_item(&origin, language) {
            Ok((code, parsed)) => {
                if let Some(entry) = self.entities.items.get_mut(id) {
                    entry.update(text, code, parsed);
                }
                pass.affected.insert(id);
            }
            Err(error) => {
                let label = origin.label();
                self.sink.report(error.to_diagnostic(&label));
            }
        }
    }

    fn reapply_source(&mut self, id: SourceId, pass: &mut LivePass) {
        let Some(text) = pass.fresh.remove(&InputId::Source(id)) else {
            return;
        };
        self.remove_functions(id, pass);
        let parsed = self.languages.transformer().parse(&text);
        let Some(source) = self.entities.sources.get_mut(id) else {
            return;
        };
        source.set_text(text);
        source.parsed = parsed.is_ok();
        source.unresolved = false;
        let label = source.origin().label();
        match parsed {
            Ok(result) => {
                self.declare_functions(id, result.declarations);
                let roots = self.resolve_source(id, Mode::Live, true);
                pass.affected.extend(roots);
            }
            Err(error) => {
                self.sink
                    .report(RegistrationError::parse(label.clone(), error).to_diagnostic(&label));
            }
        }
    }

    fn register_new_file(
        &mut self,
        package: &PackageResources,
        full_path: &Utf8Path,
        sub_path: &str,
        pass: &mut LivePass,
    ) {
        let locator = ResourceLocator::new(sub_path);
        let Some(language) = self.languages.language_of(locator.resource_name()) else {
            trace!(
                target: "splice::environment",
                path = %full_path,
                "new path is in no known language"
            );
            return;
        };
        let registered = match language {
            Language::Target(target) => self
                .register_item(package, target, &locator)
                .map(InputId::Item),
            Language::Transformer => self
                .declare_source(package, &locator)
                .map(InputId::Source),
        };
        match registered {
            Ok(InputId::Item(id)) => {
                pass.affected.insert(id);
                pass.new_items.push(id);
                pass.registered_any = true;
                debug!(
                    target: "splice::environment",
                    path = %full_path,
                    "registered new item"
                );
            }
            Ok(InputId::Source(id)) => {
                let roots = self.resolve_source(id, Mode::Live, true);
                pass.affected.extend(roots);
                pass.registered_any = true;
                debug!(
                    target: "splice::environment",
                    path = %full_path,
                    "registered new function source"
                );
            }
            Err(RegistrationError::Resource(ResourceError::NotFound { .. })) => {
                debug!(
                    target: "splice::environment",
                    path = %full_path,
                    "new path vanished before registration"
                );
            }
            Err(error) => {
                warn!(
                    target: "splice::environment",
                    path = %full_path,
                    error = %error,
                    "failed to register new file"
                );
                self.report_registration(package, &locator, &error);
            }
        }
    }

    /// Whether a pending change concerns a function source.
    fn declares_functions(&self, change: &PendingChange) -> bool {
        match change {
            PendingChange::Input(InputId::Source(_)) => true,
            PendingChange::Input(InputId::Item(_)) => false,
            PendingChange::NewFile { sub_path, .. } => {
                let locator = ResourceLocator::new(sub_path.as_str());
                self.languages.language_of(locator.resource_name()) == Some(Language::Transformer)
            }
        }
    }

    /// A new item may match the target of a function that already
    /// resolved elsewhere. Such functions are unlinked and queued as
    /// orphans, so that the relink reports the ambiguity a full build would.
    fn recheck_linked_targets(&mut self, pass: &mut LivePass) {
        let new_items: Vec<(PackageId, Language)> = std::mem::take(&mut pass.new_items)
            .into_iter()
            .filter_map(|id| self.entities.items.get(id))
            .map(|item| {
                (
                    item.origin().package().clone(),
                    Language::Target(item.language()),
                )
            })
            .collect();
        if new_items.is_empty() {
            return;
        }
        let linked: Vec<(FunctionId, TargetRef)> = self
            .entities
            .functions
            .iter()
            .filter(|(_, function)| {
                new_items.iter().any(|(package, language)| {
                    function.language() == *language
                        && self.graph.is_reachable(function.package(), package)
                })
            })
            .filter_map(|(id, function)| {
                function
                    .target()
                    .filter(|target| matches!(target, TargetRef::Item(_)))
                    .map(|target| (id, target))
            })
            .collect();
        for (function, current) in linked {
            let still_bound = matches!(
                self.resolve_function(function, Mode::Live),
                Ok(Resolution::Target(target)) if target == current
            );
            if still_bound {
                continue;
            }
            if let Some(previous) = self.entities.unlink(function) {
                pass.affected.extend(self.entities.root_item(previous));
            }
            pass.orphans.push(function);
            debug!(
                target: "splice::environment",
                function = self.function_label(function),
                "target no longer resolves uniquely"
            );
        }
    }

    fn relink_orphans(&mut self, pass: &mut LivePass) {
        let orphans = std::mem::take(&mut pass.orphans);
        let mut touched = BTreeSet::new();
        let mut roots = Vec::new();
        for function in orphans {
            let Some(source) = self.entities.functions.get(function).map(|f| f.source()) else {
                continue;
            };
            self.link_function(function, Mode::Live, true, &mut roots);
            touched.insert(source);
        }
        for source in touched {
            self.refresh_unresolved(source);
        }
        pass.affected.extend(roots);
    }

    /// New inputs may satisfy functions that failed earlier. Retries them
    /// without reporting again.
    fn retry_unresolved(&mut self, pass: &mut LivePass) {
        let pending: Vec<SourceId> = self
            .entities
            .sources
            .iter()
            .filter(|(_, source)| source.has_unresolved())
            .map(|(id, _)| id)
            .collect();
        for source in pending {
            let roots = self.resolve_source(source, Mode::Live, false);
            pass.affected.extend(roots);
        }
    }
}
