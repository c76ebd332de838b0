//! Target resolution for transformer functions.
//!
//! A function targeting a language resolves against the items of that
//! language in its reachable packages, by name and optional path. A
//! function targeting the transformer language resolves by exact name
//! against every registered function.

use tracing::{debug, trace};

use super::{Mode, TransformEnvironment};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::entities::{FunctionId, Item, ItemId, SourceId, TFunction, TargetRef};
use crate::error::ResolutionError;
use crate::language::Language;
use crate::resources::PackageResources;

/// Maps `../` references to the target path of a registered item.
pub trait ExternalItemResolver: Send + Sync {
    /// Final target path denoted by `reference` as seen from `from`, or
    /// `None` when the reference is unknown.
    fn resolve(&self, reference: &str, from: &PackageResources) -> Option<String>;
}

/// Outcome of a successful resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    Target(TargetRef),
    /// An external reference skipped in live mode for lack of a resolver.
    Ignored,
}

/// What an item must look like to be a function's target.
#[derive(Debug)]
struct TargetQuery<'a> {
    path: Option<&'a str>,
    name: &'a str,
    exact: bool,
}

impl TargetQuery<'_> {
    fn matches(&self, item: &Item) -> bool {
        let candidate = item.origin().locator().resource_name();
        let name_matches = if self.exact {
            candidate == self.name
        } else {
            candidate.len() > self.name.len()
                && candidate.starts_with(self.name)
                && candidate.as_bytes().get(self.name.len()) == Some(&b'.')
        };
        name_matches && self.path.is_none_or(|expected| path_matches(item, expected))
    }

    fn display(&self) -> String {
        self.path.map_or_else(
            || self.name.to_owned(),
            |path| format!("{path}/{}", self.name),
        )
    }
}

/// The item's target directory equals `expected` or ends with
/// `/expected`.
fn path_matches(item: &Item, expected: &str) -> bool {
    let directory = item
        .target_path()
        .rsplit_once('/')
        .map_or("", |(dir, _)| dir);
    directory == expected
        || directory
            .strip_suffix(expected)
            .is_some_and(|rest| rest.ends_with('/'))
}

impl TransformEnvironment {
    /// Resolves every unlinked function of a source and links the ones
    /// that resolve. Returns the root items of the newly linked functions.
    ///
    /// Failures are reported when `report` is set; either way the source is
    /// flagged for a later retry.
    pub(crate) fn resolve_source(&mut self, id: SourceId, mode: Mode, report: bool) -> Vec<ItemId> {
        let functions = self
            .entities
            .sources
            .get(id)
            .map(|source| source.functions.clone())
            .unwrap_or_default();
        let mut roots = Vec::new();
        for function in functions {
            self.link_function(function, mode, report, &mut roots);
        }
        self.refresh_unresolved(id);
        roots
    }

    /// Resolves and links one function if it has no target yet, pushing
    /// the root item of the new link onto `roots`. Returns `true` when the
    /// function is linked afterwards.
    pub(crate) fn link_function(
        &mut self,
        id: FunctionId,
        mode: Mode,
        report: bool,
        roots: &mut Vec<ItemId>,
    ) -> bool {
        match self.entities.functions.get(id) {
            None => return false,
            Some(function) if function.target().is_some() => return true,
            Some(_) => {}
        }
        match self.resolve_function(id, mode) {
            Ok(Resolution::Target(target)) => {
                self.entities.link(id, target);
                roots.extend(self.entities.root_item(target));
                trace!(
                    target: "splice::environment",
                    function = self.function_label(id),
                    "resolved target"
                );
                true
            }
            Ok(Resolution::Ignored) => {
                if report {
                    self.report_ignored_external(id);
                }
                false
            }
            Err(error) => {
                if report {
                    self.report_resolution(id, &error);
                }
                false
            }
        }
    }

    /// Recomputes whether a source still has unlinked functions.
    pub(crate) fn refresh_unresolved(&mut self, id: SourceId) {
        let Some(source) = self.entities.sources.get(id) else {
            return;
        };
        let unresolved = source.functions.iter().any(|f| {
            self.entities
                .functions
                .get(*f)
                .is_some_and(|function| function.target().is_none())
        });
        if let Some(entry) = self.entities.sources.get_mut(id) {
            entry.unresolved = unresolved;
        }
    }

    /// Finds the target of one function.
    pub(crate) fn resolve_function(
        &self,
        id: FunctionId,
        mode: Mode,
    ) -> Result<Resolution, ResolutionError> {
        let Some(function) = self.entities.functions.get(id) else {
            return Ok(Resolution::Ignored);
        };
        match function.language() {
            Language::Transformer => self.resolve_function_target(id, function),
            Language::Target(_) => self.resolve_item_target(function, mode),
        }
    }

    fn resolve_item_target(
        &self,
        function: &TFunction,
        mode: Mode,
    ) -> Result<Resolution, ResolutionError> {
        let source_name = self
            .entities
            .sources
            .get(function.source())
            .map(|source| source.source_name().to_owned())
            .unwrap_or_default();
        let declared = function
            .declared_target()
            .map(str::trim)
            .filter(|target| !target.is_empty());
        let query = match declared {
            None => TargetQuery {
                path: None,
                name: &source_name,
                exact: false,
            },
            Some(target) if target.starts_with("../") => {
                return self.resolve_external(function, target, mode);
            }
            Some(target) => {
                let (path, name) = target
                    .rsplit_once('/')
                    .map_or((None, target), |(dir, file)| {
                        (Some(dir.trim_start_matches('/')), file)
                    });
                TargetQuery {
                    path: path.filter(|p| !p.is_empty()),
                    name,
                    exact: self.languages.is_language_file(name),
                }
            }
        };

        let mut candidates = Vec::new();
        let mut matches = Vec::new();
        for package in self.graph.reachables(function.package()) {
            let items = self.package_items.get(package.id()).into_iter().flatten();
            for &item_id in items {
                let Some(item) = self.entities.items.get(item_id) else {
                    continue;
                };
                if Language::Target(item.language()) != function.language() {
                    continue;
                }
                candidates.push(item.target_path().to_owned());
                if query.matches(item) {
                    matches.push((item_id, item.target_path().to_owned()));
                }
            }
        }
        candidates.sort();

        match matches.as_slice() {
            [(single, _)] => Ok(Resolution::Target(TargetRef::Item(*single))),
            [] => Err(ResolutionError::NotFound {
                function: function.name().to_owned(),
                target: query.display(),
                candidates,
            }),
            _ => Err(ResolutionError::Ambiguous {
                function: function.name().to_owned(),
                target: query.display(),
                matches: matches.into_iter().map(|(_, path)| path).collect(),
                candidates,
            }),
        }
    }

    fn resolve_external(
        &self,
        function: &TFunction,
        reference: &str,
        mode: Mode,
    ) -> Result<Resolution, ResolutionError> {
        let Some(resolver) = self.external.as_deref() else {
            return match mode {
                Mode::Build => Err(ResolutionError::MissingExternalResolver {
                    function: function.name().to_owned(),
                    target: reference.to_owned(),
                }),
                Mode::Live => Ok(Resolution::Ignored),
            };
        };
        let resolved = self
            .graph
            .get(function.package())
            .and_then(|from| resolver.resolve(reference, from));
        debug!(
            target: "splice::environment",
            function = function.name(),
            reference,
            resolved = resolved.as_deref(),
            "resolved external reference"
        );
        resolved
            .and_then(|path| self.items_by_path.get(&path).copied())
            .map(|item| Resolution::Target(TargetRef::Item(item)))
            .ok_or_else(|| ResolutionError::NotFound {
                function: function.name().to_owned(),
                target: reference.to_owned(),
                candidates: Vec::new(),
            })
    }

    fn resolve_function_target(
        &self,
        id: FunctionId,
        function: &TFunction,
    ) -> Result<Resolution, ResolutionError> {
        let Some(wanted) = function
            .declared_target()
            .map(str::trim)
            .filter(|target| !target.is_empty())
        else {
            return Err(ResolutionError::MissingTargetName {
                function: function.name().to_owned(),
            });
        };
        let Some((target_id, target)) = self
            .functions_by_name
            .get(wanted)
            .and_then(|&found| Some((found, self.entities.functions.get(found)?)))
        else {
            let mut candidates: Vec<_> = self
                .entities
                .functions
                .iter()
                .filter(|(other, f)| {
                    *other != id && self.graph.is_reachable(function.package(), f.package())
                })
                .map(|(_, f)| f.name().to_owned())
                .collect();
            candidates.sort();
            return Err(ResolutionError::NotFound {
                function: function.name().to_owned(),
                target: wanted.to_owned(),
                candidates,
            });
        };
        if !self.graph.is_reachable(function.package(), target.package()) {
            return Err(ResolutionError::Unreachable {
                function: function.name().to_owned(),
                target: wanted.to_owned(),
                package: target.package().clone(),
            });
        }
        let mut cursor = Some(TargetRef::Function(target_id));
        while let Some(TargetRef::Function(current)) = cursor {
            if current == id {
                return Err(ResolutionError::Cycle {
                    function: function.name().to_owned(),
                    target: wanted.to_owned(),
                });
            }
            cursor = self.entities.functions.get(current).and_then(TFunction::target);
        }
        Ok(Resolution::Target(TargetRef::Function(target_id)))
    }

    pub(crate) fn function_label(&self, id: FunctionId) -> String {
        self.entities
            .functions
            .get(id)
            .map(|f| f.name().to_owned())
            .unwrap_or_default()
    }

    /// Label of the function's source and its declaration text.
    fn function_context(&self, id: FunctionId) -> (String, String) {
        let Some(function) = self.entities.functions.get(id) else {
            return (String::new(), String::new());
        };
        let label = self
            .entities
            .sources
            .get(function.source())
            .map(|source| source.origin().label())
            .unwrap_or_default();
        (label, function.declaration().text().to_owned())
    }

    pub(crate) fn report_resolution(&self, id: FunctionId, error: &ResolutionError) {
        let (label, text) = self.function_context(id);
        self.sink.report(error.to_diagnostic(&label, &text));
    }

    fn report_ignored_external(&self, id: FunctionId) {
        let (label, _) = self.function_context(id);
        let message = format!(
            "external target of `{}` ignored: no external resolver is configured",
            self.function_label(id)
        );
        self.sink.report(
            Diagnostic::warning(DiagnosticCode::ESpliceMissingExternalResolver, message)
                .with_resource(label),
        );
    }
}
