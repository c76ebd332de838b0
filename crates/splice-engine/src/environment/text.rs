//! Computing transformed text by replaying function chains.

use std::collections::BTreeSet;

use splice_syntax::{Analyzer, SourceCode};
use tracing::warn;

use super::TransformEnvironment;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::entities::{FunctionId, ItemId, TargetRef};
use crate::error::TransformError;
use crate::install::InstallableItem;
use crate::language::Language;
use crate::transformer::{Statement, apply_statements};

impl TransformEnvironment {
    /// Text of an item after every function chained on it has been
    /// applied, first to last.
    ///
    /// # Errors
    ///
    /// Fails when a function's anchor is missing, its statements conflict
    /// or a rewritten function no longer parses.
    pub fn transformed_text(&self, id: ItemId) -> Result<String, TransformError> {
        let item = self.entities.items.get(id).ok_or(TransformError::Unknown)?;
        let analyzer = self
            .languages
            .analyzer(Language::Target(item.language()))
            .ok_or(TransformError::Unknown)?;
        let mut text = item.origin().text().to_owned();
        let mut code = item.code().clone();
        for function in self.entities.chain_of(TargetRef::Item(id)) {
            let statements = self.effective_statements(function)?;
            let name = self.function_name_of(function);
            text = apply_statements(code, &statements, &name, item.target_path())?;
            code = retokenize(analyzer, &text, &name)?;
        }
        Ok(text)
    }

    /// Declaration text of a function after the functions targeting it
    /// have been applied.
    ///
    /// # Errors
    ///
    /// As for [`transformed_text`](Self::transformed_text).
    pub fn transformed_function_text(&self, id: FunctionId) -> Result<String, TransformError> {
        let function = self
            .entities
            .functions
            .get(id)
            .ok_or(TransformError::Unknown)?;
        let analyzer = self.languages.transformer();
        let mut text = function.declaration().text().to_owned();
        let mut code = retokenize(analyzer, &text, function.name())?;
        for meta in self.entities.chain_of(TargetRef::Function(id)) {
            let statements = self.effective_statements(meta)?;
            let name = self.function_name_of(meta);
            text = apply_statements(code, &statements, &name, function.name())?;
            code = retokenize(analyzer, &text, &name)?;
        }
        Ok(text)
    }

    /// Statements a function applies: its own when nothing targets it,
    /// else those of its rewritten declaration.
    fn effective_statements(&self, id: FunctionId) -> Result<Vec<Statement>, TransformError> {
        let function = self
            .entities
            .functions
            .get(id)
            .ok_or(TransformError::Unknown)?;
        if self.entities.chain_of(TargetRef::Function(id)).next().is_none() {
            return Ok(function.declaration().statements().to_vec());
        }
        let text = self.transformed_function_text(id)?;
        let parsed = self
            .languages
            .transformer()
            .parse(&text)
            .map_err(|source| TransformError::Parse {
                function: function.name().to_owned(),
                source,
            })?;
        Ok(parsed
            .declarations
            .into_iter()
            .next()
            .map(|declaration| declaration.statements().to_vec())
            .unwrap_or_default())
    }

    fn function_name_of(&self, id: FunctionId) -> String {
        self.entities
            .functions
            .get(id)
            .map(|f| f.name().to_owned())
            .unwrap_or_default()
    }

    /// Every item with its transformed text, ordered by target path.
    ///
    /// Items whose chain fails to apply are reported and left out.
    #[must_use]
    pub fn installable_items(&self) -> Vec<InstallableItem> {
        let ids: BTreeSet<ItemId> = self.entities.items.ids().collect();
        self.installable(&ids)
    }

    pub(crate) fn installable(&self, ids: &BTreeSet<ItemId>) -> Vec<InstallableItem> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            let Some(item) = self.entities.items.get(id) else {
                continue;
            };
            match self.transformed_text(id) {
                Ok(text) => out.push(InstallableItem {
                    target_path: item.target_path().to_owned(),
                    text,
                }),
                Err(error) => {
                    warn!(
                        target: "splice::environment",
                        item = item.target_path(),
                        error = %error,
                        "transformation failed"
                    );
                    self.sink.report(
                        Diagnostic::error(DiagnosticCode::ESpliceTransformFailed, error.to_string())
                            .with_resource(item.origin().label()),
                    );
                }
            }
        }
        out.sort_by(|a, b| a.target_path.cmp(&b.target_path));
        out
    }
}

fn retokenize(
    analyzer: &dyn Analyzer,
    text: &str,
    function: &str,
) -> Result<SourceCode, TransformError> {
    analyzer
        .tokenize(text)
        .map_err(|source| TransformError::Parse {
            function: function.to_owned(),
            source,
        })
}
