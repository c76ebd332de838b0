//! Structured diagnostics and the sinks that receive them.
//!
//! Data-dependent failures (registration, resolution, live validation) are
//! never returned as `Err` from the environment. They are turned into a
//! [`Diagnostic`] and handed to the injected [`DiagnosticSink`], and the
//! environment keeps going so that a single run surfaces every problem.
//! [`ErrorScope`] lets a caller ask whether a particular stretch of work
//! raised an error.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{error, info, warn};

/// How serious a diagnostic is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    /// Informational message.
    Info,
    /// Something was skipped but processing continued normally.
    Warning,
    /// A resource or function could not be registered or resolved.
    Error,
}

/// Stable codes for splice diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DiagnosticCode {
    /// Two items produce the same final target path.
    ESpliceDuplicateTargetPath,
    /// Two transformer functions share a name.
    ESpliceDuplicateFunctionName,
    /// A resource failed to parse.
    ESpliceParseFailed,
    /// A transformer declaration names no language and its file has no hint.
    ESpliceMissingLanguage,
    /// A function-of-function declaration names no target.
    ESpliceMissingTargetName,
    /// No reachable candidate matches the declared target.
    ESpliceTargetNotFound,
    /// Several reachable candidates match the declared target.
    ESpliceAmbiguousTarget,
    /// The target exists but its package is not reachable.
    ESpliceUnreachableTarget,
    /// The target chain loops back onto the function itself.
    ESpliceCyclicTarget,
    /// An external reference was found but no resolver is configured.
    ESpliceMissingExternalResolver,
    /// A resource could not be listed or read.
    ESpliceResourceUnavailable,
    /// A transformer function could not be applied to its target.
    ESpliceTransformFailed,
    /// A tracked input disappeared during live processing.
    ESpliceInputRemoved,
}

impl DiagnosticCode {
    /// The stable textual form of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ESpliceDuplicateTargetPath => "E_SPLICE_DUPLICATE_TARGET_PATH",
            Self::ESpliceDuplicateFunctionName => "E_SPLICE_DUPLICATE_FUNCTION_NAME",
            Self::ESpliceParseFailed => "E_SPLICE_PARSE_FAILED",
            Self::ESpliceMissingLanguage => "E_SPLICE_MISSING_LANGUAGE",
            Self::ESpliceMissingTargetName => "E_SPLICE_MISSING_TARGET_NAME",
            Self::ESpliceTargetNotFound => "E_SPLICE_TARGET_NOT_FOUND",
            Self::ESpliceAmbiguousTarget => "E_SPLICE_AMBIGUOUS_TARGET",
            Self::ESpliceUnreachableTarget => "E_SPLICE_UNREACHABLE_TARGET",
            Self::ESpliceCyclicTarget => "E_SPLICE_CYCLIC_TARGET",
            Self::ESpliceMissingExternalResolver => "E_SPLICE_MISSING_EXTERNAL_RESOLVER",
            Self::ESpliceResourceUnavailable => "E_SPLICE_RESOURCE_UNAVAILABLE",
            Self::ESpliceTransformFailed => "E_SPLICE_TRANSFORM_FAILED",
            Self::ESpliceInputRemoved => "E_SPLICE_INPUT_REMOVED",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    severity: Severity,
    code: DiagnosticCode,
    message: String,
    resource: Option<String>,
    notes: Vec<String>,
}

impl Diagnostic {
    /// Creates a diagnostic without resource or notes.
    #[must_use]
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            resource: None,
            notes: Vec::new(),
        }
    }

    /// Creates an error diagnostic.
    #[must_use]
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a warning diagnostic.
    #[must_use]
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Names the offending resource.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Appends a supplementary note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Appends several notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl IntoIterator<Item = String>) -> Self {
        self.notes.extend(notes);
        self
    }

    /// The severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// The stable code.
    #[must_use]
    pub const fn code(&self) -> DiagnosticCode {
        self.code
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The offending resource, if known.
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Supplementary notes (candidates considered, offending text, ...).
    #[must_use]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(resource) = &self.resource {
            write!(f, "\n  --> {resource}")?;
        }
        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }
        Ok(())
    }
}

/// Receives diagnostics from the engine.
pub trait DiagnosticSink: Send + Sync {
    /// Records one diagnostic.
    fn report(&self, diagnostic: Diagnostic);

    /// Number of [`Severity::Error`] diagnostics reported so far.
    fn error_count(&self) -> usize;
}

/// Emits every diagnostic as a `tracing` event.
#[derive(Debug, Default)]
pub struct TracingSink {
    errors: AtomicUsize,
}

impl TracingSink {
    /// Creates a sink with a zero error count.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            errors: AtomicUsize::new(0),
        }
    }
}

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        emit(&diagnostic);
        if diagnostic.severity == Severity::Error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Keeps diagnostics in memory and forwards them to `tracing`.
///
/// The error count only grows: [`take`](Self::take) drains the stored
/// diagnostics but not the count seen by an [`ErrorScope`].
#[derive(Debug, Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    errors: AtomicUsize,
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            errors: AtomicUsize::new(0),
        }
    }

    /// A copy of everything reported so far.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Removes and returns everything reported so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    /// Renders every diagnostic, one block per entry.
    #[must_use]
    pub fn render(&self) -> String {
        self.lock()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        emit(&diagnostic);
        if diagnostic.severity == Severity::Error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        self.lock().push(diagnostic);
    }

    fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }
}

fn emit(diagnostic: &Diagnostic) {
    let code = diagnostic.code.as_str();
    let resource = diagnostic.resource.as_deref().unwrap_or_default();
    let notes = diagnostic.notes.len();
    match diagnostic.severity {
        Severity::Error => error!(
            target: "splice::diagnostics",
            code,
            resource,
            notes,
            "{}",
            diagnostic.message
        ),
        Severity::Warning => warn!(
            target: "splice::diagnostics",
            code,
            resource,
            notes,
            "{}",
            diagnostic.message
        ),
        Severity::Info => info!(
            target: "splice::diagnostics",
            code,
            resource,
            "{}",
            diagnostic.message
        ),
    }
}

/// Detects whether errors were reported while the scope was open.
#[derive(Debug, Clone, Copy)]
pub struct ErrorScope {
    baseline: usize,
}

impl ErrorScope {
    /// Opens a scope at the sink's current error count.
    #[must_use]
    pub fn open(sink: &dyn DiagnosticSink) -> Self {
        Self {
            baseline: sink.error_count(),
        }
    }

    /// Number of errors reported since the scope opened.
    #[must_use]
    pub fn errors_since(self, sink: &dyn DiagnosticSink) -> usize {
        sink.error_count().saturating_sub(self.baseline)
    }

    /// Returns `true` when at least one error was reported since opening.
    #[must_use]
    pub fn has_errors(self, sink: &dyn DiagnosticSink) -> bool {
        self.errors_since(sink) > 0
    }
}
