//! Error types for the transformation engine.
//!
//! [`RegistrationError`] and [`ResolutionError`] describe data problems; the
//! environment converts them into [`Diagnostic`]s and carries on.
//! The remaining types are returned as `Err` by the collaborator adapters.

use camino::Utf8PathBuf;
use splice_syntax::{EditError, SyntaxError};
use thiserror::Error;

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::resources::PackageId;

/// Failures while registering a resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Another item already produces the same final target path.
    #[error("target path `{path}` is already produced by `{existing}`")]
    DuplicateTargetPath {
        /// The contested target path.
        path: String,
        /// Resource of the item registered first.
        existing: String,
    },

    /// Another transformer function already uses this name.
    #[error("transformer function `{name}` is already declared in `{existing}`")]
    DuplicateFunctionName {
        /// The contested function name.
        name: String,
        /// Resource of the function registered first.
        existing: String,
    },

    /// The resource text does not parse.
    #[error("failed to parse `{resource}`: {source}")]
    Parse {
        /// The offending resource.
        resource: String,
        /// Underlying analyzer failure.
        #[source]
        source: SyntaxError,
    },

    /// A transformer declaration has no language and the file no hint.
    #[error("transformer `{function}` names no target language")]
    MissingLanguage {
        /// Name of the declaration.
        function: String,
    },

    /// The resource could not be read.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl RegistrationError {
    /// Creates a parse failure.
    #[must_use]
    pub fn parse(resource: impl Into<String>, source: SyntaxError) -> Self {
        Self::Parse {
            resource: resource.into(),
            source,
        }
    }

    /// The stable diagnostic code.
    #[must_use]
    pub const fn code(&self) -> DiagnosticCode {
        match self {
            Self::DuplicateTargetPath { .. } => DiagnosticCode::ESpliceDuplicateTargetPath,
            Self::DuplicateFunctionName { .. } => DiagnosticCode::ESpliceDuplicateFunctionName,
            Self::Parse { .. } => DiagnosticCode::ESpliceParseFailed,
            Self::MissingLanguage { .. } => DiagnosticCode::ESpliceMissingLanguage,
            Self::Resource(_) => DiagnosticCode::ESpliceResourceUnavailable,
        }
    }

    /// Converts the error into an error diagnostic about `resource`.
    #[must_use]
    pub fn to_diagnostic(&self, resource: &str) -> Diagnostic {
        Diagnostic::error(self.code(), self.to_string()).with_resource(resource)
    }
}

/// Failures while resolving a transformer function's target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// A function-of-function declaration has no target name.
    #[error("transformer `{function}` targets a transformer but names none")]
    MissingTargetName {
        /// The declaring function.
        function: String,
    },

    /// No reachable candidate matches.
    #[error("target `{target}` of `{function}` not found")]
    NotFound {
        /// The declaring function.
        function: String,
        /// The target as searched for.
        target: String,
        /// Every reachable candidate considered.
        candidates: Vec<String>,
    },

    /// Several reachable candidates match.
    #[error("target `{target}` of `{function}` is ambiguous: {}", .matches.join(", "))]
    Ambiguous {
        /// The declaring function.
        function: String,
        /// The target as searched for.
        target: String,
        /// Every matching candidate.
        matches: Vec<String>,
        /// Every reachable candidate considered.
        candidates: Vec<String>,
    },

    /// The named function exists in a package that is not reachable.
    #[error("target `{target}` of `{function}` is in unreachable package `{package}`")]
    Unreachable {
        /// The declaring function.
        function: String,
        /// The target function name.
        target: String,
        /// The package owning the target.
        package: PackageId,
    },

    /// Following the target chain leads back to the function.
    #[error("target `{target}` of `{function}` leads back to `{function}`")]
    Cycle {
        /// The declaring function.
        function: String,
        /// The target function name.
        target: String,
    },

    /// The target is external and no resolver is configured.
    #[error("target `{target}` of `{function}` is external and no external resolver is configured")]
    MissingExternalResolver {
        /// The declaring function.
        function: String,
        /// The external reference.
        target: String,
    },
}

impl ResolutionError {
    /// The stable diagnostic code.
    #[must_use]
    pub const fn code(&self) -> DiagnosticCode {
        match self {
            Self::MissingTargetName { .. } => DiagnosticCode::ESpliceMissingTargetName,
            Self::NotFound { .. } => DiagnosticCode::ESpliceTargetNotFound,
            Self::Ambiguous { .. } => DiagnosticCode::ESpliceAmbiguousTarget,
            Self::Unreachable { .. } => DiagnosticCode::ESpliceUnreachableTarget,
            Self::Cycle { .. } => DiagnosticCode::ESpliceCyclicTarget,
            Self::MissingExternalResolver { .. } => DiagnosticCode::ESpliceMissingExternalResolver,
        }
    }

    /// Candidate list attached to the error, if any.
    #[must_use]
    pub fn candidates(&self) -> &[String] {
        match self {
            Self::NotFound { candidates, .. } | Self::Ambiguous { candidates, .. } => candidates,
            _ => &[],
        }
    }

    /// Converts the error into a diagnostic listing the candidates and the
    /// offending transformer text.
    #[must_use]
    pub fn to_diagnostic(&self, resource: &str, transformer_text: &str) -> Diagnostic {
        let candidates = self.candidates();
        let listing = if candidates.is_empty() {
            "reachable candidates: (none)".to_owned()
        } else {
            format!("reachable candidates: {}", candidates.join(", "))
        };
        Diagnostic::error(self.code(), self.to_string())
            .with_resource(resource)
            .with_note(listing)
            .with_note(format!("transformer:\n{}", transformer_text.trim_end()))
    }
}

/// Failures while computing an item's final text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// A statement's anchor text does not occur in the target.
    #[error("`{function}`: anchor `{anchor}` not found in `{target}`")]
    AnchorNotFound {
        /// The applying function.
        function: String,
        /// The missing anchor text.
        anchor: String,
        /// Display name of the target.
        target: String,
    },

    /// Two statements of one function edit overlapping tokens.
    #[error("`{function}`: conflicting edits: {source}")]
    Edit {
        /// The applying function.
        function: String,
        /// Underlying editor failure.
        #[source]
        source: EditError,
    },

    /// The function's (possibly rewritten) text no longer parses.
    #[error("`{function}` no longer parses: {source}")]
    Parse {
        /// The applying function.
        function: String,
        /// Underlying parse failure.
        #[source]
        source: SyntaxError,
    },

    /// The handle does not refer to a registered item or function.
    #[error("unknown transformable")]
    Unknown,
}

/// Failures of a [`ResourceStore`](crate::ResourceStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The resource does not exist.
    #[error("resource `{resource}` not found in package `{package}`")]
    NotFound {
        /// The package searched.
        package: PackageId,
        /// The missing resource.
        resource: String,
    },

    /// The package has no file-system root to read from.
    #[error("package `{package}` has no root directory")]
    NoRoot {
        /// The package.
        package: PackageId,
    },

    /// An I/O failure other than absence.
    #[error("failed to access {path}: {message}")]
    Io {
        /// The path being accessed.
        path: Utf8PathBuf,
        /// Description of the failure.
        message: String,
    },
}

impl ResourceError {
    /// Creates an I/O failure.
    #[must_use]
    pub fn io(path: impl Into<Utf8PathBuf>, error: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

/// Failures while building a [`PackageGraph`](crate::PackageGraph).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A package with this id was already added.
    #[error("package `{package}` is already registered")]
    DuplicatePackage {
        /// The duplicated package.
        package: PackageId,
    },

    /// A dependency has not been added before its dependant.
    #[error("package `{package}` requires unknown package `{dependency}`")]
    UnknownDependency {
        /// The dependant package.
        package: PackageId,
        /// The missing dependency.
        dependency: PackageId,
    },
}

/// Failures while persisting transformed items.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The target path would escape the install root.
    #[error("target path `{path}` escapes the install root")]
    InvalidTargetPath {
        /// The rejected target path.
        path: String,
    },

    /// Writing the file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination of the write.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}
