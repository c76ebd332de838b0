//! Transformation engine for splice.
//!
//! Packages contribute two kinds of resources: *items*, source files in a
//! target language that end up installed, and *function sources*, files
//! declaring transformer functions that rewrite an item or another
//! function. The [`TransformEnvironment`] registers both, resolves every
//! function to its target and replays the resulting chains to produce the
//! text of each item.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use splice_engine::{
//!     FileSystemResourceStore, LanguageRegistry, PackageGraph, PackageResources,
//!     TracingSink, TransformEnvironment,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = PackageGraph::new();
//! graph.add(PackageResources::local("app", "app").with_root("src/app"), &[])?;
//! let mut environment = TransformEnvironment::new(
//!     graph,
//!     LanguageRegistry::new("t")?,
//!     Arc::new(FileSystemResourceStore::new()),
//!     Arc::new(TracingSink::new()),
//! );
//! environment.build();
//! for item in environment.installable_items() {
//!     println!("{}", item.target_path);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! In live mode, [`TransformEnvironment::on_change`] records file-system
//! changes and [`TransformEnvironment::apply_changes`] applies them in one
//! batch, returning only the items whose text may have changed.

mod diagnostics;
mod entities;
mod environment;
mod error;
mod graph;
mod install;
mod language;
mod resources;
pub mod telemetry;
mod tracker;
pub mod transformer;

pub use diagnostics::{
    CollectingSink, Diagnostic, DiagnosticCode, DiagnosticSink, ErrorScope, Severity, TracingSink,
};
pub use entities::{
    ChainIter, ChainOrder, FunctionChain, FunctionId, FunctionSource, InputId, Item, ItemId,
    Origin, SourceId, TFunction, TargetRef, Transformable,
};
pub use environment::{BuildSummary, ChangeEvent, ExternalItemResolver, TransformEnvironment};
pub use error::{
    GraphError, InstallError, RegistrationError, ResolutionError, ResourceError, TransformError,
};
pub use graph::PackageGraph;
pub use install::{FileSystemInstaller, InstallableItem, Installer};
pub use language::{Language, LanguageRegistry};
pub use resources::{
    FileSystemResourceStore, MemoryResourceStore, PackageId, PackageResources, ResourceLocator,
    ResourceStore,
};

#[cfg(test)]
mod tests;
