//! Package graph with precomputed reachability.
//!
//! Packages are added dependencies first, so insertion order is a
//! topological order and a package's rank is its insertion index. Each
//! package reaches itself and, transitively, everything it requires.

use std::collections::{BTreeSet, HashMap};

use crate::error::GraphError;
use crate::resources::{PackageId, PackageResources};

/// Packages in topological order with their reachable sets.
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    packages: Vec<PackageResources>,
    index: HashMap<PackageId, usize>,
    reachables: Vec<BTreeSet<usize>>,
}

impl PackageGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a package after all the packages it requires.
    ///
    /// # Errors
    ///
    /// Fails when the id is already present or a requirement has not been
    /// added yet.
    pub fn add(
        &mut self,
        package: PackageResources,
        requires: &[PackageId],
    ) -> Result<&mut Self, GraphError> {
        if self.index.contains_key(package.id()) {
            return Err(GraphError::DuplicatePackage {
                package: package.id().clone(),
            });
        }
        let rank = self.packages.len();
        let mut reachable = BTreeSet::from([rank]);
        for dependency in requires {
            let Some(&dep_rank) = self.index.get(dependency) else {
                return Err(GraphError::UnknownDependency {
                    package: package.id().clone(),
                    dependency: dependency.clone(),
                });
            };
            if let Some(transitive) = self.reachables.get(dep_rank) {
                reachable.extend(transitive.iter().copied());
            }
        }
        self.index.insert(package.id().clone(), rank);
        self.packages.push(package);
        self.reachables.push(reachable);
        Ok(self)
    }

    /// Every package in topological order.
    #[must_use]
    pub fn packages(&self) -> &[PackageResources] {
        &self.packages
    }

    /// Looks a package up by id.
    #[must_use]
    pub fn get(&self, id: &PackageId) -> Option<&PackageResources> {
        self.rank(id).and_then(|rank| self.packages.get(rank))
    }

    /// Topological position of a package.
    #[must_use]
    pub fn rank(&self, id: &PackageId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Packages visible from `id`, in topological order, itself included.
    pub fn reachables(&self, id: &PackageId) -> impl Iterator<Item = &PackageResources> {
        self.rank(id)
            .and_then(|rank| self.reachables.get(rank))
            .into_iter()
            .flatten()
            .filter_map(|&rank| self.packages.get(rank))
    }

    /// Returns `true` when `to` is visible from `from`.
    #[must_use]
    pub fn is_reachable(&self, from: &PackageId, to: &PackageId) -> bool {
        match (self.rank(from), self.rank(to)) {
            (Some(from_rank), Some(to_rank)) => self
                .reachables
                .get(from_rank)
                .is_some_and(|set| set.contains(&to_rank)),
            _ => false,
        }
    }

    /// Local packages in topological order.
    pub fn local_packages(&self) -> impl Iterator<Item = &PackageResources> {
        self.packages.iter().filter(|p| p.is_local())
    }
}
