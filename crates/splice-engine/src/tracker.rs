//! Per-package index of inputs and their pending changes.
//!
//! Stable packages keep a flat list of inputs that never changes once
//! built. Local packages keep a doubly linked list threaded through the
//! inputs themselves (see `InputLinks`), plus the set of changes recorded
//! since the last application.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, trace};

use crate::entities::{Entities, InputId};
use crate::resources::{PackageId, PackageResources};

/// A change waiting for the next application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingChange {
    /// An existing input whose file changed.
    Input(InputId),
    /// A path matching no tracked input.
    NewFile {
        full_path: Utf8PathBuf,
        sub_path: String,
    },
}

#[derive(Debug)]
enum BucketStorage {
    Stable(Vec<InputId>),
    Local {
        head: Option<InputId>,
        tail: Option<InputId>,
        changes: Vec<PendingChange>,
    },
}

/// Inputs of every package, by package id.
#[derive(Debug, Default)]
pub(crate) struct Tracker {
    buckets: HashMap<PackageId, BucketStorage>,
}

impl Tracker {
    pub(crate) fn new<'a>(packages: impl IntoIterator<Item = &'a PackageResources>) -> Self {
        let buckets = packages
            .into_iter()
            .map(|package| {
                let storage = if package.is_local() {
                    BucketStorage::Local {
                        head: None,
                        tail: None,
                        changes: Vec::new(),
                    }
                } else {
                    BucketStorage::Stable(Vec::new())
                };
                (package.id().clone(), storage)
            })
            .collect();
        Self { buckets }
    }

    pub(crate) fn add_stable(&mut self, package: &PackageId, input: InputId) {
        if let Some(BucketStorage::Stable(inputs)) = self.buckets.get_mut(package) {
            inputs.push(input);
        }
    }

    /// Appends a local input at the tail of its bucket's list.
    pub(crate) fn add_local(&mut self, entities: &mut Entities, package: &PackageId, input: InputId) {
        let Some(BucketStorage::Local { head, tail, .. }) = self.buckets.get_mut(package) else {
            return;
        };
        let previous = *tail;
        if let Some(links) = entities.links_mut(input) {
            links.prev = previous;
            links.next = None;
        }
        match previous.and_then(|p| entities.links_mut(p)) {
            Some(links) => links.next = Some(input),
            None => *head = Some(input),
        }
        *tail = Some(input);
    }

    /// Adds `input` to whichever structure its package uses.
    pub(crate) fn add(&mut self, entities: &mut Entities, package: &PackageId, input: InputId) {
        match self.buckets.get(package) {
            Some(BucketStorage::Local { .. }) => self.add_local(entities, package, input),
            Some(BucketStorage::Stable(_)) => self.add_stable(package, input),
            None => {}
        }
    }

    /// Splices `input` out of its bucket and drops its pending change.
    pub(crate) fn remove(&mut self, entities: &mut Entities, package: &PackageId, input: InputId) {
        match self.buckets.get_mut(package) {
            Some(BucketStorage::Stable(inputs)) => inputs.retain(|i| *i != input),
            Some(BucketStorage::Local {
                head,
                tail,
                changes,
            }) => {
                let Some(links) = entities.links(input) else {
                    return;
                };
                match links.prev.and_then(|p| entities.links_mut(p)) {
                    Some(prev) => prev.next = links.next,
                    None => *head = links.next,
                }
                match links.next.and_then(|n| entities.links_mut(n)) {
                    Some(next) => next.prev = links.prev,
                    None => *tail = links.prev,
                }
                if let Some(own) = entities.links_mut(input) {
                    own.prev = None;
                    own.next = None;
                }
                changes.retain(|change| *change != PendingChange::Input(input));
            }
            None => {}
        }
    }

    /// Inputs of a package in insertion order.
    pub(crate) fn inputs(&self, entities: &Entities, package: &PackageId) -> Vec<InputId> {
        match self.buckets.get(package) {
            Some(BucketStorage::Stable(inputs)) => inputs.clone(),
            Some(BucketStorage::Local { head, .. }) => {
                let mut out = Vec::new();
                let mut cursor = *head;
                while let Some(input) = cursor {
                    out.push(input);
                    cursor = entities.links(input).and_then(|links| links.next);
                }
                out
            }
            None => Vec::new(),
        }
    }

    /// Records a file-system change in a local package.
    ///
    /// Every input at or below `sub_path` is marked changed. When none
    /// matches, the path is recorded as a new-file candidate. Returns
    /// `false` when the package is unknown or stable.
    pub(crate) fn on_change(
        &mut self,
        entities: &Entities,
        package: &PackageId,
        full_path: &Utf8Path,
        sub_path: &str,
    ) -> bool {
        let Some(BucketStorage::Local { head, changes, .. }) = self.buckets.get_mut(package) else {
            debug!(
                target: "splice::tracker",
                package = %package,
                path = sub_path,
                "ignoring change outside local packages"
            );
            return false;
        };
        let normalised = sub_path.replace('\\', "/");
        let wanted = normalised.trim_matches('/');
        let mut matched = false;
        let mut cursor = *head;
        while let Some(input) = cursor {
            let covers = entities.origin(input).is_some_and(|origin| {
                let name = origin.locator().full_resource_name();
                name == wanted
                    || name
                        .strip_prefix(wanted)
                        .is_some_and(|rest| rest.starts_with('/'))
            });
            if covers {
                matched = true;
                let change = PendingChange::Input(input);
                if !changes.contains(&change) {
                    changes.push(change);
                }
            }
            cursor = entities.links(input).and_then(|links| links.next);
        }
        if !matched {
            let candidate = PendingChange::NewFile {
                full_path: full_path.to_owned(),
                sub_path: wanted.to_owned(),
            };
            if !changes.contains(&candidate) {
                changes.push(candidate);
            }
        }
        trace!(
            target: "splice::tracker",
            package = %package,
            path = wanted,
            matched,
            "recorded change"
        );
        true
    }

    pub(crate) fn has_changes(&self) -> bool {
        self.buckets.values().any(|storage| {
            matches!(storage, BucketStorage::Local { changes, .. } if !changes.is_empty())
        })
    }

    /// Takes the pending changes of one package.
    pub(crate) fn take_changes(&mut self, package: &PackageId) -> Vec<PendingChange> {
        match self.buckets.get_mut(package) {
            Some(BucketStorage::Local { changes, .. }) => std::mem::take(changes),
            _ => Vec::new(),
        }
    }
}
