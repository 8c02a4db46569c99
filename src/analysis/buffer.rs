//! Per-dependency buffer of unique third-party calls.

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use super::resolver::TypeResolver;
use crate::core::graph::{DependencyGraph, DependencyId};
use crate::core::model::MethodCallEntry;

/// Unique call entries grouped by owning dependency.
///
/// Every dependency of the graph gets a bucket up front. Entries compare
/// structurally, so adding the same logical call twice stores it once.
#[derive(Debug, Clone, Default)]
pub struct MethodCallBuffer {
    buckets: IndexMap<DependencyId, IndexSet<MethodCallEntry>>,
    size: usize,
}

impl MethodCallBuffer {
    /// Create a buffer with an empty bucket per dependency
    pub fn new(graph: &DependencyGraph) -> Self {
        Self {
            buckets: graph.ids().map(|id| (id, IndexSet::new())).collect(),
            size: 0,
        }
    }

    /// Resolve the entry's declaring type and store it under its dependency.
    ///
    /// Returns the owning dependency when the entry was newly added.
    /// Unresolved entries are dropped; the resolver keeps track of them.
    pub fn add_method_call(
        &mut self,
        entry: MethodCallEntry,
        resolver: &mut TypeResolver,
    ) -> Option<DependencyId> {
        let dependency = resolver.resolve(&entry.declaring_type).dependency()?;
        self.insert(dependency, entry).then_some(dependency)
    }

    /// Store an entry under a known dependency. Returns false for duplicates.
    pub fn insert(&mut self, dependency: DependencyId, entry: MethodCallEntry) -> bool {
        let added = self.buckets.entry(dependency).or_default().insert(entry);
        if added {
            self.size += 1;
        } else {
            trace!("Duplicate call ignored for dependency #{}", dependency.index());
        }
        added
    }

    /// Remove an entry from its dependency's bucket
    pub fn remove_method_call(&mut self, dependency: DependencyId, entry: &MethodCallEntry) -> bool {
        let removed = self
            .buckets
            .get_mut(&dependency)
            .is_some_and(|bucket| bucket.shift_remove(entry));
        if removed {
            self.size -= 1;
        }
        removed
    }

    /// Whether the entry is buffered under `dependency`
    pub fn has_method_call(&self, dependency: DependencyId, entry: &MethodCallEntry) -> bool {
        self.buckets
            .get(&dependency)
            .is_some_and(|bucket| bucket.contains(entry))
    }

    /// Entries buffered for one dependency, in insertion order
    pub fn method_calls(&self, dependency: DependencyId) -> impl Iterator<Item = &MethodCallEntry> {
        self.buckets
            .get(&dependency)
            .into_iter()
            .flat_map(|bucket| bucket.iter())
    }

    /// Every bucket, including empty ones
    pub fn buckets(&self) -> impl Iterator<Item = (DependencyId, &IndexSet<MethodCallEntry>)> {
        self.buckets.iter().map(|(id, bucket)| (*id, bucket))
    }

    /// Empty one dependency's bucket
    pub fn clear_dependency(&mut self, dependency: DependencyId) {
        if let Some(bucket) = self.buckets.get_mut(&dependency) {
            self.size -= bucket.len();
            bucket.clear();
        }
    }

    /// Empty every bucket, keeping the dependencies
    pub fn clear(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }
        self.size = 0;
    }

    /// Whether no bucket holds an entry
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(IndexSet::is_empty)
    }

    /// Total number of buffered entries
    pub fn total_size(&self) -> usize {
        self.size
    }

    /// Number of entries buffered for one dependency
    pub fn size_of(&self, dependency: DependencyId) -> usize {
        self.buckets.get(&dependency).map_or(0, IndexSet::len)
    }
}
