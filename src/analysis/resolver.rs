//! Type-to-Dependency Resolver.
//!
//! Maps a fully-qualified declaring type back to the dependency whose acquired
//! source root contains it. The search probes `<root>/<a>/<b>/<C>.java` for
//! every root, then drops the innermost segment and retries, so that
//! `com.acme.Outer.Inner` is found in `com/acme/Outer.java`. The first root
//! holding a matching file wins; roots are probed in graph insertion order.
//!
//! Results and misses are memoized for the lifetime of the resolver.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::core::graph::{DependencyGraph, DependencyId};
use crate::core::heuristics::{
    is_standard_library, root_name, CoordinateOwnershipMatcher, OwnershipMatcher,
    SubstringOwnershipMatcher,
};
use crate::core::model::Dependency;
use crate::lang::SourceParser;

/// Declaring types need at least this many segments to be searched.
pub const MIN_TYPE_SEGMENTS: usize = 3;

/// Source file extension probed in every root.
pub const SOURCE_EXTENSION: &str = "java";

/// Where a declaring type was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    /// Owning dependency
    pub dependency: DependencyId,
    /// Source file that matched
    pub source_file: PathBuf,
}

/// Outcome of one resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Attributed to a dependency
    Resolved(ResolvedType),
    /// No acquired root holds the type
    Unresolved,
    /// Project-local or standard-library type, never searched
    Skipped,
}

impl Resolution {
    /// Owning dependency, if resolved
    pub fn dependency(&self) -> Option<DependencyId> {
        match self {
            Resolution::Resolved(found) => Some(found.dependency),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct SourceRoot {
    path: PathBuf,
    name: String,
    acquired_for: DependencyId,
}

/// Resolution state for one analysis run.
pub struct TypeResolver {
    roots: Vec<SourceRoot>,
    owners: Vec<(DependencyId, Dependency)>,
    matcher: Box<dyn OwnershipMatcher>,
    project_group_id: Option<String>,
    deep_search: Option<Box<dyn SourceParser>>,
    resolved: IndexMap<String, ResolvedType>,
    by_dependency: IndexMap<DependencyId, IndexSet<String>>,
    unresolved: IndexSet<String>,
    probes: usize,
}

impl std::fmt::Debug for TypeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeResolver")
            .field("roots", &self.roots.len())
            .field("matcher", &self.matcher)
            .field("resolved", &self.resolved.len())
            .field("unresolved", &self.unresolved.len())
            .field("probes", &self.probes)
            .finish()
    }
}

impl TypeResolver {
    /// Build a resolver over every dependency with an acquired source root
    pub fn new(graph: &DependencyGraph) -> Self {
        let owners: Vec<(DependencyId, Dependency)> = graph
            .dependencies()
            .filter(|(_, dep)| dep.source_root.is_some())
            .map(|(id, dep)| (id, dep.clone()))
            .collect();
        let roots = graph
            .source_roots()
            .into_iter()
            .map(|(id, path)| SourceRoot {
                path: path.to_path_buf(),
                name: root_name(path).to_string(),
                acquired_for: id,
            })
            .collect();

        Self {
            roots,
            owners,
            matcher: Box::new(SubstringOwnershipMatcher),
            project_group_id: None,
            deep_search: None,
            resolved: IndexMap::new(),
            by_dependency: IndexMap::new(),
            unresolved: IndexSet::new(),
            probes: 0,
        }
    }

    /// Replace the ownership heuristic
    pub fn with_matcher(mut self, matcher: Box<dyn OwnershipMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Use [`CoordinateOwnershipMatcher`] when `strict` is set
    pub fn with_strict_matching(self, strict: bool) -> Self {
        if strict {
            self.with_matcher(Box::new(CoordinateOwnershipMatcher))
        } else {
            self
        }
    }

    /// Never search types under the project's own groupId
    pub fn with_project_group(mut self, group_id: Option<&str>) -> Self {
        self.project_group_id = group_id.filter(|g| !g.is_empty()).map(str::to_string);
        self
    }

    /// Enable the declaration scan fallback, parsing candidates with `parser`
    pub fn with_deep_search(mut self, parser: Box<dyn SourceParser>) -> Self {
        self.deep_search = Some(parser);
        self
    }

    /// Whether a declaring type is excluded from searching
    pub fn is_skipped(&self, declaring_type: &str) -> bool {
        if is_standard_library(declaring_type) {
            return true;
        }
        self.project_group_id.as_deref().is_some_and(|group| {
            declaring_type == group
                || declaring_type
                    .strip_prefix(group)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// Resolve a declaring type to its owning dependency
    pub fn resolve(&mut self, declaring_type: &str) -> Resolution {
        if let Some(found) = self.resolved.get(declaring_type) {
            return Resolution::Resolved(found.clone());
        }
        if self.unresolved.contains(declaring_type) {
            return Resolution::Unresolved;
        }

        let parts: Vec<&str> = declaring_type.split('.').collect();
        if parts.len() < MIN_TYPE_SEGMENTS || parts.iter().any(|p| p.is_empty()) {
            self.unresolved.insert(declaring_type.to_string());
            return Resolution::Unresolved;
        }
        if self.is_skipped(declaring_type) {
            return Resolution::Skipped;
        }

        let found = self
            .probe_truncations(&parts)
            .or_else(|| self.scan_declarations(&parts));

        match found {
            Some(found) => {
                debug!(
                    "{} resolved to {} via {}",
                    declaring_type,
                    self.owner(found.dependency)
                        .map(|d| d.coordinate.to_string())
                        .unwrap_or_default(),
                    found.source_file.display()
                );
                self.record(declaring_type, found.clone());
                Resolution::Resolved(found)
            }
            None => {
                trace!("{} unresolved", declaring_type);
                self.unresolved.insert(declaring_type.to_string());
                Resolution::Unresolved
            }
        }
    }

    fn record(&mut self, declaring_type: &str, found: ResolvedType) {
        self.unresolved.shift_remove(declaring_type);
        self.by_dependency
            .entry(found.dependency)
            .or_default()
            .insert(declaring_type.to_string());
        self.resolved.insert(declaring_type.to_string(), found);
    }

    fn probe_truncations(&mut self, parts: &[&str]) -> Option<ResolvedType> {
        let mut len = parts.len();
        while len >= MIN_TYPE_SEGMENTS {
            let candidate = candidate_path(&parts[..len]);
            for root_index in 0..self.roots.len() {
                let file = self.roots[root_index].path.join(&candidate);
                self.probes += 1;
                if !file.is_file() {
                    continue;
                }
                if let Some(dependency) = self.owner_of_root(root_index) {
                    return Some(ResolvedType {
                        dependency,
                        source_file: file,
                    });
                }
            }
            len -= 1;
        }
        None
    }

    fn scan_declarations(&mut self, parts: &[&str]) -> Option<ResolvedType> {
        let mut parser = self.deep_search.take()?;
        let simple_name = parts[parts.len() - 1];
        let package_dir: PathBuf = parts[..parts.len() - 1].iter().collect();

        let mut found = None;
        'roots: for root_index in 0..self.roots.len() {
            let dir = self.roots[root_index].path.join(&package_dir);
            if !dir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if !is_source_file(path) {
                    continue;
                }
                self.probes += 1;
                let declares = parser
                    .parse_file(path)
                    .map(|unit| unit.declares_type(simple_name))
                    .unwrap_or(false);
                if !declares {
                    continue;
                }
                if let Some(dependency) = self.owner_of_root(root_index) {
                    found = Some(ResolvedType {
                        dependency,
                        source_file: path.to_path_buf(),
                    });
                    break 'roots;
                }
            }
        }

        self.deep_search = Some(parser);
        found
    }

    /// Dependency that owns the root's name. The dependency the root was
    /// acquired for wins when it matches, so versions of one artifact keep
    /// their own types; otherwise the first match in insertion order.
    fn owner_of_root(&self, root_index: usize) -> Option<DependencyId> {
        let root = &self.roots[root_index];
        let mut matching = self
            .owners
            .iter()
            .filter(|(_, dependency)| self.matcher.owns(&root.name, dependency))
            .map(|(id, _)| *id)
            .peekable();
        let first = matching.peek().copied();
        matching
            .find(|id| *id == root.acquired_for)
            .or(first)
    }

    fn owner(&self, id: DependencyId) -> Option<&Dependency> {
        self.owners.iter().find(|(o, _)| *o == id).map(|(_, d)| d)
    }

    /// Memoized result for a type, without searching
    pub fn lookup(&self, declaring_type: &str) -> Option<&ResolvedType> {
        self.resolved.get(declaring_type)
    }

    /// Declaring types attributed to `dependency`, in resolution order
    pub fn resolved_types(&self, dependency: DependencyId) -> impl Iterator<Item = &str> {
        self.by_dependency
            .get(&dependency)
            .into_iter()
            .flat_map(|types| types.iter().map(String::as_str))
    }

    /// Every resolved type with its owner, in resolution order
    pub fn resolutions(&self) -> impl Iterator<Item = (&str, &ResolvedType)> {
        self.resolved.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Types that could not be attributed
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.unresolved.iter().map(String::as_str)
    }

    /// Number of resolved types
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Number of unresolved types
    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }

    /// Filesystem probes performed so far
    pub fn probe_count(&self) -> usize {
        self.probes
    }

    /// Number of acquired roots searched
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }
}

/// `a/b/C.java` for `["a", "b", "C"]`
fn candidate_path(parts: &[&str]) -> PathBuf {
    let mut path: PathBuf = parts.iter().collect();
    path.set_extension(SOURCE_EXTENSION);
    path
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == SOURCE_EXTENSION)
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
