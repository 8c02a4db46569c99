//! Dependency graph keyed by build coordinate.
//!
//! Build tools print transitive dependencies as a tree, but the same artifact
//! can appear under several parents. The graph keeps one node per coordinate
//! and records every parent edge, so a diamond is analysed once.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use tracing::debug;

use crate::core::errors::{CovsbomError, Result};
use crate::core::model::{Coordinate, Dependency};

/// Stable handle to a dependency node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId(NodeIndex);

impl DependencyId {
    /// Position of the node in insertion order
    pub fn index(self) -> usize {
        self.0.index()
    }
}

/// Directed acyclic graph of dependencies, deduplicated by coordinate.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<Dependency, ()>,
    by_coordinate: HashMap<Coordinate, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct dependencies
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph holds no dependency
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Insert a dependency, returning the existing node for a known coordinate
    pub fn insert(&mut self, dependency: Dependency) -> DependencyId {
        if let Some(&idx) = self.by_coordinate.get(&dependency.coordinate) {
            return DependencyId(idx);
        }
        let coordinate = dependency.coordinate.clone();
        let idx = self.graph.add_node(dependency);
        self.by_coordinate.insert(coordinate, idx);
        DependencyId(idx)
    }

    /// Insert a dependency as a top-level root
    pub fn insert_root(&mut self, dependency: Dependency) -> DependencyId {
        let id = self.insert(dependency);
        if !self.roots.contains(&id.0) {
            self.roots.push(id.0);
        }
        id
    }

    /// Record `child` as a direct dependency of `parent`.
    ///
    /// Edges that would close a cycle are rejected.
    pub fn add_edge(&mut self, parent: DependencyId, child: DependencyId) -> Result<()> {
        if parent == child || self.reaches(child, parent) {
            return Err(CovsbomError::validation(format!(
                "edge {} -> {} would create a cycle",
                self.graph[parent.0].coordinate, self.graph[child.0].coordinate
            )));
        }
        if self.graph.find_edge(parent.0, child.0).is_none() {
            self.graph.add_edge(parent.0, child.0, ());
        } else {
            debug!(
                "Duplicate edge {} -> {} ignored",
                self.graph[parent.0].coordinate, self.graph[child.0].coordinate
            );
        }
        Ok(())
    }

    fn reaches(&self, from: DependencyId, to: DependencyId) -> bool {
        let mut dfs = Dfs::new(&self.graph, from.0);
        while let Some(node) = dfs.next(&self.graph) {
            if node == to.0 {
                return true;
            }
        }
        false
    }

    /// Look up a node by coordinate
    pub fn find(&self, coordinate: &Coordinate) -> Option<DependencyId> {
        self.by_coordinate.get(coordinate).copied().map(DependencyId)
    }

    /// Look up a node by `groupId:artifactId`, ignoring the version
    pub fn find_versionless(&self, group_id: &str, artifact_id: &str) -> Option<DependencyId> {
        self.ids().find(|id| {
            let coord = &self.graph[id.0].coordinate;
            coord.group_id == group_id && coord.artifact_id == artifact_id
        })
    }

    /// Borrow a dependency
    pub fn get(&self, id: DependencyId) -> &Dependency {
        &self.graph[id.0]
    }

    /// All node ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = DependencyId> + '_ {
        self.graph.node_indices().map(DependencyId)
    }

    /// All dependencies in insertion order
    pub fn dependencies(&self) -> impl Iterator<Item = (DependencyId, &Dependency)> + '_ {
        self.graph
            .node_indices()
            .map(move |idx| (DependencyId(idx), &self.graph[idx]))
    }

    /// Top-level roots in insertion order
    pub fn roots(&self) -> Vec<DependencyId> {
        self.roots.iter().copied().map(DependencyId).collect()
    }

    /// Direct children of `id` in insertion order
    pub fn children(&self, id: DependencyId) -> Vec<DependencyId> {
        // petgraph yields neighbours newest-first
        let mut children: Vec<_> = self.graph.neighbors(id.0).map(DependencyId).collect();
        children.reverse();
        children
    }

    /// Number of parents pointing at `id`
    pub fn parent_count(&self, id: DependencyId) -> usize {
        self.graph
            .neighbors_directed(id.0, petgraph::Direction::Incoming)
            .count()
    }

    /// Replace the compiled archive path of a dependency
    pub fn set_archive_path(&mut self, id: DependencyId, path: PathBuf) {
        self.graph[id.0].archive_path = path;
    }

    /// Record the acquired source root. A root can be written only once.
    pub fn set_source_root(&mut self, id: DependencyId, root: PathBuf) -> Result<()> {
        let dependency = &mut self.graph[id.0];
        if let Some(existing) = &dependency.source_root {
            return Err(CovsbomError::internal(format!(
                "source root for {} already set to {}",
                dependency.coordinate,
                existing.display()
            )));
        }
        dependency.source_root = Some(root);
        Ok(())
    }

    /// Dependencies that have an acquired source root, in insertion order
    pub fn source_roots(&self) -> Vec<(DependencyId, &Path)> {
        self.dependencies()
            .filter_map(|(id, dep)| dep.source_root.as_deref().map(|root| (id, root)))
            .collect()
    }

    /// Render the graph as an indented tree. Shared nodes are printed under
    /// every parent; their subtrees are expanded only the first time.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let mut expanded = std::collections::HashSet::new();
        let roots = if self.roots.is_empty() {
            self.ids()
                .filter(|id| self.parent_count(*id) == 0)
                .collect::<Vec<_>>()
        } else {
            self.roots()
        };

        for root in roots {
            let _ = writeln!(out, "{}", self.graph[root.0].coordinate);
            expanded.insert(root);
            self.render_children(root, "", &mut expanded, &mut out);
        }
        out
    }

    fn render_children(
        &self,
        id: DependencyId,
        prefix: &str,
        expanded: &mut std::collections::HashSet<DependencyId>,
        out: &mut String,
    ) {
        let children = self.children(id);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            let last = i + 1 == count;
            let branch = if last { "└── " } else { "├── " };
            let first_visit = expanded.insert(child);
            let marker = if first_visit { "" } else { " (*)" };
            let _ = writeln!(
                out,
                "{prefix}{branch}{}{marker}",
                self.graph[child.0].coordinate
            );
            if first_visit {
                let nested = format!("{prefix}{}", if last { "    " } else { "│   " });
                self.render_children(child, &nested, expanded, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(group: &str, artifact: &str, version: &str) -> Dependency {
        Dependency::from_local_repository(
            Coordinate::new(group, artifact, version),
            Path::new("/repo"),
        )
    }

    #[test]
    fn diamond_dependency_is_single_node() {
        let mut graph = DependencyGraph::new();
        let app = graph.insert_root(dep("com.acme", "app", "1.0"));
        let left = graph.insert(dep("org.left", "left", "1.0"));
        let right = graph.insert(dep("org.right", "right", "1.0"));
        let shared_a = graph.insert(dep("org.shared", "shared", "2.0"));
        let shared_b = graph.insert(dep("org.shared", "shared", "2.0"));

        assert_eq!(shared_a, shared_b);
        graph.add_edge(app, left).unwrap();
        graph.add_edge(app, right).unwrap();
        graph.add_edge(left, shared_a).unwrap();
        graph.add_edge(right, shared_b).unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.parent_count(shared_a), 2);
        assert_eq!(graph.children(app), vec![left, right]);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut graph = DependencyGraph::new();
        let a = graph.insert(dep("g", "a", "1"));
        let b = graph.insert(dep("g", "b", "1"));
        graph.add_edge(a, b).unwrap();
        assert!(graph.add_edge(b, a).is_err());
        assert!(graph.add_edge(a, a).is_err());
    }

    #[test]
    fn source_root_is_written_once() {
        let mut graph = DependencyGraph::new();
        let id = graph.insert(dep("org.widget", "widget", "1.0"));
        graph.set_source_root(id, PathBuf::from("/src/a")).unwrap();
        assert!(graph.set_source_root(id, PathBuf::from("/src/b")).is_err());
        assert_eq!(
            graph.get(id).source_root.as_deref(),
            Some(Path::new("/src/a"))
        );
        assert_eq!(graph.source_roots().len(), 1);
    }

    #[test]
    fn render_tree_draws_branches() {
        let mut graph = DependencyGraph::new();
        let app = graph.insert_root(dep("com.acme", "app", "1.0"));
        let widget = graph.insert(dep("org.widget", "widget", "1.0"));
        let gear = graph.insert(dep("org.gear", "gear", "2.0"));
        let junit = graph.insert(dep("junit", "junit", "4.13"));
        graph.add_edge(app, widget).unwrap();
        graph.add_edge(widget, gear).unwrap();
        graph.add_edge(app, junit).unwrap();

        let rendered = graph.render_tree();
        let expected = "com.acme:app:1.0\n\
                        ├── org.widget:widget:1.0\n\
                        │   └── org.gear:gear:2.0\n\
                        └── junit:junit:4.13\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn versionless_lookup_ignores_version() {
        let mut graph = DependencyGraph::new();
        let id = graph.insert(dep("org.widget", "widget", "1.0"));
        assert_eq!(graph.find_versionless("org.widget", "widget"), Some(id));
        assert_eq!(graph.find_versionless("org.widget", "gadget"), None);
    }
}
