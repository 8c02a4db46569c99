//! Ingestion of `mvn dependency:tree` text output.
//!
//! Lines look like:
//!
//! ```text
//! [INFO] com.acme:app:jar:1.0
//! [INFO] +- org.widget:widget:jar:1.0:compile
//! [INFO] |  \- org.gear:gear:jar:2.5:compile
//! [INFO] \- junit:junit:jar:4.13.2:test
//! ```
//!
//! Depth is the number of leading tree-drawing characters divided by three.
//! Unprefixed lines are project roots; several appear in reactor builds.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::core::graph::{DependencyGraph, DependencyId};
use crate::core::model::{Coordinate, Dependency};

/// Token marking a line as a compiled-archive dependency.
pub const ARCHIVE_MARKER: &str = ":jar:";

const LOG_PREFIXES: [&str; 4] = ["[INFO] ", "[INFO]", "[DEBUG] ", "[WARNING] "];
const TREE_CHARS: [char; 6] = [' ', '|', '+', '-', '\\', '/'];

/// One coordinate line of the tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLine {
    /// Nesting depth; 0 for project roots
    pub depth: usize,
    /// Parsed coordinate
    pub coordinate: Coordinate,
    /// Packaging type segment (`jar`, `pom`, ...)
    pub packaging: String,
    /// Scope when printed
    pub scope: Option<String>,
}

/// Parse one line of tree output. Returns `None` for banners and blank lines.
pub fn parse_tree_line(raw: &str) -> Option<TreeLine> {
    let mut line = raw.trim_end();
    for prefix in LOG_PREFIXES {
        if let Some(rest) = line.strip_prefix(prefix) {
            line = rest;
            break;
        }
    }

    let prefix_len = line.chars().take_while(|c| TREE_CHARS.contains(c)).count();
    let depth = prefix_len / 3;
    let body = &line[prefix_len..];

    // the coordinate is the token carrying the colons; verbose output wraps
    // omitted entries in parentheses and appends commentary
    let token = body
        .split_whitespace()
        .find(|token| token.contains(':'))?
        .trim_start_matches('(')
        .trim_end_matches(')');

    let segments: Vec<&str> = token.split(':').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    let (group_id, artifact_id, packaging, version, scope) = match segments.as_slice() {
        [g, a, t, v] => (*g, *a, *t, *v, None),
        [g, a, t, v, s] if depth > 0 => (*g, *a, *t, *v, Some(*s)),
        [g, a, t, _classifier, v] => (*g, *a, *t, *v, None),
        [g, a, t, _classifier, v, s] => (*g, *a, *t, *v, Some(*s)),
        _ => return None,
    };

    if depth > 0 && !token.contains(ARCHIVE_MARKER) {
        return None;
    }

    Some(TreeLine {
        depth,
        coordinate: Coordinate::new(group_id, artifact_id, version),
        packaging: packaging.to_string(),
        scope: scope.map(|s| s.trim_end_matches(|c: char| !c.is_alphanumeric()).to_string()),
    })
}

/// Output of tree ingestion.
#[derive(Debug, Clone, Default)]
pub struct TreeIngestion {
    /// Project coordinates (depth-0 lines), in order
    pub projects: Vec<Coordinate>,
    /// Third-party dependencies; roots are the projects' direct dependencies
    pub graph: DependencyGraph,
}

/// Build a dependency graph from tree output.
///
/// Reactor modules listed as dependencies of a sibling are not added; their
/// children attach to the nearest non-reactor ancestor instead.
pub fn ingest_dependency_tree(text: &str, local_repository: &Path) -> TreeIngestion {
    let lines: Vec<TreeLine> = text.lines().filter_map(parse_tree_line).collect();

    let projects: Vec<Coordinate> = lines
        .iter()
        .filter(|line| line.depth == 0)
        .map(|line| line.coordinate.clone())
        .collect();
    let reactor: HashSet<String> = projects.iter().map(Coordinate::versionless_key).collect();

    let mut graph = DependencyGraph::new();
    // stack[d] holds the node printed at depth d, or None for a pass-through
    let mut stack: Vec<Option<DependencyId>> = Vec::new();

    for line in lines {
        if line.depth == 0 {
            stack.clear();
            stack.push(None);
            continue;
        }
        if stack.is_empty() {
            // dependency lines before any project header
            stack.push(None);
        }
        stack.truncate(line.depth);
        while stack.len() < line.depth {
            stack.push(None);
        }

        if reactor.contains(&line.coordinate.versionless_key()) {
            debug!("Reactor module {} passed through", line.coordinate);
            stack.push(None);
            continue;
        }

        let parent = stack.iter().rev().find_map(|entry| *entry);
        let dependency = Dependency::from_local_repository(line.coordinate, local_repository)
            .with_scope(line.scope);
        let id = match parent {
            Some(parent) => {
                let child = graph.insert(dependency);
                if let Err(err) = graph.add_edge(parent, child) {
                    debug!("Skipping edge: {}", err);
                }
                child
            }
            None => graph.insert_root(dependency),
        };
        stack.push(Some(id));
    }

    info!(
        "Dependency tree lists {} project(s) and {} distinct dependencies",
        projects.len(),
        graph.len()
    );
    TreeIngestion { projects, graph }
}

/// Override computed archive paths using `dependency:build-classpath` output.
///
/// Returns the number of dependencies whose archive path changed.
pub fn apply_classpath(graph: &mut DependencyGraph, classpath: &str) -> usize {
    let entries: Vec<_> = classpath
        .lines()
        .filter(|line| !line.starts_with('['))
        .flat_map(|line| std::env::split_paths(line.trim()).collect::<Vec<_>>())
        .filter(|path| !path.as_os_str().is_empty())
        .collect();

    let ids: Vec<DependencyId> = graph.ids().collect();
    let mut updated = 0;
    for id in ids {
        let expected = graph.get(id).coordinate.archive_file_name();
        let found = entries.iter().find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name == expected)
        });
        if let Some(path) = found {
            if graph.get(id).archive_path != *path {
                graph.set_archive_path(id, path.clone());
                updated += 1;
            }
        }
    }
    debug!("Classpath listing updated {} archive path(s)", updated);
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SINGLE_MODULE: &str = "\
[INFO] Scanning for projects...
[INFO] --- maven-dependency-plugin:3.6.0:tree (default-cli) @ app ---
[INFO] com.acme:app:jar:1.0
[INFO] +- org.widget:widget:jar:1.0:compile
[INFO] |  \\- org.gear:gear:jar:2.5:compile
[INFO] +- org.lever:lever:jar:3.0:compile
[INFO] |  \\- org.gear:gear:jar:2.5:compile
[INFO] \\- junit:junit:jar:4.13.2:test
[INFO]    \\- org.hamcrest:hamcrest-core:jar:1.3:test
[INFO] ------------------------------------------------------------------------
";

    #[test]
    fn parses_depth_and_segments() {
        let line = parse_tree_line("[INFO] |  \\- org.gear:gear:jar:2.5:compile").unwrap();
        assert_eq!(line.depth, 2);
        assert_eq!(line.coordinate, Coordinate::new("org.gear", "gear", "2.5"));
        assert_eq!(line.scope.as_deref(), Some("compile"));

        let root = parse_tree_line("com.acme:app:pom:1.0").unwrap();
        assert_eq!(root.depth, 0);
        assert_eq!(root.packaging, "pom");
    }

    #[test]
    fn parses_classifier_segments() {
        let line = parse_tree_line("+- io.netty:netty-transport:jar:linux-x86_64:4.1.100:runtime")
            .unwrap();
        assert_eq!(line.coordinate.version, "4.1.100");
        assert_eq!(line.scope.as_deref(), Some("runtime"));
    }

    #[test]
    fn ignores_banners_and_non_archive_dependencies() {
        assert!(parse_tree_line("[INFO] Scanning for projects...").is_none());
        assert!(parse_tree_line("[INFO] ---------------------------").is_none());
        assert!(parse_tree_line("[INFO] +- org.bom:bom:pom:1.0:import").is_none());
        assert!(parse_tree_line("").is_none());
    }

    #[test]
    fn verbose_omitted_entries_are_unwrapped() {
        let line =
            parse_tree_line("|  \\- (org.gear:gear:jar:2.5:compile - omitted for duplicate)")
                .unwrap();
        assert_eq!(line.coordinate.artifact_id, "gear");
        assert_eq!(line.scope.as_deref(), Some("compile"));
    }

    #[test]
    fn diamond_becomes_one_node_with_two_parents() {
        let ingestion = ingest_dependency_tree(SINGLE_MODULE, Path::new("/repo"));
        let graph = &ingestion.graph;

        assert_eq!(ingestion.projects, vec![Coordinate::new("com.acme", "app", "1.0")]);
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.roots().len(), 3);

        let gear = graph
            .find(&Coordinate::new("org.gear", "gear", "2.5"))
            .unwrap();
        assert_eq!(graph.parent_count(gear), 2);

        let junit = graph.find_versionless("junit", "junit").unwrap();
        assert_eq!(graph.children(junit).len(), 1);
        assert_eq!(graph.get(junit).scope.as_deref(), Some("test"));
    }

    #[test]
    fn reactor_modules_pass_through() {
        let text = "\
com.acme:parent:pom:1.0
com.acme:api:jar:1.0
+- org.widget:widget:jar:1.0:compile
com.acme:web:jar:1.0
+- com.acme:api:jar:1.0:compile
|  \\- org.widget:widget:jar:1.0:compile
\\- org.gear:gear:jar:2.5:compile
";
        let ingestion = ingest_dependency_tree(text, Path::new("/repo"));
        assert_eq!(ingestion.projects.len(), 3);
        assert!(ingestion.graph.find_versionless("com.acme", "api").is_none());

        let widget = ingestion.graph.find_versionless("org.widget", "widget").unwrap();
        assert!(ingestion.graph.roots().contains(&widget));
        assert_eq!(ingestion.graph.len(), 2);
    }

    #[test]
    fn classpath_overrides_archive_paths() {
        let mut ingestion = ingest_dependency_tree(SINGLE_MODULE, Path::new("/repo"));
        let classpath = "[INFO] Dependencies classpath:\n/cache/widget-1.0.jar:/cache/gear-2.5.jar\n";
        let updated = apply_classpath(&mut ingestion.graph, classpath);
        assert_eq!(updated, 2);

        let widget = ingestion.graph.find_versionless("org.widget", "widget").unwrap();
        assert_eq!(
            ingestion.graph.get(widget).archive_path,
            PathBuf::from("/cache/widget-1.0.jar")
        );
    }
}
