//! Build Tree Builder: turns a project's build descriptors into a dependency graph.
//!
//! Two interchangeable inputs feed the rest of the pipeline:
//!
//! - [`pom::scan_descriptor`] reads declared dependencies straight from
//!   `pom.xml` files (direct dependencies only, as flat roots).
//! - [`tree::ingest_dependency_tree`] reads the build tool's evaluated tree,
//!   including transitive dependencies, via a [`provider::BuildTreeProvider`].

pub mod pom;
pub mod provider;
pub mod tree;

use std::path::Path;

use tracing::{debug, info, warn};

use crate::core::graph::DependencyGraph;
use crate::core::model::Coordinate;
use crate::core::pipeline::diagnostics::{AnalysisDiagnostics, DiagnosticCategory};

pub use pom::{parse_pom, parse_pom_file, scan_descriptor, DescriptorScan, PomDescriptor};
pub use provider::{BuildTreeProvider, FileTreeProvider, MavenTreeProvider};
pub use tree::{apply_classpath, ingest_dependency_tree, parse_tree_line, TreeIngestion};

/// Dependencies of one project, however they were obtained.
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    /// The analysed project's own coordinate when known
    pub project: Option<Coordinate>,
    /// Third-party dependencies
    pub graph: DependencyGraph,
}

impl BuildOutcome {
    /// Project groupId, used to keep project-local types out of resolution
    pub fn project_group_id(&self) -> Option<&str> {
        self.project.as_ref().map(|c| c.group_id.as_str())
    }
}

/// Build the graph from `pom.xml` descriptors under `project_dir`
pub fn from_descriptors(
    project_dir: &Path,
    local_repository: &Path,
    diagnostics: &mut AnalysisDiagnostics,
) -> BuildOutcome {
    let scan = scan_descriptor(
        &project_dir.join(pom::DESCRIPTOR_FILE),
        local_repository,
        diagnostics,
    );

    let mut graph = DependencyGraph::new();
    for (_, dependency) in scan.dependencies {
        graph.insert_root(dependency);
    }
    BuildOutcome {
        project: scan.project,
        graph,
    }
}

/// Build the graph from the provider's evaluated tree.
///
/// A provider failure is recorded and the descriptor scan is used instead.
pub async fn from_provider(
    project_dir: &Path,
    provider: &dyn BuildTreeProvider,
    local_repository: &Path,
    diagnostics: &mut AnalysisDiagnostics,
) -> BuildOutcome {
    let descriptor = project_dir.join(pom::DESCRIPTOR_FILE);
    let text = match provider.dependency_tree(&descriptor).await {
        Ok(text) => text,
        Err(err) => {
            diagnostics.record(
                DiagnosticCategory::Descriptor,
                descriptor.display().to_string(),
                format!("{} tree provider failed: {}", provider.name(), err),
            );
            warn!("Falling back to descriptor scan");
            return from_descriptors(project_dir, local_repository, diagnostics);
        }
    };

    let TreeIngestion { projects, mut graph } = ingest_dependency_tree(&text, local_repository);

    match provider.classpath(&descriptor).await {
        Ok(Some(classpath)) => {
            apply_classpath(&mut graph, &classpath);
        }
        Ok(None) => {}
        Err(err) => debug!("Classpath listing unavailable: {}", err),
    }

    let project = projects.into_iter().next().or_else(|| {
        parse_pom_file(&descriptor)
            .ok()
            .and_then(|pom| pom.coordinate())
    });
    info!(
        "Using {} tree: {} dependencies",
        provider.name(),
        graph.len()
    );
    BuildOutcome { project, graph }
}
