//! Main pipeline executor that orchestrates an attribution run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::diagnostics::{AnalysisDiagnostics, DiagnosticCategory};
use super::pipeline_results::{AnalysisOutcome, RunStats};
use crate::acquire::{Decompiler, SourceAcquirer};
use crate::analysis::buffer::MethodCallBuffer;
use crate::analysis::expansion::{DeclarationArena, DeclarationExpander, ExpansionStats};
use crate::analysis::extraction::{CallExtractor, ExtractionResult};
use crate::analysis::resolver::TypeResolver;
use crate::build::{self, BuildOutcome, BuildTreeProvider, MavenTreeProvider};
use crate::core::config::CovsbomConfig;
use crate::core::errors::Result;
use crate::core::graph::DependencyGraph;
use crate::core::heuristics::ImportClassifier;
use crate::core::model::MethodCallEntry;
use crate::io::reports::{
    project_name, usage_report, ReportRenderer, ReportSet, ReportWriter, RunSummary,
};
use crate::lang;

/// Main analysis pipeline
pub struct AnalysisPipeline {
    config: CovsbomConfig,
    tree_provider: Option<Arc<dyn BuildTreeProvider>>,
    decompiler: Option<Arc<dyn Decompiler>>,
}

impl AnalysisPipeline {
    /// Create a pipeline using the configured external tools
    pub fn new(config: CovsbomConfig) -> Self {
        Self {
            config,
            tree_provider: None,
            decompiler: None,
        }
    }

    /// Read the dependency tree from `provider` instead of the descriptors
    pub fn with_tree_provider(mut self, provider: Arc<dyn BuildTreeProvider>) -> Self {
        self.tree_provider = Some(provider);
        self
    }

    /// Use `decompiler` instead of the configured command
    pub fn with_decompiler(mut self, decompiler: Arc<dyn Decompiler>) -> Self {
        self.decompiler = Some(decompiler);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &CovsbomConfig {
        &self.config
    }

    /// Run every stage over `project_dir` and write the reports
    pub async fn analyze(&self, project_dir: &Path) -> Result<AnalysisOutcome> {
        let start_time = Instant::now();
        let mut diagnostics = AnalysisDiagnostics::new();
        info!("Starting analysis of {}", project_dir.display());

        let BuildOutcome { project, mut graph } =
            self.build_outcome(project_dir, &mut diagnostics).await?;
        info!("Dependency graph holds {} dependencies", graph.len());

        let acquirer = match &self.decompiler {
            Some(decompiler) => {
                SourceAcquirer::new(self.config.acquisition.clone(), decompiler.clone())
            }
            None => SourceAcquirer::from_config(&self.config.acquisition)?,
        };
        let acquisition = acquirer.acquire_all(&mut graph, &mut diagnostics).await;

        let analysis = &self.config.analysis;
        let mut resolver = TypeResolver::new(&graph)
            .with_strict_matching(analysis.strict_coordinate_matching)
            .with_project_group(project.as_ref().map(|c| c.group_id.as_str()));
        if analysis.deep_type_search {
            resolver = resolver.with_deep_search(lang::default_parser()?);
        }

        let classifier = ImportClassifier::from_dependencies(graph.dependencies().map(|(_, d)| d));
        let mut extractor = CallExtractor::new(lang::default_parser()?, classifier, analysis.ignore_test)
            .with_excluded(self.excluded_dirs());
        let mut extraction = extractor.extract_project(project_dir, &mut diagnostics);

        let mut buffer = MethodCallBuffer::new(&graph);
        for entry in third_party_candidates(&extraction) {
            buffer.add_method_call(entry.clone(), &mut resolver);
        }
        let audit = ResolutionAudit::capture(&resolver);
        info!(
            "Buffered {} unique third-party calls ({} types resolved, {} unresolved)",
            buffer.total_size(),
            audit.resolved,
            audit.unresolved.len()
        );

        for declaring_type in &audit.unresolved {
            diagnostics.record(
                DiagnosticCategory::ResolutionMiss,
                declaring_type,
                "no acquired source root declares this type",
            );
        }

        // Declaration lookups below may resolve more types; the audit above stays as taken
        let expansion = if self.config.output.include_declarations {
            let mut expander = DeclarationExpander::new(lang::default_parser()?, analysis.depth_limit());
            expander.attach_all(&mut extraction, &mut resolver, &mut diagnostics);
            Some(expander.finish())
        } else {
            None
        };

        let (arena, expansion_stats) = match expansion {
            Some((arena, stats)) => (Some(arena), Some(stats)),
            None => (None, None),
        };
        let reports = build_reports(
            project_dir,
            &extraction,
            arena.as_ref(),
            expansion_stats,
            &resolver,
            audit,
            &buffer,
            &graph,
            project.as_ref().map(ToString::to_string),
            diagnostics,
        );

        let name = project_name(project.as_ref(), project_dir);
        let paths = ReportWriter::new(&self.config.output.directory, &name).write(&reports)?;

        let stats = RunStats {
            elapsed: start_time.elapsed(),
            acquisition,
            expansion: expansion_stats,
        };
        info!(
            "Analysis of {} completed in {:?} ({} tolerated failures)",
            project_dir.display(),
            stats.elapsed,
            reports.summary.diagnostics.total()
        );

        Ok(AnalysisOutcome {
            project,
            graph,
            reports,
            paths,
            stats,
        })
    }

    /// Run the build tree stage only
    pub async fn build_outcome(
        &self,
        project_dir: &Path,
        diagnostics: &mut AnalysisDiagnostics,
    ) -> Result<BuildOutcome> {
        let local_repository = self.config.maven.resolved_local_repository()?;
        let outcome = if let Some(provider) = &self.tree_provider {
            build::from_provider(project_dir, provider.as_ref(), &local_repository, diagnostics).await
        } else if self.config.maven.use_dependency_tree {
            let provider = MavenTreeProvider::new(&self.config.maven);
            build::from_provider(project_dir, &provider, &local_repository, diagnostics).await
        } else {
            build::from_descriptors(project_dir, &local_repository, diagnostics)
        };
        Ok(outcome)
    }

    /// Work and output directories never count as project sources
    fn excluded_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.config.acquisition.work_dir.clone(),
            self.config.output.directory.clone(),
        ]
    }
}

/// Resolution counts over the third-party candidates, independent of declaration lookups.
struct ResolutionAudit {
    resolved: usize,
    unresolved: Vec<String>,
}

impl ResolutionAudit {
    fn capture(resolver: &TypeResolver) -> Self {
        Self {
            resolved: resolver.resolved_count(),
            unresolved: resolver.unresolved().map(str::to_string).collect(),
        }
    }
}

/// Calls eligible for the third-party report, before resolution
fn third_party_candidates(extraction: &ExtractionResult) -> impl Iterator<Item = &MethodCallEntry> {
    let shallowest = &extraction.shallowest_package;
    extraction
        .files
        .values()
        .flat_map(|record| record.calls.iter())
        .filter(move |entry| !shallowest.excludes(&entry.declaring_type))
}

#[allow(clippy::too_many_arguments)]
fn build_reports(
    project_dir: &Path,
    extraction: &ExtractionResult,
    arena: Option<&DeclarationArena>,
    expansion: Option<ExpansionStats>,
    resolver: &TypeResolver,
    audit: ResolutionAudit,
    buffer: &MethodCallBuffer,
    graph: &DependencyGraph,
    project: Option<String>,
    diagnostics: AnalysisDiagnostics,
) -> ReportSet {
    let mut renderer = ReportRenderer::new(project_dir);
    if let Some(arena) = arena {
        renderer = renderer.with_declarations(arena);
    }
    let shallowest = &extraction.shallowest_package;
    let filtered = renderer.filtered_report(extraction, |entry| {
        !shallowest.excludes(&entry.declaring_type)
            && resolver.lookup(&entry.declaring_type).is_some()
    });
    if filtered.is_empty() && !extraction.files.is_empty() {
        warn!("No call in {} was attributed to a dependency", project_dir.display());
    }

    let summary = RunSummary {
        project,
        dependencies: graph.len(),
        acquired_dependencies: graph.source_roots().len(),
        files_parsed: extraction.files_parsed,
        test_files_skipped: extraction.test_files_skipped,
        shallowest_package: extraction.shallowest_package.get().map(str::to_string),
        resolved_types: audit.resolved,
        unresolved_types: audit.unresolved,
        buffered_calls: buffer.total_size(),
        declarations: expansion.map_or(0, |stats| stats.declarations),
        truncated_expansions: expansion.map_or(0, |stats| stats.truncated),
        probes: resolver.probe_count(),
        diagnostics,
    };

    ReportSet {
        full: renderer.full_report(extraction),
        filtered,
        usage: usage_report(graph, buffer, resolver),
        summary,
    }
}
