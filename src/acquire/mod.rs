//! Source Acquisition: obtains one source root per dependency.
//!
//! Independent dependencies are acquired concurrently, bounded by the
//! configured pool size. Results are joined before any source root is written
//! to the graph, and each root is written at most once.

pub mod decompiler;
pub mod source_archive;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::core::config::{AcquisitionConfig, SourceStrategy};
use crate::core::errors::{CovsbomError, Result};
use crate::core::graph::{DependencyGraph, DependencyId};
use crate::core::model::Dependency;
use crate::core::pipeline::diagnostics::{AnalysisDiagnostics, DiagnosticCategory};

pub use decompiler::{CommandDecompiler, Decompiler};
pub use source_archive::{strip_meta_inf, unpack_source_archive};

/// Extension of compiled and source archives.
pub const ARCHIVE_EXTENSION: &str = "jar";

/// How a source root was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMethod {
    /// Ran the decompiler over the compiled archive
    Decompiled,
    /// Unpacked a published source archive
    Unpacked,
}

/// Counts for one acquisition pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionSummary {
    /// Roots produced by the decompiler
    pub decompiled: usize,
    /// Roots produced from source archives
    pub unpacked: usize,
    /// Dependencies left without a source root
    pub failed: usize,
}

/// Acquires sources for every dependency of a graph.
pub struct SourceAcquirer {
    config: AcquisitionConfig,
    decompiler: Arc<dyn Decompiler>,
}

impl SourceAcquirer {
    /// Create an acquirer with an explicit decompiler
    pub fn new(config: AcquisitionConfig, decompiler: Arc<dyn Decompiler>) -> Self {
        Self { config, decompiler }
    }

    /// Create an acquirer running the configured decompiler command
    pub fn from_config(config: &AcquisitionConfig) -> Result<Self> {
        let decompiler = CommandDecompiler::from_config(config)?;
        Ok(Self::new(config.clone(), Arc::new(decompiler)))
    }

    /// Directory that will hold `dependency`'s sources
    pub fn source_root_for(&self, dependency: &Dependency) -> PathBuf {
        self.config
            .work_dir
            .join(dependency.coordinate.source_root_name())
    }

    /// Acquire every dependency without a source root and record the roots.
    pub async fn acquire_all(
        &self,
        graph: &mut DependencyGraph,
        diagnostics: &mut AnalysisDiagnostics,
    ) -> AcquisitionSummary {
        let jobs: Vec<(DependencyId, Dependency)> = graph
            .dependencies()
            .filter(|(_, dep)| dep.source_root.is_none())
            .map(|(id, dep)| (id, dep.clone()))
            .collect();

        info!(
            "Acquiring sources for {} dependencies (pool size {})",
            jobs.len(),
            self.config.pool_size
        );

        let mut results: Vec<(DependencyId, Result<(PathBuf, AcquisitionMethod)>)> =
            stream::iter(jobs)
                .map(|(id, dependency)| async move {
                    let outcome = self.acquire(&dependency).await;
                    (id, outcome)
                })
                .buffer_unordered(self.config.pool_size.max(1))
                .collect()
                .await;
        results.sort_by_key(|(id, _)| *id);

        let mut summary = AcquisitionSummary::default();
        for (id, outcome) in results {
            let coordinate = graph.get(id).coordinate.to_string();
            let recorded = outcome.and_then(|(root, method)| {
                graph.set_source_root(id, root)?;
                Ok(method)
            });
            match recorded {
                Ok(AcquisitionMethod::Decompiled) => summary.decompiled += 1,
                Ok(AcquisitionMethod::Unpacked) => summary.unpacked += 1,
                Err(err) => {
                    summary.failed += 1;
                    diagnostics.record(DiagnosticCategory::Acquisition, coordinate, err);
                }
            }
        }

        info!(
            "Acquisition finished: {} decompiled, {} unpacked, {} failed",
            summary.decompiled, summary.unpacked, summary.failed
        );
        summary
    }

    /// Obtain sources for one dependency according to the configured strategy
    pub async fn acquire(&self, dependency: &Dependency) -> Result<(PathBuf, AcquisitionMethod)> {
        let root = self.source_root_for(dependency);
        let has_source_archive = dependency.source_archive_path.is_file();

        let method = match self.config.strategy {
            SourceStrategy::SourceArchive if !has_source_archive => {
                return Err(CovsbomError::acquisition(
                    dependency.coordinate.to_string(),
                    format!(
                        "source archive {} not found",
                        dependency.source_archive_path.display()
                    ),
                ));
            }
            SourceStrategy::SourceArchive => AcquisitionMethod::Unpacked,
            SourceStrategy::PreferSourceArchive if has_source_archive => {
                AcquisitionMethod::Unpacked
            }
            SourceStrategy::PreferSourceArchive | SourceStrategy::Decompile => {
                AcquisitionMethod::Decompiled
            }
        };

        match method {
            AcquisitionMethod::Unpacked => {
                reset_root(&root).await?;
                let archive = dependency.source_archive_path.clone();
                let destination = root.clone();
                tokio::task::spawn_blocking(move || unpack_source_archive(&archive, &destination))
                    .await
                    .map_err(|e| CovsbomError::internal(format!("unpack task failed: {e}")))??;
            }
            AcquisitionMethod::Decompiled => {
                check_compiled_archive(dependency)?;
                reset_root(&root).await?;
                self.decompiler
                    .decompile(&dependency.archive_path, &root)
                    .await?;
            }
        }

        if self.config.strip_meta_inf {
            strip_meta_inf(&root)?;
        }
        debug!(
            "{} acquired at {} ({:?})",
            dependency.coordinate,
            root.display(),
            method
        );
        Ok((root, method))
    }
}

/// A compiled archive must exist and carry the archive extension
fn check_compiled_archive(dependency: &Dependency) -> Result<()> {
    let path = &dependency.archive_path;
    let is_archive = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION));
    if !is_archive {
        return Err(CovsbomError::acquisition(
            dependency.coordinate.to_string(),
            format!("{} is not a .{} archive", path.display(), ARCHIVE_EXTENSION),
        ));
    }
    if !path.is_file() {
        return Err(CovsbomError::acquisition(
            dependency.coordinate.to_string(),
            format!("archive {} not found", path.display()),
        ));
    }
    Ok(())
}

/// Start from an empty directory so stale sources never leak into a run
async fn reset_root(root: &Path) -> Result<()> {
    if root.exists() {
        tokio::fs::remove_dir_all(root)
            .await
            .map_err(|e| CovsbomError::io(format!("Failed to clear {}", root.display()), e))?;
    }
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| CovsbomError::io(format!("Failed to create {}", root.display()), e))
}
