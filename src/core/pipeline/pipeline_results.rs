//! Results of one analysis run.

use std::time::Duration;

use crate::acquire::AcquisitionSummary;
use crate::analysis::expansion::ExpansionStats;
use crate::core::graph::DependencyGraph;
use crate::core::model::Coordinate;
use crate::io::reports::{ReportPaths, ReportSet};

/// Stage counters and timing.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Wall time of the whole run
    pub elapsed: Duration,
    /// Source acquisition counts
    pub acquisition: AcquisitionSummary,
    /// Declaration expansion counts, when expansion ran
    pub expansion: Option<ExpansionStats>,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Project coordinate, when known
    pub project: Option<Coordinate>,
    /// Dependency graph with acquired source roots
    pub graph: DependencyGraph,
    /// Rendered reports
    pub reports: ReportSet,
    /// Where the reports were written
    pub paths: ReportPaths,
    /// Counters and timing
    pub stats: RunStats,
}

impl AnalysisOutcome {
    /// Share of attempted declaring types that resolved, in `[0, 1]`
    pub fn resolution_ratio(&self) -> f64 {
        let summary = &self.reports.summary;
        let attempted = summary.resolved_types + summary.unresolved_types.len();
        if attempted == 0 {
            1.0
        } else {
            summary.resolved_types as f64 / attempted as f64
        }
    }
}
