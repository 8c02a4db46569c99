//! JSON report generation.
//!
//! Four files are written per analysed project:
//!
//! - `method_calls.json` maps each source file to every call found in it
//! - `third_party_calls.json` keeps only calls attributed to a dependency
//! - `dependency_usage.json` lists the unique calls buffered per dependency
//! - `summary.json` holds run counters and diagnostics

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::buffer::MethodCallBuffer;
use crate::analysis::expansion::DeclarationArena;
use crate::analysis::extraction::ExtractionResult;
use crate::analysis::resolver::TypeResolver;
use crate::core::errors::{CovsbomError, Result};
use crate::core::graph::DependencyGraph;
use crate::core::model::{Coordinate, DeclarationId, MethodCallEntry};
use crate::core::pipeline::diagnostics::AnalysisDiagnostics;

/// Full report file name
pub const FULL_REPORT_FILE: &str = "method_calls.json";
/// Third-party report file name
pub const FILTERED_REPORT_FILE: &str = "third_party_calls.json";
/// Dependency usage file name
pub const USAGE_REPORT_FILE: &str = "dependency_usage.json";
/// Summary file name
pub const SUMMARY_FILE: &str = "summary.json";

/// One call as rendered in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Qualified declaring type guess
    pub declaring_type: String,
    /// Invoked method
    pub method_name: String,
    /// 1-based lines of every sighting
    pub line_numbers: Vec<usize>,
    /// Expression text of the first sighting
    pub full_expression: String,
    /// Call-site signature
    pub method_signature: String,
    /// Located declaration, when one was attached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration_info: Option<DeclarationRecord>,
}

/// A located declaration with its rendered inner calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationRecord {
    /// Source file holding the declaration
    pub source_file_path: String,
    /// First line of the declaration
    pub start_line: usize,
    /// Last line of the declaration
    pub end_line: usize,
    /// Declared method name
    pub method_name: String,
    /// `name(Type, Type)`
    pub declaration_signature: String,
    /// Calls made from the declaration body
    pub inner_method_calls: Vec<CallRecord>,
}

/// Calls per source file, in discovery order.
pub type CallReport = IndexMap<String, Vec<CallRecord>>;

/// Usage of one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyUsageRecord {
    /// Declared scope, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Acquired source root, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    /// Declaring types attributed to the dependency
    pub declaring_types: Vec<String>,
    /// Unique calls into the dependency
    pub calls: Vec<CallRecord>,
}

/// Usage keyed by `group:artifact:version`.
pub type UsageReport = IndexMap<String, DependencyUsageRecord>;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Project coordinate, when the descriptor named one
    pub project: Option<String>,
    /// Dependencies in the graph
    pub dependencies: usize,
    /// Dependencies with an acquired source root
    pub acquired_dependencies: usize,
    /// Project files parsed
    pub files_parsed: usize,
    /// Test-scoped files skipped
    pub test_files_skipped: usize,
    /// Shallowest project package
    pub shallowest_package: Option<String>,
    /// Declaring types attributed to a dependency
    pub resolved_types: usize,
    /// Declaring types left unattributed
    pub unresolved_types: Vec<String>,
    /// Unique third-party calls buffered
    pub buffered_calls: usize,
    /// Declarations located in dependency sources
    pub declarations: usize,
    /// Expansion items dropped by the depth bound
    pub truncated_expansions: usize,
    /// Filesystem probes made by the resolver
    pub probes: usize,
    /// Tolerated failures
    pub diagnostics: AnalysisDiagnostics,
}

/// Everything written for one project.
#[derive(Debug, Clone, Default)]
pub struct ReportSet {
    /// Every call of every parsed file
    pub full: CallReport,
    /// Calls attributed to a dependency
    pub filtered: CallReport,
    /// Per-dependency usage
    pub usage: UsageReport,
    /// Run counters
    pub summary: RunSummary,
}

/// Renders extraction results into report records.
#[derive(Debug, Clone, Copy)]
pub struct ReportRenderer<'a> {
    project_dir: &'a Path,
    declarations: Option<&'a DeclarationArena>,
}

impl<'a> ReportRenderer<'a> {
    /// File keys are rendered relative to `project_dir`
    pub fn new(project_dir: &'a Path) -> Self {
        Self {
            project_dir,
            declarations: None,
        }
    }

    /// Attach `declarationInfo` from located declarations
    pub fn with_declarations(mut self, declarations: &'a DeclarationArena) -> Self {
        self.declarations = Some(declarations);
        self
    }

    /// Render every call of every file
    pub fn full_report(&self, extraction: &ExtractionResult) -> CallReport {
        self.call_report(extraction, |_| true, true)
    }

    /// Render the calls accepted by `keep`, omitting files left empty
    pub fn filtered_report(
        &self,
        extraction: &ExtractionResult,
        keep: impl Fn(&MethodCallEntry) -> bool,
    ) -> CallReport {
        self.call_report(extraction, keep, false)
    }

    fn call_report(
        &self,
        extraction: &ExtractionResult,
        keep: impl Fn(&MethodCallEntry) -> bool,
        keep_empty: bool,
    ) -> CallReport {
        let mut report = CallReport::new();
        for (path, record) in &extraction.files {
            let calls: Vec<CallRecord> = record
                .calls
                .iter()
                .filter(|&entry| keep(entry))
                .map(|entry| self.call(entry))
                .collect();
            if keep_empty || !calls.is_empty() {
                report.insert(self.file_key(path), calls);
            }
        }
        report
    }

    /// Render one call with its declaration tree
    pub fn call(&self, entry: &MethodCallEntry) -> CallRecord {
        let mut path = Vec::new();
        self.render(entry, &mut path)
    }

    fn render(&self, entry: &MethodCallEntry, path: &mut Vec<DeclarationId>) -> CallRecord {
        let declaration_info = match (entry.declaration, self.declarations) {
            (Some(id), Some(arena)) if !path.contains(&id) => arena.get(id).map(|info| {
                path.push(id);
                let inner_method_calls = info
                    .inner_method_calls
                    .iter()
                    .map(|inner| self.render(inner, path))
                    .collect();
                path.pop();
                DeclarationRecord {
                    source_file_path: info.source_file_path.display().to_string(),
                    start_line: info.start_line,
                    end_line: info.end_line,
                    method_name: info.method_name.clone(),
                    declaration_signature: info.declaration_signature.clone(),
                    inner_method_calls,
                }
            }),
            _ => None,
        };
        plain_record(entry, declaration_info)
    }

    fn file_key(&self, path: &Path) -> String {
        path.strip_prefix(self.project_dir)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

fn plain_record(entry: &MethodCallEntry, declaration_info: Option<DeclarationRecord>) -> CallRecord {
    CallRecord {
        declaring_type: entry.declaring_type.clone(),
        method_name: entry.method_name.clone(),
        line_numbers: entry.line_numbers.clone(),
        full_expression: entry.full_expression.clone(),
        method_signature: entry.method_signature.clone(),
        declaration_info,
    }
}

/// Group buffered calls by dependency coordinate
pub fn usage_report(
    graph: &DependencyGraph,
    buffer: &MethodCallBuffer,
    resolver: &TypeResolver,
) -> UsageReport {
    buffer
        .buckets()
        .map(|(id, bucket)| {
            let dependency = graph.get(id);
            let record = DependencyUsageRecord {
                scope: dependency.scope.clone(),
                source_root: dependency
                    .source_root
                    .as_ref()
                    .map(|root| root.display().to_string()),
                declaring_types: resolver.resolved_types(id).map(str::to_string).collect(),
                calls: bucket.iter().map(|entry| plain_record(entry, None)).collect(),
            };
            (dependency.coordinate.to_string(), record)
        })
        .collect()
}

/// Directory name used for a project's reports
pub fn project_name(project: Option<&Coordinate>, project_dir: &Path) -> String {
    project
        .map(|coordinate| coordinate.artifact_id.clone())
        .filter(|name| !name.is_empty())
        .or_else(|| {
            project_dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "project".to_string())
}

/// Paths of the files written for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    /// Report directory
    pub directory: PathBuf,
    /// Full report
    pub full: PathBuf,
    /// Third-party report
    pub filtered: PathBuf,
    /// Dependency usage
    pub usage: PathBuf,
    /// Run summary
    pub summary: PathBuf,
}

/// Writes a [`ReportSet`] under `<output root>/<project name>/`.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    directory: PathBuf,
}

impl ReportWriter {
    /// Target `<output_root>/<project_name>`
    pub fn new(output_root: &Path, project_name: &str) -> Self {
        Self {
            directory: output_root.join(project_name),
        }
    }

    /// Directory the reports are written to
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Write every report. Failures here are the only fatal errors of a run.
    pub fn write(&self, reports: &ReportSet) -> Result<ReportPaths> {
        fs::create_dir_all(&self.directory).map_err(|e| {
            CovsbomError::io(
                format!("Failed to create report directory {}", self.directory.display()),
                e,
            )
        })?;

        let paths = ReportPaths {
            directory: self.directory.clone(),
            full: self.directory.join(FULL_REPORT_FILE),
            filtered: self.directory.join(FILTERED_REPORT_FILE),
            usage: self.directory.join(USAGE_REPORT_FILE),
            summary: self.directory.join(SUMMARY_FILE),
        };
        write_json(&paths.full, &reports.full)?;
        write_json(&paths.filtered, &reports.filtered)?;
        write_json(&paths.usage, &reports.usage)?;
        write_json(&paths.summary, &reports.summary)?;

        info!("Reports written to {}", self.directory.display());
        Ok(paths)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .map_err(|e| CovsbomError::io(format!("Failed to write {}", path.display()), e))
}
