//! Import & Call Extraction over project source files.
//!
//! Each call's declaring type is a best-effort guess built from text alone:
//!
//! 1. A receiver naming a local, parameter or field takes its declared type.
//! 2. A receiver type is qualified by the import that ends with it, preferring
//!    a match on a segment boundary.
//! 3. Calls without a receiver (or on `this`/`super`) belong to a
//!    statically imported owner when one matches, else to the enclosing type.
//! 4. Anything else keeps the bare receiver text, or the bare method name.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::core::errors::Result;
use crate::core::heuristics::{
    is_standard_library, is_test_scoped, match_receiver, ImportClassifier, ReceiverMatch,
};
use crate::core::model::MethodCallEntry;
use crate::core::pipeline::diagnostics::{AnalysisDiagnostics, DiagnosticCategory};
use crate::lang::{CallExpression, CompilationUnit, SourceParser};

/// Build output directories never scanned for project sources.
const SKIPPED_DIRS: [&str; 2] = ["target", "build"];

/// Tracks the shortest package declared by any analysed project file.
///
/// Ties keep the first package seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShallowestPackage {
    package: Option<String>,
}

impl ShallowestPackage {
    /// Offer a package declaration
    pub fn observe(&mut self, package: &str) {
        if package.is_empty() {
            return;
        }
        let depth = package.split('.').count();
        let shallower = self
            .package
            .as_deref()
            .map_or(true, |current| depth < current.split('.').count());
        if shallower {
            self.package = Some(package.to_string());
        }
    }

    /// The shallowest package seen so far
    pub fn get(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Whether a declaring type is project-local or standard-library
    pub fn excludes(&self, declaring_type: &str) -> bool {
        is_standard_library(declaring_type)
            || self
                .package
                .as_deref()
                .is_some_and(|prefix| declaring_type.starts_with(prefix))
    }
}

/// Calls and third-party imports of one project file.
#[derive(Debug, Clone, Default)]
pub struct FileRecord {
    /// Declared package
    pub package: Option<String>,
    /// Imports classified as third-party
    pub third_party_imports: Vec<String>,
    /// One entry per (declaring type, method name), lines merged
    pub calls: Vec<MethodCallEntry>,
}

/// Output of the extraction stage.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// Records keyed by file path, in discovery order
    pub files: IndexMap<PathBuf, FileRecord>,
    /// Shallowest project package
    pub shallowest_package: ShallowestPackage,
    /// Files parsed successfully
    pub files_parsed: usize,
    /// Test-scoped files skipped
    pub test_files_skipped: usize,
}

impl ExtractionResult {
    /// Total call entries across files
    pub fn call_count(&self) -> usize {
        self.files.values().map(|f| f.calls.len()).sum()
    }
}

/// Find `.java` files under `project_dir`, skipping build output and `excluded` trees
pub fn discover_sources(project_dir: &Path, extension: &str, excluded: &[PathBuf]) -> Vec<PathBuf> {
    let excluded: Vec<PathBuf> = excluded
        .iter()
        .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
        .collect();

    let walker = WalkBuilder::new(project_dir)
        .standard_filters(true)
        .require_git(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if !is_dir || entry.depth() == 0 {
                return true;
            }
            let skipped_name = entry
                .file_name()
                .to_str()
                .is_some_and(|name| SKIPPED_DIRS.contains(&name));
            if skipped_name {
                return false;
            }
            let canonical = entry
                .path()
                .canonicalize()
                .unwrap_or_else(|_| entry.path().to_path_buf());
            !excluded.iter().any(|ex| canonical.starts_with(ex))
        })
        .build();

    let mut files: Vec<PathBuf> = walker
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == extension)
        })
        .collect();
    files.sort();
    files
}

/// Guess the declaring type of a call from the unit's imports and declarations
pub fn qualify_call(unit: &CompilationUnit, call: &CallExpression) -> String {
    let receiver = call
        .receiver
        .as_deref()
        .filter(|r| !matches!(*r, "this" | "super"));

    let Some(receiver) = receiver else {
        if call.receiver.is_none() {
            if let Some(owner) = static_import_owner(unit, &call.method_name) {
                return owner;
            }
        }
        return call
            .enclosing_type
            .clone()
            .unwrap_or_else(|| call.method_name.clone());
    };

    let type_name = unit.variable_type(call, receiver).unwrap_or(receiver);

    if let Some(declared) = unit.types.iter().find(|t| t.name == type_name) {
        return declared.qualified_name.clone();
    }

    let mut best: Option<(&str, ReceiverMatch)> = None;
    for import in unit.imports.iter().filter(|i| !i.is_static && !i.is_wildcard) {
        let strength = match_receiver(&import.name, type_name);
        if strength > best.map_or(ReceiverMatch::None, |(_, s)| s) {
            best = Some((import.name.as_str(), strength));
        }
    }
    best.map_or_else(|| type_name.to_string(), |(name, _)| name.to_string())
}

fn static_import_owner(unit: &CompilationUnit, method_name: &str) -> Option<String> {
    unit.imports
        .iter()
        .filter(|i| i.is_static && !i.is_wildcard)
        .find_map(|i| {
            let (owner, member) = i.name.rsplit_once('.')?;
            (member == method_name).then(|| owner.to_string())
        })
}

/// Turn one parsed unit into a file record
pub fn record_unit(unit: &CompilationUnit, classifier: &ImportClassifier) -> FileRecord {
    let third_party_imports = unit
        .imports
        .iter()
        .filter(|import| classifier.is_third_party(&import.name))
        .map(|import| import.name.clone())
        .collect();

    let calls = merge_calls(unit.calls.iter(), |call| qualify_call(unit, call));

    FileRecord {
        package: unit.package.clone(),
        third_party_imports,
        calls,
    }
}

/// Build call entries, merging repeat sightings of a (declaring type, method name)
pub fn merge_calls<'a>(
    calls: impl Iterator<Item = &'a CallExpression>,
    qualify: impl Fn(&CallExpression) -> String,
) -> Vec<MethodCallEntry> {
    let mut merged: IndexMap<(String, String), MethodCallEntry> = IndexMap::new();
    for call in calls {
        let key = (qualify(call), call.method_name.clone());
        match merged.get_mut(&key) {
            Some(existing) => existing.add_line(call.line),
            None => {
                let entry = MethodCallEntry::new(
                    key.0.clone(),
                    call.method_name.clone(),
                    call.line,
                    call.text.clone(),
                    call.signature(),
                    call.arguments.len(),
                );
                merged.insert(key, entry);
            }
        }
    }
    merged.into_values().collect()
}

/// Walks project sources and records their calls.
pub struct CallExtractor {
    parser: Box<dyn SourceParser>,
    classifier: ImportClassifier,
    ignore_test: bool,
    excluded: Vec<PathBuf>,
}

impl CallExtractor {
    /// Create an extractor
    pub fn new(parser: Box<dyn SourceParser>, classifier: ImportClassifier, ignore_test: bool) -> Self {
        Self {
            parser,
            classifier,
            ignore_test,
            excluded: Vec::new(),
        }
    }

    /// Directories inside the project that must not be scanned
    pub fn with_excluded(mut self, excluded: Vec<PathBuf>) -> Self {
        self.excluded = excluded;
        self
    }

    /// Extract calls from every source file under `project_dir`
    pub fn extract_project(
        &mut self,
        project_dir: &Path,
        diagnostics: &mut AnalysisDiagnostics,
    ) -> ExtractionResult {
        let files = discover_sources(project_dir, self.parser.file_extension(), &self.excluded);
        info!("Discovered {} project source files", files.len());

        let mut result = ExtractionResult::default();
        let mut seen = HashSet::new();
        for path in files {
            if !seen.insert(path.clone()) {
                continue;
            }
            let relative = path.strip_prefix(project_dir).unwrap_or(&path);
            if self.ignore_test && is_test_scoped(relative) {
                debug!("Skipping test source {}", path.display());
                result.test_files_skipped += 1;
                continue;
            }

            match self.extract_file(&path) {
                Ok(record) => {
                    if let Some(package) = &record.package {
                        result.shallowest_package.observe(package);
                    }
                    result.files_parsed += 1;
                    result.files.insert(path, record);
                }
                Err(err) => {
                    diagnostics.record(DiagnosticCategory::Parse, path.display().to_string(), err)
                }
            }
        }

        info!(
            "Extracted {} calls from {} files (shallowest package: {})",
            result.call_count(),
            result.files_parsed,
            result.shallowest_package.get().unwrap_or("<none>")
        );
        result
    }

    /// Parse and record one file
    pub fn extract_file(&mut self, path: &Path) -> Result<FileRecord> {
        let unit = self.parser.parse_file(path)?;
        Ok(record_unit(&unit, &self.classifier))
    }
}
