//! Declaration attachment and depth-bounded inner-call expansion.
//!
//! A call whose declaring type resolves to a dependency is linked to the
//! method declaration in that dependency's sources. Each located declaration
//! lists its own inner calls, which are attached in turn. Expansion runs over
//! a breadth-first worklist of `(declaration, depth)` items; declarations are
//! memoized by [`MethodSignatureKey`], so mutually recursive methods are
//! visited once and the walk always terminates.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::extraction::{merge_calls, qualify_call, ExtractionResult};
use super::resolver::{Resolution, TypeResolver, SOURCE_EXTENSION};
use crate::core::heuristics::is_standard_library;
use crate::core::model::{DeclarationId, MethodCallEntry, MethodDeclarationInfo, MethodSignatureKey};
use crate::core::pipeline::diagnostics::{AnalysisDiagnostics, DiagnosticCategory};
use crate::lang::{CompilationUnit, SourceParser};

/// Depth given to declarations attached directly to project calls.
pub const TOP_LEVEL_DEPTH: usize = 1;

/// Located declarations, addressed by [`DeclarationId`].
#[derive(Debug, Clone, Default)]
pub struct DeclarationArena {
    declarations: Vec<MethodDeclarationInfo>,
}

impl DeclarationArena {
    /// Borrow a declaration
    pub fn get(&self, id: DeclarationId) -> Option<&MethodDeclarationInfo> {
        self.declarations.get(id.0)
    }

    /// Number of located declarations
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Whether no declaration was located
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// All declarations with their ids
    pub fn iter(&self) -> impl Iterator<Item = (DeclarationId, &MethodDeclarationInfo)> {
        self.declarations
            .iter()
            .enumerate()
            .map(|(i, d)| (DeclarationId(i), d))
    }

    /// Store a declaration, returning its id
    pub fn push(&mut self, info: MethodDeclarationInfo) -> DeclarationId {
        self.declarations.push(info);
        DeclarationId(self.declarations.len() - 1)
    }
}

/// Counters for one expansion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionStats {
    /// Project calls linked to a declaration
    pub attached_calls: usize,
    /// Distinct declarations located
    pub declarations: usize,
    /// Worklist items dropped by the depth bound
    pub truncated: usize,
    /// Deepest level expanded
    pub max_depth_reached: usize,
}

type LocateKey = (String, String, usize);

/// Locates declarations for calls and expands their inner calls.
pub struct DeclarationExpander {
    parser: Box<dyn SourceParser>,
    depth_limit: Option<usize>,
    units: HashMap<PathBuf, Option<CompilationUnit>>,
    located: HashMap<LocateKey, Option<DeclarationId>>,
    by_key: HashMap<MethodSignatureKey, DeclarationId>,
    arena: DeclarationArena,
    stats: ExpansionStats,
}

impl DeclarationExpander {
    /// `depth_limit` of `None` expands until every reachable declaration is visited
    pub fn new(parser: Box<dyn SourceParser>, depth_limit: Option<usize>) -> Self {
        Self {
            parser,
            depth_limit,
            units: HashMap::new(),
            located: HashMap::new(),
            by_key: HashMap::new(),
            arena: DeclarationArena::default(),
            stats: ExpansionStats::default(),
        }
    }

    /// Attach declarations to the third-party calls of the extraction result, then expand them
    pub fn attach_all(
        &mut self,
        extraction: &mut ExtractionResult,
        resolver: &mut TypeResolver,
        diagnostics: &mut AnalysisDiagnostics,
    ) {
        let mut roots = Vec::new();
        let shallowest = extraction.shallowest_package.clone();
        for record in extraction.files.values_mut() {
            for entry in &mut record.calls {
                if shallowest.excludes(&entry.declaring_type) {
                    continue;
                }
                if let Some((id, created)) = self.attach(entry, resolver, diagnostics) {
                    entry.declaration = Some(id);
                    self.stats.attached_calls += 1;
                    if created {
                        roots.push(id);
                    }
                }
            }
        }
        self.expand(roots, resolver, diagnostics);
    }

    /// Expand inner calls breadth-first from `roots`
    pub fn expand(
        &mut self,
        roots: Vec<DeclarationId>,
        resolver: &mut TypeResolver,
        diagnostics: &mut AnalysisDiagnostics,
    ) {
        let mut worklist: VecDeque<(DeclarationId, usize)> =
            roots.into_iter().map(|id| (id, TOP_LEVEL_DEPTH)).collect();

        while let Some((id, depth)) = worklist.pop_front() {
            if self.depth_limit.is_some_and(|limit| depth > limit) {
                self.stats.truncated += 1;
                continue;
            }
            self.stats.max_depth_reached = self.stats.max_depth_reached.max(depth);

            let inner: Vec<MethodCallEntry> = match self.arena.declarations.get(id.0) {
                Some(info) => info.inner_method_calls.clone(),
                None => continue,
            };
            for (index, call) in inner.iter().enumerate() {
                let Some((child, created)) = self.attach(call, resolver, diagnostics) else {
                    continue;
                };
                self.arena.declarations[id.0].inner_method_calls[index].declaration = Some(child);
                if created {
                    worklist.push_back((child, depth + 1));
                }
            }
        }

        info!(
            "Expanded {} declarations ({} truncated by depth)",
            self.arena.len(),
            self.stats.truncated
        );
    }

    /// Locate the declaration a call refers to.
    ///
    /// Returns the declaration id and whether it was located for the first time.
    pub fn attach(
        &mut self,
        entry: &MethodCallEntry,
        resolver: &mut TypeResolver,
        diagnostics: &mut AnalysisDiagnostics,
    ) -> Option<(DeclarationId, bool)> {
        if is_standard_library(&entry.declaring_type) {
            return None;
        }
        let locate_key = (
            entry.declaring_type.clone(),
            entry.method_name.clone(),
            entry.argument_count,
        );
        if let Some(known) = self.located.get(&locate_key) {
            return known.map(|id| (id, false));
        }

        let source_file = match resolver.resolve(&entry.declaring_type) {
            Resolution::Resolved(found) => found.source_file,
            _ => return None,
        };

        let info = self.build_declaration(entry, &source_file, diagnostics);
        let result = info.map(|info| {
            let key = MethodSignatureKey::new(&info.declaring_type, &info.declaration_signature);
            match self.by_key.get(&key) {
                Some(&existing) => (existing, false),
                None => {
                    let id = self.arena.push(info);
                    self.by_key.insert(key, id);
                    self.stats.declarations += 1;
                    (id, true)
                }
            }
        });
        self.located.insert(locate_key, result.map(|(id, _)| id));
        result
    }

    fn build_declaration(
        &mut self,
        entry: &MethodCallEntry,
        source_file: &Path,
        diagnostics: &mut AnalysisDiagnostics,
    ) -> Option<MethodDeclarationInfo> {
        let unit = self.unit_for(source_file, diagnostics)?;

        let candidates: Vec<_> = unit
            .methods_of(&entry.declaring_type)
            .filter(|(_, m)| m.name == entry.method_name)
            .collect();
        let (index, method) = candidates
            .iter()
            .find(|(_, m)| m.parameter_types.len() == entry.argument_count)
            .or_else(|| candidates.first())
            .copied()?;

        let directory = source_file.parent().unwrap_or(Path::new(""));
        let inner_method_calls = merge_calls(unit.calls_in_method(index), |call| {
            qualify_in_package(unit, qualify_call(unit, call), directory)
        });

        debug!(
            "Located {}.{} in {}",
            entry.declaring_type,
            method.signature(),
            source_file.display()
        );
        Some(MethodDeclarationInfo {
            source_file_path: source_file.to_path_buf(),
            start_line: method.start_line,
            end_line: method.end_line,
            declaring_type: method.declaring_type.clone(),
            method_name: method.name.clone(),
            declaration_signature: method.signature(),
            inner_method_calls,
        })
    }

    fn unit_for(
        &mut self,
        path: &Path,
        diagnostics: &mut AnalysisDiagnostics,
    ) -> Option<&CompilationUnit> {
        if !self.units.contains_key(path) {
            let parsed = match self.parser.parse_file(path) {
                Ok(unit) => Some(unit),
                Err(err) => {
                    diagnostics.record(DiagnosticCategory::Parse, path.display().to_string(), err);
                    None
                }
            };
            self.units.insert(path.to_path_buf(), parsed);
        }
        self.units.get(path).and_then(Option::as_ref)
    }

    /// Counters so far
    pub fn stats(&self) -> ExpansionStats {
        self.stats
    }

    /// Finish, handing over the located declarations
    pub fn finish(self) -> (DeclarationArena, ExpansionStats) {
        (self.arena, self.stats)
    }
}

/// Qualify a bare type name with the unit's package when a sibling file declares it
fn qualify_in_package(unit: &CompilationUnit, qualified: String, directory: &Path) -> String {
    if qualified.contains('.') {
        return qualified;
    }
    let sibling = directory.join(format!("{qualified}.{SOURCE_EXTENSION}"));
    if sibling.is_file() {
        unit.qualify(&qualified)
    } else {
        qualified
    }
}
