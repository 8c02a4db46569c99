//! Data model shared by every pipeline stage.
//!
//! Dependencies are identified by their [`Coordinate`]. Call-site records use
//! explicit structural equality so that set membership never depends on
//! allocation identity.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The (groupId, artifactId, version) triple identifying a build artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Group identifier, e.g. `org.apache.commons`
    pub group_id: String,
    /// Artifact identifier, e.g. `commons-lang3`
    pub artifact_id: String,
    /// Resolved version
    pub version: String,
}

impl Coordinate {
    /// Create a coordinate from its three parts
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }

    /// `groupId:artifactId`, the version-less key used by build tools
    pub fn versionless_key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    /// Directory name used for this coordinate's acquired source root.
    /// Versions of one artifact get separate roots.
    pub fn source_root_name(&self) -> String {
        format!("{}.{}-{}", self.group_id, self.artifact_id, self.version)
    }

    /// Expected `<artifact>-<version>.jar` file name
    pub fn archive_file_name(&self) -> String {
        format!("{}-{}.jar", self.artifact_id, self.version)
    }

    /// Location of the compiled and source archives inside a local artifact cache
    pub fn archive_paths(&self, local_repository: &Path) -> (PathBuf, PathBuf) {
        let mut dir = local_repository.to_path_buf();
        for segment in self.group_id.split('.') {
            dir.push(segment);
        }
        dir.push(&self.artifact_id);
        dir.push(&self.version);

        let stem = format!("{}-{}", self.artifact_id, self.version);
        (
            dir.join(format!("{stem}.jar")),
            dir.join(format!("{stem}-sources.jar")),
        )
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// One resolved build artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Build coordinate
    pub coordinate: Coordinate,
    /// Compiled archive in the local artifact cache
    pub archive_path: PathBuf,
    /// Source archive next to the compiled archive
    pub source_archive_path: PathBuf,
    /// Declared scope when known (`compile`, `test`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Acquired source root, written once by the acquisition stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_root: Option<PathBuf>,
}

impl Dependency {
    /// Create a dependency whose archives live under `local_repository`
    pub fn from_local_repository(coordinate: Coordinate, local_repository: &Path) -> Self {
        let (archive_path, source_archive_path) = coordinate.archive_paths(local_repository);
        Self {
            coordinate,
            archive_path,
            source_archive_path,
            scope: None,
            source_root: None,
        }
    }

    /// Attach a declared scope
    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Group identifier shortcut
    pub fn group_id(&self) -> &str {
        &self.coordinate.group_id
    }

    /// Artifact identifier shortcut
    pub fn artifact_id(&self) -> &str {
        &self.coordinate.artifact_id
    }
}

/// Index of a located declaration inside the analysis' declaration arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclarationId(pub usize);

/// One call-site occurrence of a method.
///
/// Equality and hashing cover the declaring type, method name and call-site
/// expression only. Line numbers accumulate on repeat sightings and the
/// declaration link is attached later, so neither takes part in identity.
#[derive(Debug, Clone)]
pub struct MethodCallEntry {
    /// Fully-qualified type the method is believed to belong to
    pub declaring_type: String,
    /// Invoked method name
    pub method_name: String,
    /// 1-based lines where this call was seen, in sighting order
    pub line_numbers: Vec<usize>,
    /// Source text of the call expression
    pub full_expression: String,
    /// Best-effort signature: `name(arg, ...)`
    pub method_signature: String,
    /// Number of call arguments
    pub argument_count: usize,
    /// Located declaration, once attached
    pub declaration: Option<DeclarationId>,
}

impl MethodCallEntry {
    /// Create an entry for a first sighting at `line`
    pub fn new(
        declaring_type: impl Into<String>,
        method_name: impl Into<String>,
        line: usize,
        full_expression: impl Into<String>,
        method_signature: impl Into<String>,
        argument_count: usize,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            method_name: method_name.into(),
            line_numbers: vec![line],
            full_expression: full_expression.into(),
            method_signature: method_signature.into(),
            argument_count,
            declaration: None,
        }
    }

    /// Record another sighting, ignoring a line already present
    pub fn add_line(&mut self, line: usize) {
        if !self.line_numbers.contains(&line) {
            self.line_numbers.push(line);
        }
    }

    /// Identity key used for method-level deduplication
    pub fn signature_key(&self) -> MethodSignatureKey {
        MethodSignatureKey::new(&self.declaring_type, &self.method_signature)
    }
}

impl PartialEq for MethodCallEntry {
    fn eq(&self, other: &Self) -> bool {
        self.declaring_type == other.declaring_type
            && self.method_name == other.method_name
            && self.full_expression == other.full_expression
    }
}

impl Eq for MethodCallEntry {}

impl Hash for MethodCallEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.declaring_type.hash(state);
        self.method_name.hash(state);
        self.full_expression.hash(state);
    }
}

/// The declaration site of a method reachable from a call.
#[derive(Debug, Clone)]
pub struct MethodDeclarationInfo {
    /// Source file holding the declaration
    pub source_file_path: PathBuf,
    /// First line of the declaration (1-based)
    pub start_line: usize,
    /// Last line of the declaration (1-based)
    pub end_line: usize,
    /// Type the declaration belongs to
    pub declaring_type: String,
    /// Declared method name
    pub method_name: String,
    /// Declared signature: `name(ParamType, ...)`
    pub declaration_signature: String,
    /// Calls made from the declaration body
    pub inner_method_calls: Vec<MethodCallEntry>,
}

impl MethodDeclarationInfo {
    /// Declaring types of every inner call, deduplicated in first-seen order
    pub fn inner_declaring_types(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for call in &self.inner_method_calls {
            if !seen.contains(&call.declaring_type.as_str()) {
                seen.push(call.declaring_type.as_str());
            }
        }
        seen
    }
}

/// Identity key for a method's usage across call sites.
///
/// Anonymous-class variants of the same outer type compare equal, so
/// `com.acme.Foo.Anonymous-1` and `com.acme.Foo.Anonymous-2` collapse onto
/// `com.acme.Foo` when their signatures match.
#[derive(Debug, Clone)]
pub struct MethodSignatureKey {
    /// Declaring type as recorded
    pub declaring_type: String,
    /// Method signature
    pub signature: String,
}

impl MethodSignatureKey {
    /// Create a key
    pub fn new(declaring_type: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            signature: signature.into(),
        }
    }

    /// Declaring type with anonymous-class suffixes removed
    pub fn base_type(&self) -> &str {
        strip_anonymous_suffix(&self.declaring_type)
    }
}

impl PartialEq for MethodSignatureKey {
    fn eq(&self, other: &Self) -> bool {
        self.base_type() == other.base_type() && self.signature == other.signature
    }
}

impl Eq for MethodSignatureKey {}

impl Hash for MethodSignatureKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base_type().hash(state);
        self.signature.hash(state);
    }
}

/// Strip trailing anonymous-class segments (`Anonymous-N` or `$N`).
pub fn strip_anonymous_suffix(declaring_type: &str) -> &str {
    let mut current = declaring_type;
    loop {
        if let Some((head, last)) = current.rsplit_once('.') {
            if is_anonymous_segment(last) {
                current = head;
                continue;
            }
        }
        if let Some((head, tail)) = current.rsplit_once('$') {
            if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
                current = head;
                continue;
            }
        }
        return current;
    }
}

fn is_anonymous_segment(segment: &str) -> bool {
    segment
        .strip_prefix("Anonymous-")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
