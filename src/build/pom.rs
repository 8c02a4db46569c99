//! Maven descriptor (`pom.xml`) scanning.
//!
//! Reads direct dependency declarations, `${...}` properties, managed
//! versions and `<modules>` from a descriptor, then recurses into each module
//! whose own descriptor exists. Failures are recorded per descriptor and the
//! affected branch simply contributes nothing.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info};

use crate::core::errors::{CovsbomError, Result};
use crate::core::model::{Coordinate, Dependency};
use crate::core::pipeline::diagnostics::{AnalysisDiagnostics, DiagnosticCategory};

/// Descriptor file name inside a module directory.
pub const DESCRIPTOR_FILE: &str = "pom.xml";

/// Placeholder nesting resolved before giving up.
const MAX_INTERPOLATION_PASSES: usize = 8;

/// A `<dependency>` element as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredDependency {
    /// `<groupId>`
    pub group_id: String,
    /// `<artifactId>`
    pub artifact_id: String,
    /// `<version>`, possibly with placeholders
    pub version: Option<String>,
    /// `<scope>`
    pub scope: Option<String>,
    /// `<type>`
    pub packaging: Option<String>,
}

/// Parent or project coordinate parts, any of which may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialCoordinate {
    /// `<groupId>`
    pub group_id: Option<String>,
    /// `<artifactId>`
    pub artifact_id: Option<String>,
    /// `<version>`
    pub version: Option<String>,
}

/// Parsed contents of one descriptor.
#[derive(Debug, Clone, Default)]
pub struct PomDescriptor {
    /// Path the descriptor was read from
    pub path: PathBuf,
    /// `<project>` coordinate
    pub project: PartialCoordinate,
    /// `<parent>` coordinate
    pub parent: PartialCoordinate,
    /// `<properties>`
    pub properties: HashMap<String, String>,
    /// Direct `<dependencies>` (including profile dependencies)
    pub dependencies: Vec<DeclaredDependency>,
    /// `<dependencyManagement>` entries
    pub managed: Vec<DeclaredDependency>,
    /// `<modules>` entries as written
    pub modules: Vec<String>,
}

impl PomDescriptor {
    /// Effective groupId, inherited from `<parent>` when absent
    pub fn group_id(&self) -> Option<&str> {
        self.project
            .group_id
            .as_deref()
            .or(self.parent.group_id.as_deref())
    }

    /// Effective version, inherited from `<parent>` when absent
    pub fn version(&self) -> Option<&str> {
        self.project
            .version
            .as_deref()
            .or(self.parent.version.as_deref())
    }

    /// The project's own coordinate when fully known
    pub fn coordinate(&self) -> Option<Coordinate> {
        Some(Coordinate::new(
            self.group_id()?,
            self.project.artifact_id.as_deref()?,
            self.version()?,
        ))
    }
}

/// Read and parse one descriptor
pub fn parse_pom_file(path: &Path) -> Result<PomDescriptor> {
    let bytes = std::fs::read(path).map_err(|e| {
        CovsbomError::descriptor(path.display().to_string(), format!("cannot read: {e}"))
    })?;
    let mut descriptor = parse_pom(&bytes)
        .map_err(|e| CovsbomError::descriptor(path.display().to_string(), e.to_string()))?;
    descriptor.path = path.to_path_buf();
    Ok(descriptor)
}

/// Parse descriptor XML
pub fn parse_pom(bytes: &[u8]) -> Result<PomDescriptor> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut descriptor = PomDescriptor::default();
    let mut current: Option<DeclaredDependency> = None;
    let mut saw_project = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) => {
                let name = tag.local_name().as_ref().to_vec();
                if path.is_empty() {
                    if name.as_slice() != b"project" {
                        return Err(CovsbomError::parse(
                            "xml",
                            "root element is not <project>",
                        ));
                    }
                    saw_project = true;
                }
                if name.as_slice() == b"dependency" {
                    current = Some(DeclaredDependency::default());
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                if path.last().map(Vec::as_slice) == Some(b"dependency".as_slice()) {
                    if let Some(dependency) = current.take() {
                        match dependency_context(&path) {
                            DependencyContext::Direct => descriptor.dependencies.push(dependency),
                            DependencyContext::Managed => descriptor.managed.push(dependency),
                            DependencyContext::Other => {}
                        }
                    }
                }
                path.pop();
            }
            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|e| CovsbomError::parse("xml", e.to_string()))?
                    .trim()
                    .to_string();
                apply_text(&path, value, &mut descriptor, current.as_mut());
            }
            Ok(Event::CData(data)) => {
                let value = String::from_utf8_lossy(&data.into_inner()).trim().to_string();
                apply_text(&path, value, &mut descriptor, current.as_mut());
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(CovsbomError::parse(
                    "xml",
                    format!(
                        "malformed descriptor at position {}: {}",
                        reader.buffer_position(),
                        err
                    ),
                ))
            }
        }
        buf.clear();
    }

    if !saw_project {
        return Err(CovsbomError::parse("xml", "no <project> element"));
    }
    Ok(descriptor)
}

enum DependencyContext {
    Direct,
    Managed,
    Other,
}

fn dependency_context(path: &[Vec<u8>]) -> DependencyContext {
    // path ends with [..., "dependencies", "dependency"]
    let names: Vec<&[u8]> = path.iter().map(Vec::as_slice).collect();
    match names.as_slice() {
        [b"project", b"dependencies", b"dependency"] => DependencyContext::Direct,
        [b"project", b"profiles", b"profile", b"dependencies", b"dependency"] => {
            DependencyContext::Direct
        }
        [b"project", b"dependencyManagement", b"dependencies", b"dependency"] => {
            DependencyContext::Managed
        }
        _ => DependencyContext::Other,
    }
}

fn apply_text(
    path: &[Vec<u8>],
    value: String,
    descriptor: &mut PomDescriptor,
    current: Option<&mut DeclaredDependency>,
) {
    let names: Vec<&[u8]> = path.iter().map(Vec::as_slice).collect();

    if let (Some(dependency), [.., b"dependency", field]) = (current, names.as_slice()) {
        match *field {
            b"groupId" => dependency.group_id = value,
            b"artifactId" => dependency.artifact_id = value,
            b"version" => dependency.version = Some(value),
            b"scope" => dependency.scope = Some(value),
            b"type" => dependency.packaging = Some(value),
            _ => {}
        }
        return;
    }

    match names.as_slice() {
        [b"project", b"groupId"] => descriptor.project.group_id = Some(value),
        [b"project", b"artifactId"] => descriptor.project.artifact_id = Some(value),
        [b"project", b"version"] => descriptor.project.version = Some(value),
        [b"project", b"parent", b"groupId"] => descriptor.parent.group_id = Some(value),
        [b"project", b"parent", b"artifactId"] => descriptor.parent.artifact_id = Some(value),
        [b"project", b"parent", b"version"] => descriptor.parent.version = Some(value),
        [b"project", b"properties", key] => {
            descriptor
                .properties
                .insert(String::from_utf8_lossy(key).into_owned(), value);
        }
        [b"project", b"modules", b"module"] => descriptor.modules.push(value),
        _ => {}
    }
}

/// Properties and managed versions visible to a descriptor.
#[derive(Debug, Clone, Default)]
pub struct Interpolation {
    properties: HashMap<String, String>,
    managed: HashMap<(String, String), String>,
}

impl Interpolation {
    /// Layer a descriptor's own values over inherited ones
    pub fn layered(&self, descriptor: &PomDescriptor) -> Self {
        let mut next = self.clone();
        next.properties.extend(
            descriptor
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let builtins = [
            ("project.groupId", descriptor.group_id()),
            ("project.artifactId", descriptor.project.artifact_id.as_deref()),
            ("project.version", descriptor.version()),
            ("pom.version", descriptor.version()),
            ("version", descriptor.version()),
            ("project.parent.version", descriptor.parent.version.as_deref()),
            ("project.parent.groupId", descriptor.parent.group_id.as_deref()),
        ];
        for (key, value) in builtins {
            if let Some(value) = value {
                next.properties.insert(key.to_string(), value.to_string());
            }
        }

        for managed in &descriptor.managed {
            if let Some(version) = &managed.version {
                let version = next.interpolate(version);
                next.managed.insert(
                    (
                        next.interpolate(&managed.group_id),
                        next.interpolate(&managed.artifact_id),
                    ),
                    version,
                );
            }
        }
        next
    }

    /// Substitute `${name}` placeholders; unknown names are left in place
    pub fn interpolate(&self, value: &str) -> String {
        let mut current = value.to_string();
        for _ in 0..MAX_INTERPOLATION_PASSES {
            if !current.contains("${") {
                break;
            }
            let mut replaced = String::with_capacity(current.len());
            let mut rest = current.as_str();
            let mut changed = false;

            while let Some(open) = rest.find("${") {
                let Some(close) = rest[open..].find('}') else {
                    break;
                };
                let key = &rest[open + 2..open + close];
                replaced.push_str(&rest[..open]);
                match self.properties.get(key) {
                    Some(v) => {
                        replaced.push_str(v);
                        changed = true;
                    }
                    None => replaced.push_str(&rest[open..=open + close]),
                }
                rest = &rest[open + close + 1..];
            }
            replaced.push_str(rest);
            current = replaced;
            if !changed {
                break;
            }
        }
        current
    }

    /// Resolved version for a declared dependency
    pub fn version_for(&self, declared: &DeclaredDependency) -> Option<String> {
        let group_id = self.interpolate(&declared.group_id);
        let artifact_id = self.interpolate(&declared.artifact_id);
        let version = match &declared.version {
            Some(v) => self.interpolate(v),
            None => self.managed.get(&(group_id, artifact_id))?.clone(),
        };
        (!version.is_empty() && !version.contains("${")).then_some(version)
    }
}

/// Result of scanning a descriptor and its modules.
#[derive(Debug, Clone, Default)]
pub struct DescriptorScan {
    /// Root project coordinate when known
    pub project: Option<Coordinate>,
    /// Coordinates of every scanned descriptor (the reactor)
    pub reactor: Vec<Coordinate>,
    /// Accepted modules: declared name to directory
    pub modules: IndexMap<String, PathBuf>,
    /// Dependencies by `groupId:artifactId`, in declaration order
    pub dependencies: IndexMap<String, Dependency>,
}

/// Scan a descriptor and, recursively, every module that has its own descriptor
pub fn scan_descriptor(
    root_descriptor: &Path,
    local_repository: &Path,
    diagnostics: &mut AnalysisDiagnostics,
) -> DescriptorScan {
    let mut scan = DescriptorScan::default();
    let mut visited = HashSet::new();
    let mut reactor_keys = HashSet::new();

    scan_recursive(
        root_descriptor,
        &Interpolation::default(),
        local_repository,
        &mut scan,
        &mut visited,
        &mut reactor_keys,
        diagnostics,
        true,
    );

    let before = scan.dependencies.len();
    scan.dependencies.retain(|key, _| !reactor_keys.contains(key));
    if before != scan.dependencies.len() {
        debug!(
            "Excluded {} reactor module(s) from dependencies",
            before - scan.dependencies.len()
        );
    }

    info!(
        "Descriptor scan found {} dependencies across {} module(s)",
        scan.dependencies.len(),
        scan.modules.len()
    );
    scan
}

#[allow(clippy::too_many_arguments)]
fn scan_recursive(
    descriptor_path: &Path,
    inherited: &Interpolation,
    local_repository: &Path,
    scan: &mut DescriptorScan,
    visited: &mut HashSet<PathBuf>,
    reactor_keys: &mut HashSet<String>,
    diagnostics: &mut AnalysisDiagnostics,
    is_root: bool,
) {
    let canonical = descriptor_path
        .canonicalize()
        .unwrap_or_else(|_| descriptor_path.to_path_buf());
    if !visited.insert(canonical) {
        debug!("Descriptor {} already scanned", descriptor_path.display());
        return;
    }

    let descriptor = match parse_pom_file(descriptor_path) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            diagnostics.record(
                DiagnosticCategory::Descriptor,
                descriptor_path.display().to_string(),
                err,
            );
            return;
        }
    };

    let interpolation = inherited.layered(&descriptor);
    if let Some(coordinate) = descriptor.coordinate() {
        let coordinate = Coordinate::new(
            interpolation.interpolate(&coordinate.group_id),
            interpolation.interpolate(&coordinate.artifact_id),
            interpolation.interpolate(&coordinate.version),
        );
        reactor_keys.insert(coordinate.versionless_key());
        if is_root {
            scan.project = Some(coordinate.clone());
        }
        scan.reactor.push(coordinate);
    }

    for declared in &descriptor.dependencies {
        let group_id = interpolation.interpolate(&declared.group_id);
        let artifact_id = interpolation.interpolate(&declared.artifact_id);
        if group_id.is_empty() || artifact_id.is_empty() {
            diagnostics.record(
                DiagnosticCategory::Descriptor,
                descriptor_path.display().to_string(),
                "dependency without groupId or artifactId",
            );
            continue;
        }

        let Some(version) = interpolation.version_for(declared) else {
            diagnostics.record(
                DiagnosticCategory::Descriptor,
                format!("{group_id}:{artifact_id}"),
                format!(
                    "unresolved version {:?} in {}",
                    declared.version,
                    descriptor_path.display()
                ),
            );
            continue;
        };

        let coordinate = Coordinate::new(group_id, artifact_id, version);
        let key = coordinate.versionless_key();
        scan.dependencies.entry(key).or_insert_with(|| {
            Dependency::from_local_repository(coordinate, local_repository)
                .with_scope(declared.scope.clone())
        });
    }

    let base_dir = descriptor_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    for module in &descriptor.modules {
        let module_path = base_dir.join(module);
        let (module_dir, module_descriptor) = if module.ends_with(".xml") {
            let dir = module_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| base_dir.clone());
            (dir, module_path.clone())
        } else {
            (module_path.clone(), module_path.join(DESCRIPTOR_FILE))
        };

        if !module_descriptor.is_file() {
            diagnostics.record(
                DiagnosticCategory::Descriptor,
                module_descriptor.display().to_string(),
                format!("module '{module}' has no descriptor"),
            );
            continue;
        }

        scan.modules.insert(module.clone(), module_dir);
        scan_recursive(
            &module_descriptor,
            &interpolation,
            local_repository,
            scan,
            visited,
            reactor_keys,
            diagnostics,
            false,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ROOT_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>com.acme</groupId>
  <artifactId>app</artifactId>
  <version>1.0</version>
  <packaging>pom</packaging>
  <properties>
    <widget.version>1.0</widget.version>
  </properties>
  <modules>
    <module>core</module>
    <module>missing</module>
  </modules>
  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>org.gear</groupId>
        <artifactId>gear</artifactId>
        <version>2.5</version>
      </dependency>
    </dependencies>
  </dependencyManagement>
  <dependencies>
    <dependency>
      <groupId>org.widget</groupId>
      <artifactId>widget</artifactId>
      <version>${widget.version}</version>
    </dependency>
  </dependencies>
  <build>
    <plugins>
      <plugin>
        <artifactId>maven-shade-plugin</artifactId>
        <dependencies>
          <dependency>
            <groupId>org.plugin</groupId>
            <artifactId>helper</artifactId>
            <version>9</version>
          </dependency>
        </dependencies>
      </plugin>
    </plugins>
  </build>
</project>
"#;

    const CORE_POM: &str = r#"<project>
  <parent>
    <groupId>com.acme</groupId>
    <artifactId>app</artifactId>
    <version>1.0</version>
  </parent>
  <artifactId>app-core</artifactId>
  <dependencies>
    <dependency>
      <groupId>org.gear</groupId>
      <artifactId>gear</artifactId>
    </dependency>
    <dependency>
      <groupId>com.acme</groupId>
      <artifactId>app-api</artifactId>
      <version>${project.version}</version>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>4.13.2</version>
      <scope>test</scope>
    </dependency>
  </dependencies>
</project>
"#;

    #[test]
    fn parses_project_dependencies_and_modules() {
        let descriptor = parse_pom(ROOT_POM.as_bytes()).unwrap();
        assert_eq!(descriptor.group_id(), Some("com.acme"));
        assert_eq!(
            descriptor.coordinate(),
            Some(Coordinate::new("com.acme", "app", "1.0"))
        );
        assert_eq!(descriptor.modules, vec!["core", "missing"]);
        assert_eq!(descriptor.dependencies.len(), 1);
        assert_eq!(descriptor.managed.len(), 1);
        assert_eq!(
            descriptor.properties.get("widget.version").map(String::as_str),
            Some("1.0")
        );
    }

    #[test]
    fn child_inherits_parent_coordinates() {
        let descriptor = parse_pom(CORE_POM.as_bytes()).unwrap();
        assert_eq!(
            descriptor.coordinate(),
            Some(Coordinate::new("com.acme", "app-core", "1.0"))
        );
    }

    #[test]
    fn rejects_non_project_documents() {
        assert!(parse_pom(b"<settings></settings>").is_err());
        assert!(parse_pom(b"<project><dependencies></project>").is_err());
    }

    #[test]
    fn interpolation_resolves_nested_properties() {
        let descriptor = parse_pom(
            br#"<project>
                 <groupId>g</groupId><artifactId>a</artifactId><version>3.1</version>
                 <properties>
                   <base>${project.version}</base>
                   <lib.version>${base}-final</lib.version>
                 </properties>
               </project>"#,
        )
        .unwrap();
        let interpolation = Interpolation::default().layered(&descriptor);
        assert_eq!(interpolation.interpolate("${lib.version}"), "3.1-final");
        assert_eq!(interpolation.interpolate("${unknown}"), "${unknown}");
    }

    #[test]
    fn scan_recurses_into_existing_modules() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pom.xml"), ROOT_POM).unwrap();
        fs::create_dir(dir.path().join("core")).unwrap();
        fs::write(dir.path().join("core").join("pom.xml"), CORE_POM).unwrap();

        let mut diagnostics = AnalysisDiagnostics::new();
        let scan = scan_descriptor(
            &dir.path().join("pom.xml"),
            Path::new("/repo"),
            &mut diagnostics,
        );

        assert_eq!(scan.project, Some(Coordinate::new("com.acme", "app", "1.0")));
        assert_eq!(scan.modules.len(), 1);
        assert_eq!(scan.modules.get("core"), Some(&dir.path().join("core")));

        let keys: Vec<_> = scan.dependencies.keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["org.widget:widget", "org.gear:gear", "com.acme:app-api", "junit:junit"]
        );

        let gear = &scan.dependencies["org.gear:gear"];
        assert_eq!(gear.coordinate.version, "2.5");
        assert_eq!(
            gear.archive_path,
            PathBuf::from("/repo/org/gear/gear/2.5/gear-2.5.jar")
        );
        assert_eq!(
            scan.dependencies["junit:junit"].scope.as_deref(),
            Some("test")
        );

        // the "missing" module has no descriptor
        assert_eq!(diagnostics.descriptor_errors, 1);
    }

    #[test]
    fn reactor_modules_are_not_dependencies() {
        let dir = TempDir::new().unwrap();
        let root = ROOT_POM.replace("<module>missing</module>", "<module>api</module>");
        fs::write(dir.path().join("pom.xml"), root).unwrap();
        let api_pom = r#"<project>
  <parent><groupId>com.acme</groupId><artifactId>app</artifactId><version>1.0</version></parent>
  <artifactId>app-api</artifactId>
</project>"#;
        for (module, pom) in [("core", CORE_POM), ("api", api_pom)] {
            fs::create_dir(dir.path().join(module)).unwrap();
            fs::write(dir.path().join(module).join("pom.xml"), pom).unwrap();
        }

        let mut diagnostics = AnalysisDiagnostics::new();
        let scan = scan_descriptor(
            &dir.path().join("pom.xml"),
            Path::new("/repo"),
            &mut diagnostics,
        );
        assert!(!scan.dependencies.contains_key("com.acme:app-api"));
        assert_eq!(scan.reactor.len(), 3);
    }

    #[test]
    fn missing_root_descriptor_is_recorded() {
        let dir = TempDir::new().unwrap();
        let mut diagnostics = AnalysisDiagnostics::new();
        let scan = scan_descriptor(
            &dir.path().join("pom.xml"),
            Path::new("/repo"),
            &mut diagnostics,
        );
        assert!(scan.dependencies.is_empty());
        assert_eq!(diagnostics.descriptor_errors, 1);
    }
}
