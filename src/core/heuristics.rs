//! String heuristics used to classify imports and attribute source roots.
//!
//! None of these tests understand Java semantics. They compare names and are
//! wrong in predictable ways:
//!
//! - An artifactId that is a substring of an unrelated name matches it. The
//!   artifact `core` claims any root named `org.acme.jetty-core`, and an import
//!   from `io.core.util` is classified as third-party.
//! - A receiver suffix matches unrelated imports sharing the tail:
//!   `Gadget` is a suffix of `org.widget.BigGadget`. Boundary matches are
//!   preferred for that reason, but plain suffix matches are still accepted.
//! - Shaded or relocated packages present in two roots resolve to whichever
//!   root is probed first.
//!
//! [`OwnershipMatcher`] is the extension point for stricter, coordinate-aware
//! attribution; [`CoordinateOwnershipMatcher`] is the exact variant.

use std::fmt::Debug;
use std::path::{Component, Path};

use crate::core::model::Dependency;

/// Prefixes of types owned by the Java platform.
pub const STANDARD_LIBRARY_PREFIXES: [&str; 2] = ["java.", "javax."];

/// Whether a declaring type belongs to the Java platform
pub fn is_standard_library(declaring_type: &str) -> bool {
    STANDARD_LIBRARY_PREFIXES
        .iter()
        .any(|prefix| declaring_type.starts_with(prefix))
}

/// Decides whether a source root belongs to a dependency.
pub trait OwnershipMatcher: Send + Sync + Debug {
    /// `root_name` is the final path component of an acquired source root
    fn owns(&self, root_name: &str, dependency: &Dependency) -> bool;
}

/// Default matcher: the root name contains the artifactId.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringOwnershipMatcher;

impl OwnershipMatcher for SubstringOwnershipMatcher {
    fn owns(&self, root_name: &str, dependency: &Dependency) -> bool {
        !dependency.artifact_id().is_empty() && root_name.contains(dependency.artifact_id())
    }
}

/// Strict matcher: the root name is exactly `groupId.artifactId-version`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoordinateOwnershipMatcher;

impl OwnershipMatcher for CoordinateOwnershipMatcher {
    fn owns(&self, root_name: &str, dependency: &Dependency) -> bool {
        root_name == dependency.coordinate.source_root_name()
    }
}

/// Final path component as a string, empty when absent
pub fn root_name(root: &Path) -> &str {
    root.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

/// Classifies import names as third-party using dependency coordinate tokens.
#[derive(Debug, Clone, Default)]
pub struct ImportClassifier {
    tokens: Vec<String>,
}

impl ImportClassifier {
    /// Build a classifier from every known dependency's groupId and artifactId
    pub fn from_dependencies<'a>(dependencies: impl IntoIterator<Item = &'a Dependency>) -> Self {
        let mut tokens: Vec<String> = Vec::new();
        for dependency in dependencies {
            for token in [dependency.group_id(), dependency.artifact_id()] {
                if !token.is_empty() && !tokens.iter().any(|t| t == token) {
                    tokens.push(token.to_string());
                }
            }
        }
        Self { tokens }
    }

    /// An import is third-party iff it starts with, or contains, a known token
    pub fn is_third_party(&self, import: &str) -> bool {
        self.tokens
            .iter()
            .any(|token| import.starts_with(token.as_str()) || import.contains(token.as_str()))
    }
}

/// Strength of an import matching a receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReceiverMatch {
    /// The import does not end with the receiver text
    None,
    /// The import ends with the receiver text mid-segment
    Suffix,
    /// The import's trailing segments equal the receiver text
    Boundary,
}

/// Compare an import name against a call receiver
pub fn match_receiver(import: &str, receiver: &str) -> ReceiverMatch {
    if receiver.is_empty() || !import.ends_with(receiver) {
        return ReceiverMatch::None;
    }
    let head = &import[..import.len() - receiver.len()];
    if head.is_empty() || head.ends_with('.') {
        ReceiverMatch::Boundary
    } else {
        ReceiverMatch::Suffix
    }
}

/// Whether a project path lies in a test source set (`src/test/...`)
pub fn is_test_scoped(path: &Path) -> bool {
    let names: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect();
    names.windows(2).any(|pair| pair[0] == "src" && pair[1] == "test")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Coordinate;

    fn dep(group: &str, artifact: &str) -> Dependency {
        Dependency::from_local_repository(Coordinate::new(group, artifact, "1.0"), Path::new("/r"))
    }

    #[test]
    fn standard_library_prefixes() {
        assert!(is_standard_library("java.util.List"));
        assert!(is_standard_library("javax.inject.Inject"));
        assert!(!is_standard_library("javafx.scene.Node"));
        assert!(!is_standard_library("org.widget.Gadget"));
    }

    #[test]
    fn substring_matcher_accepts_containing_names() {
        let matcher = SubstringOwnershipMatcher;
        assert!(matcher.owns("org.widget.widget-1.0", &dep("org.widget", "widget")));
        // documented false positive
        assert!(matcher.owns("org.acme.jetty-core", &dep("org.other", "core")));
        assert!(!matcher.owns("org.gear.gear-1.0", &dep("org.widget", "widget")));
    }

    #[test]
    fn coordinate_matcher_requires_exact_name() {
        let matcher = CoordinateOwnershipMatcher;
        assert!(matcher.owns("org.widget.widget-1.0", &dep("org.widget", "widget")));
        assert!(!matcher.owns("org.widget.widget", &dep("org.widget", "widget")));
        assert!(!matcher.owns("org.widget.widget-2.0", &dep("org.widget", "widget")));
        assert!(!matcher.owns("org.acme.jetty-core", &dep("org.other", "core")));
    }

    #[test]
    fn import_classifier_uses_group_and_artifact_tokens() {
        let deps = [dep("org.widget", "widget"), dep("com.google.guava", "guava")];
        let classifier = ImportClassifier::from_dependencies(deps.iter());
        assert!(classifier.is_third_party("org.widget.Gadget"));
        // documented false negative: guava's packages do not carry its groupId
        assert!(!classifier.is_third_party("com.google.common.collect.ImmutableList"));
        assert!(classifier.is_third_party("shaded.guava.Cache"));
        assert!(!classifier.is_third_party("com.acme.app.Main"));
    }

    #[test]
    fn receiver_matching_prefers_segment_boundaries() {
        assert_eq!(match_receiver("org.widget.Gadget", "Gadget"), ReceiverMatch::Boundary);
        assert_eq!(match_receiver("org.widget.BigGadget", "Gadget"), ReceiverMatch::Suffix);
        assert_eq!(
            match_receiver("org.widget.Outer.Inner", "Outer.Inner"),
            ReceiverMatch::Boundary
        );
        assert_eq!(match_receiver("org.widget.Gadget", "gadget"), ReceiverMatch::None);
        assert_eq!(match_receiver("Gadget", "Gadget"), ReceiverMatch::Boundary);
    }

    #[test]
    fn test_scoped_paths() {
        assert!(is_test_scoped(Path::new("/p/module/src/test/java/AppTest.java")));
        assert!(!is_test_scoped(Path::new("/p/module/src/main/java/App.java")));
        assert!(!is_test_scoped(Path::new("/p/test/src/main/java/App.java")));
    }

    #[test]
    fn root_name_is_last_component() {
        assert_eq!(root_name(Path::new("/work/org.widget.widget-1.0")), "org.widget.widget-1.0");
        assert_eq!(root_name(Path::new("/")), "");
    }
}
