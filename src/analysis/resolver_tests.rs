use super::*;
use crate::core::model::Coordinate;
use crate::lang::JavaAdapter;
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    graph: DependencyGraph,
    widget: DependencyId,
    gear: DependencyId,
}

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn dep(group: &str, artifact: &str) -> Dependency {
    Dependency::from_local_repository(Coordinate::new(group, artifact, "1.0"), Path::new("/repo"))
}

/// Two acquired roots and one dependency without sources.
fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let widget_root = dir.path().join("org.widget.widget-1.0");
    let gear_root = dir.path().join("org.gear.gear-1.0");

    write(&widget_root, "org/widget/Gadget.java", "package org.widget; public class Gadget {}");
    write(
        &widget_root,
        "org/widget/Helpers.java",
        "package org.widget; class Helpers {} class Hidden {}",
    );
    write(&widget_root, "org/shared/Util.java", "package org.shared; class Util {}");
    write(
        &gear_root,
        "org/gear/Outer.java",
        "package org.gear; public class Outer { public static class Inner {} }",
    );
    write(&gear_root, "org/shared/Util.java", "package org.shared; class Util {}");

    let mut graph = DependencyGraph::new();
    let widget = graph.insert_root(dep("org.widget", "widget"));
    let gear = graph.insert_root(dep("org.gear", "gear"));
    graph.insert_root(dep("org.lever", "lever"));
    graph.set_source_root(widget, widget_root).unwrap();
    graph.set_source_root(gear, gear_root).unwrap();

    Fixture {
        _dir: dir,
        graph,
        widget,
        gear,
    }
}

#[test]
fn resolves_top_level_type() {
    let f = fixture();
    let mut resolver = TypeResolver::new(&f.graph);
    assert_eq!(resolver.root_count(), 2);

    let resolution = resolver.resolve("org.widget.Gadget");
    assert_eq!(resolution.dependency(), Some(f.widget));
    match resolution {
        Resolution::Resolved(found) => {
            assert!(found.source_file.ends_with("org/widget/Gadget.java"));
        }
        other => panic!("expected resolution, got {other:?}"),
    }
    assert_eq!(
        resolver.resolved_types(f.widget).collect::<Vec<_>>(),
        vec!["org.widget.Gadget"]
    );
}

#[test]
fn nested_type_matches_on_truncated_attempt() {
    let f = fixture();
    let mut resolver = TypeResolver::new(&f.graph);

    let resolution = resolver.resolve("org.gear.Outer.Inner");
    assert_eq!(resolution.dependency(), Some(f.gear));
    // two roots miss Outer/Inner.java, then widget misses and gear hits Outer.java
    assert_eq!(resolver.probe_count(), 4);
    assert!(resolver
        .lookup("org.gear.Outer.Inner")
        .unwrap()
        .source_file
        .ends_with("org/gear/Outer.java"));
}

#[test]
fn first_root_wins_for_duplicated_files() {
    let f = fixture();
    let mut resolver = TypeResolver::new(&f.graph);
    assert_eq!(resolver.resolve("org.shared.Util").dependency(), Some(f.widget));
}

#[test]
fn repeated_resolution_does_not_probe_again() {
    let f = fixture();
    let mut resolver = TypeResolver::new(&f.graph);

    resolver.resolve("org.widget.Gadget");
    resolver.resolve("org.nowhere.Missing");
    let probes = resolver.probe_count();

    assert_eq!(resolver.resolve("org.widget.Gadget").dependency(), Some(f.widget));
    assert_eq!(resolver.resolve("org.nowhere.Missing"), Resolution::Unresolved);
    assert_eq!(resolver.probe_count(), probes);
    assert_eq!(resolver.unresolved().collect::<Vec<_>>(), vec!["org.nowhere.Missing"]);
}

#[test]
fn short_names_are_unresolved_without_probing() {
    let f = fixture();
    let mut resolver = TypeResolver::new(&f.graph);
    assert_eq!(resolver.resolve("Gadget"), Resolution::Unresolved);
    assert_eq!(resolver.resolve("widget.Gadget"), Resolution::Unresolved);
    assert_eq!(resolver.probe_count(), 0);
    assert_eq!(resolver.unresolved_count(), 2);
}

#[test]
fn project_and_platform_types_are_skipped() {
    let f = fixture();
    let mut resolver = TypeResolver::new(&f.graph).with_project_group(Some("org.widget"));
    assert_eq!(resolver.resolve("org.widget.Gadget"), Resolution::Skipped);
    assert_eq!(resolver.resolve("java.util.List"), Resolution::Skipped);
    // a longer group sharing the prefix is not the project's
    assert!(!resolver.is_skipped("org.widgetry.Thing"));
    assert_eq!(resolver.probe_count(), 0);
    assert_eq!(resolver.unresolved_count(), 0);
}

#[test]
fn unowned_roots_never_resolve() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("misc");
    write(&root, "org/gear/Cog.java", "package org.gear; class Cog {}");

    let mut graph = DependencyGraph::new();
    let gear = graph.insert_root(dep("org.gear", "gear"));
    graph.set_source_root(gear, root).unwrap();

    let mut resolver = TypeResolver::new(&graph);
    assert_eq!(resolver.resolve("org.gear.Cog"), Resolution::Unresolved);
}

#[test]
fn strict_matching_requires_coordinate_named_roots() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("gear-sources");
    write(&root, "org/gear/Cog.java", "package org.gear; class Cog {}");

    let mut graph = DependencyGraph::new();
    let gear = graph.insert_root(dep("org.gear", "gear"));
    graph.set_source_root(gear, root).unwrap();

    let mut lenient = TypeResolver::new(&graph);
    assert_eq!(lenient.resolve("org.gear.Cog").dependency(), Some(gear));

    let mut strict = TypeResolver::new(&graph).with_strict_matching(true);
    assert_eq!(strict.resolve("org.gear.Cog"), Resolution::Unresolved);
}

#[test]
fn versions_of_one_artifact_keep_their_own_types() {
    let dir = TempDir::new().unwrap();
    let old_root = dir.path().join("org.gear.gear-2.4");
    let new_root = dir.path().join("org.gear.gear-2.5");
    write(&old_root, "org/gear/Legacy.java", "package org.gear; class Legacy {}");
    write(&new_root, "org/gear/Fresh.java", "package org.gear; class Fresh {}");

    let mut graph = DependencyGraph::new();
    let old = graph.insert_root(Dependency::from_local_repository(
        Coordinate::new("org.gear", "gear", "2.4"),
        Path::new("/repo"),
    ));
    let new = graph.insert_root(Dependency::from_local_repository(
        Coordinate::new("org.gear", "gear", "2.5"),
        Path::new("/repo"),
    ));
    graph.set_source_root(old, old_root).unwrap();
    graph.set_source_root(new, new_root).unwrap();

    for strict in [false, true] {
        let mut resolver = TypeResolver::new(&graph).with_strict_matching(strict);
        assert_eq!(resolver.resolve("org.gear.Legacy").dependency(), Some(old));
        assert_eq!(resolver.resolve("org.gear.Fresh").dependency(), Some(new));
    }
}

#[test]
fn deep_search_finds_secondary_declarations() {
    let f = fixture();

    let mut plain = TypeResolver::new(&f.graph);
    assert_eq!(plain.resolve("org.widget.Hidden"), Resolution::Unresolved);

    let mut deep =
        TypeResolver::new(&f.graph).with_deep_search(Box::new(JavaAdapter::new().unwrap()));
    let resolution = deep.resolve("org.widget.Hidden");
    assert_eq!(resolution.dependency(), Some(f.widget));
    assert!(deep
        .lookup("org.widget.Hidden")
        .unwrap()
        .source_file
        .ends_with("org/widget/Helpers.java"));
}

proptest! {
    #[test]
    fn fewer_than_three_segments_never_probe(
        name in "[a-z]{1,8}(\\.[A-Z][a-z]{0,8})?"
    ) {
        let f = fixture();
        let mut resolver = TypeResolver::new(&f.graph);
        prop_assert_eq!(resolver.resolve(&name), Resolution::Unresolved);
        prop_assert_eq!(resolver.probe_count(), 0);
    }

    #[test]
    fn resolution_is_memoized_and_owner_named(
        name in prop_oneof![
            Just("org.widget.Gadget".to_string()),
            Just("org.gear.Outer.Inner".to_string()),
            Just("org.shared.Util".to_string()),
            "org\\.[a-z]{1,6}\\.[A-Z][a-z]{1,6}",
        ]
    ) {
        let f = fixture();
        let mut resolver = TypeResolver::new(&f.graph);
        let first = resolver.resolve(&name);
        let probes = resolver.probe_count();
        let second = resolver.resolve(&name);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(resolver.probe_count(), probes);

        if let Some(id) = first.dependency() {
            let dependency = f.graph.get(id);
            let root = dependency.source_root.as_deref().unwrap();
            prop_assert!(root_name(root).contains(dependency.artifact_id()));
        }
    }
}
