//! End-to-end runs of the analysis pipeline over a temporary Maven project.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use covsbom_rs::acquire::Decompiler;
use covsbom_rs::build::FileTreeProvider;
use covsbom_rs::core::config::SourceStrategy;
use covsbom_rs::core::pipeline::DiagnosticCategory;
use covsbom_rs::io::reports::CallReport;
use covsbom_rs::{AnalysisPipeline, CovsbomConfig, CovsbomError, Result};
use tempfile::TempDir;

const APP_FILE: &str = "src/main/java/com/acme/app/App.java";

const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project>
  <groupId>com.acme</groupId>
  <artifactId>app</artifactId>
  <version>1.0</version>
  <dependencies>
    <dependency><groupId>org.widget</groupId><artifactId>widget</artifactId><version>1.0</version></dependency>
    <dependency><groupId>org.gear</groupId><artifactId>gear</artifactId><version>1.0</version></dependency>
    <dependency><groupId>org.broken</groupId><artifactId>broken</artifactId><version>1.0</version></dependency>
  </dependencies>
</project>
"#;

const APP: &str = r#"package com.acme.app;

import org.widget.Gadget;
import org.gear.Outer.Inner;
import org.lever.Lever;
import com.acme.app.util.Helper;

public class App {
    public void run() {
        Gadget gadget = new Gadget();
        gadget.spin();
        Inner.make();
        Lever.pull();
        Helper.assist();
        gadget.spin();
    }
}
"#;

const HELPER: &str = r#"package com.acme.app.util;

public class Helper {
    public static void assist() {
    }
}
"#;

const APP_TEST: &str = r#"package com.acme.app;

import org.widget.Gadget;

public class AppTest {
    void spins() {
        new Gadget().stop();
    }
}
"#;

const GADGET: &str = r#"package org.widget;

public class Gadget {
    public void spin() {
        wobble();
    }

    void wobble() {
        settle();
    }

    void settle() {
    }
}
"#;

const OUTER: &str = r#"package org.gear;

public class Outer {
    public static class Inner {
        public static void make() {
        }
    }
}
"#;

const COG: &str = r#"package org.gear;

public class Cog {
    public void turn() {
    }
}
"#;

const CRANK: &str = r#"package com.acme.app;

import org.gear.Cog;

public class Crank {
    void crank(Cog cog) {
        cog.turn();
    }
}
"#;

/// Writes canned sources per archive name; `broken` archives fail.
struct CannedDecompiler;

#[async_trait]
impl Decompiler for CannedDecompiler {
    async fn decompile(&self, archive: &Path, output: &Path) -> Result<()> {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (relative, body) = match name.as_str() {
            "widget-1.0.jar" => ("org/widget/Gadget.java", GADGET),
            "gear-1.0.jar" => ("org/gear/Outer.java", OUTER),
            "gear-2.0.jar" => ("org/gear/Cog.java", COG),
            _ => {
                return Err(CovsbomError::acquisition(name, "decompiler exited with status 1"));
            }
        };
        let target = output.join(relative);
        fs::create_dir_all(target.parent().unwrap_or(output))?;
        fs::write(target, body)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "canned"
    }
}

struct Workspace {
    _root: TempDir,
    project: PathBuf,
    repository: PathBuf,
    work: PathBuf,
    out: PathBuf,
}

fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn workspace() -> Workspace {
    let root = TempDir::new().unwrap();
    let project = root.path().join("app");
    let repository = root.path().join("repository");

    write(&project.join("pom.xml"), POM);
    write(&project.join(APP_FILE), APP);
    write(&project.join("src/main/java/com/acme/app/util/Helper.java"), HELPER);
    write(&project.join("src/test/java/com/acme/app/AppTest.java"), APP_TEST);

    for (group, artifact) in [("org/widget", "widget"), ("org/gear", "gear"), ("org/broken", "broken")] {
        write(
            &repository.join(format!("{group}/{artifact}/1.0/{artifact}-1.0.jar")),
            "PK",
        );
    }

    Workspace {
        work: root.path().join("work"),
        out: root.path().join("out"),
        project,
        repository,
        _root: root,
    }
}

fn config(ws: &Workspace) -> CovsbomConfig {
    let mut config = CovsbomConfig::default();
    config.maven.local_repository = Some(ws.repository.clone());
    config.acquisition.work_dir = ws.work.clone();
    config.acquisition.strategy = SourceStrategy::Decompile;
    config.output.directory = ws.out.clone();
    config.analysis.restrict_depth = true;
    config.analysis.max_method_call_depth = 1;
    config.analysis.ignore_test = true;
    config
}

fn pipeline(config: CovsbomConfig) -> AnalysisPipeline {
    AnalysisPipeline::new(config).with_decompiler(Arc::new(CannedDecompiler))
}

fn read_report(path: &Path) -> CallReport {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn attributes_calls_to_declaring_dependencies() {
    let ws = workspace();
    let outcome = pipeline(config(&ws)).analyze(&ws.project).await.unwrap();

    assert_eq!(outcome.paths.directory, ws.out.join("app"));
    let filtered = read_report(&outcome.paths.filtered);
    assert_eq!(filtered.keys().collect::<Vec<_>>(), vec![APP_FILE]);

    let calls: Vec<_> = filtered[APP_FILE]
        .iter()
        .map(|c| (c.declaring_type.as_str(), c.method_name.as_str()))
        .collect();
    assert_eq!(
        calls,
        vec![("org.widget.Gadget", "spin"), ("org.gear.Outer.Inner", "make")]
    );
    assert_eq!(filtered[APP_FILE][0].line_numbers, vec![11, 15]);

    let usage = &outcome.reports.usage;
    assert_eq!(usage["org.widget:widget:1.0"].calls.len(), 1);
    assert_eq!(usage["org.gear:gear:1.0"].declaring_types, vec!["org.gear.Outer.Inner"]);
    assert!(usage["org.broken:broken:1.0"].calls.is_empty());
    assert_eq!(outcome.reports.summary.buffered_calls, 2);
}

#[tokio::test]
async fn project_local_calls_stay_in_full_report_only() {
    let ws = workspace();
    let outcome = pipeline(config(&ws)).analyze(&ws.project).await.unwrap();

    let full = read_report(&outcome.paths.full);
    let types: Vec<_> = full[APP_FILE].iter().map(|c| c.declaring_type.as_str()).collect();
    assert!(types.contains(&"com.acme.app.util.Helper"));
    assert!(types.contains(&"org.lever.Lever"));
    assert!(full.contains_key("src/main/java/com/acme/app/util/Helper.java"));

    let summary = &outcome.reports.summary;
    assert_eq!(summary.shallowest_package.as_deref(), Some("com.acme.app"));
    assert_eq!(summary.test_files_skipped, 1);
    assert_eq!(summary.files_parsed, 2);
    assert!(!full.contains_key("src/test/java/com/acme/app/AppTest.java"));
}

#[tokio::test]
async fn failures_are_recorded_without_aborting() {
    let ws = workspace();
    let outcome = pipeline(config(&ws)).analyze(&ws.project).await.unwrap();

    let diagnostics = &outcome.reports.summary.diagnostics;
    assert_eq!(diagnostics.count(DiagnosticCategory::Acquisition), 1);
    assert_eq!(diagnostics.count(DiagnosticCategory::ResolutionMiss), 1);
    assert_eq!(outcome.stats.acquisition.failed, 1);
    assert_eq!(outcome.stats.acquisition.decompiled, 2);
    assert_eq!(outcome.reports.summary.unresolved_types, vec!["org.lever.Lever"]);
    assert!(outcome.resolution_ratio() > 0.6);
}

#[tokio::test]
async fn declaration_expansion_respects_depth_bound() {
    let ws = workspace();
    let outcome = pipeline(config(&ws)).analyze(&ws.project).await.unwrap();

    let filtered = read_report(&outcome.paths.filtered);
    let spin = filtered[APP_FILE][0].declaration_info.as_ref().unwrap();
    assert!(spin.source_file_path.ends_with("org/widget/Gadget.java"));
    assert_eq!((spin.start_line, spin.end_line), (4, 6));

    let wobble = &spin.inner_method_calls[0];
    let wobble_info = wobble.declaration_info.as_ref().unwrap();
    assert_eq!(wobble_info.method_name, "wobble");
    // wobble sits one level past the bound, so its own calls stay unexpanded
    assert!(wobble_info.inner_method_calls[0].declaration_info.is_none());
    assert_eq!(outcome.reports.summary.truncated_expansions, 1);

    let make = filtered[APP_FILE][1].declaration_info.as_ref().unwrap();
    assert!(make.source_file_path.ends_with("org/gear/Outer.java"));
}

#[tokio::test]
async fn unbounded_expansion_reaches_every_declaration() {
    let ws = workspace();
    let mut config = config(&ws);
    config.analysis.restrict_depth = false;
    let outcome = pipeline(config).analyze(&ws.project).await.unwrap();

    let filtered = &outcome.reports.filtered;
    let spin = filtered[APP_FILE][0].declaration_info.as_ref().unwrap();
    let wobble = spin.inner_method_calls[0].declaration_info.as_ref().unwrap();
    let settle = wobble.inner_method_calls[0].declaration_info.as_ref().unwrap();
    assert_eq!(settle.declaration_signature, "settle()");
    assert_eq!(outcome.reports.summary.truncated_expansions, 0);
    // spin, wobble, settle and make
    assert_eq!(outcome.reports.summary.declarations, 4);
}

#[tokio::test]
async fn evaluated_tree_supplies_transitive_dependencies() {
    let ws = workspace();
    let tree = ws.work.with_file_name("tree.txt");
    fs::write(
        &tree,
        "com.acme:app:jar:1.0\n+- org.widget:widget:jar:1.0:compile\n|  \\- org.gear:gear:jar:1.0:compile\n",
    )
    .unwrap();

    let outcome = pipeline(config(&ws))
        .with_tree_provider(Arc::new(FileTreeProvider::new(tree)))
        .analyze(&ws.project)
        .await
        .unwrap();

    assert_eq!(outcome.graph.len(), 2);
    assert_eq!(outcome.graph.roots().len(), 1);
    assert_eq!(outcome.project.unwrap().artifact_id, "app");
    assert_eq!(outcome.stats.acquisition.failed, 0);
    assert_eq!(outcome.reports.filtered[APP_FILE].len(), 2);
}

#[tokio::test]
async fn versions_of_one_artifact_are_attributed_separately() {
    let ws = workspace();
    write(&ws.repository.join("org/gear/gear/2.0/gear-2.0.jar"), "PK");
    write(&ws.project.join("src/main/java/com/acme/app/Crank.java"), CRANK);
    let tree = ws.work.with_file_name("tree.txt");
    fs::write(
        &tree,
        "com.acme:app:jar:1.0\n+- org.widget:widget:jar:1.0:compile\n|  \\- org.gear:gear:jar:1.0:compile\n\\- org.gear:gear:jar:2.0:runtime\n",
    )
    .unwrap();

    let outcome = pipeline(config(&ws))
        .with_tree_provider(Arc::new(FileTreeProvider::new(tree)))
        .analyze(&ws.project)
        .await
        .unwrap();

    assert_eq!(outcome.graph.len(), 3);
    assert_eq!(outcome.stats.acquisition.decompiled, 3);
    let roots: Vec<_> = outcome
        .graph
        .dependencies()
        .filter(|(_, dep)| dep.coordinate.artifact_id == "gear")
        .map(|(_, dep)| (dep.coordinate.version.clone(), dep.source_root.clone().unwrap()))
        .collect();
    assert_eq!(roots.len(), 2);
    assert_ne!(roots[0].1, roots[1].1);
    for (version, root) in &roots {
        let expected = if version == "1.0" { "org/gear/Outer.java" } else { "org/gear/Cog.java" };
        assert!(root.join(expected).is_file(), "{version} lost its sources");
    }

    let usage = &outcome.reports.usage;
    assert_eq!(usage["org.gear:gear:1.0"].declaring_types, vec!["org.gear.Outer.Inner"]);
    assert_eq!(usage["org.gear:gear:2.0"].declaring_types, vec!["org.gear.Cog"]);
}

#[tokio::test]
async fn unresolved_audit_ignores_declaration_output() {
    let ws = workspace();
    // packages no longer sit under the groupId, so only the shallowest package marks them local
    fs::write(
        ws.project.join("pom.xml"),
        POM.replacen("<groupId>com.acme</groupId>", "<groupId>io.acmecorp</groupId>", 1),
    )
    .unwrap();

    let mut summaries = Vec::new();
    for include_declarations in [false, true] {
        let mut config = config(&ws);
        config.output.include_declarations = include_declarations;
        let outcome = pipeline(config).analyze(&ws.project).await.unwrap();
        summaries.push(outcome.reports.summary);
    }

    let (without, with) = (&summaries[0], &summaries[1]);
    assert_eq!(with.unresolved_types, vec!["org.lever.Lever"]);
    assert_eq!(without.unresolved_types, with.unresolved_types);
    assert_eq!(without.resolved_types, with.resolved_types);
    assert_eq!(
        without.diagnostics.count(DiagnosticCategory::ResolutionMiss),
        with.diagnostics.count(DiagnosticCategory::ResolutionMiss)
    );
    assert!(with.declarations > 0);
    assert_eq!(without.declarations, 0);
}

#[tokio::test]
async fn missing_descriptor_still_produces_reports() {
    let ws = workspace();
    fs::remove_file(ws.project.join("pom.xml")).unwrap();

    let outcome = pipeline(config(&ws)).analyze(&ws.project).await.unwrap();
    assert!(outcome.graph.is_empty());
    assert_eq!(
        outcome.reports.summary.diagnostics.count(DiagnosticCategory::Descriptor),
        1
    );
    assert!(outcome.reports.filtered.is_empty());
    assert!(outcome.paths.summary.is_file());
}

#[tokio::test]
async fn unwritable_output_is_fatal() {
    let ws = workspace();
    let mut config = config(&ws);
    let blocker = ws.work.with_file_name("blocker");
    fs::write(&blocker, "file").unwrap();
    config.output.directory = blocker;

    let err = pipeline(config).analyze(&ws.project).await.unwrap_err();
    assert!(matches!(err, CovsbomError::Io { .. }));
}
