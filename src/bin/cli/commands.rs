//! Command execution for the `covsbom` binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use owo_colors::OwoColorize;
use tabled::{settings::Style as TableStyle, Table, Tabled};
use tracing::info;

use covsbom_rs::build::FileTreeProvider;
use covsbom_rs::core::pipeline::{AnalysisDiagnostics, AnalysisOutcome, AnalysisPipeline};
use covsbom_rs::CovsbomConfig;

use crate::cli::args::{AnalyzeArgs, TreeArgs, ValidateConfigArgs};

/// Load a configuration file, or the defaults when none is given
pub fn load_configuration(path: Option<&Path>) -> anyhow::Result<CovsbomConfig> {
    let config = match path {
        Some(path) => CovsbomConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => CovsbomConfig::default(),
    };
    Ok(config)
}

/// Fold command-line overrides into the loaded configuration
pub fn apply_analyze_overrides(config: &mut CovsbomConfig, args: &AnalyzeArgs) {
    if let Some(out) = &args.out {
        config.output.directory = out.clone();
    }
    if let Some(depth) = args.max_depth {
        config.analysis.restrict_depth = true;
        config.analysis.max_method_call_depth = depth;
    }
    if args.no_depth_limit {
        config.analysis.restrict_depth = false;
    }
    if args.ignore_test {
        config.analysis.ignore_test = true;
    }
    if args.use_mvn_tree {
        config.maven.use_dependency_tree = true;
    }
}

fn pipeline_for(config: CovsbomConfig, dependency_tree: Option<&PathBuf>) -> AnalysisPipeline {
    let pipeline = AnalysisPipeline::new(config);
    match dependency_tree {
        Some(path) => pipeline.with_tree_provider(Arc::new(FileTreeProvider::new(path.clone()))),
        None => pipeline,
    }
}

/// Analyze a project and write reports
pub async fn analyze_command(args: AnalyzeArgs) -> anyhow::Result<()> {
    let mut config = load_configuration(args.config.as_deref())?;
    apply_analyze_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    println!(
        "{} {}",
        "Analyzing".bright_blue().bold(),
        args.project_dir.display().to_string().cyan()
    );

    let pipeline = pipeline_for(config, args.dependency_tree.as_ref());
    let outcome = pipeline
        .analyze(&args.project_dir)
        .await
        .with_context(|| format!("Analysis of {} failed", args.project_dir.display()))?;

    display_outcome(&outcome);
    Ok(())
}

/// Row type for the run summary table.
#[derive(Tabled)]
struct SummaryRow {
    metric: &'static str,
    value: String,
}

fn display_outcome(outcome: &AnalysisOutcome) {
    let summary = &outcome.reports.summary;
    let rows = vec![
        SummaryRow {
            metric: "Dependencies",
            value: format!("{} ({} with sources)", summary.dependencies, summary.acquired_dependencies),
        },
        SummaryRow {
            metric: "Files parsed",
            value: summary.files_parsed.to_string(),
        },
        SummaryRow {
            metric: "Third-party calls",
            value: summary.buffered_calls.to_string(),
        },
        SummaryRow {
            metric: "Resolved types",
            value: format!(
                "{} of {} ({:.0}%)",
                summary.resolved_types,
                summary.resolved_types + summary.unresolved_types.len(),
                outcome.resolution_ratio() * 100.0
            ),
        },
        SummaryRow {
            metric: "Declarations",
            value: format!(
                "{} ({} truncated)",
                summary.declarations, summary.truncated_expansions
            ),
        },
        SummaryRow {
            metric: "Tolerated failures",
            value: summary.diagnostics.total().to_string(),
        },
        SummaryRow {
            metric: "Elapsed",
            value: format!("{:.2?}", outcome.stats.elapsed),
        },
    ];

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    println!(
        "{} {}",
        "Reports written to".bright_green().bold(),
        outcome.paths.directory.display().to_string().cyan()
    );
}

/// Print default configuration in YAML format
pub async fn print_default_config() -> anyhow::Result<()> {
    println!("{}", "# Default covsbom configuration".dimmed());
    println!("{}", "# Usage: covsbom analyze --config your-config.yml <project>".dimmed());
    println!();

    let yaml_output = serde_yaml::to_string(&CovsbomConfig::default())?;
    println!("{}", yaml_output);
    Ok(())
}

/// Validate a configuration file
pub async fn validate_config(args: ValidateConfigArgs) -> anyhow::Result<()> {
    let config = load_configuration(Some(&args.config))?;
    config
        .validate()
        .with_context(|| format!("{} is not a valid configuration", args.config.display()))?;

    println!(
        "{} {}",
        "Configuration is valid:".bright_green().bold(),
        args.config.display().to_string().cyan()
    );
    Ok(())
}

/// Print the dependency tree
pub async fn tree_command(args: TreeArgs) -> anyhow::Result<()> {
    let mut config = load_configuration(args.config.as_deref())?;
    if args.use_mvn_tree {
        config.maven.use_dependency_tree = true;
    }

    let pipeline = pipeline_for(config, args.dependency_tree.as_ref());
    let mut diagnostics = AnalysisDiagnostics::new();
    let outcome = pipeline.build_outcome(&args.project_dir, &mut diagnostics).await?;
    info!("{} descriptor problems", diagnostics.descriptor_errors);

    if let Some(project) = &outcome.project {
        println!("{}", project.to_string().bold());
    }
    print!("{}", outcome.graph.render_tree());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_args() -> AnalyzeArgs {
        AnalyzeArgs {
            project_dir: PathBuf::from("."),
            config: None,
            out: None,
            max_depth: None,
            no_depth_limit: false,
            ignore_test: false,
            dependency_tree: None,
            use_mvn_tree: false,
        }
    }

    #[test]
    fn overrides_apply_to_configuration() {
        let mut config = CovsbomConfig::default();
        let mut args = analyze_args();
        args.out = Some(PathBuf::from("reports"));
        args.max_depth = Some(5);
        args.ignore_test = true;
        args.use_mvn_tree = true;

        apply_analyze_overrides(&mut config, &args);
        assert_eq!(config.output.directory, PathBuf::from("reports"));
        assert_eq!(config.analysis.depth_limit(), Some(5));
        assert!(config.analysis.ignore_test);
        assert!(config.maven.use_dependency_tree);
    }

    #[test]
    fn no_depth_limit_lifts_the_bound() {
        let mut config = CovsbomConfig::default();
        let mut args = analyze_args();
        args.no_depth_limit = true;
        apply_analyze_overrides(&mut config, &args);
        assert_eq!(config.analysis.depth_limit(), None);
    }
}
