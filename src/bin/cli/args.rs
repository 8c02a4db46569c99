//! CLI Argument Structures
//!
//! Command and argument definitions for the `covsbom` binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Attribute a Maven project's third-party calls to dependency artifacts
#[derive(Parser)]
#[command(name = "covsbom")]
#[command(version = VERSION)]
#[command(about = "Attribute third-party call sites to the dependencies that declare them")]
#[command(long_about = "
Reads a Maven project's pom.xml files, obtains sources for each dependency
(decompiled or from -sources archives), and reports which dependency declares
each type the project calls into.

Common Usage:

  # Analyze a project with default settings
  covsbom analyze ./my-service

  # Use the evaluated dependency tree from mvn, including transitive dependencies
  covsbom analyze --use-mvn-tree ./my-service

  # Feed a previously saved `mvn dependency:tree` output
  covsbom analyze --dependency-tree tree.txt ./my-service

  # Follow inner calls without a depth bound
  covsbom analyze --no-depth-limit ./my-service

  # Show the dependency tree only
  covsbom tree ./my-service
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a project and write call attribution reports
    Analyze(Box<AnalyzeArgs>),

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Validate a covsbom configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),

    /// Print the project's dependency tree
    Tree(TreeArgs),
}

/// Arguments for `analyze`
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Project directory holding the root pom.xml
    pub project_dir: PathBuf,

    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base output directory; reports go to <out>/<project name>/
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Maximum inner-call expansion depth
    #[arg(long, conflicts_with = "no_depth_limit")]
    pub max_depth: Option<usize>,

    /// Expand inner calls until every reachable declaration is visited
    #[arg(long)]
    pub no_depth_limit: bool,

    /// Skip files under src/test
    #[arg(long)]
    pub ignore_test: bool,

    /// Read the dependency tree from a saved `mvn dependency:tree` output
    #[arg(long, value_name = "FILE", conflicts_with = "use_mvn_tree")]
    pub dependency_tree: Option<PathBuf>,

    /// Run `mvn dependency:tree` instead of reading pom.xml files directly
    #[arg(long)]
    pub use_mvn_tree: bool,
}

/// Arguments for `validate-config`
#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Configuration file to validate
    pub config: PathBuf,
}

/// Arguments for `tree`
#[derive(Args)]
pub struct TreeArgs {
    /// Project directory holding the root pom.xml
    pub project_dir: PathBuf,

    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Read the dependency tree from a saved `mvn dependency:tree` output
    #[arg(long, value_name = "FILE", conflicts_with = "use_mvn_tree")]
    pub dependency_tree: Option<PathBuf>,

    /// Run `mvn dependency:tree` instead of reading pom.xml files directly
    #[arg(long)]
    pub use_mvn_tree: bool,
}
