//! Configuration types and management for covsbom-rs.
//!
//! A [`CovsbomConfig`] value is built once (defaults, YAML file, then CLI
//! overrides) and handed to the pipeline explicitly. No stage reads settings
//! from ambient state, so two runs with different settings never interfere.

pub mod validation;


use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{CovsbomError, Result};

pub use validation::{
    validate_bounded_usize, validate_non_empty, validate_path_set, validate_positive_u64,
    validate_positive_usize,
};

/// Placeholder substituted with the compiled archive path in decompiler commands.
pub const ARCHIVE_PLACEHOLDER: &str = "{archive}";

/// Placeholder substituted with the per-dependency output directory.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Main configuration for a covsbom analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CovsbomConfig {
    /// Call extraction and expansion settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Source acquisition settings
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Build tool integration settings
    #[serde(default)]
    pub maven: MavenConfig,

    /// Report output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Configuration construction and I/O methods for [`CovsbomConfig`].
impl CovsbomConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CovsbomError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            CovsbomError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.acquisition.validate()?;
        self.maven.validate()?;
        self.output.validate()?;
        Ok(())
    }
}

/// Call extraction and inner-call expansion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum number of inner-call expansion levels
    #[serde(default = "AnalysisConfig::default_max_method_call_depth")]
    pub max_method_call_depth: usize,

    /// Whether `max_method_call_depth` is enforced
    #[serde(default = "AnalysisConfig::default_restrict_depth")]
    pub restrict_depth: bool,

    /// Skip test-scoped project sources during extraction
    #[serde(default)]
    pub ignore_test: bool,

    /// Scan package directories for type declarations when path probing fails
    #[serde(default)]
    pub deep_type_search: bool,

    /// Require a source root to be named exactly `groupId.artifactId-version`
    #[serde(default)]
    pub strict_coordinate_matching: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_method_call_depth: Self::default_max_method_call_depth(),
            restrict_depth: Self::default_restrict_depth(),
            ignore_test: false,
            deep_type_search: false,
            strict_coordinate_matching: false,
        }
    }
}

impl AnalysisConfig {
    const fn default_max_method_call_depth() -> usize {
        2
    }

    const fn default_restrict_depth() -> bool {
        true
    }

    /// Validate analysis settings
    pub fn validate(&self) -> Result<()> {
        if self.restrict_depth {
            validate_bounded_usize(self.max_method_call_depth, 0, 64, "max_method_call_depth")?;
        }
        Ok(())
    }

    /// Effective depth bound, `None` when unrestricted
    pub fn depth_limit(&self) -> Option<usize> {
        self.restrict_depth.then_some(self.max_method_call_depth)
    }
}

/// How sources are obtained for each dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStrategy {
    /// Always run the decompiler over the compiled archive
    Decompile,
    /// Only unpack published source archives
    SourceArchive,
    /// Unpack a source archive when present, otherwise decompile
    PreferSourceArchive,
}

impl Default for SourceStrategy {
    fn default() -> Self {
        Self::PreferSourceArchive
    }
}

/// Source acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Strategy used per dependency
    #[serde(default)]
    pub strategy: SourceStrategy,

    /// Decompiler argv with `{archive}` and `{output}` placeholders
    #[serde(default = "AcquisitionConfig::default_decompiler_command")]
    pub decompiler_command: Vec<String>,

    /// Directory holding one source root per dependency
    #[serde(default = "AcquisitionConfig::default_work_dir")]
    pub work_dir: PathBuf,

    /// Maximum concurrent acquisitions
    #[serde(default = "AcquisitionConfig::default_pool_size")]
    pub pool_size: usize,

    /// Per-dependency timeout for the decompiler process
    #[serde(default = "AcquisitionConfig::default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Remove `META-INF` from unpacked source roots
    #[serde(default = "AcquisitionConfig::default_strip_meta_inf")]
    pub strip_meta_inf: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            strategy: SourceStrategy::default(),
            decompiler_command: Self::default_decompiler_command(),
            work_dir: Self::default_work_dir(),
            pool_size: Self::default_pool_size(),
            timeout_seconds: Self::default_timeout_seconds(),
            strip_meta_inf: Self::default_strip_meta_inf(),
        }
    }
}

impl AcquisitionConfig {
    fn default_decompiler_command() -> Vec<String> {
        [
            "java",
            "-jar",
            "cfr.jar",
            ARCHIVE_PLACEHOLDER,
            "--outputdir",
            OUTPUT_PLACEHOLDER,
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
    }

    fn default_work_dir() -> PathBuf {
        PathBuf::from("covsbom_output/decompressed")
    }

    const fn default_pool_size() -> usize {
        4
    }

    const fn default_timeout_seconds() -> u64 {
        300
    }

    const fn default_strip_meta_inf() -> bool {
        true
    }

    /// Validate acquisition settings
    pub fn validate(&self) -> Result<()> {
        validate_positive_usize(self.pool_size, "pool_size")?;
        validate_positive_u64(self.timeout_seconds, "timeout_seconds")?;
        validate_path_set(&self.work_dir, "work_dir")?;

        if self.strategy != SourceStrategy::SourceArchive {
            let Some(program) = self.decompiler_command.first() else {
                return Err(CovsbomError::validation_field(
                    "decompiler_command must name a program",
                    "decompiler_command",
                ));
            };
            validate_non_empty(program, "decompiler_command")?;

            if !self
                .decompiler_command
                .iter()
                .any(|arg| arg.contains(ARCHIVE_PLACEHOLDER))
            {
                return Err(CovsbomError::validation_field(
                    format!("decompiler_command must reference {ARCHIVE_PLACEHOLDER}"),
                    "decompiler_command",
                ));
            }
        }
        Ok(())
    }
}

/// Build tool integration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MavenConfig {
    /// Build tool executable
    #[serde(default = "MavenConfig::default_executable")]
    pub executable: String,

    /// Local artifact cache; `~/.m2/repository` when unset
    #[serde(default)]
    pub local_repository: Option<PathBuf>,

    /// Timeout for build tool invocations
    #[serde(default = "MavenConfig::default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Ingest the evaluated dependency tree instead of scanning descriptors
    #[serde(default)]
    pub use_dependency_tree: bool,
}

impl Default for MavenConfig {
    fn default() -> Self {
        Self {
            executable: Self::default_executable(),
            local_repository: None,
            timeout_seconds: Self::default_timeout_seconds(),
            use_dependency_tree: false,
        }
    }
}

impl MavenConfig {
    fn default_executable() -> String {
        "mvn".to_string()
    }

    const fn default_timeout_seconds() -> u64 {
        600
    }

    /// Validate build tool settings
    pub fn validate(&self) -> Result<()> {
        validate_non_empty(&self.executable, "executable")?;
        validate_positive_u64(self.timeout_seconds, "maven.timeout_seconds")?;
        Ok(())
    }

    /// Resolve the local artifact cache directory
    pub fn resolved_local_repository(&self) -> Result<PathBuf> {
        if let Some(path) = &self.local_repository {
            return Ok(path.clone());
        }

        dirs::home_dir()
            .map(|home| home.join(".m2").join("repository"))
            .ok_or_else(|| {
                CovsbomError::config_field(
                    "cannot determine home directory for the local repository",
                    "local_repository",
                )
            })
    }
}

/// Report output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base directory; reports go to `<directory>/<project name>/`
    #[serde(default = "OutputConfig::default_directory")]
    pub directory: PathBuf,

    /// Render located declarations into report records
    #[serde(default = "OutputConfig::default_include_declarations")]
    pub include_declarations: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
            include_declarations: Self::default_include_declarations(),
        }
    }
}

impl OutputConfig {
    fn default_directory() -> PathBuf {
        PathBuf::from("covsbom_output/analysis")
    }

    const fn default_include_declarations() -> bool {
        true
    }

    /// Validate output settings
    pub fn validate(&self) -> Result<()> {
        validate_path_set(&self.directory, "output.directory")
    }
}
