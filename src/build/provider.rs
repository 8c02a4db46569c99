//! Build Tree Provider: obtains an evaluated dependency tree from the build tool.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::core::config::MavenConfig;
use crate::core::errors::{CovsbomError, Result};

static OUTPUT_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Source of `dependency:tree` style text for a descriptor.
#[async_trait]
pub trait BuildTreeProvider: Send + Sync {
    /// Evaluated dependency tree for the descriptor at `descriptor`
    async fn dependency_tree(&self, descriptor: &Path) -> Result<String>;

    /// Resolved classpath listing, when the provider can produce one
    async fn classpath(&self, _descriptor: &Path) -> Result<Option<String>> {
        Ok(None)
    }

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// Runs Maven's dependency plugin.
#[derive(Debug, Clone)]
pub struct MavenTreeProvider {
    executable: String,
    timeout: Duration,
}

impl MavenTreeProvider {
    /// Create a provider from the `maven` configuration section
    pub fn new(config: &MavenConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    fn scratch_file(kind: &str) -> PathBuf {
        let n = OUTPUT_COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("covsbom-{}-{}-{}.txt", kind, std::process::id(), n))
    }

    /// Run a plugin goal that writes its result to a file and return the file contents
    async fn run_goal(&self, descriptor: &Path, goal: &str, output_property: &str) -> Result<String> {
        let output_file = Self::scratch_file(goal.rsplit(':').next().unwrap_or("goal"));
        let mut command = Command::new(&self.executable);
        command
            .arg("-q")
            .arg("-f")
            .arg(descriptor)
            .arg(goal)
            .arg(format!("-D{}={}", output_property, output_file.display()))
            .arg("-DappendOutput=true")
            .kill_on_drop(true);

        debug!("Running {} {} for {}", self.executable, goal, descriptor.display());
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                CovsbomError::pipeline(
                    "build-tree",
                    format!("{} timed out after {:?}", goal, self.timeout),
                )
            })?
            .map_err(|e| CovsbomError::io(format!("Failed to run {}", self.executable), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let _ = tokio::fs::remove_file(&output_file).await;
            return Err(CovsbomError::pipeline(
                "build-tree",
                format!("{} exited with {}: {}", goal, output.status, stderr.trim()),
            ));
        }

        let text = tokio::fs::read_to_string(&output_file)
            .await
            .map_err(|e| CovsbomError::io("Failed to read build tool output", e))?;
        let _ = tokio::fs::remove_file(&output_file).await;
        Ok(text)
    }
}

#[async_trait]
impl BuildTreeProvider for MavenTreeProvider {
    async fn dependency_tree(&self, descriptor: &Path) -> Result<String> {
        let text = self
            .run_goal(descriptor, "dependency:tree", "outputFile")
            .await?;
        info!("Maven reported {} tree line(s)", text.lines().count());
        Ok(text)
    }

    async fn classpath(&self, descriptor: &Path) -> Result<Option<String>> {
        self.run_goal(descriptor, "dependency:build-classpath", "mdep.outputFile")
            .await
            .map(Some)
    }

    fn name(&self) -> &str {
        "maven"
    }
}

/// Reads a previously captured tree listing from disk.
#[derive(Debug, Clone)]
pub struct FileTreeProvider {
    path: PathBuf,
}

impl FileTreeProvider {
    /// Provider backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BuildTreeProvider for FileTreeProvider {
    async fn dependency_tree(&self, _descriptor: &Path) -> Result<String> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CovsbomError::io(
                format!("Failed to read dependency tree {}", self.path.display()),
                e,
            )
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_provider_returns_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tree.txt");
        std::fs::write(&path, "com.acme:app:jar:1.0\n").unwrap();

        let provider = FileTreeProvider::new(&path);
        let text = provider.dependency_tree(Path::new("pom.xml")).await.unwrap();
        assert_eq!(text, "com.acme:app:jar:1.0\n");
        assert_eq!(provider.classpath(Path::new("pom.xml")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_provider_missing_file_is_io_error() {
        let provider = FileTreeProvider::new("/nonexistent/covsbom/tree.txt");
        let err = provider.dependency_tree(Path::new("pom.xml")).await.unwrap_err();
        assert!(matches!(err, CovsbomError::Io { .. }));
    }

    #[tokio::test]
    async fn missing_executable_is_reported() {
        let config = MavenConfig {
            executable: "covsbom-no-such-mvn".to_string(),
            ..MavenConfig::default()
        };
        let provider = MavenTreeProvider::new(&config);
        assert!(provider.dependency_tree(Path::new("pom.xml")).await.is_err());
    }
}
