//! Decompiler collaborator: an out-of-process tool that turns a compiled
//! archive into approximate source text.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::core::config::{AcquisitionConfig, ARCHIVE_PLACEHOLDER, OUTPUT_PLACEHOLDER};
use crate::core::errors::{CovsbomError, Result};

/// Produces source files for a compiled archive.
#[async_trait]
pub trait Decompiler: Send + Sync {
    /// Decompile `archive` into `output`. Failure affects this archive only.
    async fn decompile(&self, archive: &Path, output: &Path) -> Result<()>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Runs a configured command line, e.g. `java -jar cfr.jar {archive} --outputdir {output}`.
#[derive(Debug, Clone)]
pub struct CommandDecompiler {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandDecompiler {
    /// Create a decompiler from an argv template
    pub fn new(argv: Vec<String>, timeout: Duration) -> Result<Self> {
        if argv.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(CovsbomError::config_field(
                "decompiler command is empty",
                "decompiler_command",
            ));
        }
        Ok(Self { argv, timeout })
    }

    /// Create a decompiler from the `acquisition` configuration section
    pub fn from_config(config: &AcquisitionConfig) -> Result<Self> {
        Self::new(
            config.decompiler_command.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    /// The argv with placeholders substituted
    pub fn command_line(&self, archive: &Path, output: &Path) -> Vec<String> {
        let archive = archive.to_string_lossy();
        let output = output.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| {
                arg.replace(ARCHIVE_PLACEHOLDER, &archive)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

#[async_trait]
impl Decompiler for CommandDecompiler {
    async fn decompile(&self, archive: &Path, output: &Path) -> Result<()> {
        let argv = self.command_line(archive, output);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| CovsbomError::internal("empty decompiler argv"))?;
        let subject = archive.display().to_string();

        debug!("Decompiling {} with {}", subject, program);
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let result = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                CovsbomError::acquisition(
                    subject.clone(),
                    format!("decompiler timed out after {:?}", self.timeout),
                )
            })?
            .map_err(|e| {
                CovsbomError::acquisition(subject.clone(), format!("cannot run {program}: {e}"))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(CovsbomError::acquisition(
                subject,
                format!("decompiler exited with {}: {}", result.status, stderr.trim()),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("decompiler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn placeholders_are_substituted() {
        let decompiler = CommandDecompiler::new(
            argv(&["java", "-jar", "cfr.jar", "{archive}", "--outputdir", "{output}"]),
            Duration::from_secs(5),
        )
        .unwrap();
        let line = decompiler.command_line(Path::new("/r/w-1.0.jar"), Path::new("/out/org.w.w"));
        assert_eq!(
            line,
            argv(&["java", "-jar", "cfr.jar", "/r/w-1.0.jar", "--outputdir", "/out/org.w.w"])
        );
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandDecompiler::new(Vec::new(), Duration::from_secs(1)).is_err());
        assert!(CommandDecompiler::new(argv(&[" "]), Duration::from_secs(1)).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_acquisition_error() {
        let decompiler =
            CommandDecompiler::new(argv(&["sh", "-c", "exit 3"]), Duration::from_secs(5)).unwrap();
        let err = decompiler
            .decompile(Path::new("a.jar"), Path::new("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, CovsbomError::Acquisition { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_is_acquisition_error() {
        let decompiler =
            CommandDecompiler::new(argv(&["sleep", "5"]), Duration::from_millis(50)).unwrap();
        let err = decompiler
            .decompile(Path::new("a.jar"), Path::new("out"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_command_writes_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let decompiler = CommandDecompiler::new(
            argv(&["sh", "-c", "mkdir -p \"$0/org\" && touch \"$0/org/A.java\"", "{output}"]),
            Duration::from_secs(5),
        )
        .unwrap();
        decompiler
            .decompile(Path::new("a.jar"), dir.path())
            .await
            .unwrap();
        assert!(dir.path().join("org/A.java").exists());
    }
}
