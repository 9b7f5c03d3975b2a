use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{OutputFile, Sliced, Slicer, output_path_for};
use crate::consts::{DEFAULT_LAYER_HEIGHT, DEFAULT_SLICE_TIMEOUT, DEFAULT_SLICER};
use crate::gcode::parse_slice_info;

/// Stderr bytes kept when logging a failed run.
const MAX_STDERR_LOG_BYTES: usize = 2_000;

/// Configuration for the PrusaSlicer CLI.
#[derive(Debug, Clone)]
pub struct SlicerConfig {
    pub binary: PathBuf,
    pub layer_height: f64,
    /// Kill the slicer if it runs longer than this. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_SLICER),
            layer_height: DEFAULT_LAYER_HEIGHT,
            timeout: Some(DEFAULT_SLICE_TIMEOUT),
        }
    }
}

/// Runs `prusa-slicer <model> -g --layer-height <h> -o <model>.gcode`.
pub struct PrusaSlicer {
    config: SlicerConfig,
}

impl PrusaSlicer {
    pub fn new(config: SlicerConfig) -> Self {
        Self { config }
    }

    fn command(&self, model: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.arg(model)
            .arg("-g")
            .arg("--layer-height")
            .arg(self.config.layer_height.to_string())
            .arg("-o")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn tail(stderr: &[u8]) -> String {
        let text = String::from_utf8_lossy(stderr);
        let text = text.trim_end();
        if text.len() <= MAX_STDERR_LOG_BYTES {
            return text.to_string();
        }
        let mut start = text.len() - MAX_STDERR_LOG_BYTES;
        while !text.is_char_boundary(start) {
            start += 1;
        }
        format!("...{}", &text[start..])
    }
}

#[async_trait]
impl Slicer for PrusaSlicer {
    fn name(&self) -> &str {
        "prusa-slicer"
    }

    async fn slice(&self, model: &Path) -> Result<Sliced> {
        // Guard the output from the start so a failed or killed run
        // does not leave a partial file behind.
        let output = OutputFile::new(output_path_for(model));
        let mut cmd = self.command(model, output.path());
        let run = cmd.output();

        let result = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        model = %model.display(),
                        timeout_secs = limit.as_secs_f64(),
                        "slicer timed out, killed"
                    );
                    return Ok(Sliced::failed());
                }
            },
            None => run.await,
        };

        let run = match result {
            Ok(run) => run,
            Err(e) => {
                tracing::warn!(
                    binary = %self.config.binary.display(),
                    error = %e,
                    "failed to launch slicer"
                );
                return Ok(Sliced::failed());
            }
        };

        if !run.status.success() {
            tracing::warn!(
                model = %model.display(),
                status = %run.status,
                stderr = %Self::tail(&run.stderr),
                "slicer failed"
            );
            return Ok(Sliced::failed());
        }

        tracing::debug!(output = %output.path().display(), "slicer finished");

        let gcode = tokio::fs::read_to_string(output.path())
            .await
            .with_context(|| format!("failed to read {}", output.path().display()))?;
        let result = parse_slice_info(&gcode)
            .with_context(|| format!("failed to parse {}", output.path().display()))?;

        Ok(Sliced {
            result,
            output: Some(output),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SlicerConfig::default();
        assert_eq!(config.binary, PathBuf::from("prusa-slicer"));
        assert_eq!(config.layer_height, 0.2);
        assert_eq!(config.timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn command_line_shape() {
        let slicer = PrusaSlicer::new(SlicerConfig::default());
        let cmd = slicer.command(Path::new("/tmp/a.stl"), Path::new("/tmp/a.stl.gcode"));
        let std = cmd.as_std();

        assert_eq!(std.get_program(), "prusa-slicer");
        let args: Vec<_> = std.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            ["/tmp/a.stl", "-g", "--layer-height", "0.2", "-o", "/tmp/a.stl.gcode"]
        );
    }

    #[test]
    fn tail_keeps_short_stderr() {
        assert_eq!(PrusaSlicer::tail(b"bad mesh\n"), "bad mesh");
    }

    #[test]
    fn tail_truncates_long_stderr() {
        let long = "x".repeat(MAX_STDERR_LOG_BYTES + 50);
        let tail = PrusaSlicer::tail(long.as_bytes());
        assert!(tail.starts_with("..."));
        assert_eq!(tail.len(), MAX_STDERR_LOG_BYTES + 3);
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let long = "é".repeat(MAX_STDERR_LOG_BYTES);
        let tail = PrusaSlicer::tail(long.as_bytes());
        assert!(tail.starts_with("..."));
    }
}
