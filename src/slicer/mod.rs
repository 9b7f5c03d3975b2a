pub mod mock;
pub mod prusa;

use anyhow::Result;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

/// Summary of one slicing attempt.
///
/// The default value is the failure value: not ok, every metric zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct SliceResult {
    pub slicing_ok: bool,
    pub print_time_sec: u64,
    pub filament_used_g: f64,
    pub filament_used_mm: f64,
}

impl SliceResult {
    pub fn failed() -> Self {
        Self::default()
    }
}

/// A G-code file on disk, deleted when the handle is dropped.
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
}

impl OutputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed slicer output"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove slicer output")
            }
        }
    }
}

/// What a slicer hands back: the metrics, plus the output file when the
/// run succeeded. The caller owns the output and removes it by dropping it.
#[derive(Debug)]
pub struct Sliced {
    pub result: SliceResult,
    pub output: Option<OutputFile>,
}

impl Sliced {
    pub fn failed() -> Self {
        Self {
            result: SliceResult::failed(),
            output: None,
        }
    }
}

/// Turns a model file into G-code and reports what it would take to print.
///
/// A tool that fails to run is not an error: it yields [`Sliced::failed`].
/// Errors are reserved for output that was produced but cannot be read.
#[async_trait]
pub trait Slicer: Send + Sync {
    fn name(&self) -> &str;
    async fn slice(&self, model: &Path) -> Result<Sliced>;
}

/// `<model>.gcode`, next to the model.
pub fn output_path_for(model: &Path) -> PathBuf {
    let mut path = model.as_os_str().to_owned();
    path.push(crate::consts::GCODE_SUFFIX);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zeroed_failure() {
        let r = SliceResult::default();
        assert!(!r.slicing_ok);
        assert_eq!(r.print_time_sec, 0);
        assert_eq!(r.filament_used_g, 0.0);
        assert_eq!(r.filament_used_mm, 0.0);
        assert_eq!(r, SliceResult::failed());
    }

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_value(SliceResult::failed()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "slicing_ok": false,
                "print_time_sec": 0,
                "filament_used_g": 0.0,
                "filament_used_mm": 0.0,
            })
        );
    }

    #[test]
    fn output_path_appends_suffix() {
        let out = output_path_for(Path::new("/tmp/slice-abc.stl"));
        assert_eq!(out, PathBuf::from("/tmp/slice-abc.stl.gcode"));
    }

    #[test]
    fn output_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.stl.gcode");
        std::fs::write(&path, "G28\n").unwrap();

        let output = OutputFile::new(&path);
        assert_eq!(output.path(), path);
        drop(output);

        assert!(!path.exists());
    }

    #[test]
    fn output_file_drop_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        drop(OutputFile::new(dir.path().join("never-written.gcode")));
    }

    #[test]
    fn failed_sliced_has_no_output() {
        let sliced = Sliced::failed();
        assert!(sliced.output.is_none());
        assert_eq!(sliced.result, SliceResult::default());
    }
}
