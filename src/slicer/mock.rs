use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{OutputFile, Sliced, Slicer, output_path_for};
use crate::gcode::parse_slice_info;

/// How a [`MockSlicer`] run ends.
#[derive(Debug, Clone)]
pub enum MockRun {
    /// Exit cleanly, leaving this G-code next to the model.
    Gcode(String),
    /// Exit with a failure status.
    Fail,
}

/// A scripted slicer for tests. Behaves like a real slicer on disk
/// (writes `<model>.gcode` and hands it over) without spawning anything.
pub struct MockSlicer {
    run: MockRun,
    count: AtomicUsize,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockSlicer {
    pub fn new(run: MockRun) -> Self {
        Self {
            run,
            count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Model paths this slicer was asked to slice, in order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.recorded().clone()
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    // A panicking test thread must not hide the calls from the others.
    fn recorded(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Slicer for MockSlicer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn slice(&self, model: &Path) -> Result<Sliced> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.recorded().push(model.to_path_buf());

        match &self.run {
            MockRun::Fail => Ok(Sliced::failed()),
            MockRun::Gcode(gcode) => {
                let output = OutputFile::new(output_path_for(model));
                tokio::fs::write(output.path(), gcode)
                    .await
                    .context("MockSlicer: failed to write output")?;
                let result = parse_slice_info(gcode)?;
                Ok(Sliced {
                    result,
                    output: Some(output),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_each_call() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("part.stl");
        let slicer = MockSlicer::new(MockRun::Fail);

        assert_eq!(slicer.call_count(), 0);
        slicer.slice(&model).await.unwrap();
        slicer.slice(&model).await.unwrap();

        assert_eq!(slicer.call_count(), 2);
        assert_eq!(slicer.calls(), vec![model.clone(), model]);
    }

    #[tokio::test]
    async fn gcode_run_hands_over_output() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("part.stl");
        let slicer = MockSlicer::new(MockRun::Gcode("; total filament used [g] = 3.5\n".to_string()));

        let sliced = slicer.slice(&model).await.unwrap();

        assert_eq!(sliced.result.filament_used_g, 3.5);
        let output = sliced.output.unwrap();
        assert!(output.path().exists());
    }
}
