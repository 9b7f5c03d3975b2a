//! Project-wide constants.

use std::time::Duration;

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Model file suffixes the slicer is allowed to see.
pub const ALLOWED_SUFFIXES: &[&str] = &[".stl", ".obj"];

/// Multipart field carrying the model.
pub const FILE_FIELD: &str = "file";

/// Appended to the model path to name the G-code output.
pub const GCODE_SUFFIX: &str = ".gcode";

/// Default slicer executable, resolved through `PATH`.
pub const DEFAULT_SLICER: &str = "prusa-slicer";

pub const DEFAULT_LAYER_HEIGHT: f64 = 0.2;

/// Upper bound on a single slicer run before the child is killed.
pub const DEFAULT_SLICE_TIMEOUT: Duration = Duration::from_secs(600);

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// Whether `suffix` (with its leading dot) may be sliced. Case-sensitive.
pub fn is_allowed_suffix(suffix: &str) -> bool {
    ALLOWED_SUFFIXES.contains(&suffix)
}
