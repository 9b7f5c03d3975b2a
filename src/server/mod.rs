//! The `POST /slice` endpoint.
//!
//! Each request writes its upload to its own temp file, hands the path to
//! a [`Slicer`], and removes both the upload and the slicer output before
//! the response goes out. Nothing is shared between requests beyond the
//! slicer itself.

mod error;

pub use error::ApiError;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower_http::trace::TraceLayer;

use crate::consts::{FILE_FIELD, is_allowed_suffix};
use crate::slicer::{SliceResult, Slicer};

const UNSUPPORTED_SUFFIX: &str = "unsupported suffix";

/// Configuration for the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Where uploads are staged. `None` uses the system temp dir.
    pub work_dir: Option<PathBuf>,
    /// Reject request bodies larger than this. `None` accepts any size.
    pub max_upload_bytes: Option<usize>,
}

/// Body of a `POST /slice` reply.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum SliceResponse {
    Sliced {
        result: SliceResult,
        size: usize,
    },
    Rejected {
        #[serde(rename = "Error")]
        error: String,
    },
}

impl SliceResponse {
    pub fn unsupported_suffix() -> Self {
        Self::Rejected {
            error: UNSUPPORTED_SUFFIX.to_string(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    slicer: Arc<dyn Slicer>,
    config: Arc<ServerConfig>,
}

/// Build the application router.
pub fn router(slicer: Arc<dyn Slicer>, config: ServerConfig) -> Router {
    let body_limit = match config.max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/slice", post(slice_upload))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            slicer,
            config: Arc::new(config),
        })
}

async fn slice_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SliceResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(ApiError::multipart)? {
        if field.name() == Some(FILE_FIELD) {
            return slice_field(&state, field).await.map(Json);
        }
    }
    Err(ApiError::unprocessable(format!(
        "missing multipart field {:?}",
        FILE_FIELD
    )))
}

async fn slice_field(state: &AppState, field: Field<'_>) -> Result<SliceResponse, ApiError> {
    let Some(file_name) = field.file_name().map(str::to_string) else {
        return Err(ApiError::unprocessable(format!(
            "multipart field {:?} is not a file upload",
            FILE_FIELD
        )));
    };
    let suffix = suffix_of(&file_name);
    tracing::debug!(file_name = %file_name, suffix = %suffix, "upload received");

    if !is_allowed_suffix(&suffix) {
        tracing::info!(file_name = %file_name, "rejected: unsupported suffix");
        return Ok(SliceResponse::unsupported_suffix());
    }

    let body = field.bytes().await.map_err(ApiError::multipart)?;
    let size = body.len();

    // Both guards are dropped when this function returns, on every path.
    let model = stage_upload(state.config.work_dir.clone(), suffix, body).await?;
    tracing::debug!(path = %model.path().display(), size, "upload staged");

    let sliced = state.slicer.slice(model.path()).await?;
    let result = sliced.result;

    tracing::info!(
        slicer = state.slicer.name(),
        size,
        slicing_ok = result.slicing_ok,
        print_time_sec = result.print_time_sec,
        filament_used_g = result.filament_used_g,
        "slice finished"
    );

    Ok(SliceResponse::Sliced { result, size })
}

/// The final `.ext` of a file name, dot included, or `""` if there is none.
pub fn suffix_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

/// Write the upload to a fresh temp file ending in `suffix`, so the slicer
/// can tell the format from the name. The file is deleted on drop.
async fn stage_upload(dir: Option<PathBuf>, suffix: String, body: Bytes) -> Result<NamedTempFile> {
    tokio::task::spawn_blocking(move || -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("slice-").suffix(&suffix);
        let mut file = match &dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("failed to create temp file for upload")?;
        file.write_all(&body).context("failed to write upload")?;
        file.flush().context("failed to write upload")?;
        Ok(file)
    })
    .await
    .context("upload staging task failed")?
}
