use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A request that could not be answered with a slicing result.
///
/// Rendered as `{"detail": "..."}` with the carried status. Anything
/// converted through `?` is an internal error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: anyhow::Error,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            anyhow::anyhow!(message.into()),
        )
    }

    /// Keeps the status axum assigns (400 for a broken body, 413 when the
    /// upload limit is hit).
    pub fn multipart(error: MultipartError) -> Self {
        Self::new(error.status(), anyhow::anyhow!(error.body_text()))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!("{:#}", self.error);
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "{}", detail);
        } else {
            tracing::warn!(status = %self.status, "{}", detail);
        }
        (self.status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_mark_is_internal() {
        let err: ApiError = anyhow::anyhow!("boom").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unprocessable_status() {
        let err = ApiError::unprocessable("missing field");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn response_carries_status() {
        let response = ApiError::unprocessable("missing field").into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
