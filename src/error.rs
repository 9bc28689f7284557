use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::db::RepoError;
use crate::outcome::Outcome;

/// Failures a handler does not recover from itself.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("login required")]
    Unauthenticated,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => AppError::NotFound("record"),
            other => AppError::Internal(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "view": "error_404",
                    "flash": [],
                    "error": format!("{} not found", what),
                })),
            )
                .into_response(),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "view": "error_400", "flash": [], "error": msg })),
            )
                .into_response(),
            AppError::Unauthenticated => {
                Outcome::redirect_with("/login", "Please log in to access this page.")
                    .into_response()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %format!("{:#}", e), "unhandled server error");
                server_error()
            }
        }
    }
}

/// The `error_500` view; the cause is logged, never sent.
pub fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "view": "error_500", "flash": [], "error": "internal server error" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn status_mapping() {
        assert_eq!(
            AppError::NotFound("post").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let res = AppError::Unauthenticated.into_response();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn repo_not_found_maps_to_404() {
        let err: AppError = RepoError::NotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
        let err: AppError = RepoError::DuplicateEmail.into();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
