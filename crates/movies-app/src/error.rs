use axum::response::{IntoResponse, Response};
use http::StatusCode;
use tracing::error;

use crate::validate::ValidationProblem;

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Record not found")]
    NotFound,

    #[error("Invalid request: {0}")]
    InvalidRequest(ValidationProblem),

    #[error("Unprocessable request: {0}")]
    UnprocessableRequest(ValidationProblem),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] movies_dal::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound | ApiError::DatabaseError(movies_dal::Error::RecordNotFound(_)) => {
                StatusCode::NOT_FOUND.into_response()
            }
            ApiError::InvalidRequest(problem) => {
                problem.with_status(StatusCode::BAD_REQUEST).into_response()
            }
            ApiError::UnprocessableRequest(problem) => {
                problem.with_status(StatusCode::UNPROCESSABLE_ENTITY).into_response()
            }
            ApiError::InvalidQuery(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::DatabaseError(e) => {
                error!("Database error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            ApiError::InvalidUrl(e) => {
                error!("Cannot build URL: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
