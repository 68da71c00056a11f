use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fairdraw_core::CoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("job not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("job not completed yet")]
    NotCompleted,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotCompleted => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Rejections of caller input map to 400; anything else is a server fault.
impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfig(_)
            | CoreError::EmptyInput
            | CoreError::InvalidSample { .. }
            | CoreError::Bits(_) => Self::BadRequest(err.to_string()),
            CoreError::WhiteningStalled { .. } | CoreError::NoEntropy => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if let Self::Internal(msg) = &self {
            log::error!("{msg}");
        }
        (self.status(), Json(json!({"detail": self.to_string()}))).into_response()
    }
}
