use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::errors::GradingError;
use crate::services::pipeline::PipelineError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    /// Credentials for an upstream service are missing or unusable.
    ServiceUnavailable(String),
    /// The upstream service failed or could not be reached.
    BadGateway(String),
    Internal(String),
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        Self::classify(&err, err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::classify(err.cause(), err.to_string())
    }
}

impl ApiError {
    fn classify(cause: &GradingError, detail: String) -> Self {
        match cause {
            GradingError::InvalidInput(_) => Self::BadRequest(detail),
            GradingError::Configuration(_) => Self::ServiceUnavailable(detail),
            GradingError::Service(_) | GradingError::Transient(_) => Self::BadGateway(detail),
            GradingError::Parse(_) => Self::Internal(detail),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            Self::BadRequest(message) => message,
            Self::ServiceUnavailable(message)
            | Self::BadGateway(message)
            | Self::Internal(message) => {
                tracing::error!(status = status.as_u16(), error = %message, "Request failed");
                message
            }
        };

        (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
    }
}
