use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;

/// Failures terminated at the edge. Messages are client-facing and must
/// never carry backend URLs or configuration values.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream unavailable")] UpstreamUnavailable,
    #[error("upstream timed out")] UpstreamTimeout,
    #[error("request body too large")] PayloadTooLarge,
    #[error("Invalid API path")] InvalidPath,
    #[error("Invalid request body")] InvalidBody,
    #[error("Unknown function: {0}")] UnknownFunction(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::InvalidPath | ProxyError::InvalidBody => StatusCode::BAD_REQUEST,
            ProxyError::UnknownFunction(_) => StatusCode::NOT_FOUND,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> { success: bool, error: &'a str }

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = self.to_string();
        (status, Json(ErrorBody { success: false, error: &msg })).into_response()
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::UpstreamUnavailable.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ProxyError::UpstreamTimeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ProxyError::UnknownFunction("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ProxyError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ProxyError::InvalidBody.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_body_shape() {
        let msg = ProxyError::UnknownFunction("teacher_admin".into()).to_string();
        let body = serde_json::to_value(ErrorBody { success: false, error: &msg }).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Unknown function: teacher_admin");
    }
}
