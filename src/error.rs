use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::any::Any;

use crate::models::ErrorBody;

/// The four failure kinds surfaced to HTTP clients. Each carries the
/// description echoed in the `error` field of the response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    NotFound(String),
    Internal(String),
    Unauthorized(String),
    Forbidden(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Fixed summary placed in the `message` field.
    pub fn message(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "Resource not found",
            ApiError::Internal(_) => "Internal server error",
            ApiError::Unauthorized(_) => "Unauthorized access",
            ApiError::Forbidden(_) => "Forbidden access",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ApiError::NotFound(detail)
            | ApiError::Internal(detail)
            | ApiError::Unauthorized(detail)
            | ApiError::Forbidden(detail) => detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message().to_string(),
            error: self.to_string(),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = self.status().canonical_reason().unwrap_or("Error");
        write!(f, "{} {}: {}", self.status().as_u16(), reason, self.detail())
    }
}

impl std::error::Error for ApiError {}

/// Turn a handler panic into the 500 envelope. The panic payload is only
/// echoed when debug is on.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>, debug: bool) -> Response {
    let detail = if debug {
        if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "handler panicked".to_string()
        }
    } else {
        "The server encountered an internal error and was unable to complete your request"
            .to_string()
    };

    log::error!("request handler panicked: {}", detail);
    ApiError::Internal(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn envelope(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn test_not_found_envelope() {
        let (status, body) = envelope(ApiError::NotFound("no such book".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Resource not found");
        assert_eq!(body["error"], "404 Not Found: no such book");
    }

    #[tokio::test]
    async fn test_internal_error_envelope() {
        let (status, body) = envelope(ApiError::Internal("pool closed".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert!(body["error"].as_str().unwrap().contains("pool closed"));
    }

    #[tokio::test]
    async fn test_unauthorized_envelope() {
        let (status, body) = envelope(ApiError::Unauthorized("token expired".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized access");
        assert_eq!(body.as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_forbidden_envelope() {
        let (status, body) = envelope(ApiError::Forbidden("librarian role required".to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Forbidden access");
        assert_eq!(body["error"], "403 Forbidden: librarian role required");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ApiError::Unauthorized("missing bearer token".to_string()).to_string(),
            "401 Unauthorized: missing bearer token"
        );
    }

    #[tokio::test]
    async fn test_panic_payload_hidden_without_debug() {
        let response = panic_response(Box::new("index out of bounds"), false);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(!body["error"].as_str().unwrap().contains("index out of bounds"));

        let response = panic_response(Box::new(String::from("index out of bounds")), true);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].as_str().unwrap().contains("index out of bounds"));
    }
}
