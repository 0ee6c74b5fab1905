//! Webhook errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cluster_store::StoreError;
use hco_operator::ControllerError;
use std::time::Duration;

/// Error type for webhook operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The admission review was malformed or carried no request
    #[error("invalid admission review: {0}")]
    InvalidReview(String),

    /// The request violates a rule enforced at admission time
    #[error("{0}")]
    Denied(String),

    /// A downstream object could not be rendered from the HyperConverged spec
    #[error(transparent)]
    Build(#[from] ControllerError),

    /// The API server (or a downstream webhook) refused a dry-run call
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The dry-run fan-out did not finish in time
    #[error("dry-run validation did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TLS material could not be loaded
    #[error("TLS config error: {0}")]
    Tls(String),

    /// The HTTPS listener failed
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidReview(_) | WebhookError::Serialization(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}
