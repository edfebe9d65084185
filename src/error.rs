use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::db::StoreError;
use crate::ffmpeg::{ProbeError, RemuxError};
use crate::models::ErrorResponse;
use crate::storage::StorageError;

/// Every way a request can fail, mapped to one HTTP status each.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}: {source}")]
    Auth {
        message: &'static str,
        #[source]
        source: AuthError,
    },
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("remux failed: {0}")]
    Remux(#[from] RemuxError),
    #[error("{context}: {source}")]
    Scratch {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("record store: {0}")]
    Persistence(#[from] StoreError),
}

impl ApiError {
    pub fn auth(message: &'static str, source: AuthError) -> Self {
        ApiError::Auth { message, source }
    }

    pub fn scratch(context: &'static str, source: std::io::Error) -> Self {
        ApiError::Scratch { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Probe(_)
            | ApiError::Remux(_)
            | ApiError::Scratch { .. }
            | ApiError::Storage(_)
            | ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable kind, stable across message changes.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Auth { .. } => "auth_error",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Validation(_) | ApiError::PayloadTooLarge(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Probe(_) | ApiError::Remux(_) | ApiError::Scratch { .. } => "processing_error",
            ApiError::Storage(_) => "storage_error",
            ApiError::Persistence(_) => "persistence_error",
        }
    }

    /// What the client is told. Server-side failures never echo internal detail.
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Auth { message, .. } => message.to_string(),
            ApiError::Forbidden(message) | ApiError::NotFound(message) => message.to_string(),
            ApiError::Validation(message) | ApiError::PayloadTooLarge(message) => message.clone(),
            ApiError::Probe(_) => "Couldn't determine the video's aspect ratio".to_string(),
            ApiError::Remux(_) => "Couldn't process the video for fast start".to_string(),
            ApiError::Scratch { .. } => "Couldn't buffer the upload".to_string(),
            ApiError::Storage(_) => "Couldn't store the asset".to_string(),
            ApiError::Persistence(_) => "Couldn't update the video".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "request failed");
        } else {
            warn!(error = %self, code = self.code(), "request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.client_message(),
                code: self.code(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::auth("Couldn't find JWT", AuthError::MissingHeader).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden("nope").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Validation("bad".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::PayloadTooLarge("big".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ApiError::NotFound("gone").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(RemuxError::EmptyOutput).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::from(ProbeError::NoStreams).code(), "processing_error");
        let persistence = ApiError::from(StoreError::Unavailable("pool timed out".into()));
        assert_eq!(persistence.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(persistence.code(), "persistence_error");
        assert!(!persistence.client_message().contains("pool"));
    }

    #[test]
    fn server_errors_hide_detail() {
        let err = ApiError::from(StorageError::UploadFailed(
            "AccessDenied: arn:aws:iam::123456789012".to_string(),
        ));
        assert_eq!(err.client_message(), "Couldn't store the asset");
        assert!(err.to_string().contains("AccessDenied"));
    }
}
