use annotator_common::protocol::{
    ErrorResponse, FailureEnvelope, FlaggedErrorResponse, Operation,
};
use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::service::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed body, missing field, undecodable image, or a referenced path
    /// that does not exist.
    InvalidInput,
    /// Request body over the configured limit.
    PayloadTooLarge,
    /// Filesystem failure while serving an otherwise valid request.
    Io,
    Internal,
}

impl ErrorKind {
    pub const fn status(self) -> StatusCode {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Io | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A failed operation, rendered in that operation's error envelope.
#[derive(Debug, Clone)]
pub struct ApiError {
    operation: Operation,
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(operation: Operation, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { operation, kind, message: message.into() }
    }

    pub fn from_service(operation: Operation, error: ServiceError) -> Self {
        let kind = match &error {
            ServiceError::InvalidInput(_) | ServiceError::Missing(_) | ServiceError::Image(_) => {
                ErrorKind::InvalidInput
            }
            ServiceError::Store(_) | ServiceError::SourceRead { .. } => ErrorKind::Io,
        };
        Self::new(operation, kind, error.to_string())
    }

    /// The body could not be read, usually because it exceeds the limit.
    pub fn from_rejection(operation: Operation, rejection: BytesRejection) -> Self {
        let kind = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ErrorKind::PayloadTooLarge
        } else {
            ErrorKind::InvalidInput
        };
        Self::new(operation, kind, rejection.body_text())
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        if status.is_server_error() {
            error!(operation = %self.operation, error = %self.message, "operation failed");
        } else {
            warn!(operation = %self.operation, error = %self.message, "operation rejected");
        }

        match self.operation.failure_envelope() {
            FailureEnvelope::Bare => {
                (status, Json(ErrorResponse { error: self.message })).into_response()
            }
            FailureEnvelope::Flagged => {
                (status, Json(FlaggedErrorResponse { success: false, error: self.message }))
                    .into_response()
            }
        }
    }
}
