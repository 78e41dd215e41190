//! HTTP error responses.
//!
//! Every failure leaves the server as `{"code", "message", "reason"?}` with a
//! status derived from the engine's [`ErrorKind`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use tix_core::{DenyReason, EngineError, ErrorKind};

/// Error type returned by every handler.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    /// Caller-facing class, e.g. `not_found`.
    code: &'static str,
    message: String,
    reason: Option<DenyReason>,
    /// Logged on 5xx, never sent to the client.
    source: Option<anyhow::Error>,
}

impl AppError {
    #[must_use]
    pub const fn new(status: StatusCode, code: &'static str, message: String) -> Self {
        Self {
            status,
            code,
            message,
            reason: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 for malformed bodies, queries, and fields.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorKind::InvalidInput.as_str(),
            message.into(),
        )
    }

    /// 404 for paths that name nothing.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ErrorKind::NotFound.as_str(),
            message.into(),
        )
    }

    /// Opaque 500.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Internal.as_str(),
            "internal error".to_string(),
        )
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let kind = err.kind();
        if kind == ErrorKind::Internal {
            return Self::internal().with_source(err.into());
        }
        let mut app = Self::new(status_for(kind), kind.as_str(), err.to_string());
        app.reason = err.deny_reason();
        app
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<DenyReason>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %format!("{source:#}"),
                    "request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "request failed"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: &self.message,
            reason: self.reason,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tix_core::model::{Action, Status, TicketId};
    use tix_core::store::StoreError;

    #[test]
    fn engine_kinds_map_to_statuses() {
        let cases = [
            (
                EngineError::invalid_input("title", "must not be empty"),
                StatusCode::BAD_REQUEST,
            ),
            (
                EngineError::NotFound {
                    id: TicketId::new_unchecked("tk-1"),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                EngineError::Conflict {
                    id: TicketId::new_unchecked("tk-1"),
                    status: Status::Resolved,
                    action: Action::Close,
                    reason: DenyReason::IllegalTransition,
                },
                StatusCode::CONFLICT,
            ),
            (
                EngineError::StoreUnavailable {
                    operation: "commit",
                    waited: Duration::from_secs(5),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn conflicts_carry_the_reason() {
        let err = AppError::from(EngineError::Conflict {
            id: TicketId::new_unchecked("tk-1"),
            status: Status::Closed,
            action: Action::Start,
            reason: DenyReason::TicketTerminal,
        });
        assert_eq!(err.reason, Some(DenyReason::TicketTerminal));
        assert_eq!(err.code, "conflict");
    }

    #[test]
    fn internal_errors_are_opaque() {
        let err = AppError::from(EngineError::Internal(StoreError::Corrupt {
            id: "tk-1".to_string(),
            detail: "bad status 'open'".to_string(),
        }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "[internal] internal error");
        assert!(std::error::Error::source(&err).is_some());
    }
}
