use std::fmt;
use std::time::Duration;

use crate::authority::DenyReason;
use crate::model::{Action, Status, TicketId};
use crate::store::StoreError;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    InvalidInput,
    TicketNotFound,
    InvalidStateTransition,
    TicketTerminal,
    ConcurrentModification,
    StoreUnavailable,
    CorruptRecord,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidInput => "E2001",
            Self::TicketNotFound => "E2002",
            Self::InvalidStateTransition => "E3001",
            Self::TicketTerminal => "E3002",
            Self::ConcurrentModification => "E3003",
            Self::StoreUnavailable => "E5001",
            Self::CorruptRecord => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidInput => "Invalid input",
            Self::TicketNotFound => "Ticket not found",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::TicketTerminal => "Ticket is in a terminal status",
            Self::ConcurrentModification => "Ticket changed concurrently",
            Self::StoreUnavailable => "Ticket store unavailable",
            Self::CorruptRecord => "Corrupt ticket record",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `tix init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .tix/config.toml and retry."),
            Self::InvalidInput => Some("Fix the request and retry."),
            Self::TicketNotFound => None,
            Self::InvalidStateTransition => {
                Some("Refresh the ticket and pick an action allowed from its current status.")
            }
            Self::TicketTerminal => Some("Only a resolved ticket can be reopened."),
            Self::ConcurrentModification => Some("Refresh the ticket state and retry."),
            Self::StoreUnavailable => Some("Retry with backoff; nothing was committed."),
            Self::CorruptRecord => Some("Inspect the ticket's event log for damage."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The five caller-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed request; fix and retry.
    InvalidInput,
    /// Unknown ticket id.
    NotFound,
    /// Well-formed but inapplicable to the current status.
    Conflict,
    /// Transient infrastructure failure; safe to retry.
    StoreUnavailable,
    /// Unexpected defect.
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::StoreUnavailable => "store_unavailable",
            Self::Internal => "internal",
        }
    }

    /// Whether an automatic retry with backoff can succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the lifecycle service and projector.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("ticket '{id}' not found")]
    NotFound { id: TicketId },

    #[error("cannot {action} ticket '{id}' in status {status}: {reason}")]
    Conflict {
        id: TicketId,
        status: Status,
        action: Action,
        reason: DenyReason,
    },

    #[error("ticket store unavailable during {operation} (waited {waited:?})")]
    StoreUnavailable {
        operation: &'static str,
        waited: Duration,
    },

    #[error("internal error: {0}")]
    Internal(#[source] StoreError),
}

impl EngineError {
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput { .. } => ErrorCode::InvalidInput,
            Self::NotFound { .. } => ErrorCode::TicketNotFound,
            Self::Conflict { reason, .. } => match reason {
                DenyReason::IllegalTransition => ErrorCode::InvalidStateTransition,
                DenyReason::TicketTerminal => ErrorCode::TicketTerminal,
                DenyReason::ConcurrentModification => ErrorCode::ConcurrentModification,
            },
            Self::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            Self::Internal(StoreError::Corrupt { .. }) => ErrorCode::CorruptRecord,
            Self::Internal(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Structured deny reason for `conflict` errors.
    #[must_use]
    pub const fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Conflict { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { operation, waited } => {
                Self::StoreUnavailable { operation, waited }
            }
            StoreError::NotFound { id } => Self::NotFound { id },
            other => Self::Internal(other),
        }
    }
}
