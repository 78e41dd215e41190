//! Transition authority: the single place that knows which lifecycle moves
//! are legal.
//!
//! Every function here is pure. The lifecycle service consults [`decide`]
//! before each status change and [`authorize_assignment`] before each
//! reassignment; no other layer re-implements the table.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{Action, Status};

/// Why a requested action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The action has no edge from the current status.
    IllegalTransition,
    /// The ticket is terminal and does not accept this action.
    TicketTerminal,
    /// The ticket kept changing underneath the caller until retries ran out.
    ConcurrentModification,
}

impl DenyReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IllegalTransition => "illegal_transition",
            Self::TicketTerminal => "ticket_terminal",
            Self::ConcurrentModification => "concurrent_modification",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of asking whether `action` may be applied from a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { next: Status },
    Denied { reason: DenyReason },
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    #[must_use]
    pub const fn next_status(self) -> Option<Status> {
        match self {
            Self::Allowed { next } => Some(next),
            Self::Denied { .. } => None,
        }
    }

    #[must_use]
    pub const fn reason(self) -> Option<DenyReason> {
        match self {
            Self::Allowed { .. } => None,
            Self::Denied { reason } => Some(reason),
        }
    }
}

const fn allow(next: Status) -> Decision {
    Decision::Allowed { next }
}

const ILLEGAL: Decision = Decision::Denied {
    reason: DenyReason::IllegalTransition,
};

const TERMINAL: Decision = Decision::Denied {
    reason: DenyReason::TicketTerminal,
};

/// Decide whether `action` is legal from `current`, and where it leads.
#[must_use]
pub const fn decide(current: Status, action: Action) -> Decision {
    use Action as A;
    use Status as S;

    match (current, action) {
        (S::Closed | S::Canceled, _) => TERMINAL,
        (S::Resolved, A::Reopen) => allow(S::Created),
        (S::Resolved, _) => ILLEGAL,

        (_, A::Close) => allow(S::Closed),
        (_, A::Cancel) => allow(S::Canceled),

        (S::Created, A::Assign) => allow(S::Assigned),
        (S::Created | S::Assigned | S::Waiting, A::Start) => allow(S::InProgress),
        (S::Created | S::Assigned | S::InProgress, A::Wait) => allow(S::Waiting),
        (S::Created | S::Assigned | S::InProgress | S::Waiting, A::Escalate) => {
            allow(S::Escalated)
        }
        (S::Assigned | S::InProgress | S::Waiting | S::Escalated, A::Resolve) => {
            allow(S::Resolved)
        }

        _ => ILLEGAL,
    }
}

/// Whether the assignee may be changed while the ticket is in `current`.
///
/// Reassignment does not move the status, so it is gated only on the ticket
/// not being terminal.
///
/// # Errors
///
/// Returns [`DenyReason::TicketTerminal`] for `resolved`, `closed` and
/// `canceled` tickets.
pub const fn authorize_assignment(current: Status) -> Result<(), DenyReason> {
    if current.is_terminal() {
        Err(DenyReason::TicketTerminal)
    } else {
        Ok(())
    }
}

/// Actions the table accepts from `current`, in canonical order.
#[must_use]
pub fn allowed_actions(current: Status) -> Vec<Action> {
    Action::ALL
        .into_iter()
        .filter(|action| decide(current, *action).is_allowed())
        .collect()
}
