//! Rebuild ticket state from its event log.
//!
//! [`replay_status`] is the audit check: folding the log from the `created`
//! event must land on the ticket's stored status and assignee.
//! [`cycles`] splits the same log into handling rounds, one per `created` or
//! `reopen`, and reports per-round timing.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Action, EventType, Status, TicketEvent};

/// Result of folding an event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replayed {
    pub status: Status,
    pub assignee: Option<String>,
    /// Number of events folded; equals the ticket version.
    pub version: u64,
}

/// A log that cannot be folded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("event log does not start with a created event")]
    MissingCreated,

    #[error("event {seq} is a second created event")]
    DuplicateCreated { seq: u64 },

    #[error("event {seq} starts from {found:?} but the ticket was {expected}")]
    Discontinuity {
        seq: u64,
        expected: Status,
        found: Option<Status>,
    },
}

/// Fold `events` (oldest first) into the status and assignee they produce.
///
/// # Errors
///
/// Returns [`ReplayError`] when the log is empty, does not begin with
/// `created`, or an event's `from_status` disagrees with the running status.
pub fn replay_status(events: &[TicketEvent]) -> Result<Replayed, ReplayError> {
    let (first, rest) = events.split_first().ok_or(ReplayError::MissingCreated)?;
    if first.event_type != EventType::Created {
        return Err(ReplayError::MissingCreated);
    }

    let mut state = Replayed {
        status: first.to_status,
        assignee: first.assignee.clone(),
        version: 1,
    };

    for event in rest {
        if event.event_type == EventType::Created {
            return Err(ReplayError::DuplicateCreated { seq: event.seq });
        }
        if event.from_status != Some(state.status) {
            return Err(ReplayError::Discontinuity {
                seq: event.seq,
                expected: state.status,
                found: event.from_status,
            });
        }

        state.status = event.to_status;
        if event.assignee.is_some() {
            state.assignee.clone_from(&event.assignee);
        }
        state.version += 1;
    }

    Ok(state)
}

/// One handling round of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cycle {
    pub opened_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_assigned_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled_at: Option<DateTime<Utc>>,
    /// Status at the end of the round.
    pub status: Status,
    /// Seconds from opening to resolution, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_secs: Option<i64>,
}

impl Cycle {
    const fn open(at: DateTime<Utc>, status: Status) -> Self {
        Self {
            opened_at: at,
            first_assigned_at: None,
            started_at: None,
            escalated_at: None,
            resolved_at: None,
            closed_at: None,
            canceled_at: None,
            status,
            resolution_secs: None,
        }
    }

    fn record(&mut self, action: Action, at: DateTime<Utc>, to: Status) {
        match action {
            Action::Assign => {
                self.first_assigned_at.get_or_insert(at);
            }
            Action::Start => {
                self.started_at.get_or_insert(at);
            }
            Action::Escalate => {
                self.escalated_at.get_or_insert(at);
            }
            Action::Resolve => {
                self.resolved_at = Some(at);
                self.resolution_secs = Some((at - self.opened_at).num_seconds());
            }
            Action::Close => self.closed_at = Some(at),
            Action::Cancel => self.canceled_at = Some(at),
            Action::Wait | Action::Reopen => {}
        }
        self.status = to;
    }
}

/// Every round of a ticket plus the index of the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub current: usize,
    pub cycles: Vec<Cycle>,
}

/// Split a ticket's log into handling rounds.
///
/// An empty log yields an empty report.
#[must_use]
pub fn cycles(events: &[TicketEvent]) -> CycleReport {
    let mut rounds: Vec<Cycle> = Vec::new();

    for event in events {
        match event.event_type {
            EventType::Created | EventType::Action(Action::Reopen) => {
                rounds.push(Cycle::open(event.at, event.to_status));
            }
            EventType::Assigned => {
                if let Some(round) = rounds.last_mut() {
                    round.record(Action::Assign, event.at, event.to_status);
                }
            }
            EventType::Action(action) => {
                if let Some(round) = rounds.last_mut() {
                    round.record(action, event.at, event.to_status);
                }
            }
        }
    }

    CycleReport {
        current: rounds.len().saturating_sub(1),
        cycles: rounds,
    }
}
