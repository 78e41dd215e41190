//! Read-only aggregate views over the ticket store.
//!
//! Nothing here mutates. Each call works from one [`TicketStore::list`]
//! snapshot; [`Projector::dashboard`] derives all three views from the same
//! snapshot so they agree with each other.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::clock::Clock;
use crate::error::EngineError;
use crate::model::{Status, Ticket};
use crate::store::TicketStore;

/// Default number of tickets returned by the backlog views.
pub const DEFAULT_LIMIT: usize = 50;

/// Statuses that count toward the unassigned backlog.
pub const UNASSIGNED_STATUSES: [Status; 2] = [Status::Created, Status::Waiting];

/// Ticket counts per status plus the overall total.
///
/// Serializes as a flat object with all eight status keys and `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusHistogram {
    counts: [usize; Status::ALL.len()],
    total: usize,
}

impl StatusHistogram {
    #[must_use]
    pub fn from_tickets(tickets: &[Ticket]) -> Self {
        let mut histogram = Self::default();
        for ticket in tickets {
            histogram.counts[slot(ticket.status)] += 1;
            histogram.total += 1;
        }
        histogram
    }

    #[must_use]
    pub const fn get(&self, status: Status) -> usize {
        self.counts[slot(status)]
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// `(status, count)` pairs in lifecycle order.
    pub fn iter(&self) -> impl Iterator<Item = (Status, usize)> + '_ {
        Status::ALL.into_iter().map(|status| (status, self.get(status)))
    }
}

const fn slot(status: Status) -> usize {
    status as usize
}

impl Serialize for StatusHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Status::ALL.len() + 1))?;
        for (status, count) in self.iter() {
            map.serialize_entry(status.as_str(), &count)?;
        }
        map.serialize_entry("total", &self.total)?;
        map.end()
    }
}

/// Supervisor view: counts plus both backlogs from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Dashboard {
    pub stats: StatusHistogram,
    pub unassigned: Vec<Ticket>,
    pub overdue: Vec<Ticket>,
    pub generated_at: DateTime<Utc>,
}

/// Unassigned backlog: no assignee, status `created` or `waiting`, newest
/// first.
#[must_use]
pub fn unassigned_of(tickets: &[Ticket], limit: usize) -> Vec<Ticket> {
    let mut out: Vec<Ticket> = tickets
        .iter()
        .filter(|t| t.is_unassigned() && UNASSIGNED_STATUSES.contains(&t.status))
        .cloned()
        .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    out.truncate(limit);
    out
}

/// Overdue backlog: past `due_at`, not terminal, most overdue first.
#[must_use]
pub fn overdue_of(tickets: &[Ticket], now: DateTime<Utc>, limit: usize) -> Vec<Ticket> {
    let mut out: Vec<Ticket> = tickets
        .iter()
        .filter(|t| t.is_overdue(now))
        .cloned()
        .collect();
    out.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.id.cmp(&b.id)));
    out.truncate(limit);
    out
}

/// Aggregation projector over a shared store.
pub struct Projector {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector").finish_non_exhaustive()
    }
}

impl Projector {
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// # Errors
    ///
    /// Propagates store errors.
    pub fn status_histogram(&self) -> Result<StatusHistogram, EngineError> {
        Ok(StatusHistogram::from_tickets(&self.store.list()?))
    }

    /// # Errors
    ///
    /// Propagates store errors.
    pub fn unassigned(&self, limit: usize) -> Result<Vec<Ticket>, EngineError> {
        Ok(unassigned_of(&self.store.list()?, limit))
    }

    /// # Errors
    ///
    /// Propagates store errors.
    pub fn overdue(&self, limit: usize) -> Result<Vec<Ticket>, EngineError> {
        let tickets = self.store.list()?;
        Ok(overdue_of(&tickets, self.clock.now(), limit))
    }

    /// # Errors
    ///
    /// Propagates store errors.
    pub fn dashboard(&self, limit: usize) -> Result<Dashboard, EngineError> {
        let tickets = self.store.list()?;
        let now = self.clock.now();
        Ok(Dashboard {
            stats: StatusHistogram::from_tickets(&tickets),
            unassigned: unassigned_of(&tickets, limit),
            overdue: overdue_of(&tickets, now, limit),
            generated_at: now,
        })
    }
}
