//! Lifecycle service: the only writer of ticket state.
//!
//! Every mutation is a load-decide-commit unit. The commit succeeds only if
//! the ticket version is unchanged since the load; otherwise the ticket is
//! re-read and the decision is made again against the winner's status.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::authority::{Decision, DenyReason, authorize_assignment, decide};
use crate::clock::{Clock, IdGenerator};
use crate::error::EngineError;
use crate::model::{Action, EventType, NewTicket, Status, Ticket, TicketEvent, TicketId};
use crate::replay::{CycleReport, Replayed, cycles, replay_status};
use crate::store::{StoreError, TicketStore, Versioned};

/// Longest accepted title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Default compare-and-commit attempts per mutation.
pub const DEFAULT_MAX_COMMIT_RETRIES: u32 = 8;

/// Fresh ids to try when the store reports a collision.
const ID_ATTEMPTS: usize = 4;

/// What an accepted request does to the ticket.
struct Change {
    to: Status,
    assignee: Option<String>,
}

/// Orchestrates ticket creation and transitions.
pub struct LifecycleService {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
    max_commit_retries: u32,
}

impl std::fmt::Debug for LifecycleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleService")
            .field("max_commit_retries", &self.max_commit_retries)
            .finish_non_exhaustive()
    }
}

impl LifecycleService {
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ids: IdGenerator::new(),
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
        }
    }

    #[must_use]
    pub fn with_max_commit_retries(mut self, attempts: u32) -> Self {
        self.max_commit_retries = attempts.max(1);
        self
    }

    /// Create a ticket in status `created` and record its `created` event.
    ///
    /// # Errors
    ///
    /// `invalid_input` for a blank, overlong, or control-character title;
    /// `store_unavailable` / `internal` from the store.
    pub fn create(&self, input: NewTicket) -> Result<Ticket, EngineError> {
        let title = validate_title(&input.title)?;

        let mut last_collision = None;
        for _ in 0..ID_ATTEMPTS {
            let now = self.clock.now();
            let ticket = Ticket {
                id: self.ids.next_id(now),
                title: title.clone(),
                description: input.description.clone(),
                status: Status::Created,
                assignee: None,
                created_at: now,
                due_at: input.due_at,
                updated_at: now,
            };
            let created = TicketEvent::created(now, None);

            match self.store.insert(&ticket, &created) {
                Ok(()) => {
                    info!(id = %ticket.id, title = %ticket.title, "ticket created");
                    return Ok(ticket);
                }
                Err(StoreError::Duplicate { id }) => {
                    warn!(%id, "ticket id collision, allocating another");
                    last_collision = Some(StoreError::Duplicate { id });
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(EngineError::Internal(last_collision.unwrap_or_else(|| {
            StoreError::Corrupt {
                id: String::new(),
                detail: "id allocation exhausted".to_string(),
            }
        })))
    }

    /// Apply a lifecycle action through the transition table.
    ///
    /// `Action::Assign` here is the status-only `created → assigned` edge; it
    /// leaves the assignee untouched. Use [`assign`](Self::assign) to name an
    /// agent.
    ///
    /// # Errors
    ///
    /// `not_found`, `conflict` with the deny reason, or a store error.
    pub fn apply_action(
        &self,
        id: &TicketId,
        action: Action,
        note: Option<&str>,
    ) -> Result<Ticket, EngineError> {
        self.mutate(id, action, EventType::Action(action), note, |ticket| {
            let decision = decide(ticket.status, action);
            debug!(id = %ticket.id, from = %ticket.status, %action, ?decision, "transition decided");
            match decision {
                Decision::Allowed { next } => Ok(Change {
                    to: next,
                    assignee: None,
                }),
                Decision::Denied { reason } => Err(reason),
            }
        })
    }

    /// Set the assignee without changing status.
    ///
    /// # Errors
    ///
    /// `invalid_input` for an empty assignee, `not_found`, `conflict`
    /// (`ticket_terminal`) on resolved/closed/canceled tickets, or a store
    /// error.
    pub fn assign(
        &self,
        id: &TicketId,
        assignee: &str,
        note: Option<&str>,
    ) -> Result<Ticket, EngineError> {
        let assignee = assignee.trim();
        if assignee.is_empty() {
            return Err(EngineError::invalid_input("assignee", "must not be empty"));
        }

        self.mutate(id, Action::Assign, EventType::Assigned, note, |ticket| {
            authorize_assignment(ticket.status)?;
            debug!(id = %ticket.id, status = %ticket.status, assignee, "reassignment allowed");
            Ok(Change {
                to: ticket.status,
                assignee: Some(assignee.to_string()),
            })
        })
    }

    /// # Errors
    ///
    /// `not_found` or a store error.
    pub fn get(&self, id: &TicketId) -> Result<Ticket, EngineError> {
        Ok(self.store.load(id)?.ticket)
    }

    /// All tickets, oldest first (ties broken by id).
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn list(&self) -> Result<Vec<Ticket>, EngineError> {
        let mut tickets = self.store.list()?;
        tickets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tickets)
    }

    /// The ticket's audit log, oldest first.
    ///
    /// # Errors
    ///
    /// `not_found` or a store error.
    pub fn events(&self, id: &TicketId) -> Result<Vec<TicketEvent>, EngineError> {
        Ok(self.store.events(id)?)
    }

    /// Per-round timing derived from the audit log.
    ///
    /// # Errors
    ///
    /// `not_found` or a store error.
    pub fn cycles(&self, id: &TicketId) -> Result<CycleReport, EngineError> {
        Ok(cycles(&self.store.events(id)?))
    }

    /// Replay the audit log and check it reproduces the stored ticket.
    ///
    /// # Errors
    ///
    /// `internal` (corrupt record) when the log cannot be folded or lands on
    /// a different status, assignee, or version than the stored record.
    pub fn verify(&self, id: &TicketId) -> Result<Replayed, EngineError> {
        let Versioned { ticket, version } = self.store.load(id)?;
        let events = self.store.events(id)?;
        let corrupt = |detail: String| {
            EngineError::Internal(StoreError::Corrupt {
                id: id.to_string(),
                detail,
            })
        };

        let replayed = replay_status(&events).map_err(|e| corrupt(e.to_string()))?;
        if replayed.status != ticket.status
            || replayed.assignee != ticket.assignee
            || replayed.version != version
        {
            return Err(corrupt(format!(
                "log replays to {} (assignee {:?}, version {}) but record is {} (assignee {:?}, version {version})",
                replayed.status, replayed.assignee, replayed.version, ticket.status, ticket.assignee,
            )));
        }
        Ok(replayed)
    }

    fn mutate(
        &self,
        id: &TicketId,
        action: Action,
        kind: EventType,
        note: Option<&str>,
        plan: impl Fn(&Ticket) -> Result<Change, DenyReason>,
    ) -> Result<Ticket, EngineError> {
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        let mut last_status = None;

        for attempt in 1..=self.max_commit_retries {
            let Versioned { ticket, version } = self.store.load(id)?;
            last_status = Some(ticket.status);

            let change = plan(&ticket).map_err(|reason| EngineError::Conflict {
                id: id.clone(),
                status: ticket.status,
                action,
                reason,
            })?;

            let at = self.clock.now().max(ticket.updated_at);
            let event = TicketEvent {
                seq: version + 1,
                event_type: kind,
                at,
                note: note.map(ToString::to_string),
                from_status: Some(ticket.status),
                to_status: change.to,
                assignee: change.assignee.clone(),
            };
            let mut next = ticket.clone();
            next.status = change.to;
            if change.assignee.is_some() {
                next.assignee = change.assignee;
            }
            next.updated_at = at;

            match self.store.commit(&next, &event, version) {
                Ok(_) => {
                    info!(
                        id = %id,
                        %action,
                        from = %ticket.status,
                        to = %next.status,
                        "transition accepted"
                    );
                    return Ok(next);
                }
                Err(StoreError::VersionConflict { expected, actual, .. }) => {
                    warn!(id = %id, %action, attempt, expected, actual, "ticket changed concurrently, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(EngineError::Conflict {
            id: id.clone(),
            status: last_status.unwrap_or(Status::Created),
            action,
            reason: DenyReason::ConcurrentModification,
        })
    }
}

fn validate_title(raw: &str) -> Result<String, EngineError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(EngineError::invalid_input("title", "must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(EngineError::invalid_input(
            "title",
            format!("must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    if title.chars().any(char::is_control) {
        return Err(EngineError::invalid_input(
            "title",
            "must not contain control characters",
        ));
    }
    Ok(title.to_string())
}

/// Parse a caller-supplied id. Malformed ids name no ticket.
///
/// # Errors
///
/// `not_found` when `raw` is not a well-formed ticket id.
pub fn parse_ticket_id(raw: &str) -> Result<TicketId, EngineError> {
    TicketId::parse(raw).map_err(|_| EngineError::NotFound {
        id: TicketId::new_unchecked(raw.trim()),
    })
}
