//! Ticket storage.
//!
//! A store keeps each ticket's current record together with its append-only
//! event log and exposes one atomic write primitive, [`TicketStore::commit`],
//! which replaces the record and appends one event only if the caller's view
//! of the ticket is still current.

pub mod memory;
pub mod sqlite;

use std::time::Duration;

use crate::lock::LockError;
use crate::model::{Ticket, TicketEvent, TicketId};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Default bound on how long any store operation may wait for a lock.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// A ticket together with the version it was read at.
///
/// The version is the number of events in the ticket's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub ticket: Ticket,
    pub version: u64,
}

/// Errors raised by [`TicketStore`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("ticket '{id}' already exists")]
    Duplicate { id: TicketId },

    #[error("ticket '{id}' not found")]
    NotFound { id: TicketId },

    #[error("ticket '{id}' is at version {actual}, expected {expected}")]
    VersionConflict {
        id: TicketId,
        expected: u64,
        actual: u64,
    },

    #[error("store {operation} timed out after {waited:?}")]
    Unavailable {
        operation: &'static str,
        waited: Duration,
    },

    #[error("corrupt record for ticket '{id}': {detail}")]
    Corrupt { id: String, detail: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn from_lock(operation: &'static str, err: &LockError) -> Self {
        Self::Unavailable {
            operation,
            waited: err.waited(),
        }
    }
}

/// Durable keyed storage for tickets and their event logs.
///
/// Implementations must make [`commit`](Self::commit) atomic per ticket:
/// either the record and its event are both written or neither is.
pub trait TicketStore: Send + Sync {
    /// Store a brand-new ticket with its `created` event (version 1).
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] if the id is taken.
    fn insert(&self, ticket: &Ticket, created: &TicketEvent) -> Result<(), StoreError>;

    /// Read the current record and its version.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no such ticket exists.
    fn load(&self, id: &TicketId) -> Result<Versioned, StoreError>;

    /// Snapshot every ticket. Order is unspecified.
    ///
    /// # Errors
    ///
    /// Propagates lock timeouts and backend failures.
    fn list(&self) -> Result<Vec<Ticket>, StoreError>;

    /// The ticket's events, oldest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no such ticket exists.
    fn events(&self, id: &TicketId) -> Result<Vec<TicketEvent>, StoreError>;

    /// Replace the record and append `event`, provided the stored version
    /// still equals `expected_version`. Returns the new version.
    ///
    /// # Errors
    ///
    /// [`StoreError::VersionConflict`] when another writer got there first.
    fn commit(
        &self,
        ticket: &Ticket,
        event: &TicketEvent,
        expected_version: u64,
    ) -> Result<u64, StoreError>;
}
