use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use tracing::debug;

use super::{DEFAULT_STORE_TIMEOUT, StoreError, TicketStore, Versioned};
use crate::lock::{lock_mutex, read_lock, write_lock};
use crate::model::{Ticket, TicketEvent, TicketId};

#[derive(Debug)]
struct Record {
    ticket: Ticket,
    events: Vec<TicketEvent>,
}

impl Record {
    fn version(&self) -> u64 {
        self.events.len() as u64
    }
}

/// In-process ticket store.
///
/// The index is only write-locked to insert new tickets; mutations take the
/// per-ticket mutex, so work on different tickets never contends.
#[derive(Debug)]
pub struct MemoryStore {
    index: RwLock<HashMap<TicketId, Arc<Mutex<Record>>>>,
    timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_STORE_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    fn record(&self, id: &TicketId, operation: &'static str) -> Result<Arc<Mutex<Record>>, StoreError> {
        let index = read_lock(&self.index, "index", self.timeout)
            .map_err(|e| StoreError::from_lock(operation, &e))?;
        index
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }
}

impl TicketStore for MemoryStore {
    fn insert(&self, ticket: &Ticket, created: &TicketEvent) -> Result<(), StoreError> {
        let mut index = write_lock(&self.index, "index", self.timeout)
            .map_err(|e| StoreError::from_lock("insert", &e))?;
        if index.contains_key(&ticket.id) {
            return Err(StoreError::Duplicate {
                id: ticket.id.clone(),
            });
        }
        index.insert(
            ticket.id.clone(),
            Arc::new(Mutex::new(Record {
                ticket: ticket.clone(),
                events: vec![created.clone()],
            })),
        );
        debug!(id = %ticket.id, "memory store: inserted ticket");
        Ok(())
    }

    fn load(&self, id: &TicketId) -> Result<Versioned, StoreError> {
        let record = self.record(id, "load")?;
        let guard = lock_mutex(&record, "ticket", self.timeout)
            .map_err(|e| StoreError::from_lock("load", &e))?;
        Ok(Versioned {
            ticket: guard.ticket.clone(),
            version: guard.version(),
        })
    }

    fn list(&self) -> Result<Vec<Ticket>, StoreError> {
        let records: Vec<_> = {
            let index = read_lock(&self.index, "index", self.timeout)
                .map_err(|e| StoreError::from_lock("list", &e))?;
            index.values().cloned().collect()
        };

        records
            .iter()
            .map(|record| {
                lock_mutex(record, "ticket", self.timeout)
                    .map(|guard| guard.ticket.clone())
                    .map_err(|e| StoreError::from_lock("list", &e))
            })
            .collect()
    }

    fn events(&self, id: &TicketId) -> Result<Vec<TicketEvent>, StoreError> {
        let record = self.record(id, "events")?;
        let guard = lock_mutex(&record, "ticket", self.timeout)
            .map_err(|e| StoreError::from_lock("events", &e))?;
        Ok(guard.events.clone())
    }

    fn commit(
        &self,
        ticket: &Ticket,
        event: &TicketEvent,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let record = self.record(&ticket.id, "commit")?;
        let mut guard = lock_mutex(&record, "ticket", self.timeout)
            .map_err(|e| StoreError::from_lock("commit", &e))?;

        let actual = guard.version();
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                id: ticket.id.clone(),
                expected: expected_version,
                actual,
            });
        }

        guard.events.push(event.clone());
        guard.ticket = ticket.clone();
        Ok(guard.version())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::model::{Action, EventType, Status, Ticket, TicketEvent, TicketId};
    use crate::store::{StoreError, TicketStore};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn sample(id: &str) -> (Ticket, TicketEvent) {
        let at = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        let ticket = Ticket {
            id: TicketId::new_unchecked(id),
            title: "VPN drops".to_string(),
            description: String::new(),
            status: Status::Created,
            assignee: None,
            created_at: at,
            due_at: None,
            updated_at: at,
        };
        (ticket, TicketEvent::created(at, None))
    }

    fn started(mut ticket: Ticket) -> (Ticket, TicketEvent) {
        let event = TicketEvent {
            seq: 2,
            event_type: EventType::Action(Action::Start),
            at: ticket.updated_at,
            note: None,
            from_status: Some(ticket.status),
            to_status: Status::InProgress,
            assignee: None,
        };
        ticket.status = Status::InProgress;
        (ticket, event)
    }

    #[test]
    fn insert_then_load_is_version_one() {
        let store = MemoryStore::new();
        let (ticket, created) = sample("tk-01");
        store.insert(&ticket, &created).unwrap();

        let loaded = store.load(&ticket.id).unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.ticket, ticket);
        assert_eq!(store.events(&ticket.id).unwrap(), vec![created]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        let (ticket, created) = sample("tk-02");
        store.insert(&ticket, &created).unwrap();
        assert!(matches!(
            store.insert(&ticket, &created),
            Err(StoreError::Duplicate { .. })
        ));
    }

    #[test]
    fn stale_commit_is_rejected() {
        let store = MemoryStore::new();
        let (ticket, created) = sample("tk-03");
        store.insert(&ticket, &created).unwrap();

        let (next, event) = started(ticket);
        assert_eq!(store.commit(&next, &event, 1).unwrap(), 2);

        let err = store.commit(&next, &event, 1).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert_eq!(store.events(&next.id).unwrap().len(), 2);
    }

    #[test]
    fn unknown_ticket_is_not_found() {
        let store = MemoryStore::new();
        let id = TicketId::new_unchecked("tk-ff");
        assert!(matches!(store.load(&id), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.events(&id), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn held_record_lock_times_out_as_unavailable() {
        let store = MemoryStore::with_timeout(Duration::from_millis(20));
        let (ticket, created) = sample("tk-04");
        store.insert(&ticket, &created).unwrap();

        let record = store.record(&ticket.id, "test").unwrap();
        let _held = record.lock().unwrap();

        let err = store.load(&ticket.id).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Unavailable {
                operation: "load",
                ..
            }
        ));
    }

    #[test]
    fn list_snapshots_every_ticket() {
        let store = MemoryStore::new();
        for id in ["tk-0a", "tk-0b", "tk-0c"] {
            let (ticket, created) = sample(id);
            store.insert(&ticket, &created).unwrap();
        }
        let mut ids: Vec<_> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|t| t.id.as_str().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["tk-0a", "tk-0b", "tk-0c"]);
    }
}
