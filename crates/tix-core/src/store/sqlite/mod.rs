//! Durable SQLite ticket store.
//!
//! Connections come from an r2d2 pool capped at `pool_size`; a checkout that
//! waits longer than the store timeout fails as [`StoreError::Unavailable`].
//! Every pooled connection runs with:
//! - `journal_mode = WAL` so readers never block the writer
//! - `busy_timeout` equal to the store timeout, so contended writes fail as
//!   [`StoreError::Unavailable`] instead of hanging
//! - `foreign_keys = ON` so events cannot outlive their ticket
//!
//! Writes use `BEGIN IMMEDIATE`, which takes SQLite's database-wide write
//! lock: writes touch only one ticket's rows, but writers to different
//! tickets still queue behind each other for the length of one transaction.

pub mod migrations;
pub mod schema;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{
    Connection, ErrorCode as SqliteCode, OptionalExtension, Row, TransactionBehavior, params,
};
use tracing::{debug, warn};

use super::{DEFAULT_STORE_TIMEOUT, StoreError, TicketStore, Versioned};
use crate::clock::from_micros;
use crate::model::{EventType, Status, Ticket, TicketEvent, TicketId};

/// Default cap on open connections.
pub const DEFAULT_POOL_SIZE: usize = 4;

const TICKET_COLUMNS: &str = "ticket_id, title, description, status, assignee, version, \
                              created_at_us, due_at_us, updated_at_us";

const EVENT_COLUMNS: &str = "seq, event_type, at_us, note, from_status, to_status, assignee";

/// SQLite-backed [`TicketStore`].
pub struct SqliteStore {
    path: PathBuf,
    pool: Pool<SqliteConnectionManager>,
    timeout: Duration,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("max_size", &self.pool.max_size())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` with default timeout and pool
    /// size.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, configured, or
    /// migrated.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with(path, DEFAULT_STORE_TIMEOUT, DEFAULT_POOL_SIZE)
    }

    /// Open (or create) the database at `path`, migrate the schema to the
    /// latest version, and build a pool of at most `pool_size` connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, configured, or
    /// migrated.
    pub fn open_with(path: &Path, timeout: Duration, pool_size: usize) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // Migrate before any pooled connection exists.
        {
            let mut conn = Connection::open(path)?;
            configure_connection(&conn, timeout)?;
            let version = migrations::migrate(&mut conn)?;
            debug!(path = %path.display(), schema_version = version, "sqlite schema ready");
        }

        // r2d2 rejects a zero size or timeout.
        let max_size = u32::try_from(pool_size).unwrap_or(u32::MAX).max(1);
        let checkout = timeout.max(Duration::from_millis(1));
        let manager = SqliteConnectionManager::file(path)
            .with_init(move |conn| configure_connection(conn, timeout));
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(1))
            .connection_timeout(checkout)
            .build(manager)
            .map_err(|err| {
                warn!(path = %path.display(), error = %err, "sqlite pool failed to start");
                StoreError::Unavailable {
                    operation: "open",
                    waited: checkout,
                }
            })?;
        debug!(path = %path.display(), max_size, "sqlite pool ready");

        Ok(Self {
            path: path.to_path_buf(),
            pool,
            timeout,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` on a pooled connection. Waits at most the store timeout for a
    /// free slot.
    fn with_connection<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.pool.get().map_err(|err| {
            debug!(operation, error = %err, "sqlite pool checkout timed out");
            StoreError::Unavailable {
                operation,
                waited: self.timeout,
            }
        })?;
        f(&mut *conn)
    }

    fn classify(&self, operation: &'static str) -> impl Fn(rusqlite::Error) -> StoreError + '_ {
        move |err| match err.sqlite_error_code() {
            Some(SqliteCode::DatabaseBusy | SqliteCode::DatabaseLocked) => {
                StoreError::Unavailable {
                    operation,
                    waited: self.timeout,
                }
            }
            _ => StoreError::Sqlite(err),
        }
    }
}

fn configure_connection(conn: &Connection, timeout: Duration) -> rusqlite::Result<()> {
    // Set first: the pragmas below may need the lock another connection holds.
    conn.busy_timeout(timeout)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct TicketRow {
    ticket_id: String,
    title: String,
    description: String,
    status: String,
    assignee: Option<String>,
    version: i64,
    created_at_us: i64,
    due_at_us: Option<i64>,
    updated_at_us: i64,
}

impl TicketRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            ticket_id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            status: row.get(3)?,
            assignee: row.get(4)?,
            version: row.get(5)?,
            created_at_us: row.get(6)?,
            due_at_us: row.get(7)?,
            updated_at_us: row.get(8)?,
        })
    }

    fn into_versioned(self) -> Result<Versioned, StoreError> {
        let status = self.status.parse::<Status>().map_err(|e| StoreError::Corrupt {
            id: self.ticket_id.clone(),
            detail: e.to_string(),
        })?;
        let version = u64::try_from(self.version).map_err(|_| StoreError::Corrupt {
            id: self.ticket_id.clone(),
            detail: format!("negative version {}", self.version),
        })?;

        Ok(Versioned {
            ticket: Ticket {
                id: TicketId::new_unchecked(self.ticket_id),
                title: self.title,
                description: self.description,
                status,
                assignee: self.assignee,
                created_at: from_micros(self.created_at_us),
                due_at: self.due_at_us.map(from_micros),
                updated_at: from_micros(self.updated_at_us),
            },
            version,
        })
    }
}

struct EventRow {
    seq: i64,
    event_type: String,
    at_us: i64,
    note: Option<String>,
    from_status: Option<String>,
    to_status: String,
    assignee: Option<String>,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            event_type: row.get(1)?,
            at_us: row.get(2)?,
            note: row.get(3)?,
            from_status: row.get(4)?,
            to_status: row.get(5)?,
            assignee: row.get(6)?,
        })
    }

    fn into_event(self, id: &TicketId) -> Result<TicketEvent, StoreError> {
        let corrupt = |detail: String| StoreError::Corrupt {
            id: id.to_string(),
            detail,
        };

        let event_type = self
            .event_type
            .parse::<EventType>()
            .map_err(|e| corrupt(e.to_string()))?;
        let from_status = self
            .from_status
            .as_deref()
            .map(str::parse::<Status>)
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;
        let to_status = self
            .to_status
            .parse::<Status>()
            .map_err(|e| corrupt(e.to_string()))?;
        let seq = u64::try_from(self.seq).map_err(|_| corrupt(format!("bad seq {}", self.seq)))?;

        Ok(TicketEvent {
            seq,
            event_type,
            at: from_micros(self.at_us),
            note: self.note,
            from_status,
            to_status,
            assignee: self.assignee,
        })
    }
}

fn sql_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn insert_event(
    tx: &rusqlite::Transaction<'_>,
    id: &TicketId,
    event: &TicketEvent,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO ticket_events
            (ticket_id, seq, event_type, at_us, note, from_status, to_status, assignee)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id.as_str(),
            sql_u64(event.seq),
            event.event_type.as_str(),
            event.at.timestamp_micros(),
            event.note,
            event.from_status.map(Status::as_str),
            event.to_status.as_str(),
            event.assignee,
        ],
    )?;
    Ok(())
}

fn ticket_version(conn: &Connection, id: &TicketId) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT version FROM tickets WHERE ticket_id = ?1",
        [id.as_str()],
        |row| row.get(0),
    )
    .optional()
}

impl TicketStore for SqliteStore {
    fn insert(&self, ticket: &Ticket, created: &TicketEvent) -> Result<(), StoreError> {
        let classify = self.classify("insert");
        self.with_connection("insert", |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(&classify)?;

            if ticket_version(&tx, &ticket.id).map_err(&classify)?.is_some() {
                return Err(StoreError::Duplicate {
                    id: ticket.id.clone(),
                });
            }

            tx.execute(
                "INSERT INTO tickets
                    (ticket_id, title, description, status, assignee, version,
                     created_at_us, due_at_us, updated_at_us)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8)",
                params![
                    ticket.id.as_str(),
                    ticket.title,
                    ticket.description,
                    ticket.status.as_str(),
                    ticket.assignee,
                    ticket.created_at.timestamp_micros(),
                    ticket.due_at.map(|due| due.timestamp_micros()),
                    ticket.updated_at.timestamp_micros(),
                ],
            )
            .map_err(&classify)?;
            insert_event(&tx, &ticket.id, created).map_err(&classify)?;
            tx.commit().map_err(&classify)
        })
    }

    fn load(&self, id: &TicketId) -> Result<Versioned, StoreError> {
        let row = self.with_connection("load", |conn| {
            conn.query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_id = ?1"),
                [id.as_str()],
                TicketRow::from_row,
            )
            .optional()
            .map_err(self.classify("load"))
        })?;

        row.ok_or_else(|| StoreError::NotFound { id: id.clone() })?
            .into_versioned()
    }

    fn list(&self) -> Result<Vec<Ticket>, StoreError> {
        let classify = self.classify("list");
        let rows = self.with_connection("list", |conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {TICKET_COLUMNS} FROM tickets"))
                .map_err(&classify)?;
            let rows = stmt
                .query_map([], TicketRow::from_row)
                .map_err(&classify)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(&classify)?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|row| row.into_versioned().map(|v| v.ticket))
            .collect()
    }

    fn events(&self, id: &TicketId) -> Result<Vec<TicketEvent>, StoreError> {
        let classify = self.classify("events");
        let rows = self.with_connection("events", |conn| {
            // One read transaction so the existence check and the log agree.
            let tx = conn.transaction().map_err(&classify)?;
            if ticket_version(&tx, id).map_err(&classify)?.is_none() {
                return Err(StoreError::NotFound { id: id.clone() });
            }

            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM ticket_events WHERE ticket_id = ?1 ORDER BY seq ASC"
                ))
                .map_err(&classify)?;
            let rows = stmt
                .query_map([id.as_str()], EventRow::from_row)
                .map_err(&classify)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(&classify)?;
            Ok(rows)
        })?;

        rows.into_iter().map(|row| row.into_event(id)).collect()
    }

    fn commit(
        &self,
        ticket: &Ticket,
        event: &TicketEvent,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let classify = self.classify("commit");
        self.with_connection("commit", |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(&classify)?;

            let actual = ticket_version(&tx, &ticket.id)
                .map_err(&classify)?
                .ok_or_else(|| StoreError::NotFound {
                    id: ticket.id.clone(),
                })?;
            if actual != sql_u64(expected_version) {
                return Err(StoreError::VersionConflict {
                    id: ticket.id.clone(),
                    expected: expected_version,
                    actual: u64::try_from(actual).unwrap_or_default(),
                });
            }

            let next_version = expected_version + 1;
            tx.execute(
                "UPDATE tickets
                 SET status = ?2, assignee = ?3, updated_at_us = ?4, version = ?5
                 WHERE ticket_id = ?1",
                params![
                    ticket.id.as_str(),
                    ticket.status.as_str(),
                    ticket.assignee,
                    ticket.updated_at.timestamp_micros(),
                    sql_u64(next_version),
                ],
            )
            .map_err(&classify)?;
            insert_event(&tx, &ticket.id, event).map_err(&classify)?;
            tx.commit().map_err(&classify)?;

            Ok(next_version)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::model::{EventType, Status, Ticket, TicketEvent, TicketId};
    use crate::store::{StoreError, TicketStore};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use rusqlite::Connection;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn temp_db() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("tix.db");
        (dir, path)
    }

    fn sample(id: &str) -> (Ticket, TicketEvent) {
        let at = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        let ticket = Ticket {
            id: TicketId::new_unchecked(id),
            title: "Mailbox full".to_string(),
            description: "Quota exceeded".to_string(),
            status: Status::Created,
            assignee: None,
            created_at: at,
            due_at: Some(at + ChronoDuration::hours(4)),
            updated_at: at,
        };
        (ticket, TicketEvent::created(at, Some("via phone".to_string())))
    }

    fn assigned(mut ticket: Ticket, agent: &str) -> (Ticket, TicketEvent) {
        ticket.assignee = Some(agent.to_string());
        ticket.updated_at += ChronoDuration::minutes(1);
        let event = TicketEvent {
            seq: 2,
            event_type: EventType::Assigned,
            at: ticket.updated_at,
            note: None,
            from_status: Some(ticket.status),
            to_status: ticket.status,
            assignee: Some(agent.to_string()),
        };
        (ticket, event)
    }

    #[test]
    fn open_sets_wal_and_busy_timeout() {
        let (_dir, path) = temp_db();
        let store = SqliteStore::open_with(&path, Duration::from_millis(1500), 2).unwrap();
        let (journal_mode, busy_timeout_ms) = store
            .with_connection("test", |conn| {
                let journal_mode: String =
                    conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
                let busy_timeout_ms: u64 =
                    conn.pragma_query_value(None, "busy_timeout", |row| row.get(0))?;
                Ok((journal_mode, busy_timeout_ms))
            })
            .unwrap();

        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");
        assert_eq!(busy_timeout_ms, 1500);
    }

    #[test]
    fn roundtrip_survives_reopen() {
        let (_dir, path) = temp_db();
        let (ticket, created) = sample("tk-a1");
        let (next, event) = assigned(ticket.clone(), "bob");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&ticket, &created).unwrap();
            assert_eq!(store.commit(&next, &event, 1).unwrap(), 2);
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load(&next.id).unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.ticket, next);
        assert_eq!(store.events(&next.id).unwrap(), vec![created, event]);
        assert_eq!(store.list().unwrap(), vec![next]);
    }

    #[test]
    fn duplicate_and_missing_ids() {
        let (_dir, path) = temp_db();
        let store = SqliteStore::open(&path).unwrap();
        let (ticket, created) = sample("tk-b2");
        store.insert(&ticket, &created).unwrap();

        assert!(matches!(
            store.insert(&ticket, &created),
            Err(StoreError::Duplicate { .. })
        ));

        let missing = TicketId::new_unchecked("tk-ffff");
        assert!(matches!(store.load(&missing), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.events(&missing), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn stale_commit_is_rejected_without_writing() {
        let (_dir, path) = temp_db();
        let store = SqliteStore::open(&path).unwrap();
        let (ticket, created) = sample("tk-c3");
        store.insert(&ticket, &created).unwrap();
        let (next, event) = assigned(ticket, "ana");
        store.commit(&next, &event, 1).unwrap();

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
    fn held_write_lock_surfaces_as_unavailable() {
        let (_dir, path) = temp_db();
        let store = SqliteStore::open_with(&path, Duration::from_millis(50), 1).unwrap();
        let (ticket, created) = sample("tk-d4");
        store.insert(&ticket, &created).unwrap();

        let blocker = Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

        let (next, event) = assigned(ticket, "eve");
        let err = store.commit(&next, &event, 1).unwrap_err();
        assert!(
            matches!(err, StoreError::Unavailable { operation: "commit", .. }),
            "unexpected {err:?}"
        );

        // The write lock is database-wide: an unrelated ticket waits too.
        let (other, other_created) = sample("tk-d5");
        assert!(matches!(
            store.insert(&other, &other_created),
            Err(StoreError::Unavailable { operation: "insert", .. })
        ));
        assert_eq!(store.load(&next.id).unwrap().version, 1);

        blocker.execute_batch("ROLLBACK").unwrap();
        assert_eq!(store.commit(&next, &event, 1).unwrap(), 2);
    }

    #[test]
    fn pool_caps_concurrent_connections() {
        let (_dir, path) = temp_db();
        let store = SqliteStore::open_with(&path, Duration::from_secs(5), 2).unwrap();
        let open = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    store
                        .with_connection("test", |_conn| {
                            let now = open.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(20));
                            open.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                });
            }
        });

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "pool_size=2 but {peak} connections were in use");
    }

    #[test]
    fn exhausted_pool_surfaces_as_unavailable() {
        let (_dir, path) = temp_db();
        let store = SqliteStore::open_with(&path, Duration::from_millis(50), 2).unwrap();
        let (ticket, created) = sample("tk-f6");
        store.insert(&ticket, &created).unwrap();

        let held = [store.pool.get().unwrap(), store.pool.get().unwrap()];
        let err = store.load(&ticket.id).unwrap_err();
        assert!(
            matches!(err, StoreError::Unavailable { operation: "load", .. }),
            "unexpected {err:?}"
        );

        drop(held);
        assert_eq!(store.load(&ticket.id).unwrap().version, 1);
    }

    #[test]
    fn corrupt_status_is_reported() {
        let (_dir, path) = temp_db();
        let store = SqliteStore::open(&path).unwrap();
        let (ticket, created) = sample("tk-e5");
        store.insert(&ticket, &created).unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE ticket_events SET to_status = 'bogus' WHERE ticket_id = 'tk-e5'",
            [],
        )
        .unwrap();

        assert!(matches!(
            store.events(&ticket.id),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
