//! SQLite schema for the durable ticket store.
//!
//! - `tickets` holds the current record of each ticket plus its version
//!   (event count) for compare-and-commit
//! - `ticket_events` is the append-only audit log, keyed by `(ticket_id, seq)`
//! - `store_meta` records the applied schema version
//!
//! Timestamps are integer microseconds since the Unix epoch.

/// Migration v1: tickets, events, store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS tickets (
    ticket_id TEXT PRIMARY KEY,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL CHECK (status IN (
        'created', 'assigned', 'in_progress', 'waiting',
        'escalated', 'resolved', 'closed', 'canceled'
    )),
    assignee TEXT,
    version INTEGER NOT NULL CHECK (version >= 1),
    created_at_us INTEGER NOT NULL,
    due_at_us INTEGER,
    updated_at_us INTEGER NOT NULL,
    CHECK (ticket_id LIKE 'tk-%'),
    CHECK (updated_at_us >= created_at_us)
);

CREATE TABLE IF NOT EXISTS ticket_events (
    ticket_id TEXT NOT NULL REFERENCES tickets(ticket_id) ON DELETE RESTRICT,
    seq INTEGER NOT NULL CHECK (seq >= 1),
    event_type TEXT NOT NULL,
    at_us INTEGER NOT NULL,
    note TEXT,
    from_status TEXT,
    to_status TEXT NOT NULL,
    assignee TEXT,
    PRIMARY KEY (ticket_id, seq)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 0);
";

/// Migration v2: indexes backing the backlog projections.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_tickets_status_created
    ON tickets(status, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_tickets_due
    ON tickets(due_at_us)
    WHERE due_at_us IS NOT NULL;
";

/// Indexes that must exist once migrations are applied.
pub const REQUIRED_INDEXES: &[&str] = &["idx_tickets_status_created", "idx_tickets_due"];
