//! Forward-only schema upgrades. The applied level lives in
//! `PRAGMA user_version` and is mirrored into `store_meta`.

use super::schema;
use rusqlite::{Connection, types::Type};
use tracing::debug;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tickets and audit log",
        sql: schema::MIGRATION_V1_SQL,
    },
    Migration {
        version: 2,
        name: "backlog indexes",
        sql: schema::MIGRATION_V2_SQL,
    },
];

/// Schema level a fully migrated database reports.
pub const SCHEMA_VERSION: u32 = 2;

/// # Errors
///
/// Fails if the pragma cannot be read or holds a negative or oversized value.
pub fn applied_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(e)))
}

/// Bring `conn` up to [`SCHEMA_VERSION`]. Each step commits on its own, so an
/// interrupted upgrade resumes from the last completed step.
///
/// # Errors
///
/// Propagates the first failing statement; earlier steps stay applied.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let from = applied_version(conn)?;

    for step in MIGRATIONS.iter().filter(|m| m.version > from) {
        let level = i64::from(step.version);
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)?;
        tx.execute("UPDATE store_meta SET schema_version = ?1 WHERE id = 1", [level])?;
        tx.pragma_update(None, "user_version", level)?;
        tx.commit()?;
        debug!(version = step.version, name = step.name, "applied schema migration");
    }

    applied_version(conn)
}
