//! Forward-only schema migrations.
//!
//! The version lives in `schema_meta`; [`run_migrations`] steps it up to
//! [`CURRENT_SCHEMA_VERSION`] one migration at a time.

use rusqlite::{Connection, OptionalExtension};

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// Embedding width the stored vectors were written with, if recorded.
pub fn get_embedding_dim(conn: &Connection) -> rusqlite::Result<Option<usize>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'embedding_dim'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw.and_then(|v| v.parse().ok()))
}

/// Run pending migrations, each inside its own transaction.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        conn.execute_batch("BEGIN")?;
        let step = match next {
            2 => migrate_v1_to_v2(conn),
            _ => {
                tracing::error!(version = next, "unknown migration target");
                conn.execute_batch("ROLLBACK")?;
                break;
            }
        };
        match step.and_then(|_| update_schema_version(conn, next)) {
            Ok(()) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                conn.execute_batch("ROLLBACK")?;
                return Err(e);
            }
        }
        version = next;
    }

    Ok(())
}

/// v1 → v2: record the vector width and index `created_at` for window scans.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_dim', ?1)",
        [crate::embedding::EMBEDDING_DIM.to_string()],
    )?;
    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn fresh_db_starts_at_version_1() {
        let conn = test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn run_migrations_upgrades_to_current() {
        let conn = test_db();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn v2_records_embedding_dim_and_index() {
        let conn = test_db();
        assert!(get_embedding_dim(&conn).unwrap().is_none());

        run_migrations(&conn).unwrap();

        assert_eq!(get_embedding_dim(&conn).unwrap(), Some(384));
        let idx: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_memories_created'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = test_db();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }
}
