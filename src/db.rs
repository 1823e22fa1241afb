use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS storage (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT DEFAULT (datetime('now'))
);
";

// Fixed storage keys.
pub const KEY_TOKEN: &str = "token";
pub const KEY_PROFILE: &str = "userData";
pub const KEY_CURRENT_PAGE: &str = "currentPage";
pub const KEY_TRANSACTIONS: &str = "transactions";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    init_db(&conn)?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn get_item(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM storage WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

pub fn set_item(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO storage (key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        rusqlite::params![key, value],
    )?;
    log::debug!("storage: wrote {key}");
    Ok(())
}

pub fn remove_item(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM storage WHERE key = ?1", [key])?;
    log::debug!("storage: removed {key}");
    Ok(())
}

pub fn clear(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM storage", [])?;
    log::debug!("storage: cleared");
    Ok(())
}

pub fn count_items(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM storage", [], |r| r.get(0))?)
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    (dir, conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db_creates_storage_table() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert!(tables.contains(&"storage".to_string()));
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_set_get_overwrite() {
        let (_dir, conn) = test_db();
        assert_eq!(get_item(&conn, KEY_TOKEN).unwrap(), None);
        set_item(&conn, KEY_TOKEN, "abc").unwrap();
        set_item(&conn, KEY_TOKEN, "def").unwrap();
        assert_eq!(get_item(&conn, KEY_TOKEN).unwrap().as_deref(), Some("def"));
        assert_eq!(count_items(&conn).unwrap(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let (_dir, conn) = test_db();
        set_item(&conn, KEY_TOKEN, "abc").unwrap();
        set_item(&conn, KEY_CURRENT_PAGE, "2").unwrap();
        remove_item(&conn, KEY_TOKEN).unwrap();
        assert_eq!(get_item(&conn, KEY_TOKEN).unwrap(), None);
        assert_eq!(get_item(&conn, KEY_CURRENT_PAGE).unwrap().as_deref(), Some("2"));
        clear(&conn).unwrap();
        assert_eq!(count_items(&conn).unwrap(), 0);
    }
}
