//! SQLite store shared by the economy and meme plugins.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY,
    name TEXT,
    job TEXT DEFAULT '초보자',
    join_date TEXT,
    total_checkin INTEGER DEFAULT 0,
    consecutive_checkin INTEGER DEFAULT 0,
    last_checkin_date TEXT,
    total_chat INTEGER DEFAULT 0,
    today_chat INTEGER DEFAULT 0,
    last_chat_date TEXT,
    points INTEGER DEFAULT 0,
    spent_points INTEGER DEFAULT 0
);
CREATE TABLE IF NOT EXISTS lotto (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    lotto_date TEXT,
    numbers TEXT,
    is_drawn INTEGER DEFAULT 0
);
CREATE TABLE IF NOT EXISTS name_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    old_name TEXT,
    new_name TEXT,
    change_date TEXT
);
CREATE TABLE IF NOT EXISTS items (
    item_id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_name TEXT UNIQUE,
    price INTEGER,
    description TEXT
);
CREATE TABLE IF NOT EXISTS inventory (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    item_id INTEGER,
    quantity INTEGER DEFAULT 1,
    purchase_date TEXT,
    FOREIGN KEY(user_id) REFERENCES users(user_id),
    FOREIGN KEY(item_id) REFERENCES items(item_id)
);
CREATE TABLE IF NOT EXISTS personal_images (
    sender_id INTEGER PRIMARY KEY,
    image BLOB NOT NULL,
    updated_at TEXT
);
"#;

/// One connection behind a mutex. Read-modify-write sequences run inside
/// [`Database::transaction`].
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        tracing::debug!("Opened database {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with the connection locked.
    pub fn with_conn<T, E>(&self, f: impl FnOnce(&Connection) -> std::result::Result<T, E>) -> std::result::Result<T, E> {
        let conn = self.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction; it commits only when `f` returns `Ok`.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&Connection) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Older databases were created before tickets carried a room.
fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let columns = {
        let mut stmt = conn.prepare("PRAGMA table_info(lotto)")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        names
    };
    if !columns.iter().any(|c| c == "room_id") {
        conn.execute_batch("ALTER TABLE lotto ADD COLUMN room_id TEXT")?;
        tracing::info!("Added lotto.room_id column");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn schema_is_idempotent_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("iris.db");
        {
            let db = Database::open(&path).unwrap();
            db.with_conn(|c| c.execute("INSERT INTO users (user_id, name) VALUES (1, 'a')", []))
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .with_conn(|c| c.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn legacy_lotto_table_gains_room_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE lotto (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER, lotto_date TEXT, numbers TEXT, is_drawn INTEGER DEFAULT 0);",
        )
        .unwrap();
        let db = Database::from_connection(conn).unwrap();
        db.with_conn(|c| {
            c.execute(
                "INSERT INTO lotto (user_id, numbers, room_id) VALUES (1, '123', '9')",
                [],
            )
        })
        .unwrap();
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let result: std::result::Result<(), rusqlite::Error> = db.transaction(|c| {
            c.execute("INSERT INTO users (user_id, name) VALUES (1, 'a')", [])?;
            Err(rusqlite::Error::QueryReturnedNoRows)
        });
        assert!(result.is_err());
        let count: i64 = db
            .with_conn(|c| c.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(count, 0);
    }
}
