use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use santa_core::{Assignment, Pair};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tokio::sync::Mutex;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("no receiver stored for {0}")]
    NotFound(String),

    #[error("bad reveal timestamp for {giver}: {source}")]
    Timestamp {
        giver: String,
        source: chrono::ParseError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RevealRecord {
    pub giver: String,
    pub revealed_at: DateTime<Utc>,
}

/// Durable home of the current draw and of who has already looked at it.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Self::from_connection(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` in a single transaction, committing only when it succeeds.
    pub async fn atomically<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(StoreError::from)?;
        let out = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(out)
    }

    pub async fn exists(&self) -> Result<bool> {
        let conn = self.conn.lock().await;
        assignment_exists(&conn)
    }

    /// Replaces the whole draw and forgets every reveal.
    pub async fn create_or_replace(&self, assignment: &Assignment) -> Result<()> {
        self.atomically(|tx| replace_assignment(tx, assignment)).await
    }

    /// Writes a draw from `generate` only when none is stored yet.
    /// Returns whether a new draw was written.
    pub async fn ensure_assignment<F, E>(&self, generate: F) -> std::result::Result<bool, E>
    where
        F: FnOnce() -> std::result::Result<Assignment, E>,
        E: From<StoreError>,
    {
        self.atomically(|tx| {
            if assignment_exists(tx)? {
                return Ok(false);
            }
            let assignment = generate()?;
            replace_assignment(tx, &assignment)?;
            Ok(true)
        })
        .await
    }

    pub async fn receiver_of(&self, giver: &str) -> Result<String> {
        let conn = self.conn.lock().await;
        load_receiver(&conn, giver)?.ok_or_else(|| StoreError::NotFound(giver.to_string()))
    }

    pub async fn has_revealed(&self, giver: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        is_revealed(&conn, giver)
    }

    pub async fn mark_revealed(&self, giver: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        insert_reveal(&conn, giver, Utc::now())
    }

    pub async fn revealed_givers(&self) -> Result<HashSet<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT giver FROM revealed")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut givers = HashSet::new();
        for giver in rows {
            givers.insert(giver?);
        }
        Ok(givers)
    }

    pub async fn assignment(&self) -> Result<Option<Assignment>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT giver, receiver FROM assignments ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(Pair {
                giver: row.get(0)?,
                receiver: row.get(1)?,
            })
        })?;

        let mut pairs = Vec::new();
        for pair in rows {
            pairs.push(pair?);
        }
        if pairs.is_empty() {
            return Ok(None);
        }
        Ok(Some(Assignment::from_pairs(pairs)))
    }

    pub async fn reveal_records(&self) -> Result<Vec<RevealRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT giver, revealed_at FROM revealed ORDER BY revealed_at, giver")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (giver, raw) = row?;
            let revealed_at = DateTime::parse_from_rfc3339(&raw)
                .map_err(|source| StoreError::Timestamp {
                    giver: giver.clone(),
                    source,
                })?
                .with_timezone(&Utc);
            records.push(RevealRecord { giver, revealed_at });
        }
        Ok(records)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments (
            giver TEXT PRIMARY KEY,
            receiver TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS revealed (
            giver TEXT PRIMARY KEY,
            revealed_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

// Statement helpers shared by the one-shot methods above and by callers
// composing several steps inside `Store::atomically`.

pub fn assignment_exists(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM assignments", [], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn replace_assignment(conn: &Connection, assignment: &Assignment) -> Result<()> {
    conn.execute("DELETE FROM assignments", [])?;
    conn.execute("DELETE FROM revealed", [])?;

    let mut stmt = conn.prepare("INSERT INTO assignments (giver, receiver) VALUES (?1, ?2)")?;
    for pair in assignment.pairs() {
        stmt.execute(params![pair.giver, pair.receiver])?;
    }
    Ok(())
}

pub fn load_receiver(conn: &Connection, giver: &str) -> Result<Option<String>> {
    let receiver = conn
        .query_row(
            "SELECT receiver FROM assignments WHERE giver = ?1",
            params![giver],
            |row| row.get(0),
        )
        .optional()?;
    Ok(receiver)
}

pub fn is_revealed(conn: &Connection, giver: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM revealed WHERE giver = ?1",
        params![giver],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Idempotent: a second mark for the same giver keeps the first timestamp.
/// Timestamps are stored with a fixed width so text order is time order.
pub fn insert_reveal(conn: &Connection, giver: &str, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO revealed (giver, revealed_at) VALUES (?1, ?2)",
        params![giver, at.to_rfc3339_opts(SecondsFormat::Micros, true)],
    )?;
    Ok(())
}
