//! Database module
//!
//! Provides persistence for conversation state, one row per conversation.

mod schema;

pub use schema::*;

use crate::state_machine::ConversationState;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Stored state is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Database connection lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn get_state(&self, id: &str) -> DbResult<Option<ConversationState>> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT state FROM conversation_states WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(DbError::from))
            .transpose()
    }

    /// Insert or replace the state of a conversation
    pub fn save_state(&self, id: &str, state: &ConversationState) -> DbResult<()> {
        let json = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO conversation_states (id, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![id, json, now],
        )?;
        Ok(())
    }

    pub fn delete_state(&self, id: &str) -> DbResult<()> {
        self.conn()?
            .execute("DELETE FROM conversation_states WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// All stored conversations, most recently updated first
    pub fn list_conversations(&self) -> DbResult<Vec<StoredConversation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, state, created_at, updated_at FROM conversation_states
             ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, state, created_at, updated_at) = row?;
            out.push(StoredConversation {
                id,
                state: serde_json::from_str(&state)?,
                created_at: parse_datetime(&created_at),
                updated_at: parse_datetime(&updated_at),
            });
        }
        Ok(out)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
