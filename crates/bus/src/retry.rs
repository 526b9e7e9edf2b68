//! SQLite queue of failed deliveries awaiting manual retry

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use crate::error::{BusError, BusResult};
use crate::event::DeskEvent;

/// One subscriber's failed attempt at one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDelivery {
    pub id: String,
    pub subscriber: String,
    pub event: DeskEvent,
    pub last_error: String,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

pub struct RetryStore {
    conn: Mutex<Connection>,
}

impl RetryStore {
    pub fn new<P: AsRef<Path>>(path: P) -> BusResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> BusResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> BusResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS failed_deliveries (
                id TEXT PRIMARY KEY,
                subscriber TEXT NOT NULL,
                case_id TEXT NOT NULL,
                event_json TEXT NOT NULL,
                last_error TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_failed_deliveries_resolved
             ON failed_deliveries(resolved)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failed delivery. Returns the new row id.
    pub fn record(&self, subscriber: &str, event: &DeskEvent, error: &str) -> BusResult<String> {
        let id = format!("RTY-{}", uuid::Uuid::new_v4().simple());
        let event_json = serde_json::to_string(event)?;

        self.conn().execute(
            "INSERT INTO failed_deliveries
             (id, subscriber, case_id, event_json, last_error, attempts, created_at, resolved)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, 0)",
            params![
                id,
                subscriber,
                event.case_id().as_str(),
                event_json,
                error,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(id)
    }

    pub fn get(&self, id: &str) -> BusResult<FailedDelivery> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, subscriber, event_json, last_error, attempts, created_at, resolved
                 FROM failed_deliveries WHERE id = ?1",
                params![id],
                read_row,
            )
            .optional()?;
        row.ok_or_else(|| BusError::DeliveryNotFound(id.to_string()))?
            .decode()
    }

    /// Unresolved deliveries, oldest first
    pub fn pending(&self) -> BusResult<Vec<FailedDelivery>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, subscriber, event_json, last_error, attempts, created_at, resolved
             FROM failed_deliveries WHERE resolved = 0 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::decode).collect()
    }

    pub fn mark_resolved(&self, id: &str) -> BusResult<()> {
        let rows = self.conn().execute(
            "UPDATE failed_deliveries SET resolved = 1 WHERE id = ?1",
            params![id],
        )?;
        if rows == 0 {
            return Err(BusError::DeliveryNotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn record_attempt(&self, id: &str, error: &str) -> BusResult<()> {
        let rows = self.conn().execute(
            "UPDATE failed_deliveries SET attempts = attempts + 1, last_error = ?1 WHERE id = ?2",
            params![error, id],
        )?;
        if rows == 0 {
            return Err(BusError::DeliveryNotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn pending_count(&self) -> BusResult<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM failed_deliveries WHERE resolved = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

struct RawRow {
    id: String,
    subscriber: String,
    event_json: String,
    last_error: String,
    attempts: u32,
    created_at: String,
    resolved: bool,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        subscriber: row.get(1)?,
        event_json: row.get(2)?,
        last_error: row.get(3)?,
        attempts: row.get(4)?,
        created_at: row.get(5)?,
        resolved: row.get(6)?,
    })
}

impl RawRow {
    fn decode(self) -> BusResult<FailedDelivery> {
        let event = serde_json::from_str(&self.event_json)?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|_| BusError::CorruptRow(self.id.clone()))?
            .with_timezone(&Utc);
        Ok(FailedDelivery {
            id: self.id,
            subscriber: self.subscriber,
            event,
            last_error: self.last_error,
            attempts: self.attempts,
            created_at,
            resolved: self.resolved,
        })
    }
}
