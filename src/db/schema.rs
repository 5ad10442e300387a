//! Database schema and record types

use crate::state_machine::{Direction, Status, UnknownStatus};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::Serialize;

/// SQL schema for initialization
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    vendor_id INTEGER NOT NULL,
    opportunity_id TEXT NOT NULL,
    vendor_email TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    po_number TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_vendor_opportunity
    ON conversations(vendor_id, opportunity_id);
CREATE INDEX IF NOT EXISTS idx_conversations_opportunity
    ON conversations(opportunity_id, status);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    direction TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(conversation_id, created_at);

CREATE TABLE IF NOT EXISTS quotes (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    vendor_id INTEGER NOT NULL,
    opportunity_id TEXT NOT NULL,
    amount REAL NOT NULL,
    notes TEXT,
    arrival_date TEXT,
    arrival_time TEXT,
    submitted_at TEXT NOT NULL,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_quotes_conversation
    ON quotes(conversation_id);
CREATE INDEX IF NOT EXISTS idx_quotes_opportunity
    ON quotes(opportunity_id);
"#;

/// Per-vendor-per-opportunity interaction record
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub vendor_id: i64,
    pub opportunity_id: String,
    pub vendor_email: String,
    pub status: Status,
    /// Set once at PO issuance; stable across re-reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only message-log entry
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub direction: Direction,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A vendor's bid for a conversation. At most one per conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub id: String,
    pub conversation_id: String,
    pub vendor_id: i64,
    pub opportunity_id: String,
    pub amount: f64,
    pub notes: Option<String>,
    pub arrival_date: Option<String>,
    pub arrival_time: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Quote fields accepted from the submission form
#[derive(Debug, Clone)]
pub struct NewQuote {
    pub amount: f64,
    pub notes: Option<String>,
    pub arrival_date: Option<String>,
    pub arrival_time: Option<String>,
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: UnknownStatus| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Direction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: UnknownStatus| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Direction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}
