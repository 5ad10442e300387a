//! Persistence for conversations, messages, and quotes
//!
//! Every transition-related mutation is a single transaction: status writes,
//! their message append, and quote/PO rows commit or roll back together, so a
//! failed transition leaves no partial side effects behind.

mod schema;

pub use schema::*;

use crate::state_machine::{MessageDraft, Status};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("quote not found for conversation: {0}")]
    QuoteNotFound(String),
    #[error("conversation {id} is {current}, cannot {action}")]
    StatusConflict {
        id: String,
        current: Status,
        action: &'static str,
    },
    #[error("quote already submitted for conversation: {0}")]
    DuplicateQuote(String),
}

pub type DbResult<T> = Result<T, DbError>;

const CONVERSATION_COLUMNS: &str =
    "id, vendor_id, opportunity_id, vendor_email, status, po_number, created_at, updated_at";

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
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        // Cascade deletes (retention purge) depend on this pragma
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Conversation Operations ====================

    /// Atomic insert-if-absent keyed on (vendor_id, opportunity_id).
    ///
    /// Returns the conversation and whether this call created it. The
    /// `opening` message is recorded only on a fresh insert, in the same
    /// transaction, so racing callers can never produce two rows or two
    /// opening messages.
    pub fn create_or_get_conversation(
        &self,
        vendor_id: i64,
        opportunity_id: &str,
        vendor_email: &str,
        opening: Option<&MessageDraft>,
    ) -> DbResult<(Conversation, bool)> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();

        let inserted = tx.execute(
            "INSERT INTO conversations \
                 (id, vendor_id, opportunity_id, vendor_email, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6) \
             ON CONFLICT(vendor_id, opportunity_id) DO NOTHING",
            params![
                id,
                vendor_id,
                opportunity_id,
                vendor_email,
                Status::Pending,
                now.to_rfc3339()
            ],
        )?;
        let created = inserted == 1;

        if created {
            if let Some(draft) = opening {
                insert_message(&tx, &id, draft, &now)?;
            }
        }

        let conversation = tx
            .query_row(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations \
                     WHERE vendor_id = ?1 AND opportunity_id = ?2"
                ),
                params![vendor_id, opportunity_id],
                conversation_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    DbError::ConversationNotFound(format!("{vendor_id}/{opportunity_id}"))
                }
                other => DbError::Sqlite(other),
            })?;

        tx.commit()?;
        Ok((conversation, created))
    }

    /// Get conversation by ID
    pub fn get_conversation(&self, id: &str) -> DbResult<Conversation> {
        let conn = self.conn.lock().unwrap();
        fetch_conversation(&conn, id)
    }

    /// List all conversations for an opportunity, newest activity first
    pub fn list_conversations(&self, opportunity_id: &str) -> DbResult<Vec<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE opportunity_id = ?1 ORDER BY updated_at DESC"
        ))?;

        let rows = stmt.query_map(params![opportunity_id], conversation_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Consistent read of every still-quoted conversation for an opportunity,
    /// excluding the winner. Input to the sibling-decline pass.
    pub fn quoted_siblings(
        &self,
        opportunity_id: &str,
        winner_id: &str,
    ) -> DbResult<Vec<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE opportunity_id = ?1 AND status = ?2 AND id != ?3"
        ))?;

        let rows = stmt.query_map(
            params![opportunity_id, Status::Quoted, winner_id],
            conversation_from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Compare-and-set status change plus its message append, atomically.
    ///
    /// Fails with `StatusConflict` (and writes nothing) unless the current
    /// status is one of `expected`. `action` names the attempted operation
    /// for the conflict message.
    pub fn apply_transition(
        &self,
        id: &str,
        expected: &[Status],
        new_status: Status,
        message: &MessageDraft,
        action: &'static str,
    ) -> DbResult<Conversation> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now();

        let current = current_status(&tx, id)?;
        if !expected.contains(&current) {
            return Err(DbError::StatusConflict {
                id: id.to_string(),
                current,
                action,
            });
        }

        tx.execute(
            "UPDATE conversations SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![new_status, now.to_rfc3339(), id],
        )?;
        insert_message(&tx, id, message, &now)?;

        let conversation = fetch_conversation(&tx, id)?;
        tx.commit()?;
        Ok(conversation)
    }

    /// Record a quote and mark the conversation `quoted`, atomically.
    ///
    /// The duplicate check, quote insert, status CAS, and message append are
    /// one transaction; a second submission fails with `DuplicateQuote` and
    /// leaves status, messages, and the quote table unchanged.
    pub fn record_quote(
        &self,
        conversation_id: &str,
        quote: &NewQuote,
        expected: &[Status],
        message: &MessageDraft,
    ) -> DbResult<(Conversation, Quote)> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now();

        let conversation = fetch_conversation(&tx, conversation_id)?;

        let already_quoted: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM quotes WHERE conversation_id = ?1)",
            params![conversation_id],
            |row| row.get(0),
        )?;
        if already_quoted {
            return Err(DbError::DuplicateQuote(conversation_id.to_string()));
        }

        if !expected.contains(&conversation.status) {
            return Err(DbError::StatusConflict {
                id: conversation_id.to_string(),
                current: conversation.status,
                action: "submit a quote",
            });
        }

        let quote_id = uuid::Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO quotes \
                 (id, conversation_id, vendor_id, opportunity_id, amount, notes, \
                  arrival_date, arrival_time, submitted_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                quote_id,
                conversation_id,
                conversation.vendor_id,
                conversation.opportunity_id,
                quote.amount,
                quote.notes,
                quote.arrival_date,
                quote.arrival_time,
                now.to_rfc3339()
            ],
        )?;

        tx.execute(
            "UPDATE conversations SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![Status::Quoted, now.to_rfc3339(), conversation_id],
        )?;
        insert_message(&tx, conversation_id, message, &now)?;

        let conversation = fetch_conversation(&tx, conversation_id)?;
        let stored = fetch_quote(&tx, conversation_id)?
            .ok_or_else(|| DbError::QuoteNotFound(conversation_id.to_string()))?;
        tx.commit()?;
        Ok((conversation, stored))
    }

    /// Issue a purchase order: CAS `agreement_signed -> po_issued`, persist
    /// the generated number, append the message. The stored number is never
    /// overwritten, so re-reads always return the first-issued value.
    pub fn record_po(
        &self,
        id: &str,
        po_number: &str,
        message: &MessageDraft,
    ) -> DbResult<Conversation> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now();

        let current = current_status(&tx, id)?;
        if current != Status::AgreementSigned {
            return Err(DbError::StatusConflict {
                id: id.to_string(),
                current,
                action: "issue a purchase order",
            });
        }

        tx.execute(
            "UPDATE conversations SET status = ?1, po_number = ?2, updated_at = ?3 \
             WHERE id = ?4 AND po_number IS NULL",
            params![Status::PoIssued, po_number, now.to_rfc3339(), id],
        )?;
        insert_message(&tx, id, message, &now)?;

        let conversation = fetch_conversation(&tx, id)?;
        tx.commit()?;
        Ok(conversation)
    }

    /// Purge conversations created before the cutoff. Messages and quotes
    /// cascade. Returns the number of conversations removed.
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<usize> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM conversations WHERE created_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(removed)
    }

    // ==================== Quote Operations ====================

    /// Get the quote for a conversation, failing if none exists
    pub fn get_quote(&self, conversation_id: &str) -> DbResult<Quote> {
        self.find_quote(conversation_id)?
            .ok_or_else(|| DbError::QuoteNotFound(conversation_id.to_string()))
    }

    /// Get the quote for a conversation, if any
    pub fn find_quote(&self, conversation_id: &str) -> DbResult<Option<Quote>> {
        let conn = self.conn.lock().unwrap();
        fetch_quote(&conn, conversation_id).map_err(DbError::from)
    }

    /// List all quotes submitted for an opportunity
    pub fn list_quotes(&self, opportunity_id: &str) -> DbResult<Vec<Quote>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, vendor_id, opportunity_id, amount, notes, \
                    arrival_date, arrival_time, submitted_at \
             FROM quotes WHERE opportunity_id = ?1 ORDER BY submitted_at ASC",
        )?;

        let rows = stmt.query_map(params![opportunity_id], quote_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Message Operations ====================

    /// Get the message log for a conversation, oldest first
    pub fn get_messages(&self, conversation_id: &str) -> DbResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, direction, subject, body, created_at \
             FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id], |row| {
            Ok(Message {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                direction: row.get(2)?,
                subject: row.get(3)?,
                body: row.get(4)?,
                created_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

// ==================== Row Helpers ====================

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        vendor_id: row.get(1)?,
        opportunity_id: row.get(2)?,
        vendor_email: row.get(3)?,
        status: row.get(4)?,
        po_number: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn quote_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Quote> {
    Ok(Quote {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        vendor_id: row.get(2)?,
        opportunity_id: row.get(3)?,
        amount: row.get(4)?,
        notes: row.get(5)?,
        arrival_date: row.get(6)?,
        arrival_time: row.get(7)?,
        submitted_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn fetch_conversation(conn: &Connection, id: &str) -> DbResult<Conversation> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
        params![id],
        conversation_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::ConversationNotFound(id.to_string()),
        other => DbError::Sqlite(other),
    })
}

fn current_status(conn: &Connection, id: &str) -> DbResult<Status> {
    conn.query_row(
        "SELECT status FROM conversations WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::ConversationNotFound(id.to_string()),
        other => DbError::Sqlite(other),
    })
}

fn fetch_quote(conn: &Connection, conversation_id: &str) -> rusqlite::Result<Option<Quote>> {
    use rusqlite::OptionalExtension;

    conn.query_row(
        "SELECT id, conversation_id, vendor_id, opportunity_id, amount, notes, \
                arrival_date, arrival_time, submitted_at \
         FROM quotes WHERE conversation_id = ?1",
        params![conversation_id],
        quote_from_row,
    )
    .optional()
}

fn insert_message(
    conn: &Connection,
    conversation_id: &str,
    draft: &MessageDraft,
    now: &DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, direction, subject, body, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            uuid::Uuid::new_v4().to_string(),
            conversation_id,
            draft.direction,
            draft.subject,
            draft.body,
            now.to_rfc3339()
        ],
    )?;
    Ok(())
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::Direction;
    use chrono::Duration;

    fn draft(direction: Direction, subject: &str) -> MessageDraft {
        MessageDraft {
            direction,
            subject: subject.to_string(),
            body: format!("{subject} body"),
        }
    }

    fn opening() -> MessageDraft {
        draft(Direction::Outbound, "New Project Opportunity")
    }

    #[test]
    fn create_or_get_is_idempotent() {
        let db = Database::open_in_memory().unwrap();

        let (first, created) = db
            .create_or_get_conversation(1, "opp-1", "a@example.com", Some(&opening()))
            .unwrap();
        assert!(created);
        assert_eq!(first.status, Status::Pending);

        let (second, created) = db
            .create_or_get_conversation(1, "opp-1", "a@example.com", Some(&opening()))
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);

        // Opening message recorded exactly once
        assert_eq!(db.get_messages(&first.id).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_creation_yields_one_row() {
        let db = Database::open_in_memory().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || {
                    let (_, created) = db
                        .create_or_get_conversation(9, "opp-race", "r@example.com", Some(&opening()))
                        .unwrap();
                    created
                })
            })
            .collect();

        let created_count = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&created| created)
            .count();

        assert_eq!(created_count, 1);
        assert_eq!(db.list_conversations("opp-race").unwrap().len(), 1);
    }

    #[test]
    fn apply_transition_enforces_expected_status() {
        let db = Database::open_in_memory().unwrap();
        let (conv, _) = db
            .create_or_get_conversation(2, "opp-2", "b@example.com", None)
            .unwrap();

        let updated = db
            .apply_transition(
                &conv.id,
                &[Status::Pending],
                Status::Interested,
                &draft(Direction::Inbound, "Interested in Opportunity"),
                "record a response",
            )
            .unwrap();
        assert_eq!(updated.status, Status::Interested);

        // Second CAS from pending loses
        let err = db
            .apply_transition(
                &conv.id,
                &[Status::Pending],
                Status::NotInterested,
                &draft(Direction::Inbound, "Declined Opportunity"),
                "record a response",
            )
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::StatusConflict {
                current: Status::Interested,
                ..
            }
        ));

        // Conflict wrote nothing
        assert_eq!(db.get_messages(&conv.id).unwrap().len(), 1);
        assert_eq!(db.get_conversation(&conv.id).unwrap().status, Status::Interested);
    }

    #[test]
    fn apply_transition_on_missing_conversation_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .apply_transition(
                "nope",
                &[Status::Pending],
                Status::Interested,
                &draft(Direction::Inbound, "x"),
                "record a response",
            )
            .unwrap_err();
        assert!(matches!(err, DbError::ConversationNotFound(_)));
    }

    #[test]
    fn record_quote_rejects_duplicates_without_side_effects() {
        let db = Database::open_in_memory().unwrap();
        let (conv, _) = db
            .create_or_get_conversation(3, "opp-3", "c@example.com", None)
            .unwrap();

        let quote = NewQuote {
            amount: 800.0,
            notes: None,
            arrival_date: None,
            arrival_time: None,
        };
        let (updated, stored) = db
            .record_quote(
                &conv.id,
                &quote,
                &[Status::Pending, Status::Interested],
                &draft(Direction::Inbound, "Quote Submitted"),
            )
            .unwrap();
        assert_eq!(updated.status, Status::Quoted);
        assert_eq!(stored.amount, 800.0);

        let err = db
            .record_quote(
                &conv.id,
                &quote,
                &[Status::Pending, Status::Interested],
                &draft(Direction::Inbound, "Quote Submitted"),
            )
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateQuote(_)));

        assert_eq!(db.list_quotes("opp-3").unwrap().len(), 1);
        assert_eq!(db.get_messages(&conv.id).unwrap().len(), 1);
        assert_eq!(db.get_conversation(&conv.id).unwrap().status, Status::Quoted);
    }

    #[test]
    fn concurrent_quote_submissions_persist_one_row() {
        let db = Database::open_in_memory().unwrap();
        let (conv, _) = db
            .create_or_get_conversation(4, "opp-4", "d@example.com", None)
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let db = db.clone();
                let id = conv.id.clone();
                std::thread::spawn(move || {
                    db.record_quote(
                        &id,
                        &NewQuote {
                            amount: 100.0 + f64::from(i),
                            notes: None,
                            arrival_date: None,
                            arrival_time: None,
                        },
                        &[Status::Pending, Status::Interested],
                        &draft(Direction::Inbound, "Quote Submitted"),
                    )
                    .is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(db.list_quotes("opp-4").unwrap().len(), 1);
    }

    #[test]
    fn po_number_is_written_once_and_stable() {
        let db = Database::open_in_memory().unwrap();
        let (conv, _) = db
            .create_or_get_conversation(5, "opp-5", "e@example.com", None)
            .unwrap();

        // Walk to agreement_signed
        for (expected, next) in [
            (Status::Pending, Status::Quoted),
            (Status::Quoted, Status::Awarded),
            (Status::Awarded, Status::AgreementSigned),
        ] {
            db.apply_transition(
                &conv.id,
                &[expected],
                next,
                &draft(Direction::Inbound, "step"),
                "step",
            )
            .unwrap();
        }

        let issued = db
            .record_po(
                &conv.id,
                "PO-1756500000000-5",
                &draft(Direction::Outbound, "Purchase Order"),
            )
            .unwrap();
        assert_eq!(issued.status, Status::PoIssued);
        assert_eq!(issued.po_number.as_deref(), Some("PO-1756500000000-5"));

        // Retry with a fresh number conflicts and leaves the original intact
        let err = db
            .record_po(
                &conv.id,
                "PO-9999999999999-5",
                &draft(Direction::Outbound, "Purchase Order"),
            )
            .unwrap_err();
        assert!(matches!(err, DbError::StatusConflict { .. }));

        let fetched = db.get_conversation(&conv.id).unwrap();
        assert_eq!(fetched.po_number.as_deref(), Some("PO-1756500000000-5"));
    }

    #[test]
    fn purge_cascades_to_messages_and_quotes() {
        let db = Database::open_in_memory().unwrap();
        let (conv, _) = db
            .create_or_get_conversation(6, "opp-6", "f@example.com", Some(&opening()))
            .unwrap();
        db.record_quote(
            &conv.id,
            &NewQuote {
                amount: 50.0,
                notes: None,
                arrival_date: None,
                arrival_time: None,
            },
            &[Status::Pending],
            &draft(Direction::Inbound, "Quote Submitted"),
        )
        .unwrap();

        let removed = db
            .purge_older_than(Utc::now() + Duration::hours(1))
            .unwrap();
        assert_eq!(removed, 1);

        assert!(matches!(
            db.get_conversation(&conv.id).unwrap_err(),
            DbError::ConversationNotFound(_)
        ));
        assert!(db.get_messages(&conv.id).unwrap().is_empty());
        assert!(db.find_quote(&conv.id).unwrap().is_none());
        assert!(db.list_quotes("opp-6").unwrap().is_empty());
    }
}
