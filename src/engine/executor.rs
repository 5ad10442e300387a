//! Engine operations on a single conversation

use super::traits::{Notifier, VendorDirectory};
use crate::db::{Conversation, Database, DbError, NewQuote, Quote};
use crate::directory::VendorProfile;
use crate::state_machine::{
    opportunity_sent_message, transition, Effect, Event, MessageDraft, NoticeDraft, Status,
    TransitionContext, TransitionError,
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("conversation not found: {0}")]
    NotFound(String),
    #[error("vendor not found: {0}")]
    VendorNotFound(i64),
    #[error("conversation is {current}, cannot {action}")]
    StateConflict {
        current: Status,
        action: String,
    },
    #[error("a quote was already submitted for this conversation")]
    DuplicateQuote,
    #[error("no quote on file for this conversation")]
    QuoteRequired,
    #[error("store error: {0}")]
    Store(DbError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbError> for EngineError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ConversationNotFound(id) => EngineError::NotFound(id),
            DbError::QuoteNotFound(_) => EngineError::QuoteRequired,
            DbError::StatusConflict {
                current, action, ..
            } => EngineError::StateConflict {
                current,
                action: action.to_string(),
            },
            DbError::DuplicateQuote(_) => EngineError::DuplicateQuote,
            other => EngineError::Store(other),
        }
    }
}

impl From<TransitionError> for EngineError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::StateConflict { current, action } => EngineError::StateConflict {
                current,
                action: action.to_string(),
            },
            TransitionError::DuplicateQuote => EngineError::DuplicateQuote,
            TransitionError::QuoteRequired => EngineError::QuoteRequired,
        }
    }
}

/// Result of starting (or re-requesting) a conversation
#[derive(Debug)]
pub struct StartOutcome {
    pub conversation: Conversation,
    /// False when the (vendor, opportunity) pair already had a row
    pub created: bool,
    pub notify_failures: usize,
}

/// Result of a single applied-or-skipped transition
#[derive(Debug)]
pub struct TransitionOutcome {
    pub conversation: Conversation,
    /// False when the event had already been applied (idempotent repeat)
    pub applied: bool,
    pub notify_failures: usize,
}

/// Result of a quote submission
#[derive(Debug)]
pub struct QuoteOutcome {
    pub conversation: Conversation,
    pub quote: Quote,
}

/// Result of signing: the agreement is recorded and the PO issued
#[derive(Debug)]
pub struct SignOutcome {
    pub conversation: Conversation,
    pub po_number: String,
    pub notify_failures: usize,
}

/// Runs transitions against the store and dispatches their notifications
pub struct ConversationEngine {
    db: Database,
    directory: Arc<dyn VendorDirectory>,
    notifier: Arc<dyn Notifier>,
    base_url: String,
}

impl ConversationEngine {
    pub fn new(
        db: Database,
        directory: Arc<dyn VendorDirectory>,
        notifier: Arc<dyn Notifier>,
        base_url: String,
    ) -> Self {
        Self {
            db,
            directory,
            notifier,
            base_url,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn vendor(&self, id: i64) -> Result<VendorProfile, EngineError> {
        self.directory
            .vendor(id)
            .ok_or(EngineError::VendorNotFound(id))
    }

    /// Start a conversation for a (vendor, opportunity) pair.
    ///
    /// Idempotent: if a row already exists it is returned unchanged and no
    /// opportunity email goes out. On a fresh insert the opening message is
    /// recorded with the row and the invitation is dispatched after commit.
    pub async fn start_conversation(
        &self,
        vendor_id: i64,
        opportunity_id: &str,
    ) -> Result<StartOutcome, EngineError> {
        let vendor = self.vendor(vendor_id)?;
        let opening = opportunity_sent_message();

        let (conversation, created) = self.db.create_or_get_conversation(
            vendor_id,
            opportunity_id,
            &vendor.email,
            Some(&opening),
        )?;

        let mut notify_failures = 0;
        if created {
            let notice = opportunity_notice(&self.base_url, &vendor, &conversation.id);
            notify_failures = self.dispatch(vec![notice]).await;
        }

        Ok(StartOutcome {
            conversation,
            created,
            notify_failures,
        })
    }

    /// Record a vendor's yes/no response, creating the conversation row if
    /// the vendor responds before the buyer tracked them.
    ///
    /// A repeated identical response is a silent no-op; a flipped response
    /// is a conflict.
    pub async fn record_response(
        &self,
        vendor_id: i64,
        opportunity_id: &str,
        interested: bool,
    ) -> Result<TransitionOutcome, EngineError> {
        let vendor = self.vendor(vendor_id)?;
        // Vendor-initiated rows get no opening message
        let (conversation, _) =
            self.db
                .create_or_get_conversation(vendor_id, opportunity_id, &vendor.email, None)?;

        let ctx = TransitionContext {
            conversation: &conversation,
            vendor: &vendor,
            quote: None,
            base_url: &self.base_url,
        };
        let result = transition(&ctx, Event::VendorResponded { interested })?;

        if result.is_noop(conversation.status) {
            return Ok(TransitionOutcome {
                conversation,
                applied: false,
                notify_failures: 0,
            });
        }

        let (message, notices) = split_effects(result.effects)?;
        let applied = self.db.apply_transition(
            &conversation.id,
            &[conversation.status],
            result.new_status,
            &message,
            "record a response",
        );

        match applied {
            Ok(updated) => {
                let notify_failures = self.dispatch(notices).await;
                Ok(TransitionOutcome {
                    conversation: updated,
                    applied: true,
                    notify_failures,
                })
            }
            // Lost a race to an identical response: treat as already applied
            Err(DbError::StatusConflict { current, .. }) if current == result.new_status => {
                let conversation = self.db.get_conversation(&conversation.id)?;
                Ok(TransitionOutcome {
                    conversation,
                    applied: false,
                    notify_failures: 0,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Submit the vendor's quote. At most one quote per conversation; a
    /// second submission fails with `DuplicateQuote` regardless of timing.
    pub async fn submit_quote(
        &self,
        conversation_id: &str,
        quote: NewQuote,
    ) -> Result<QuoteOutcome, EngineError> {
        let conversation = self.db.get_conversation(conversation_id)?;
        let vendor = self.vendor(conversation.vendor_id)?;

        let ctx = TransitionContext {
            conversation: &conversation,
            vendor: &vendor,
            quote: None,
            base_url: &self.base_url,
        };
        let result = transition(
            &ctx,
            Event::QuoteSubmitted {
                amount: quote.amount,
                notes: quote.notes.clone(),
            },
        )?;

        let (message, _) = split_effects(result.effects)?;
        let (conversation, stored) =
            self.db
                .record_quote(conversation_id, &quote, &[conversation.status], &message)?;

        Ok(QuoteOutcome {
            conversation,
            quote: stored,
        })
    }

    /// Record the vendor's e-signature and issue the purchase order.
    ///
    /// Signing and issuance are separate store transactions, so a failure
    /// between them can leave the row at `agreement_signed`. Retries resume:
    /// an `agreement_signed` conversation skips straight to issuance, and a
    /// `po_issued` one returns the stored number unchanged. The number is
    /// generated once and persisted; later reads return the stored value.
    pub async fn sign_agreement(
        &self,
        conversation_id: &str,
        full_name: &str,
        title: &str,
    ) -> Result<SignOutcome, EngineError> {
        let conversation = self.db.get_conversation(conversation_id)?;
        let vendor = self.vendor(conversation.vendor_id)?;
        let quote = self.db.get_quote(conversation_id)?;

        let mut notify_failures = 0;
        let conversation = match conversation.status {
            Status::Awarded => {
                let ctx = TransitionContext {
                    conversation: &conversation,
                    vendor: &vendor,
                    quote: Some(&quote),
                    base_url: &self.base_url,
                };
                let signed = transition(
                    &ctx,
                    Event::AgreementSigned {
                        full_name: full_name.to_string(),
                        title: title.to_string(),
                    },
                )?;
                let (message, notices) = split_effects(signed.effects)?;
                match self.db.apply_transition(
                    conversation_id,
                    &[Status::Awarded],
                    signed.new_status,
                    &message,
                    "sign the agreement",
                ) {
                    Ok(updated) => {
                        notify_failures += self.dispatch(notices).await;
                        updated
                    }
                    // Lost a race to another signer; their signature stands,
                    // continue to issuance
                    Err(DbError::StatusConflict {
                        current: Status::AgreementSigned,
                        ..
                    }) => self.db.get_conversation(conversation_id)?,
                    Err(e) => return Err(e.into()),
                }
            }
            // Issuance failed after the signature committed; pick it back up
            Status::AgreementSigned => conversation,
            Status::PoIssued => {
                let po_number = stored_po_number(&conversation)?;
                return Ok(SignOutcome {
                    conversation,
                    po_number,
                    notify_failures: 0,
                });
            }
            current => {
                return Err(EngineError::StateConflict {
                    current,
                    action: "sign the agreement".to_string(),
                })
            }
        };

        let po_number = format!("PO-{}-{}", Utc::now().timestamp_millis(), vendor.id);
        let ctx = TransitionContext {
            conversation: &conversation,
            vendor: &vendor,
            quote: Some(&quote),
            base_url: &self.base_url,
        };
        let issued = transition(
            &ctx,
            Event::PoIssued {
                po_number: po_number.clone(),
            },
        )?;
        let (message, notices) = split_effects(issued.effects)?;
        match self.db.record_po(conversation_id, &po_number, &message) {
            Ok(conversation) => {
                notify_failures += self.dispatch(notices).await;
                Ok(SignOutcome {
                    conversation,
                    po_number,
                    notify_failures,
                })
            }
            // A concurrent retry issued first; its number is the one on file
            Err(DbError::StatusConflict {
                current: Status::PoIssued,
                ..
            }) => {
                let conversation = self.db.get_conversation(conversation_id)?;
                let po_number = stored_po_number(&conversation)?;
                Ok(SignOutcome {
                    conversation,
                    po_number,
                    notify_failures,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deliver notices after the store transaction has committed. Failures
    /// are logged and counted, never propagated.
    pub(super) async fn dispatch(&self, notices: Vec<NoticeDraft>) -> usize {
        let mut failures = 0;
        for notice in notices {
            if let Err(e) = self.notifier.send(&notice).await {
                warn!(to = %notice.to, subject = %notice.subject, error = %e,
                      "notification delivery failed");
                failures += 1;
            }
        }
        failures
    }

    pub(super) fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Separate an applied transition's effects into the single message to
/// persist and the notices to deliver after commit.
pub(super) fn split_effects(
    effects: Vec<Effect>,
) -> Result<(MessageDraft, Vec<NoticeDraft>), EngineError> {
    let mut message = None;
    let mut notices = vec![];
    for effect in effects {
        match effect {
            Effect::AppendMessage(draft) => message = Some(draft),
            Effect::Notify(notice) => notices.push(notice),
        }
    }
    let message = message
        .ok_or_else(|| EngineError::Internal("transition produced no message".to_string()))?;
    Ok((message, notices))
}

fn stored_po_number(conversation: &Conversation) -> Result<String, EngineError> {
    conversation.po_number.clone().ok_or_else(|| {
        EngineError::Internal("po_issued conversation has no stored number".to_string())
    })
}

fn opportunity_notice(base_url: &str, vendor: &VendorProfile, conversation_id: &str) -> NoticeDraft {
    let yes = format!("{base_url}/respond/{conversation_id}?interested=yes");
    let no = format!("{base_url}/respond/{conversation_id}?interested=no");
    NoticeDraft {
        to: vendor.email.clone(),
        subject: "New Project Opportunity".to_string(),
        body: format!(
            "Hello {},\n\n\
             We have a new project opportunity and would like to know whether \
             you are interested in bidding.\n\n\
             Yes, I'm interested: {yes}\n\
             No, not this time: {no}\n",
            vendor.display_name()
        ),
    }
}
