//! Award coordination
//!
//! Approving a quote awards exactly one vendor per opportunity and declines
//! every sibling that was still `quoted`. The winner's award commits first;
//! sibling declines then run one at a time against a fresh read, so a racing
//! approve on another conversation loses its CAS and the opportunity ends up
//! with a single winner.

use super::executor::{split_effects, ConversationEngine, EngineError};
use crate::db::Conversation;
use crate::state_machine::{transition, Event, Status, TransitionContext};
use tracing::{debug, info, warn};

/// Result of a buyer approval
#[derive(Debug)]
pub struct AwardOutcome {
    pub conversation: Conversation,
    /// Siblings moved to `declined` by this approval
    pub rejected_count: usize,
    pub notify_failures: usize,
}

impl ConversationEngine {
    /// Approve the quote on a conversation: award it, then decline every
    /// still-quoted sibling on the same opportunity.
    ///
    /// Sibling declines are best-effort. A sibling that changed status
    /// between the read and its CAS is skipped, not retried, and never
    /// fails the approval.
    pub async fn approve(&self, conversation_id: &str) -> Result<AwardOutcome, EngineError> {
        let conversation = self.db().get_conversation(conversation_id)?;
        let vendor = self.vendor(conversation.vendor_id)?;
        let quote = self.db().get_quote(conversation_id)?;

        let ctx = TransitionContext {
            conversation: &conversation,
            vendor: &vendor,
            quote: Some(&quote),
            base_url: self.base_url(),
        };
        let result = transition(&ctx, Event::BuyerApproved)?;
        let (message, notices) = split_effects(result.effects)?;

        let winner = self.db().apply_transition(
            conversation_id,
            &[Status::Quoted],
            result.new_status,
            &message,
            "approve the quote",
        )?;
        let mut notify_failures = self.dispatch(notices).await;

        // The winner is already `awarded`, so this read cannot include it
        // and a concurrent approve elsewhere has already lost its CAS.
        let siblings = self
            .db()
            .quoted_siblings(&winner.opportunity_id, &winner.id)?;

        let mut rejected_count = 0;
        for sibling in siblings {
            match self.decline_sibling(&sibling).await {
                Ok(failures) => {
                    rejected_count += 1;
                    notify_failures += failures;
                }
                Err(EngineError::StateConflict { current, .. }) => {
                    debug!(conversation_id = %sibling.id, status = %current,
                           "sibling changed status before decline, skipping");
                }
                Err(EngineError::NotFound(_)) => {
                    debug!(conversation_id = %sibling.id,
                           "sibling removed before decline, skipping");
                }
                Err(EngineError::VendorNotFound(vendor_id)) => {
                    warn!(conversation_id = %sibling.id, vendor_id,
                          "sibling vendor missing from directory, skipping decline");
                }
                Err(e) => {
                    warn!(conversation_id = %sibling.id, error = %e,
                          "failed to decline sibling");
                }
            }
        }

        info!(conversation_id = %winner.id, opportunity_id = %winner.opportunity_id,
              rejected_count, "quote approved");

        Ok(AwardOutcome {
            conversation: winner,
            rejected_count,
            notify_failures,
        })
    }

    async fn decline_sibling(&self, sibling: &Conversation) -> Result<usize, EngineError> {
        let vendor = self.vendor(sibling.vendor_id)?;
        let ctx = TransitionContext {
            conversation: sibling,
            vendor: &vendor,
            quote: None,
            base_url: self.base_url(),
        };
        let result = transition(&ctx, Event::NotSelected)?;
        let (message, notices) = split_effects(result.effects)?;

        self.db().apply_transition(
            &sibling.id,
            &[Status::Quoted],
            result.new_status,
            &message,
            "decline the bid",
        )?;
        Ok(self.dispatch(notices).await)
    }
}
