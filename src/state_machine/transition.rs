//! Pure transition function for the conversation lifecycle
//!
//! Given the same context and event this always produces the same result and
//! performs no I/O. Effects are executed by the engine: the message append is
//! part of the same store transaction as the status write, notifications run
//! after commit.

use super::effect::{Effect, MessageDraft};
use super::state::{Direction, Status, TransitionContext};
use super::Event;
use crate::db::Quote;
use crate::directory::VendorProfile;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionResult {
    pub new_status: Status,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(status: Status) -> Self {
        Self {
            new_status: status,
            effects: vec![],
        }
    }

    /// A repeated invocation whose target status is already current.
    /// Carries no effects; the engine persists nothing for these.
    pub fn already_applied(status: Status) -> Self {
        Self::new(status)
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// True when the transition leaves the conversation untouched
    pub fn is_noop(&self, current: Status) -> bool {
        self.new_status == current && self.effects.is_empty()
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("conversation is {current}, cannot {action}")]
    StateConflict {
        current: Status,
        action: &'static str,
    },
    #[error("a quote was already submitted for this conversation")]
    DuplicateQuote,
    #[error("no quote on file for this conversation")]
    QuoteRequired,
}

/// Pure transition function.
///
/// Every applied (non-no-op) result carries exactly one `AppendMessage`
/// effect whose direction matches the event's originator. Invalid
/// from-states fail with `StateConflict` and produce no effects at all.
pub fn transition(
    ctx: &TransitionContext<'_>,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let current = ctx.conversation.status;

    match (current, event) {
        // ============================================================
        // Vendor response
        // ============================================================
        (Status::Pending, Event::VendorResponded { interested: true }) => {
            let quote_url = format!("{}/quote/{}", ctx.base_url, ctx.conversation.id);
            Ok(TransitionResult::new(Status::Interested)
                .with_effect(Effect::inbound(
                    "Interested in Opportunity",
                    "Vendor accepted the opportunity invitation",
                ))
                .with_effect(Effect::notify(
                    &ctx.conversation.vendor_email,
                    "Bid Request Form - Submit Your Quote",
                    bid_request_body(ctx.vendor, &quote_url),
                )))
        }

        (Status::Pending, Event::VendorResponded { interested: false }) => {
            Ok(TransitionResult::new(Status::NotInterested).with_effect(Effect::inbound(
                "Declined Opportunity",
                "Vendor declined the opportunity invitation",
            )))
        }

        // Response link clicked twice: no second message, no second notice
        (Status::Interested, Event::VendorResponded { interested: true })
        | (Status::NotInterested, Event::VendorResponded { interested: false }) => {
            Ok(TransitionResult::already_applied(current))
        }

        // ============================================================
        // Quote submission
        // ============================================================
        (Status::Pending | Status::Interested, Event::QuoteSubmitted { amount, notes }) => {
            Ok(TransitionResult::new(Status::Quoted).with_effect(Effect::inbound(
                "Quote Submitted",
                format!(
                    "Quote amount: ${amount:.2}\n\nNotes: {}",
                    notes.as_deref().unwrap_or("None")
                ),
            )))
        }

        (Status::Quoted, Event::QuoteSubmitted { .. }) => Err(TransitionError::DuplicateQuote),

        // ============================================================
        // Award / decline
        // ============================================================
        (Status::Quoted, Event::BuyerApproved) => {
            let quote = ctx.quote.ok_or(TransitionError::QuoteRequired)?;
            let agreement_url = format!("{}/agreement/{}", ctx.base_url, ctx.conversation.id);
            Ok(TransitionResult::new(Status::Awarded)
                .with_effect(Effect::outbound(
                    "Your Bid Has Been Accepted",
                    format!("Sent agreement link: {agreement_url}"),
                ))
                .with_effect(Effect::notify(
                    &ctx.conversation.vendor_email,
                    "Congratulations! Your Bid Has Been Accepted",
                    award_body(ctx.vendor, quote, &agreement_url),
                )))
        }

        (Status::Quoted, Event::NotSelected) => Ok(TransitionResult::new(Status::Declined)
            .with_effect(Effect::outbound(
                "Update on Your Bid Submission",
                "Vendor was not selected for this opportunity",
            ))
            .with_effect(Effect::notify(
                &ctx.conversation.vendor_email,
                "Update on Your Bid Submission",
                rejection_body(ctx.vendor),
            ))),

        // ============================================================
        // Agreement signing and PO issuance
        // ============================================================
        (Status::Awarded, Event::AgreementSigned { full_name, title }) => {
            Ok(TransitionResult::new(Status::AgreementSigned).with_effect(Effect::inbound(
                "Agreement Signed",
                format!("Agreement signed by {full_name} ({title})"),
            )))
        }

        (Status::AgreementSigned, Event::PoIssued { po_number }) => {
            let quote = ctx.quote.ok_or(TransitionError::QuoteRequired)?;
            Ok(TransitionResult::new(Status::PoIssued)
                .with_effect(Effect::outbound(
                    format!("Purchase Order {po_number} - Project Confirmed"),
                    format!("Purchase order generated: {po_number}"),
                ))
                .with_effect(Effect::notify(
                    &ctx.conversation.vendor_email,
                    format!("Purchase Order {po_number} - Project Confirmed"),
                    po_body(ctx.vendor, quote, &po_number),
                )))
        }

        // ============================================================
        // Everything else is a conflict
        // ============================================================
        (current, event) => Err(TransitionError::StateConflict {
            current,
            action: event.action(),
        }),
    }
}

/// Opening message recorded when a buyer-initiated conversation row is
/// first inserted. Persisted in the same transaction as the insert.
pub fn opportunity_sent_message() -> MessageDraft {
    MessageDraft {
        direction: Direction::Outbound,
        subject: "New Project Opportunity".to_string(),
        body: "Initial opportunity email sent with Yes/No response buttons".to_string(),
    }
}

// Notification bodies. Plain text; rendering into a mail template is the
// transport's concern.

fn bid_request_body(vendor: &VendorProfile, quote_url: &str) -> String {
    format!(
        "Hello {},\n\n\
         Thank you for your interest in this opportunity. Please use the link \
         below to access the bid request form and submit your quote.\n\n\
         {quote_url}\n",
        vendor.display_name()
    )
}

fn award_body(vendor: &VendorProfile, quote: &Quote, agreement_url: &str) -> String {
    let mut body = format!(
        "Congratulations {},\n\n\
         Your bid of ${:.2} has been accepted for this project.\n",
        vendor.display_name(),
        quote.amount
    );
    if let Some(date) = &quote.arrival_date {
        body.push_str(&format!("Arrival date: {date}\n"));
    }
    if let Some(time) = &quote.arrival_time {
        body.push_str(&format!("Arrival time: {time}\n"));
    }
    body.push_str(&format!(
        "\nPlease review and sign the service agreement to proceed:\n{agreement_url}\n"
    ));
    body
}

fn rejection_body(vendor: &VendorProfile) -> String {
    format!(
        "Hello {},\n\n\
         Thank you for submitting a bid for our recent project opportunity. \
         After careful consideration we have decided to move forward with \
         another vendor for this project. We value our relationship with {} \
         and will reach out for future opportunities.\n",
        vendor.display_name(),
        vendor.company_name
    )
}

fn po_body(vendor: &VendorProfile, quote: &Quote, po_number: &str) -> String {
    let mut body = format!(
        "Dear {},\n\n\
         Thank you for signing the service agreement. Your purchase order has \
         been generated.\n\n\
         PO number: {po_number}\n\
         Company: {}\n\
         Amount: ${:.2}\n",
        vendor.display_name(),
        vendor.company_name,
        quote.amount
    );
    if let Some(date) = &quote.arrival_date {
        body.push_str(&format!("Service date: {date}\n"));
    }
    if let Some(time) = &quote.arrival_time {
        body.push_str(&format!("Service time: {time}\n"));
    }
    body
}
