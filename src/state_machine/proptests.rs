//! Property-based tests for the transition function
//!
//! These verify the invariants that hold for every (status, event) pair.

use super::effect::Effect;
use super::state::{Status, TransitionContext};
use super::transition::{transition, TransitionError};
use super::Event;
use crate::db::{Conversation, Quote};
use crate::directory::VendorProfile;
use chrono::Utc;
use proptest::prelude::*;

fn arb_status() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Pending),
        Just(Status::Interested),
        Just(Status::NotInterested),
        Just(Status::Quoted),
        Just(Status::Awarded),
        Just(Status::Declined),
        Just(Status::AgreementSigned),
        Just(Status::PoIssued),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        any::<bool>().prop_map(|interested| Event::VendorResponded { interested }),
        (1.0f64..100_000.0, proptest::option::of("[a-zA-Z ]{0,30}"))
            .prop_map(|(amount, notes)| Event::QuoteSubmitted { amount, notes }),
        Just(Event::BuyerApproved),
        Just(Event::NotSelected),
        ("[A-Za-z ]{1,20}", "[A-Za-z ]{1,12}").prop_map(|(full_name, title)| {
            Event::AgreementSigned { full_name, title }
        }),
        "PO-[0-9]{13}-[0-9]{1,4}".prop_map(|po_number| Event::PoIssued { po_number }),
    ]
}

fn test_conversation(status: Status) -> Conversation {
    let now = Utc::now();
    Conversation {
        id: "conv-prop".to_string(),
        vendor_id: 42,
        opportunity_id: "opp-prop".to_string(),
        vendor_email: "prop@example.com".to_string(),
        status,
        po_number: None,
        created_at: now,
        updated_at: now,
    }
}

fn test_vendor() -> VendorProfile {
    VendorProfile {
        id: 42,
        name: "Prop".to_string(),
        last_name: "Tester".to_string(),
        company_name: "Prop Testing LLC".to_string(),
        email: "prop@example.com".to_string(),
    }
}

fn test_quote() -> Quote {
    Quote {
        id: "quote-prop".to_string(),
        conversation_id: "conv-prop".to_string(),
        vendor_id: 42,
        opportunity_id: "opp-prop".to_string(),
        amount: 500.0,
        notes: None,
        arrival_date: None,
        arrival_time: None,
        submitted_at: Utc::now(),
    }
}

fn run(status: Status, event: Event) -> Result<super::TransitionResult, TransitionError> {
    let conversation = test_conversation(status);
    let vendor = test_vendor();
    let quote = test_quote();
    let ctx = TransitionContext {
        conversation: &conversation,
        vendor: &vendor,
        quote: Some(&quote),
        base_url: "http://localhost:8000",
    };
    transition(&ctx, event)
}

proptest! {
    /// Same inputs always produce the same outputs
    #[test]
    fn transition_is_deterministic(status in arb_status(), event in arb_event()) {
        let first = run(status, event.clone());
        let second = run(status, event);
        prop_assert_eq!(first, second);
    }

    /// Terminal statuses never change and never emit effects
    #[test]
    fn terminal_statuses_stay_terminal(status in arb_status(), event in arb_event()) {
        if status.is_terminal() {
            if let Ok(result) = run(status, event) {
                prop_assert!(result.is_noop(status));
            }
        }
    }

    /// Every applied transition appends exactly one message
    #[test]
    fn applied_transitions_append_one_message(status in arb_status(), event in arb_event()) {
        if let Ok(result) = run(status, event) {
            let appended = result
                .effects
                .iter()
                .filter(|e| matches!(e, Effect::AppendMessage(_)))
                .count();
            if result.is_noop(status) {
                prop_assert_eq!(appended, 0);
            } else {
                prop_assert_eq!(appended, 1);
            }
        }
    }

    /// Message direction matches the event originator
    #[test]
    fn message_direction_matches_originator(status in arb_status(), event in arb_event()) {
        let vendor_initiated = event.is_vendor_initiated();
        if let Ok(result) = run(status, event) {
            for effect in &result.effects {
                if let Effect::AppendMessage(draft) = effect {
                    let expected = if vendor_initiated {
                        super::Direction::Inbound
                    } else {
                        super::Direction::Outbound
                    };
                    prop_assert_eq!(draft.direction, expected);
                }
            }
        }
    }

    /// Conflicts report the status the conversation was actually in
    #[test]
    fn conflicts_name_the_current_status(status in arb_status(), event in arb_event()) {
        if let Err(TransitionError::StateConflict { current, .. }) = run(status, event) {
            prop_assert_eq!(current, status);
        }
    }
}
