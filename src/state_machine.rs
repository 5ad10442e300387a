//! Conversation lifecycle state machine
//!
//! Pure transitions: the current status plus an event produce a new status
//! and a list of effects. All I/O happens in the engine, after the fact.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, MessageDraft, NoticeDraft};
pub use event::Event;
pub use state::{Direction, Status, TransitionContext, UnknownStatus};
pub use transition::{opportunity_sent_message, transition, TransitionError, TransitionResult};
