//! Conversation engine
//!
//! Drives the pure state machine against the store: runs a transition,
//! persists the status change and message atomically, then dispatches
//! notifications. Award fan-out (decline the losing bidders) lives in the
//! coordinator.

mod coordinator;
mod executor;
mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ConversationEngine, EngineError};
pub use traits::Notifier;
