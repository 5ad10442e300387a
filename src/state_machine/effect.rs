//! Effects produced by state transitions

use super::state::Direction;

/// Effects to be executed alongside a status change.
///
/// `AppendMessage` is persisted atomically with the status write; `Notify`
/// runs after the store transaction commits and is best-effort.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    AppendMessage(MessageDraft),
    Notify(NoticeDraft),
}

/// A message-log entry awaiting persistence
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub direction: Direction,
    pub subject: String,
    pub body: String,
}

/// An outbound notification awaiting delivery
#[derive(Debug, Clone, PartialEq)]
pub struct NoticeDraft {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Effect {
    pub fn inbound(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Effect::AppendMessage(MessageDraft {
            direction: Direction::Inbound,
            subject: subject.into(),
            body: body.into(),
        })
    }

    pub fn outbound(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Effect::AppendMessage(MessageDraft {
            direction: Direction::Outbound,
            subject: subject.into(),
            body: body.into(),
        })
    }

    pub fn notify(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Effect::Notify(NoticeDraft {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        })
    }
}
