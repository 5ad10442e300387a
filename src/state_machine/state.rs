//! Conversation status types

use crate::db::{Conversation, Quote};
use crate::directory::VendorProfile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a conversation.
///
/// `pending -> {interested, not_interested} -> quoted -> {awarded, declined}
/// -> agreement_signed -> po_issued`. `not_interested`, `declined`, and
/// `po_issued` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    Interested,
    NotInterested,
    Quoted,
    Awarded,
    Declined,
    AgreementSigned,
    PoIssued,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Interested => "interested",
            Status::NotInterested => "not_interested",
            Status::Quoted => "quoted",
            Status::Awarded => "awarded",
            Status::Declined => "declined",
            Status::AgreementSigned => "agreement_signed",
            Status::PoIssued => "po_issued",
        }
    }

    /// Check whether any further transition can leave this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::NotInterested | Status::Declined | Status::PoIssued
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored status string no longer matches the known set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown conversation status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "interested" => Ok(Status::Interested),
            "not_interested" => Ok(Status::NotInterested),
            "quoted" => Ok(Status::Quoted),
            "awarded" => Ok(Status::Awarded),
            "declined" => Ok(Status::Declined),
            "agreement_signed" => Ok(Status::AgreementSigned),
            "po_issued" => Ok(Status::PoIssued),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Originator of a message-log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// From the vendor (responses, quotes, signatures)
    Inbound,
    /// From the buyer or the system (invitations, awards, PO issuance)
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(Direction::Inbound),
            "outbound" => Ok(Direction::Outbound),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Immutable inputs for composing a transition's side effects.
///
/// The quote is only required for events whose messages reference bid terms
/// (approval, PO issuance); callers pass `None` otherwise.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub conversation: &'a Conversation,
    pub vendor: &'a VendorProfile,
    pub quote: Option<&'a Quote>,
    /// Public base URL used to build quote-form and agreement links
    pub base_url: &'a str,
}
