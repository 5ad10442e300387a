//! API request and response types

use crate::db::{Conversation, Message, Quote};
use crate::directory::VendorProfile;
use serde::{Deserialize, Serialize};

/// Request to start a conversation with a vendor
#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub vendor_id: i64,
    pub opportunity_id: String,
}

/// A vendor's yes/no response submitted through the API
#[derive(Debug, Deserialize)]
pub struct VendorResponseRequest {
    pub vendor_id: i64,
    pub opportunity_id: String,
    pub interested: bool,
}

/// Query string on the emailed response link
#[derive(Debug, Deserialize)]
pub struct RespondQuery {
    /// "yes" or "no"
    pub interested: String,
}

/// Quote submitted through the bid request form
#[derive(Debug, Deserialize)]
pub struct SubmitQuoteRequest {
    pub conversation_id: String,
    pub amount: f64,
    pub notes: Option<String>,
    pub arrival_date: Option<String>,
    pub arrival_time: Option<String>,
}

/// E-signature on the service agreement
#[derive(Debug, Deserialize)]
pub struct SignAgreementRequest {
    pub conversation_id: String,
    pub full_name: String,
    pub title: String,
}

/// Filter for listing endpoints
#[derive(Debug, Deserialize)]
pub struct OpportunityQuery {
    pub opportunity_id: String,
}

/// Filter for quote lookups: by conversation or by opportunity
#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub conversation_id: Option<String>,
    pub opportunity_id: Option<String>,
}

/// Response for conversation creation
#[derive(Debug, Serialize)]
pub struct StartConversationResponse {
    pub conversation: Conversation,
    pub created: bool,
}

/// Response with a list of conversations
#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}

/// Response with a single conversation
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation: Conversation,
}

/// Response with a conversation's message log
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Response for a recorded vendor response
#[derive(Debug, Serialize)]
pub struct VendorResponseResponse {
    pub conversation: Conversation,
    /// False when this response had already been recorded
    pub applied: bool,
}

/// Response for quote submission
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub conversation: Conversation,
    pub quote: Quote,
}

/// Response with all quotes for an opportunity
#[derive(Debug, Serialize)]
pub struct QuoteListResponse {
    pub quotes: Vec<Quote>,
}

/// Response for buyer approval
#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub conversation: Conversation,
    pub rejected_count: usize,
}

/// Response for agreement signing
#[derive(Debug, Serialize)]
pub struct SignAgreementResponse {
    pub conversation: Conversation,
    pub po_number: String,
}

/// Response for the manual cleanup endpoint
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

/// Response with a vendor profile
#[derive(Debug, Serialize)]
pub struct VendorResponse {
    pub vendor: VendorProfile,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
