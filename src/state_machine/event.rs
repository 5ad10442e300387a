//! Events that drive conversation transitions

/// Events that trigger status transitions.
///
/// Conversation creation is not an event: rows are born `pending` via the
/// store's insert-if-absent operation, with the opening message supplied by
/// [`super::transition::opportunity_sent_message`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // Vendor events
    VendorResponded {
        interested: bool,
    },
    QuoteSubmitted {
        amount: f64,
        notes: Option<String>,
    },
    AgreementSigned {
        full_name: String,
        title: String,
    },

    // Buyer / system events
    BuyerApproved,
    /// A sibling conversation lost the award race
    NotSelected,
    PoIssued {
        po_number: String,
    },
}

impl Event {
    /// Short action name used in conflict error messages
    pub fn action(&self) -> &'static str {
        match self {
            Event::VendorResponded { .. } => "record a response",
            Event::QuoteSubmitted { .. } => "submit a quote",
            Event::AgreementSigned { .. } => "sign the agreement",
            Event::BuyerApproved => "approve",
            Event::NotSelected => "decline",
            Event::PoIssued { .. } => "issue a purchase order",
        }
    }

    /// Whether the event originates from the vendor side
    pub fn is_vendor_initiated(&self) -> bool {
        matches!(
            self,
            Event::VendorResponded { .. }
                | Event::QuoteSubmitted { .. }
                | Event::AgreementSigned { .. }
        )
    }
}
