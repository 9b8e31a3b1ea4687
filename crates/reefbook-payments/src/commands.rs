//! Commands for the Payment Reconciliation context.

use uuid::Uuid;

use reefbook_core::actor::Actor;

/// Open a hosted-checkout payment for a pending booking.
#[derive(Debug, Clone)]
pub struct InitiateGatewayPayment {
    /// The initiating actor (owner or staff).
    pub actor: Actor,
    /// The booking to pay for.
    pub booking_id: Uuid,
}

/// Issue manual bank transfer instructions for a pending booking.
#[derive(Debug, Clone)]
pub struct CreateBankTransfer {
    /// The initiating actor (owner or staff).
    pub actor: Actor,
    /// The booking to pay for.
    pub booking_id: Uuid,
}

/// Confirm that a manual bank transfer arrived.
#[derive(Debug, Clone)]
pub struct ConfirmBankTransfer {
    /// The confirming administrator.
    pub actor: Actor,
    /// The booking the wire pays for.
    pub booking_id: Uuid,
    /// Bank-side transaction reference, the transfer evidence.
    pub transaction_id: String,
    /// Free-text operator note.
    pub note: Option<String>,
}
