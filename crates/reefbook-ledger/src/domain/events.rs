//! Domain events for the Booking Ledger context.
//!
//! Emitted by command handlers after a successful write. Consumers
//! (notification dispatch, real-time fan-out) run outside the write path;
//! losing an event never rolls back the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::booking::{BookingStatus, PaymentMethod};
use super::experience::ExperienceStatus;

/// Events produced by the Booking Ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A booking was created and awaits payment.
    BookingCreated {
        /// The booking.
        booking_id: Uuid,
        /// External reference.
        booking_number: String,
        /// The owner.
        customer_id: Uuid,
        /// Amount due.
        total_amount: i64,
        /// ISO currency code.
        currency: String,
    },
    /// A payment was verified and the booking confirmed.
    PaymentReceived {
        /// The booking.
        booking_id: Uuid,
        /// External reference.
        booking_number: String,
        /// The owner.
        customer_id: Uuid,
        /// Verified amount.
        amount: i64,
        /// Gateway transaction id or transfer evidence.
        transaction_id: String,
        /// How it was paid.
        method: PaymentMethod,
    },
    /// The gateway reported a failed payment.
    PaymentFailed {
        /// The booking.
        booking_id: Uuid,
        /// External reference.
        booking_number: String,
        /// The owner.
        customer_id: Uuid,
        /// Gateway message.
        reason: String,
    },
    /// Bank transfer instructions were issued.
    BankTransferInstructed {
        /// The booking.
        booking_id: Uuid,
        /// The owner.
        customer_id: Uuid,
        /// Transfer code to cite in the wire.
        transfer_code: String,
        /// Amount due.
        amount: i64,
    },
    /// The booking moved to another fulfillment stage.
    StageChanged {
        /// The booking.
        booking_id: Uuid,
        /// External reference.
        booking_number: String,
        /// The owner.
        customer_id: Uuid,
        /// Previous stage.
        from: BookingStatus,
        /// New stage.
        to: BookingStatus,
        /// Display progress after the change.
        progress_pct: u8,
    },
    /// Fulfillment finished.
    BookingCompleted {
        /// The booking.
        booking_id: Uuid,
        /// External reference.
        booking_number: String,
        /// The owner.
        customer_id: Uuid,
        /// Whether this completion issued the certificate.
        certificate_issued: bool,
    },
    /// A progress entry was appended to the timeline.
    ProgressRecorded {
        /// The booking.
        booking_id: Uuid,
        /// External reference.
        booking_number: String,
        /// The owner.
        customer_id: Uuid,
        /// Stage at the time of the entry.
        stage: BookingStatus,
        /// What happened.
        description: String,
    },
    /// The booking was cancelled.
    BookingCancelled {
        /// The booking.
        booking_id: Uuid,
        /// External reference.
        booking_number: String,
        /// The owner.
        customer_id: Uuid,
        /// Amount owed back.
        refund_amount: i64,
        /// Free-text reason.
        reason: String,
    },
    /// A paid booking was refunded.
    RefundProcessed {
        /// The booking.
        booking_id: Uuid,
        /// External reference.
        booking_number: String,
        /// The owner.
        customer_id: Uuid,
        /// Amount returned.
        amount: i64,
    },
    /// An experience session was scheduled.
    ExperienceScheduled {
        /// The session.
        experience_id: Uuid,
        /// The owning booking.
        booking_id: Uuid,
        /// The owner.
        customer_id: Uuid,
        /// Session title.
        title: String,
        /// Scheduled start.
        scheduled_at: DateTime<Utc>,
    },
    /// An experience session changed status.
    ExperienceUpdated {
        /// The session.
        experience_id: Uuid,
        /// The owning booking.
        booking_id: Uuid,
        /// The owner.
        customer_id: Uuid,
        /// Session title.
        title: String,
        /// New status.
        status: ExperienceStatus,
    },
}

impl LedgerEvent {
    /// Event type name for logging.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::BookingCreated { .. } => "ledger.booking_created",
            LedgerEvent::PaymentReceived { .. } => "ledger.payment_received",
            LedgerEvent::PaymentFailed { .. } => "ledger.payment_failed",
            LedgerEvent::BankTransferInstructed { .. } => "ledger.bank_transfer_instructed",
            LedgerEvent::StageChanged { .. } => "ledger.stage_changed",
            LedgerEvent::BookingCompleted { .. } => "ledger.booking_completed",
            LedgerEvent::ProgressRecorded { .. } => "ledger.progress_recorded",
            LedgerEvent::BookingCancelled { .. } => "ledger.booking_cancelled",
            LedgerEvent::RefundProcessed { .. } => "ledger.refund_processed",
            LedgerEvent::ExperienceScheduled { .. } => "ledger.experience_scheduled",
            LedgerEvent::ExperienceUpdated { .. } => "ledger.experience_updated",
        }
    }

    /// The customer a client-facing notification should reach, if any.
    #[must_use]
    pub fn customer_id(&self) -> Option<Uuid> {
        match self {
            LedgerEvent::BookingCreated { customer_id, .. }
            | LedgerEvent::PaymentReceived { customer_id, .. }
            | LedgerEvent::PaymentFailed { customer_id, .. }
            | LedgerEvent::BankTransferInstructed { customer_id, .. }
            | LedgerEvent::StageChanged { customer_id, .. }
            | LedgerEvent::BookingCompleted { customer_id, .. }
            | LedgerEvent::ProgressRecorded { customer_id, .. }
            | LedgerEvent::BookingCancelled { customer_id, .. }
            | LedgerEvent::RefundProcessed { customer_id, .. }
            | LedgerEvent::ExperienceScheduled { customer_id, .. }
            | LedgerEvent::ExperienceUpdated { customer_id, .. } => Some(*customer_id),
        }
    }
}
