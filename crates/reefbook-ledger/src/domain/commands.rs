//! Commands for the Booking Ledger context.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use reefbook_core::actor::Actor;

use super::booking::BookingStatus;
use super::experience::ExperienceStatus;

/// Create a booking for a package.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    /// The purchasing customer.
    pub customer_id: Uuid,
    /// The package to book.
    pub package_id: Uuid,
    /// Units to purchase, at least 1.
    pub quantity: u32,
    /// Referral code; presence applies the referral discount.
    pub referral_code: Option<String>,
}

/// Cancel a booking before fulfillment completes.
#[derive(Debug, Clone)]
pub struct CancelBooking {
    /// The initiating actor (owner or admin).
    pub actor: Actor,
    /// The booking to cancel.
    pub booking_id: Uuid,
    /// Free-text reason.
    pub reason: Option<String>,
}

/// Move a booking to another fulfillment stage.
#[derive(Debug, Clone)]
pub struct AdvanceBookingStage {
    /// The initiating actor (staff).
    pub actor: Actor,
    /// The booking to move.
    pub booking_id: Uuid,
    /// Target stage.
    pub to: BookingStatus,
    /// Optional progress note for the timeline.
    pub note: Option<String>,
    /// Site override when fulfillment starts; defaults to the package
    /// location.
    pub location: Option<String>,
    /// Closing report when completing.
    pub final_report: Option<String>,
}

/// Append a progress entry without changing stage.
#[derive(Debug, Clone)]
pub struct RecordProgress {
    /// The reporting actor (staff).
    pub actor: Actor,
    /// The booking being reported on.
    pub booking_id: Uuid,
    /// What happened.
    pub description: String,
    /// Attached media references.
    pub media: Vec<String>,
}

/// Refund a paid booking.
#[derive(Debug, Clone)]
pub struct RefundBooking {
    /// The initiating administrator.
    pub actor: Actor,
    /// The booking to refund.
    pub booking_id: Uuid,
    /// Amount to return; defaults to the full total.
    pub amount: Option<i64>,
    /// Free-text reason.
    pub reason: Option<String>,
}

/// Schedule an experience session under a booking.
#[derive(Debug, Clone)]
pub struct ScheduleExperience {
    /// The initiating actor.
    pub actor: Actor,
    /// The owning booking.
    pub booking_id: Uuid,
    /// Session title.
    pub title: String,
    /// Scheduled start.
    pub scheduled_at: DateTime<Utc>,
    /// Planned duration.
    pub duration_minutes: u32,
    /// Where the session takes place; defaults to the fulfillment
    /// location.
    pub location: Option<String>,
    /// Participant cap.
    pub max_participants: u32,
}

/// Register a participant for a session.
#[derive(Debug, Clone)]
pub struct AddParticipant {
    /// The initiating actor.
    pub actor: Actor,
    /// The session.
    pub experience_id: Uuid,
    /// The participating user.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
}

/// Record that the safety briefing was held.
#[derive(Debug, Clone)]
pub struct CompleteSafetyBriefing {
    /// The initiating actor (staff).
    pub actor: Actor,
    /// The session.
    pub experience_id: Uuid,
}

/// Move a session to another status.
#[derive(Debug, Clone)]
pub struct TransitionExperience {
    /// The initiating actor (staff).
    pub actor: Actor,
    /// The session.
    pub experience_id: Uuid,
    /// Target status.
    pub to: ExperienceStatus,
}

/// Submit feedback for a completed session.
#[derive(Debug, Clone)]
pub struct SubmitFeedback {
    /// The reviewing actor.
    pub actor: Actor,
    /// The session.
    pub experience_id: Uuid,
    /// Rating from 1 to 5.
    pub rating: u8,
    /// Free-text comment.
    pub comment: Option<String>,
}

/// Create a catalog package.
#[derive(Debug, Clone)]
pub struct CreatePackage {
    /// The initiating administrator.
    pub actor: Actor,
    /// Display name.
    pub name: String,
    /// Coral species being cultivated.
    pub coral_species: String,
    /// Cultivation site.
    pub location: String,
    /// Price per unit.
    pub unit_price: i64,
    /// ISO currency code.
    pub currency: String,
    /// Expected cultivation duration.
    pub duration_months: u32,
    /// Units the site can host at once.
    pub max_capacity: u32,
}

/// Take a package off sale.
#[derive(Debug, Clone)]
pub struct DeactivatePackage {
    /// The initiating administrator.
    pub actor: Actor,
    /// The package.
    pub package_id: Uuid,
}
