//! Capability-based authorization.
//!
//! Every handler funnels its permission decision through [`authorize`]
//! with the acting user, the action, and the resource being touched.
//! There are no role checks at call sites.

use uuid::Uuid;

use crate::actor::Actor;
use crate::error::DomainError;

/// Actions that require an authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read a booking, its progress timeline, or its certificate.
    ViewBooking,
    /// Cancel a booking before fulfillment completes.
    CancelBooking,
    /// Move a booking between fulfillment stages.
    TransitionBooking,
    /// Append a progress entry to a booking.
    RecordProgress,
    /// Schedule an experience or register participants under a booking.
    BookExperience,
    /// Confirm, start, complete, or cancel an experience session.
    ManageExperience,
    /// Join the live event room of a booking or experience.
    ObserveEntity,
    /// Open a gateway or bank-transfer payment for a booking.
    InitiatePayment,
    /// Confirm a manual bank transfer.
    ConfirmBankTransfer,
    /// Refund a paid booking.
    ProcessRefund,
    /// Create or deactivate catalog packages.
    ManagePackages,
    /// Read or mutate a notification.
    TouchNotification,
    /// Send, broadcast, or template notifications to others.
    SendNotifications,
    /// See who is connected right now.
    ViewPresence,
    /// Trigger maintenance jobs by hand.
    RunMaintenance,
}

/// The resource an action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A booking (or a record nested under it) owned by a customer.
    Booking {
        /// The customer who placed the booking.
        owner: Uuid,
    },
    /// A notification addressed to a recipient.
    Notification {
        /// The recipient the notification belongs to.
        recipient: Uuid,
    },
    /// Platform-level resources with no single owner.
    Platform,
}

/// Decide whether `actor` may perform `action` on `resource`.
///
/// # Errors
///
/// Returns [`DomainError::Unauthorized`] when the capability is not
/// granted. The embedded reason is for logging only.
pub fn authorize(actor: &Actor, action: Action, resource: Resource) -> Result<(), DomainError> {
    if actor.is_admin() {
        return Ok(());
    }

    let allowed = match (action, resource) {
        // Owners manage their own bookings and payments.
        (
            Action::ViewBooking
            | Action::CancelBooking
            | Action::ObserveEntity
            | Action::InitiatePayment
            | Action::BookExperience,
            Resource::Booking { owner },
        ) => owner == actor.user_id || actor.is_staff(),

        // Fulfillment reporting is a staff capability.
        (
            Action::RecordProgress | Action::ManageExperience | Action::TransitionBooking,
            Resource::Booking { .. },
        ) => actor.is_staff(),

        // Notifications are private to their recipient.
        (Action::TouchNotification, Resource::Notification { recipient }) => {
            recipient == actor.user_id
        }

        // Everything platform-wide below stays admin-only.
        (
            Action::ConfirmBankTransfer
            | Action::ProcessRefund
            | Action::ManagePackages
            | Action::SendNotifications
            | Action::ViewPresence
            | Action::RunMaintenance,
            _,
        ) => false,

        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(DomainError::Unauthorized {
            reason: format!(
                "{:?} denied {:?} for user {}",
                actor.role, action, actor.user_id
            ),
        })
    }
}
