//! Command handlers for the Booking Ledger context.
//!
//! This module contains application-level command handler functions that
//! orchestrate domain logic: load the aggregate, check capabilities,
//! apply the transition, persist with a conditional update.
//!
//! Handlers that can race with webhook callbacks or scheduler sweeps
//! reload and retry a bounded number of times on a revision conflict, so
//! concurrent writers converge without double-applying side effects.
//! Cross-document side effects (package capacity, revenue) run after the
//! booking write commits; the guarded transition makes a second attempt a
//! conflict, so they cannot apply twice.

use uuid::Uuid;

use reefbook_core::authz::{self, Action, Resource};
use reefbook_core::clock::Clock;
use reefbook_core::error::DomainError;
use reefbook_core::policy::BusinessPolicy;

use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::commands::{
    AddParticipant, AdvanceBookingStage, CancelBooking, CompleteSafetyBriefing, CreateBooking,
    CreatePackage, DeactivatePackage, RecordProgress, RefundBooking, ScheduleExperience,
    SubmitFeedback, TransitionExperience,
};
use crate::domain::events::LedgerEvent;
use crate::domain::experience::{Experience, ExperienceStatus};
use crate::domain::package::Package;
use crate::domain::progress::ProgressEntry;
use crate::store::{BookingStore, ExperienceStore, PackageStore};

/// How many times a handler reloads after losing a revision race.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Result of a successfully handled booking command.
#[derive(Debug)]
pub struct BookingCommandResult {
    /// The booking after the write.
    pub booking: Booking,
    /// Events for notification and fan-out dispatch.
    pub events: Vec<LedgerEvent>,
}

/// Result of a successfully handled experience command.
#[derive(Debug)]
pub struct ExperienceCommandResult {
    /// The session after the write.
    pub experience: Experience,
    /// Events for notification and fan-out dispatch.
    pub events: Vec<LedgerEvent>,
}

async fn load_booking(
    bookings: &dyn BookingStore,
    booking_id: Uuid,
) -> Result<Booking, DomainError> {
    bookings
        .find(booking_id)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "booking",
            id: booking_id.to_string(),
        })
}

async fn load_experience(
    experiences: &dyn ExperienceStore,
    experience_id: Uuid,
) -> Result<Experience, DomainError> {
    experiences
        .find(experience_id)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "experience",
            id: experience_id.to_string(),
        })
}

async fn load_package(
    packages: &dyn PackageStore,
    package_id: Uuid,
) -> Result<Package, DomainError> {
    packages
        .find(package_id)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "package",
            id: package_id.to_string(),
        })
}

/// Handles `CreateBooking`: reserves package capacity, then inserts the
/// booking in `pending` with the computed total.
///
/// Capacity is consumed through a conditional update before the insert;
/// if the insert fails the reservation is released again.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a zero quantity,
/// `DomainError::NotFound` for an unknown package, and
/// `DomainError::Conflict` when the package is off sale or full.
pub async fn handle_create_booking(
    command: &CreateBooking,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    packages: &dyn PackageStore,
    policy: &BusinessPolicy,
) -> Result<BookingCommandResult, DomainError> {
    if command.quantity == 0 {
        return Err(DomainError::Validation(
            "quantity must be at least 1".to_owned(),
        ));
    }

    let package = load_package(packages, command.package_id).await?;
    if !package.active {
        return Err(DomainError::Conflict(format!(
            "package {} is not open for booking",
            package.name
        )));
    }

    let discount_pct = if command.referral_code.is_some() {
        policy.referral_discount_pct
    } else {
        0.0
    };

    packages
        .consume_capacity(package.id, command.quantity)
        .await?;

    let now = clock.now();
    let seq = match bookings.count().await {
        Ok(count) => count + 1,
        Err(e) => {
            packages
                .release_capacity(package.id, command.quantity)
                .await?;
            return Err(e);
        }
    };
    let booking_number = format!("CR{}{:04}", now.timestamp_millis(), seq % 10_000);

    let booking = Booking::new(
        Uuid::new_v4(),
        booking_number,
        command.customer_id,
        package.id,
        command.quantity,
        package.unit_price,
        discount_pct,
        package.currency.clone(),
        now,
    );

    if let Err(e) = bookings.insert(&booking).await {
        packages
            .release_capacity(package.id, command.quantity)
            .await?;
        return Err(e);
    }

    tracing::info!(
        booking_id = %booking.id,
        booking_number = %booking.booking_number,
        package_id = %package.id,
        total_amount = booking.total_amount,
        "booking created"
    );

    let events = vec![LedgerEvent::BookingCreated {
        booking_id: booking.id,
        booking_number: booking.booking_number.clone(),
        customer_id: booking.customer_id,
        total_amount: booking.total_amount,
        currency: booking.currency.clone(),
    }];

    Ok(BookingCommandResult { booking, events })
}

/// Handles `CancelBooking`: owner or admin cancels a `pending` or
/// `confirmed` booking, recording the policy refund and releasing the
/// package capacity.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown booking,
/// `DomainError::Unauthorized` for a foreign booking, and
/// `DomainError::Conflict` for a booking past cancellation.
pub async fn handle_cancel_booking(
    command: &CancelBooking,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    packages: &dyn PackageStore,
    policy: &BusinessPolicy,
) -> Result<BookingCommandResult, DomainError> {
    let mut attempts = 0;
    let (booking, refund_amount) = loop {
        attempts += 1;
        let mut booking = load_booking(bookings, command.booking_id).await?;
        authz::authorize(
            &command.actor,
            Action::CancelBooking,
            Resource::Booking {
                owner: booking.customer_id,
            },
        )?;

        let refund_amount =
            booking.cancel(&command.actor, command.reason.clone(), policy, clock.now())?;
        match bookings.update(&mut booking).await {
            Ok(()) => break (booking, refund_amount),
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    packages
        .release_capacity(booking.package_id, booking.quantity)
        .await?;

    let reason = booking
        .cancellation
        .as_ref()
        .map_or_else(String::new, |c| c.reason.clone());
    bookings
        .append_progress(&ProgressEntry::new(
            booking.id,
            BookingStatus::Cancelled,
            format!("Booking cancelled: {reason}"),
            Vec::new(),
            command.actor.user_id,
            clock.now(),
        ))
        .await?;

    tracing::info!(
        booking_id = %booking.id,
        booking_number = %booking.booking_number,
        refund_amount,
        "booking cancelled"
    );

    let events = vec![LedgerEvent::BookingCancelled {
        booking_id: booking.id,
        booking_number: booking.booking_number.clone(),
        customer_id: booking.customer_id,
        refund_amount,
        reason,
    }];

    Ok(BookingCommandResult { booking, events })
}

/// Handles `AdvanceBookingStage`: staff moves a booking along
/// `confirmed → processing → growing → completed`, appending a timeline
/// entry. Completion issues the certificate on first transition only.
///
/// # Errors
///
/// Returns `DomainError::Conflict` for any transition outside the table
/// and `DomainError::Unauthorized` for non-staff actors.
pub async fn handle_advance_stage(
    command: &AdvanceBookingStage,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    packages: &dyn PackageStore,
) -> Result<BookingCommandResult, DomainError> {
    let mut attempts = 0;
    let (booking, from, certificate_issued) = loop {
        attempts += 1;
        let mut booking = load_booking(bookings, command.booking_id).await?;
        authz::authorize(
            &command.actor,
            Action::TransitionBooking,
            Resource::Booking {
                owner: booking.customer_id,
            },
        )?;

        let from = booking.status;
        let now = clock.now();
        let mut certificate_issued = false;
        match command.to {
            BookingStatus::Processing => {
                let package = load_package(packages, booking.package_id).await?;
                let location = command
                    .location
                    .clone()
                    .unwrap_or_else(|| package.location.clone());
                booking.begin_processing(&location, package.duration_months, now)?;
            }
            BookingStatus::Growing => booking.advance_to_growing(now)?,
            BookingStatus::Completed => {
                certificate_issued = booking.complete(command.final_report.clone(), now)?;
            }
            other => {
                return Err(DomainError::Conflict(format!(
                    "{} is not a staff stage transition target",
                    other.as_str()
                )));
            }
        }

        match bookings.update(&mut booking).await {
            Ok(()) => break (booking, from, certificate_issued),
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    let description = command.note.clone().unwrap_or_else(|| {
        format!(
            "Stage advanced from {} to {}",
            from.as_str(),
            booking.status.as_str()
        )
    });
    bookings
        .append_progress(&ProgressEntry::new(
            booking.id,
            booking.status,
            description,
            Vec::new(),
            command.actor.user_id,
            clock.now(),
        ))
        .await?;

    tracing::info!(
        booking_id = %booking.id,
        from = from.as_str(),
        to = booking.status.as_str(),
        "booking stage advanced"
    );

    let mut events = vec![LedgerEvent::StageChanged {
        booking_id: booking.id,
        booking_number: booking.booking_number.clone(),
        customer_id: booking.customer_id,
        from,
        to: booking.status,
        progress_pct: booking.progress_pct(),
    }];
    if booking.status == BookingStatus::Completed {
        events.push(LedgerEvent::BookingCompleted {
            booking_id: booking.id,
            booking_number: booking.booking_number.clone(),
            customer_id: booking.customer_id,
            certificate_issued,
        });
    }

    Ok(BookingCommandResult { booking, events })
}

/// Handles `RecordProgress`: staff appends a timeline entry without
/// changing the stage.
///
/// # Errors
///
/// Returns `DomainError::Conflict` when the booking is terminal and
/// `DomainError::Validation` for an empty description.
pub async fn handle_record_progress(
    command: &RecordProgress,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
) -> Result<BookingCommandResult, DomainError> {
    if command.description.trim().is_empty() {
        return Err(DomainError::Validation(
            "progress description must not be empty".to_owned(),
        ));
    }

    let booking = load_booking(bookings, command.booking_id).await?;
    authz::authorize(
        &command.actor,
        Action::RecordProgress,
        Resource::Booking {
            owner: booking.customer_id,
        },
    )?;
    if booking.status.is_terminal() {
        return Err(DomainError::Conflict(format!(
            "booking {} is {}; timeline is closed",
            booking.booking_number,
            booking.status.as_str()
        )));
    }

    bookings
        .append_progress(&ProgressEntry::new(
            booking.id,
            booking.status,
            command.description.clone(),
            command.media.clone(),
            command.actor.user_id,
            clock.now(),
        ))
        .await?;

    let events = vec![LedgerEvent::ProgressRecorded {
        booking_id: booking.id,
        booking_number: booking.booking_number.clone(),
        customer_id: booking.customer_id,
        stage: booking.status,
        description: command.description.clone(),
    }];

    Ok(BookingCommandResult { booking, events })
}

/// Handles `RefundBooking`: admin returns a paid amount, releasing
/// capacity and deducting package revenue.
///
/// # Errors
///
/// Returns `DomainError::Conflict` for unpaid or already-refunded
/// bookings and `DomainError::Validation` when the amount exceeds the
/// total.
pub async fn handle_refund_booking(
    command: &RefundBooking,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    packages: &dyn PackageStore,
) -> Result<BookingCommandResult, DomainError> {
    let mut attempts = 0;
    let (booking, refund_amount) = loop {
        attempts += 1;
        let mut booking = load_booking(bookings, command.booking_id).await?;
        authz::authorize(
            &command.actor,
            Action::ProcessRefund,
            Resource::Booking {
                owner: booking.customer_id,
            },
        )?;

        let refund_amount = booking.refund(
            &command.actor,
            command.amount,
            command.reason.clone(),
            clock.now(),
        )?;
        match bookings.update(&mut booking).await {
            Ok(()) => break (booking, refund_amount),
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    packages
        .release_capacity(booking.package_id, booking.quantity)
        .await?;
    packages
        .subtract_revenue(booking.package_id, booking.total_amount)
        .await?;

    bookings
        .append_progress(&ProgressEntry::new(
            booking.id,
            BookingStatus::Refunded,
            format!("Refund of {refund_amount} processed"),
            Vec::new(),
            command.actor.user_id,
            clock.now(),
        ))
        .await?;

    tracing::info!(
        booking_id = %booking.id,
        booking_number = %booking.booking_number,
        refund_amount,
        "booking refunded"
    );

    let events = vec![LedgerEvent::RefundProcessed {
        booking_id: booking.id,
        booking_number: booking.booking_number.clone(),
        customer_id: booking.customer_id,
        amount: refund_amount,
    }];

    Ok(BookingCommandResult { booking, events })
}

/// Handles `ScheduleExperience`: owner or staff schedules a session
/// under a paid, active booking.
///
/// # Errors
///
/// Returns `DomainError::Conflict` when the booking is unpaid or
/// terminal and `DomainError::Validation` for a start in the past or a
/// zero participant cap.
pub async fn handle_schedule_experience(
    command: &ScheduleExperience,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    packages: &dyn PackageStore,
    experiences: &dyn ExperienceStore,
) -> Result<ExperienceCommandResult, DomainError> {
    let booking = load_booking(bookings, command.booking_id).await?;
    authz::authorize(
        &command.actor,
        Action::BookExperience,
        Resource::Booking {
            owner: booking.customer_id,
        },
    )?;

    if !booking.is_paid() || booking.status.is_terminal() {
        return Err(DomainError::Conflict(format!(
            "booking {} must be paid and active to schedule experiences",
            booking.booking_number
        )));
    }
    let now = clock.now();
    if command.scheduled_at <= now {
        return Err(DomainError::Validation(
            "experience must be scheduled in the future".to_owned(),
        ));
    }
    if command.max_participants == 0 {
        return Err(DomainError::Validation(
            "max_participants must be at least 1".to_owned(),
        ));
    }

    let location = match &command.location {
        Some(location) => location.clone(),
        None => match &booking.fulfillment.location {
            Some(location) => location.clone(),
            None => load_package(packages, booking.package_id).await?.location,
        },
    };

    let experience = Experience::new(
        Uuid::new_v4(),
        booking.id,
        command.title.clone(),
        command.scheduled_at,
        command.duration_minutes,
        location,
        command.max_participants,
        now,
    );
    experiences.insert(&experience).await?;

    tracing::info!(
        experience_id = %experience.id,
        booking_id = %booking.id,
        scheduled_at = %experience.scheduled_at,
        "experience scheduled"
    );

    let events = vec![LedgerEvent::ExperienceScheduled {
        experience_id: experience.id,
        booking_id: booking.id,
        customer_id: booking.customer_id,
        title: experience.title.clone(),
        scheduled_at: experience.scheduled_at,
    }];

    Ok(ExperienceCommandResult { experience, events })
}

/// Handles `AddParticipant`: owner or staff registers a participant
/// while the session has room.
///
/// # Errors
///
/// Returns `DomainError::Conflict` when the session is closed, full, or
/// the user is already registered.
pub async fn handle_add_participant(
    command: &AddParticipant,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    experiences: &dyn ExperienceStore,
) -> Result<ExperienceCommandResult, DomainError> {
    let mut attempts = 0;
    let (experience, customer_id) = loop {
        attempts += 1;
        let mut experience = load_experience(experiences, command.experience_id).await?;
        let booking = load_booking(bookings, experience.booking_id).await?;
        authz::authorize(
            &command.actor,
            Action::BookExperience,
            Resource::Booking {
                owner: booking.customer_id,
            },
        )?;

        experience.add_participant(command.user_id, command.name.clone(), clock.now())?;
        match experiences.update(&mut experience).await {
            Ok(()) => break (experience, booking.customer_id),
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    let events = vec![LedgerEvent::ExperienceUpdated {
        experience_id: experience.id,
        booking_id: experience.booking_id,
        customer_id,
        title: experience.title.clone(),
        status: experience.status,
    }];

    Ok(ExperienceCommandResult { experience, events })
}

/// Handles `CompleteSafetyBriefing`: staff records the briefing.
/// Idempotent, so a repeated call acknowledges without another event.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` for non-staff actors.
pub async fn handle_complete_safety_briefing(
    command: &CompleteSafetyBriefing,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    experiences: &dyn ExperienceStore,
) -> Result<ExperienceCommandResult, DomainError> {
    let mut attempts = 0;
    let (experience, customer_id, first_time) = loop {
        attempts += 1;
        let mut experience = load_experience(experiences, command.experience_id).await?;
        let booking = load_booking(bookings, experience.booking_id).await?;
        authz::authorize(
            &command.actor,
            Action::ManageExperience,
            Resource::Booking {
                owner: booking.customer_id,
            },
        )?;

        let first_time = !experience.safety_briefing.completed;
        if !first_time {
            break (experience, booking.customer_id, false);
        }
        experience.complete_safety_briefing(clock.now());
        match experiences.update(&mut experience).await {
            Ok(()) => break (experience, booking.customer_id, true),
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    let events = if first_time {
        vec![LedgerEvent::ExperienceUpdated {
            experience_id: experience.id,
            booking_id: experience.booking_id,
            customer_id,
            title: experience.title.clone(),
            status: experience.status,
        }]
    } else {
        Vec::new()
    };

    Ok(ExperienceCommandResult { experience, events })
}

/// Handles `TransitionExperience`: staff moves a session along
/// `scheduled → confirmed → in_progress → completed`, or cancels it.
///
/// # Errors
///
/// Returns `DomainError::Conflict` for transitions outside the machine,
/// including starting before the safety briefing.
pub async fn handle_transition_experience(
    command: &TransitionExperience,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    experiences: &dyn ExperienceStore,
) -> Result<ExperienceCommandResult, DomainError> {
    let mut attempts = 0;
    let (experience, customer_id) = loop {
        attempts += 1;
        let mut experience = load_experience(experiences, command.experience_id).await?;
        let booking = load_booking(bookings, experience.booking_id).await?;
        authz::authorize(
            &command.actor,
            Action::ManageExperience,
            Resource::Booking {
                owner: booking.customer_id,
            },
        )?;

        let now = clock.now();
        match command.to {
            ExperienceStatus::Confirmed => experience.confirm(now)?,
            ExperienceStatus::InProgress => experience.start(now)?,
            ExperienceStatus::Completed => experience.complete(now)?,
            ExperienceStatus::Cancelled => experience.cancel(now)?,
            ExperienceStatus::Scheduled => {
                return Err(DomainError::Conflict(
                    "a session cannot return to scheduled".to_owned(),
                ));
            }
        }

        match experiences.update(&mut experience).await {
            Ok(()) => break (experience, booking.customer_id),
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    tracing::info!(
        experience_id = %experience.id,
        status = experience.status.as_str(),
        "experience transitioned"
    );

    let events = vec![LedgerEvent::ExperienceUpdated {
        experience_id: experience.id,
        booking_id: experience.booking_id,
        customer_id,
        title: experience.title.clone(),
        status: experience.status,
    }];

    Ok(ExperienceCommandResult { experience, events })
}

/// Handles `SubmitFeedback`: a registered participant reviews a
/// completed session, once.
///
/// # Errors
///
/// Returns `DomainError::Conflict` for non-participants, incomplete
/// sessions, or duplicate reviews.
pub async fn handle_submit_feedback(
    command: &SubmitFeedback,
    clock: &dyn Clock,
    experiences: &dyn ExperienceStore,
) -> Result<ExperienceCommandResult, DomainError> {
    let mut attempts = 0;
    let experience = loop {
        attempts += 1;
        let mut experience = load_experience(experiences, command.experience_id).await?;
        if !experience
            .participants
            .iter()
            .any(|p| p.user_id == command.actor.user_id)
        {
            return Err(DomainError::Conflict(
                "only participants may review an experience".to_owned(),
            ));
        }

        experience.add_feedback(
            command.actor.user_id,
            command.rating,
            command.comment.clone(),
            clock.now(),
        )?;
        match experiences.update(&mut experience).await {
            Ok(()) => break experience,
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    Ok(ExperienceCommandResult {
        experience,
        events: Vec::new(),
    })
}

/// Handles `CreatePackage`: admin adds a catalog offering.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty name, non-positive
/// price, or zero capacity/duration.
pub async fn handle_create_package(
    command: &CreatePackage,
    clock: &dyn Clock,
    packages: &dyn PackageStore,
) -> Result<Package, DomainError> {
    authz::authorize(&command.actor, Action::ManagePackages, Resource::Platform)?;

    if command.name.trim().is_empty() {
        return Err(DomainError::Validation("package name must not be empty".to_owned()));
    }
    if command.unit_price <= 0 {
        return Err(DomainError::Validation("unit price must be positive".to_owned()));
    }
    if command.max_capacity == 0 {
        return Err(DomainError::Validation("max capacity must be at least 1".to_owned()));
    }
    if command.duration_months == 0 {
        return Err(DomainError::Validation("duration must be at least one month".to_owned()));
    }

    let package = Package::new(
        Uuid::new_v4(),
        command.name.clone(),
        command.coral_species.clone(),
        command.location.clone(),
        command.unit_price,
        command.currency.clone(),
        command.duration_months,
        command.max_capacity,
        clock.now(),
    );
    packages.insert(&package).await?;

    tracing::info!(package_id = %package.id, name = %package.name, "package created");

    Ok(package)
}

/// Handles `DeactivatePackage`: admin takes a package off sale.
/// Existing bookings are unaffected.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown package.
pub async fn handle_deactivate_package(
    command: &DeactivatePackage,
    packages: &dyn PackageStore,
) -> Result<(), DomainError> {
    authz::authorize(&command.actor, Action::ManagePackages, Resource::Platform)?;
    packages.set_active(command.package_id, false).await
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use reefbook_core::actor::{Actor, Role};
    use reefbook_core::error::DomainError;
    use reefbook_core::policy::BusinessPolicy;
    use reefbook_store::memory::{InMemoryBookingStore, InMemoryExperienceStore, InMemoryPackageStore};
    use reefbook_test_support::FixedClock;

    use super::*;
    use crate::domain::booking::PaymentStatus;
    use crate::domain::package::Package;
    use crate::store::{BookingStore as _, PackageStore as _};

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    async fn seeded_package(packages: &InMemoryPackageStore, max_capacity: u32) -> Package {
        let package = Package::new(
            Uuid::new_v4(),
            "Staghorn starter".to_owned(),
            "Acropora cervicornis".to_owned(),
            "Nha Trang".to_owned(),
            500_000,
            "VND".to_owned(),
            6,
            max_capacity,
            fixed_clock().0,
        );
        packages.insert(&package).await.unwrap();
        package
    }

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Admin)
    }

    #[tokio::test]
    async fn test_handle_create_booking_computes_total_and_reserves_capacity() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::new();
        let packages = InMemoryPackageStore::new();
        let package = seeded_package(&packages, 10).await;

        let command = CreateBooking {
            customer_id: Uuid::new_v4(),
            package_id: package.id,
            quantity: 2,
            referral_code: Some("REEF-FRIEND".to_owned()),
        };

        // Act
        let result =
            handle_create_booking(&command, &clock, &bookings, &packages, &BusinessPolicy::default())
                .await
                .unwrap();

        // Assert
        assert_eq!(result.booking.total_amount, 900_000);
        assert!(result.booking.booking_number.starts_with("CR"));
        assert_eq!(result.booking.status, BookingStatus::Pending);
        assert_eq!(result.events.len(), 1);
        let stored = packages.find(package.id).await.unwrap().unwrap();
        assert_eq!(stored.current_bookings, 2);
    }

    #[tokio::test]
    async fn test_handle_create_booking_without_referral_charges_full_price() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::new();
        let packages = InMemoryPackageStore::new();
        let package = seeded_package(&packages, 10).await;

        let command = CreateBooking {
            customer_id: Uuid::new_v4(),
            package_id: package.id,
            quantity: 2,
            referral_code: None,
        };

        // Act
        let result =
            handle_create_booking(&command, &clock, &bookings, &packages, &BusinessPolicy::default())
                .await
                .unwrap();

        // Assert
        assert_eq!(result.booking.total_amount, 1_000_000);
    }

    #[tokio::test]
    async fn test_handle_create_booking_rejects_when_capacity_exhausted() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::new();
        let packages = InMemoryPackageStore::new();
        let package = seeded_package(&packages, 3).await;

        let first = CreateBooking {
            customer_id: Uuid::new_v4(),
            package_id: package.id,
            quantity: 2,
            referral_code: None,
        };
        handle_create_booking(&first, &clock, &bookings, &packages, &BusinessPolicy::default())
            .await
            .unwrap();

        let second = CreateBooking {
            customer_id: Uuid::new_v4(),
            package_id: package.id,
            quantity: 2,
            referral_code: None,
        };

        // Act
        let result =
            handle_create_booking(&second, &clock, &bookings, &packages, &BusinessPolicy::default())
                .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Conflict(_))));
        let stored = packages.find(package.id).await.unwrap().unwrap();
        assert_eq!(stored.current_bookings, 2);
    }

    #[tokio::test]
    async fn test_handle_cancel_booking_releases_capacity_and_appends_timeline() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::new();
        let packages = InMemoryPackageStore::new();
        let package = seeded_package(&packages, 10).await;
        let customer = Uuid::new_v4();

        let created = handle_create_booking(
            &CreateBooking {
                customer_id: customer,
                package_id: package.id,
                quantity: 2,
                referral_code: None,
            },
            &clock,
            &bookings,
            &packages,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        let command = CancelBooking {
            actor: Actor::new(customer, Role::Customer),
            booking_id: created.booking.id,
            reason: None,
        };

        // Act
        let result = handle_cancel_booking(
            &command,
            &clock,
            &bookings,
            &packages,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(result.booking.status, BookingStatus::Cancelled);
        assert_eq!(
            result.booking.cancellation.as_ref().unwrap().refund_amount,
            1_000_000
        );
        let stored = packages.find(package.id).await.unwrap().unwrap();
        assert_eq!(stored.current_bookings, 0);
        let timeline = bookings.list_progress(result.booking.id).await.unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].stage, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_handle_cancel_booking_rejects_foreign_customer() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::new();
        let packages = InMemoryPackageStore::new();
        let package = seeded_package(&packages, 10).await;

        let created = handle_create_booking(
            &CreateBooking {
                customer_id: Uuid::new_v4(),
                package_id: package.id,
                quantity: 1,
                referral_code: None,
            },
            &clock,
            &bookings,
            &packages,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        let command = CancelBooking {
            actor: Actor::new(Uuid::new_v4(), Role::Customer),
            booking_id: created.booking.id,
            reason: None,
        };

        // Act
        let result = handle_cancel_booking(
            &command,
            &clock,
            &bookings,
            &packages,
            &BusinessPolicy::default(),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Unauthorized { .. })));
        // Capacity stays reserved for the untouched booking.
        let stored = packages.find(package.id).await.unwrap().unwrap();
        assert_eq!(stored.current_bookings, 1);
    }

    #[tokio::test]
    async fn test_handle_advance_stage_walks_the_happy_path() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::new();
        let packages = InMemoryPackageStore::new();
        let package = seeded_package(&packages, 10).await;

        let created = handle_create_booking(
            &CreateBooking {
                customer_id: Uuid::new_v4(),
                package_id: package.id,
                quantity: 1,
                referral_code: None,
            },
            &clock,
            &bookings,
            &packages,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();
        let mut booking = bookings.find(created.booking.id).await.unwrap().unwrap();
        booking.confirm_payment("GW-1", clock.0).unwrap();
        bookings.update(&mut booking).await.unwrap();

        let staff = admin();

        // Act
        for target in [BookingStatus::Processing, BookingStatus::Growing, BookingStatus::Completed] {
            handle_advance_stage(
                &AdvanceBookingStage {
                    actor: staff,
                    booking_id: booking.id,
                    to: target,
                    note: None,
                    location: None,
                    final_report: None,
                },
                &clock,
                &bookings,
                &packages,
            )
            .await
            .unwrap();
        }

        // Assert
        let stored = bookings.find(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Completed);
        assert!(stored.certificate.generated);
        assert_eq!(stored.fulfillment.location.as_deref(), Some("Nha Trang"));
        let timeline = bookings.list_progress(booking.id).await.unwrap();
        assert_eq!(timeline.len(), 3);
    }

    #[tokio::test]
    async fn test_handle_advance_stage_rejects_non_staff_and_bad_targets() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::new();
        let packages = InMemoryPackageStore::new();
        let package = seeded_package(&packages, 10).await;
        let customer = Uuid::new_v4();

        let created = handle_create_booking(
            &CreateBooking {
                customer_id: customer,
                package_id: package.id,
                quantity: 1,
                referral_code: None,
            },
            &clock,
            &bookings,
            &packages,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        // Act & Assert — the owner may not drive fulfillment stages.
        let result = handle_advance_stage(
            &AdvanceBookingStage {
                actor: Actor::new(customer, Role::Customer),
                booking_id: created.booking.id,
                to: BookingStatus::Processing,
                note: None,
                location: None,
                final_report: None,
            },
            &clock,
            &bookings,
            &packages,
        )
        .await;
        assert!(matches!(result, Err(DomainError::Unauthorized { .. })));

        // Cancelled is not a stage transition target.
        let result = handle_advance_stage(
            &AdvanceBookingStage {
                actor: admin(),
                booking_id: created.booking.id,
                to: BookingStatus::Cancelled,
                note: None,
                location: None,
                final_report: None,
            },
            &clock,
            &bookings,
            &packages,
        )
        .await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_handle_refund_booking_releases_capacity_and_revenue() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::new();
        let packages = InMemoryPackageStore::new();
        let package = seeded_package(&packages, 10).await;

        let created = handle_create_booking(
            &CreateBooking {
                customer_id: Uuid::new_v4(),
                package_id: package.id,
                quantity: 2,
                referral_code: None,
            },
            &clock,
            &bookings,
            &packages,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();
        let mut booking = bookings.find(created.booking.id).await.unwrap().unwrap();
        booking.confirm_payment("GW-1", clock.0).unwrap();
        bookings.update(&mut booking).await.unwrap();
        packages.add_revenue(package.id, booking.total_amount).await.unwrap();

        // Act
        let result = handle_refund_booking(
            &RefundBooking {
                actor: admin(),
                booking_id: booking.id,
                amount: None,
                reason: Some("Site damaged by storm".to_owned()),
            },
            &clock,
            &bookings,
            &packages,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(result.booking.payment_status, PaymentStatus::Refunded);
        let stored = packages.find(package.id).await.unwrap().unwrap();
        assert_eq!(stored.current_bookings, 0);
        assert_eq!(stored.total_revenue, 0);
    }

    #[tokio::test]
    async fn test_handle_schedule_experience_requires_paid_booking() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::new();
        let packages = InMemoryPackageStore::new();
        let experiences = InMemoryExperienceStore::new();
        let package = seeded_package(&packages, 10).await;
        let customer = Uuid::new_v4();

        let created = handle_create_booking(
            &CreateBooking {
                customer_id: customer,
                package_id: package.id,
                quantity: 1,
                referral_code: None,
            },
            &clock,
            &bookings,
            &packages,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        let command = ScheduleExperience {
            actor: Actor::new(customer, Role::Customer),
            booking_id: created.booking.id,
            title: "Site dive".to_owned(),
            scheduled_at: clock.0 + chrono::Duration::days(3),
            duration_minutes: 90,
            location: None,
            max_participants: 4,
        };

        // Act — unpaid booking is rejected.
        let rejected =
            handle_schedule_experience(&command, &clock, &bookings, &packages, &experiences).await;
        assert!(matches!(rejected, Err(DomainError::Conflict(_))));

        // Pay and retry.
        let mut booking = bookings.find(created.booking.id).await.unwrap().unwrap();
        booking.confirm_payment("GW-1", clock.0).unwrap();
        bookings.update(&mut booking).await.unwrap();
        let result =
            handle_schedule_experience(&command, &clock, &bookings, &packages, &experiences)
                .await
                .unwrap();

        // Assert — location defaults to the package site.
        assert_eq!(result.experience.location, "Nha Trang");
        assert_eq!(result.experience.status, ExperienceStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_handle_submit_feedback_requires_participation() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::new();
        let packages = InMemoryPackageStore::new();
        let experiences = InMemoryExperienceStore::new();
        let package = seeded_package(&packages, 10).await;
        let customer = Uuid::new_v4();

        let created = handle_create_booking(
            &CreateBooking {
                customer_id: customer,
                package_id: package.id,
                quantity: 1,
                referral_code: None,
            },
            &clock,
            &bookings,
            &packages,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();
        let mut booking = bookings.find(created.booking.id).await.unwrap().unwrap();
        booking.confirm_payment("GW-1", clock.0).unwrap();
        bookings.update(&mut booking).await.unwrap();

        let scheduled = handle_schedule_experience(
            &ScheduleExperience {
                actor: Actor::new(customer, Role::Customer),
                booking_id: booking.id,
                title: "Site dive".to_owned(),
                scheduled_at: clock.0 + chrono::Duration::days(3),
                duration_minutes: 90,
                location: None,
                max_participants: 4,
            },
            &clock,
            &bookings,
            &packages,
            &experiences,
        )
        .await
        .unwrap();

        let staff = admin();
        handle_add_participant(
            &AddParticipant {
                actor: staff,
                experience_id: scheduled.experience.id,
                user_id: customer,
                name: "An".to_owned(),
            },
            &clock,
            &bookings,
            &experiences,
        )
        .await
        .unwrap();
        for target in [
            ExperienceStatus::Confirmed,
            ExperienceStatus::InProgress,
            ExperienceStatus::Completed,
        ] {
            if target == ExperienceStatus::InProgress {
                handle_complete_safety_briefing(
                    &CompleteSafetyBriefing {
                        actor: staff,
                        experience_id: scheduled.experience.id,
                    },
                    &clock,
                    &bookings,
                    &experiences,
                )
                .await
                .unwrap();
            }
            handle_transition_experience(
                &TransitionExperience {
                    actor: staff,
                    experience_id: scheduled.experience.id,
                    to: target,
                },
                &clock,
                &bookings,
                &experiences,
            )
            .await
            .unwrap();
        }

        // Act — an outsider cannot review.
        let outsider = handle_submit_feedback(
            &SubmitFeedback {
                actor: Actor::new(Uuid::new_v4(), Role::Customer),
                experience_id: scheduled.experience.id,
                rating: 5,
                comment: None,
            },
            &clock,
            &experiences,
        )
        .await;
        assert!(matches!(outsider, Err(DomainError::Conflict(_))));

        // The participant can, once.
        let reviewed = handle_submit_feedback(
            &SubmitFeedback {
                actor: Actor::new(customer, Role::Customer),
                experience_id: scheduled.experience.id,
                rating: 5,
                comment: Some("Unforgettable".to_owned()),
            },
            &clock,
            &experiences,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(reviewed.experience.feedback.len(), 1);
    }

    #[tokio::test]
    async fn test_handle_create_package_validates_inputs() {
        // Arrange
        let clock = fixed_clock();
        let packages = InMemoryPackageStore::new();

        let command = CreatePackage {
            actor: admin(),
            name: String::new(),
            coral_species: "Acropora".to_owned(),
            location: "Nha Trang".to_owned(),
            unit_price: 500_000,
            currency: "VND".to_owned(),
            duration_months: 6,
            max_capacity: 10,
        };

        // Act
        let result = handle_create_package(&command, &clock, &packages).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
