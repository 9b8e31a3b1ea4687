//! Ledger event fan-out.
//!
//! Command handlers return events instead of talking to the
//! notification store themselves. This module turns each event into
//! the customer-facing notification and the room pushes it implies.
//! Fan-out runs after the write has committed and never fails the
//! request: a dead store or hub costs the side effect, not the
//! booking.

use reefbook_core::error::DomainError;
use reefbook_ledger::domain::events::LedgerEvent;
use reefbook_notifications::application::command_handlers::{booking_notice, create_and_dispatch};
use reefbook_notifications::domain::notification::{NewNotification, NotificationKind, Priority};
use reefbook_realtime::messages::ServerMessage;
use reefbook_realtime::rooms::Room;

use crate::state::AppState;

/// Fan out every event a handled command produced.
pub async fn dispatch(state: &AppState, events: &[LedgerEvent]) {
    for event in events {
        if let Err(error) = publish(state, event).await {
            tracing::warn!(
                event = event.event_type(),
                error = %error,
                "event fan-out failed"
            );
        }
    }
}

async fn publish(state: &AppState, event: &LedgerEvent) -> Result<(), DomainError> {
    match event {
        LedgerEvent::BookingCreated {
            booking_id,
            booking_number,
            customer_id,
            total_amount,
            currency,
        } => {
            notify(
                state,
                booking_notice(
                    *customer_id,
                    NotificationKind::BookingCreated,
                    "Booking received",
                    format!(
                        "Booking {booking_number} was created. Total due: {total_amount} {currency}."
                    ),
                    *booking_id,
                ),
            )
            .await
        }
        LedgerEvent::PaymentReceived {
            booking_id,
            booking_number,
            customer_id,
            amount,
            ..
        } => {
            notify(
                state,
                booking_notice(
                    *customer_id,
                    NotificationKind::BookingConfirmed,
                    "Payment confirmed",
                    format!(
                        "Payment of {amount} for booking {booking_number} was verified. Your coral heads to the nursery next."
                    ),
                    *booking_id,
                ),
            )
            .await
        }
        LedgerEvent::PaymentFailed {
            booking_id,
            booking_number,
            customer_id,
            reason,
        } => {
            let mut fields = NewNotification::new(
                *customer_id,
                NotificationKind::PaymentFailed,
                "Payment failed",
                format!(
                    "Payment for booking {booking_number} failed: {reason}. You can retry from the booking page."
                ),
                Priority::High,
            );
            fields.related_booking_id = Some(*booking_id);
            notify(state, fields).await
        }
        LedgerEvent::BankTransferInstructed {
            booking_id,
            customer_id,
            transfer_code,
            amount,
        } => {
            notify(
                state,
                booking_notice(
                    *customer_id,
                    NotificationKind::BankTransferInfo,
                    "Bank transfer instructions",
                    format!(
                        "Wire {amount} citing {transfer_code} in the description to complete your payment."
                    ),
                    *booking_id,
                ),
            )
            .await
        }
        LedgerEvent::StageChanged {
            booking_id,
            booking_number,
            customer_id,
            from,
            to,
            progress_pct,
        } => {
            notify(
                state,
                booking_notice(
                    *customer_id,
                    NotificationKind::BookingStatus,
                    format!("Booking update: {}", to.as_str()),
                    format!(
                        "Booking {booking_number} moved from {} to {}.",
                        from.as_str(),
                        to.as_str()
                    ),
                    *booking_id,
                ),
            )
            .await?;
            state.hub.broadcast_room(
                &Room::Booking(*booking_id),
                &ServerMessage::BookingUpdated {
                    booking_id: *booking_id,
                    status: to.as_str(),
                    progress_pct: *progress_pct,
                },
            );
            Ok(())
        }
        LedgerEvent::BookingCompleted {
            booking_id,
            booking_number,
            customer_id,
            certificate_issued,
        } => {
            if !certificate_issued {
                return Ok(());
            }
            let mut fields = booking_notice(
                *customer_id,
                NotificationKind::CertificateReady,
                "Your certificate is ready",
                format!(
                    "Booking {booking_number} is complete. Your cultivation certificate is ready to download."
                ),
                *booking_id,
            );
            fields.action_url = Some(format!("/bookings/{booking_id}/certificate"));
            notify(state, fields).await
        }
        LedgerEvent::ProgressRecorded {
            booking_id,
            booking_number,
            customer_id,
            description,
            ..
        } => {
            notify(
                state,
                booking_notice(
                    *customer_id,
                    NotificationKind::BookingStatus,
                    "New progress report",
                    format!("Booking {booking_number}: {description}"),
                    *booking_id,
                ),
            )
            .await
        }
        LedgerEvent::BookingCancelled {
            booking_id,
            booking_number,
            customer_id,
            refund_amount,
            ..
        } => {
            let message = if *refund_amount > 0 {
                format!(
                    "Booking {booking_number} was cancelled. A refund of {refund_amount} will be returned to you."
                )
            } else {
                format!("Booking {booking_number} was cancelled.")
            };
            notify(
                state,
                booking_notice(
                    *customer_id,
                    NotificationKind::BookingCancelled,
                    "Booking cancelled",
                    message,
                    *booking_id,
                ),
            )
            .await
        }
        LedgerEvent::RefundProcessed {
            booking_id,
            booking_number,
            customer_id,
            amount,
        } => {
            notify(
                state,
                booking_notice(
                    *customer_id,
                    NotificationKind::RefundProcessed,
                    "Refund processed",
                    format!("A refund of {amount} for booking {booking_number} was processed."),
                    *booking_id,
                ),
            )
            .await
        }
        LedgerEvent::ExperienceScheduled {
            experience_id,
            booking_id,
            customer_id,
            title,
            scheduled_at,
        } => {
            let mut fields = NewNotification::new(
                *customer_id,
                NotificationKind::ExperienceUpdate,
                format!("Experience scheduled: {title}"),
                format!(
                    "{title} is scheduled for {}.",
                    scheduled_at.format("%Y-%m-%d %H:%M UTC")
                ),
                Priority::Normal,
            );
            fields.related_booking_id = Some(*booking_id);
            fields.related_experience_id = Some(*experience_id);
            notify(state, fields).await?;
            state.hub.broadcast_room(
                &Room::Booking(*booking_id),
                &ServerMessage::ExperienceUpdated {
                    experience_id: *experience_id,
                    booking_id: *booking_id,
                    title: title.clone(),
                    status: "scheduled",
                },
            );
            Ok(())
        }
        LedgerEvent::ExperienceUpdated {
            experience_id,
            booking_id,
            customer_id,
            title,
            status,
        } => {
            let mut fields = NewNotification::new(
                *customer_id,
                NotificationKind::ExperienceUpdate,
                format!("Experience update: {title}"),
                format!("{title} is now {}.", status.as_str()),
                Priority::Normal,
            );
            fields.related_booking_id = Some(*booking_id);
            fields.related_experience_id = Some(*experience_id);
            notify(state, fields).await?;
            let push = ServerMessage::ExperienceUpdated {
                experience_id: *experience_id,
                booking_id: *booking_id,
                title: title.clone(),
                status: status.as_str(),
            };
            state.hub.broadcast_room(&Room::Experience(*experience_id), &push);
            state.hub.broadcast_room(&Room::Booking(*booking_id), &push);
            Ok(())
        }
    }
}

async fn notify(state: &AppState, fields: NewNotification) -> Result<(), DomainError> {
    create_and_dispatch(fields, &*state.clock, &*state.notifications, &*state.hub).await?;
    Ok(())
}
