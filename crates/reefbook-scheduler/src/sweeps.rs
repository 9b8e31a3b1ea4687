//! The periodic maintenance sweeps.
//!
//! Every sweep follows the same shape: query the store for candidates,
//! claim each item through a conditional update, then notify. Claiming
//! before sending keeps delivery at-most-once even when two scheduler
//! instances overlap; a `RevisionConflict` on the claim means another
//! run got there first, and the item is silently skipped. Failures on a
//! single item are logged and never abort the rest of the batch.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use reefbook_core::actor::Role;
use reefbook_core::clock::Clock;
use reefbook_core::directory::RecipientDirectory;
use reefbook_core::error::DomainError;
use reefbook_core::policy::BusinessPolicy;
use reefbook_ledger::domain::booking::Booking;
use reefbook_ledger::domain::experience::Experience;
use reefbook_ledger::store::{BookingStore, ExperienceStore};
use reefbook_notifications::application::command_handlers::create_and_dispatch;
use reefbook_notifications::domain::notification::{NewNotification, NotificationKind, Priority};
use reefbook_notifications::domain::template::{self, Template};
use reefbook_notifications::push::LivePush;
use reefbook_notifications::store::NotificationStore;
use reefbook_realtime::hub::Hub;
use reefbook_realtime::messages::ServerMessage;
use reefbook_realtime::rooms::Room;

use crate::health::ResourceSampler;
use crate::weather::{WeatherProvider, WeatherReport};

/// Most scheduled notifications dispatched per run.
const DISPATCH_BATCH: u32 = 100;

// --- experience reminders ---

/// Notifies owners of sessions starting within the next day, once per
/// session.
///
/// # Errors
///
/// Returns store failures from the due-session query. Failures on a
/// single session are logged and skipped.
pub async fn send_experience_reminders(
    clock: &dyn Clock,
    experiences: &dyn ExperienceStore,
    bookings: &dyn BookingStore,
    notifications: &dyn NotificationStore,
    push: &dyn LivePush,
    policy: &BusinessPolicy,
) -> Result<u64, DomainError> {
    let now = clock.now();
    let until = now + Duration::hours(policy.experience_reminder_lookahead_hours);
    let due = experiences.list_reminder_due(now, until).await?;
    let candidates = due.len();

    let mut sent = 0;
    for mut experience in due {
        let outcome = remind_experience(
            now,
            &mut experience,
            clock,
            experiences,
            bookings,
            notifications,
            push,
        )
        .await;
        match outcome {
            Ok(true) => sent += 1,
            Ok(false) => {}
            Err(error) => tracing::warn!(
                experience_id = %experience.id,
                error = %error,
                "experience reminder skipped"
            ),
        }
    }
    tracing::info!(candidates, sent, "experience reminder sweep ran");
    Ok(sent)
}

async fn remind_experience(
    now: DateTime<Utc>,
    experience: &mut Experience,
    clock: &dyn Clock,
    experiences: &dyn ExperienceStore,
    bookings: &dyn BookingStore,
    notifications: &dyn NotificationStore,
    push: &dyn LivePush,
) -> Result<bool, DomainError> {
    experience.mark_reminder_sent(now);
    if !claim(experiences.update(experience).await)? {
        return Ok(false);
    }

    let booking = load_owner(bookings, experience).await?;
    let hours_until = (experience.scheduled_at - now).num_hours().max(0);
    let variables = HashMap::from([
        ("title".to_owned(), experience.title.clone()),
        ("location".to_owned(), experience.location.clone()),
        ("hours".to_owned(), hours_until.to_string()),
    ]);
    let mut fields = templated(template::EXPERIENCE_REMINDER, &variables, booking.customer_id);
    fields.related_booking_id = Some(experience.booking_id);
    fields.related_experience_id = Some(experience.id);
    create_and_dispatch(fields, clock, notifications, push).await?;
    Ok(true)
}

// --- overdue auto-completion ---

/// Completes sessions stuck `in_progress` past the overdue threshold and
/// tells the owner.
///
/// # Errors
///
/// Returns store failures from the overdue query. Failures on a single
/// session are logged and skipped.
pub async fn auto_complete_overdue(
    clock: &dyn Clock,
    experiences: &dyn ExperienceStore,
    bookings: &dyn BookingStore,
    notifications: &dyn NotificationStore,
    push: &dyn LivePush,
    policy: &BusinessPolicy,
) -> Result<u64, DomainError> {
    let now = clock.now();
    let overdue = experiences
        .list_overdue_in_progress(now - Duration::hours(policy.auto_complete_overdue_hours))
        .await?;
    let candidates = overdue.len();

    let mut completed = 0;
    for mut experience in overdue {
        let outcome = complete_overdue(
            now,
            &mut experience,
            clock,
            experiences,
            bookings,
            notifications,
            push,
        )
        .await;
        match outcome {
            Ok(true) => completed += 1,
            Ok(false) => {}
            Err(error) => tracing::warn!(
                experience_id = %experience.id,
                error = %error,
                "auto-completion skipped"
            ),
        }
    }
    tracing::info!(candidates, completed, "auto-complete sweep ran");
    Ok(completed)
}

async fn complete_overdue(
    now: DateTime<Utc>,
    experience: &mut Experience,
    clock: &dyn Clock,
    experiences: &dyn ExperienceStore,
    bookings: &dyn BookingStore,
    notifications: &dyn NotificationStore,
    push: &dyn LivePush,
) -> Result<bool, DomainError> {
    experience.complete(now)?;
    if !claim(experiences.update(experience).await)? {
        return Ok(false);
    }

    let booking = load_owner(bookings, experience).await?;
    let mut fields = NewNotification::new(
        booking.customer_id,
        NotificationKind::ExperienceUpdate,
        format!("Experience completed: {}", experience.title),
        format!(
            "{} was marked completed automatically after its scheduled window passed.",
            experience.title
        ),
        Priority::Normal,
    );
    fields.related_booking_id = Some(experience.booking_id);
    fields.related_experience_id = Some(experience.id);
    create_and_dispatch(fields, clock, notifications, push).await?;
    Ok(true)
}

// --- payment reminders ---

/// Reminds owners of unpaid bookings at the day thresholds, once per
/// threshold per booking. When a booking has slept through several
/// thresholds only one reminder goes out and the lower thresholds are
/// marked along with it.
///
/// # Errors
///
/// Returns store failures from the unpaid-booking query. Failures on a
/// single booking are logged and skipped.
pub async fn send_payment_reminders(
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    notifications: &dyn NotificationStore,
    push: &dyn LivePush,
    policy: &BusinessPolicy,
) -> Result<u64, DomainError> {
    let mut thresholds = policy.payment_reminder_days.clone();
    thresholds.sort_unstable();
    let Some(first) = thresholds.first().copied() else {
        return Ok(0);
    };

    let now = clock.now();
    let stale = bookings
        .list_unpaid_created_before(now - Duration::days(first))
        .await?;
    let candidates = stale.len();

    let mut sent = 0;
    for mut booking in stale {
        let outcome = remind_payment(
            now,
            &mut booking,
            &thresholds,
            clock,
            bookings,
            notifications,
            push,
        )
        .await;
        match outcome {
            Ok(true) => sent += 1,
            Ok(false) => {}
            Err(error) => tracing::warn!(
                booking_id = %booking.id,
                error = %error,
                "payment reminder skipped"
            ),
        }
    }
    tracing::info!(candidates, sent, "payment reminder sweep ran");
    Ok(sent)
}

async fn remind_payment(
    now: DateTime<Utc>,
    booking: &mut Booking,
    thresholds: &[i64],
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    notifications: &dyn NotificationStore,
    push: &dyn LivePush,
) -> Result<bool, DomainError> {
    let days_pending = (now - booking.created_at).num_days();
    let crossed: Vec<i64> = thresholds
        .iter()
        .copied()
        .filter(|threshold| days_pending >= *threshold)
        .filter(|threshold| !booking.payment_reminders_sent.contains(threshold))
        .collect();
    if crossed.is_empty() {
        return Ok(false);
    }

    for threshold in &crossed {
        booking.mark_payment_reminder_sent(*threshold, now);
    }
    if !claim(bookings.update(booking).await)? {
        return Ok(false);
    }

    let variables = HashMap::from([
        ("booking_number".to_owned(), booking.booking_number.clone()),
        ("days".to_owned(), days_pending.to_string()),
    ]);
    let mut fields = templated(template::BOOKING_REMINDER, &variables, booking.customer_id);
    fields.related_booking_id = Some(booking.id);
    create_and_dispatch(fields, clock, notifications, push).await?;
    Ok(true)
}

// --- growth updates ---

/// Sends a cultivation note to owners of `growing` bookings on each
/// weekly anniversary of the fulfillment start.
///
/// # Errors
///
/// Returns store failures from the growing-booking query. Failures on a
/// single booking are logged and skipped.
pub async fn send_growth_updates(
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    notifications: &dyn NotificationStore,
    push: &dyn LivePush,
    policy: &BusinessPolicy,
) -> Result<u64, DomainError> {
    let cadence = policy.growth_update_interval_days.max(1);
    let now = clock.now();
    let growing = bookings.list_growing().await?;
    let candidates = growing.len();

    let mut sent = 0;
    for mut booking in growing {
        let outcome =
            update_growth(now, &mut booking, cadence, clock, bookings, notifications, push).await;
        match outcome {
            Ok(true) => sent += 1,
            Ok(false) => {}
            Err(error) => tracing::warn!(
                booking_id = %booking.id,
                error = %error,
                "growth update skipped"
            ),
        }
    }
    tracing::info!(candidates, sent, "growth update sweep ran");
    Ok(sent)
}

async fn update_growth(
    now: DateTime<Utc>,
    booking: &mut Booking,
    cadence: i64,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    notifications: &dyn NotificationStore,
    push: &dyn LivePush,
) -> Result<bool, DomainError> {
    let Some(started) = booking.fulfillment.start_date else {
        return Ok(false);
    };
    let day = (now - started).num_days();
    if day <= 0 || day % cadence != 0 || booking.last_growth_update_day == Some(day) {
        return Ok(false);
    }

    booking.mark_growth_update_sent(day, now);
    if !claim(bookings.update(booking).await)? {
        return Ok(false);
    }

    let week = day / cadence;
    let mut fields = NewNotification::new(
        booking.customer_id,
        NotificationKind::GrowthUpdate,
        format!("Coral growth update: day {day}"),
        format!(
            "Your coral for booking {} has been growing for {day} days and is now in week {week}. \
             Check the progress log for the latest photos.",
            booking.booking_number
        ),
        Priority::Normal,
    );
    fields.related_booking_id = Some(booking.id);
    create_and_dispatch(fields, clock, notifications, push).await?;
    Ok(true)
}

// --- notification cleanup ---

/// Purges notifications that are both expired and read.
///
/// # Errors
///
/// Propagates store failures.
pub async fn cleanup_notifications(
    clock: &dyn Clock,
    notifications: &dyn NotificationStore,
) -> Result<u64, DomainError> {
    let removed = notifications.purge_expired_read(clock.now()).await?;
    tracing::info!(removed, "notification cleanup sweep ran");
    Ok(removed)
}

// --- scheduled dispatch ---

/// Delivers scheduled notifications whose hold time has arrived. The
/// store claim marks them dispatched and records the in-app send, so
/// overlapping runs never deliver the same record twice.
///
/// # Errors
///
/// Propagates store failures.
pub async fn dispatch_scheduled(
    clock: &dyn Clock,
    notifications: &dyn NotificationStore,
    push: &dyn LivePush,
) -> Result<u64, DomainError> {
    let claimed = notifications
        .claim_due_scheduled(clock.now(), DISPATCH_BATCH)
        .await?;
    for notification in &claimed {
        push.push_notification(notification);
    }
    if !claimed.is_empty() {
        tracing::info!(dispatched = claimed.len(), "scheduled dispatch sweep ran");
    }
    Ok(claimed.len() as u64)
}

// --- weather monitoring ---

/// Polls the weather provider for each site with upcoming sessions and,
/// on an adverse report, alerts the owners and the live rooms watching
/// those sessions. Each session is alerted at most once.
///
/// # Errors
///
/// Returns store failures from the upcoming-session query. Provider
/// failures and failures on a single session are logged and skipped.
pub async fn monitor_weather(
    clock: &dyn Clock,
    experiences: &dyn ExperienceStore,
    bookings: &dyn BookingStore,
    notifications: &dyn NotificationStore,
    provider: &dyn WeatherProvider,
    hub: &Hub,
    policy: &BusinessPolicy,
) -> Result<u64, DomainError> {
    let now = clock.now();
    let until = now + Duration::hours(policy.weather_alert_lookahead_hours);
    let upcoming = experiences.list_upcoming_between(now, until).await?;

    let mut locations: Vec<String> = upcoming
        .iter()
        .map(|experience| experience.location.clone())
        .collect();
    locations.sort();
    locations.dedup();
    let checked = locations.len();

    let mut alerted = 0;
    for location in locations {
        let report = match provider.check(&location).await {
            Ok(Some(report)) => report,
            Ok(None) => continue,
            Err(error) => {
                tracing::warn!(location = %location, error = %error, "weather check failed");
                continue;
            }
        };
        for experience in &upcoming {
            if experience.location != location || experience.weather_alerted {
                continue;
            }
            let mut experience = experience.clone();
            let outcome = alert_weather(
                now,
                &mut experience,
                &report,
                clock,
                experiences,
                bookings,
                notifications,
                hub,
            )
            .await;
            match outcome {
                Ok(true) => alerted += 1,
                Ok(false) => {}
                Err(error) => tracing::warn!(
                    experience_id = %experience.id,
                    error = %error,
                    "weather alert skipped"
                ),
            }
        }
    }
    tracing::info!(checked, alerted, "weather sweep ran");
    Ok(alerted)
}

#[allow(clippy::too_many_arguments)]
async fn alert_weather(
    now: DateTime<Utc>,
    experience: &mut Experience,
    report: &WeatherReport,
    clock: &dyn Clock,
    experiences: &dyn ExperienceStore,
    bookings: &dyn BookingStore,
    notifications: &dyn NotificationStore,
    hub: &Hub,
) -> Result<bool, DomainError> {
    experience.mark_weather_alerted(now);
    if !claim(experiences.update(experience).await)? {
        return Ok(false);
    }

    let booking = load_owner(bookings, experience).await?;
    let variables = HashMap::from([
        ("location".to_owned(), experience.location.clone()),
        ("conditions".to_owned(), report.conditions.clone()),
        ("title".to_owned(), experience.title.clone()),
    ]);
    let mut fields = templated(template::WEATHER_WARNING, &variables, booking.customer_id);
    fields.related_booking_id = Some(experience.booking_id);
    fields.related_experience_id = Some(experience.id);
    create_and_dispatch(fields, clock, notifications, hub).await?;

    let alert = ServerMessage::WeatherAlert {
        location: experience.location.clone(),
        severity: report.severity.clone(),
        message: report.conditions.clone(),
    };
    hub.broadcast_room(&Room::Experience(experience.id), &alert);
    hub.broadcast_room(&Room::Booking(experience.booking_id), &alert);
    Ok(true)
}

// --- system health ---

/// Samples process memory and alerts every administrator when it sits
/// above the policy threshold.
///
/// # Errors
///
/// Propagates directory failures. Failures on a single administrator
/// are logged and skipped.
pub async fn check_system_health(
    clock: &dyn Clock,
    sampler: &dyn ResourceSampler,
    directory: &dyn RecipientDirectory,
    notifications: &dyn NotificationStore,
    push: &dyn LivePush,
    policy: &BusinessPolicy,
) -> Result<u64, DomainError> {
    let Some(rss) = sampler.rss_bytes() else {
        tracing::debug!("resource sampler unavailable; skipping health sweep");
        return Ok(0);
    };
    let rss_mb = rss / (1024 * 1024);
    if rss_mb < policy.memory_alert_threshold_mb {
        tracing::debug!(rss_mb, "system health nominal");
        return Ok(0);
    }

    tracing::warn!(rss_mb, "process memory above alert threshold");
    let admins = directory.ids_with_role(Role::Admin).await?;
    let mut sent = 0;
    for admin_id in admins {
        let fields = NewNotification::new(
            admin_id,
            NotificationKind::SystemHealth,
            "System memory warning",
            format!("Process memory is at {rss_mb} MB, above the alert threshold."),
            Priority::Urgent,
        );
        match create_and_dispatch(fields, clock, notifications, push).await {
            Ok(_) => sent += 1,
            Err(error) => tracing::warn!(
                admin_id = %admin_id,
                error = %error,
                "health alert skipped"
            ),
        }
    }
    tracing::info!(sent, rss_mb, "health sweep alerted administrators");
    Ok(sent)
}

// --- shared helpers ---

/// Folds a claim update into "won the claim or not". A revision conflict
/// means another run claimed the item first.
fn claim(update: Result<(), DomainError>) -> Result<bool, DomainError> {
    match update {
        Ok(()) => Ok(true),
        Err(DomainError::RevisionConflict { .. }) => Ok(false),
        Err(error) => Err(error),
    }
}

async fn load_owner(
    bookings: &dyn BookingStore,
    experience: &Experience,
) -> Result<Booking, DomainError> {
    bookings
        .find(experience.booking_id)
        .await?
        .ok_or_else(|| DomainError::NotFound {
            entity: "booking",
            id: experience.booking_id.to_string(),
        })
}

fn templated(
    template: Template,
    variables: &HashMap<String, String>,
    recipient_id: Uuid,
) -> NewNotification {
    NewNotification::new(
        recipient_id,
        template.kind,
        template::render(template.title, variables),
        template::render(template.message, variables),
        template.priority,
    )
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::TimeZone;

    use reefbook_core::page::Page;
    use reefbook_ledger::domain::booking::{BookingStatus, PaymentStatus};
    use reefbook_ledger::domain::experience::ExperienceStatus;
    use reefbook_notifications::domain::notification::Notification;
    use reefbook_notifications::push::NoopPush;
    use reefbook_notifications::store::NotificationFilter;
    use reefbook_store::memory::{
        InMemoryBookingStore, InMemoryExperienceStore, InMemoryNotificationStore,
    };
    use reefbook_test_support::{FixedClock, StaticDirectory};

    use super::*;

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    /// Helper to seed a pending, unpaid booking created at `created_at`.
    fn seeded_booking(customer_id: Uuid, created_at: DateTime<Utc>) -> Booking {
        Booking::new(
            Uuid::new_v4(),
            format!("CR-{}", Uuid::new_v4().simple()),
            customer_id,
            Uuid::new_v4(),
            2,
            1_500_000,
            0.0,
            "VND".to_owned(),
            created_at,
        )
    }

    /// Helper to seed a scheduled session at `scheduled_at`.
    fn seeded_experience(
        booking_id: Uuid,
        scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Experience {
        Experience::new(
            Uuid::new_v4(),
            booking_id,
            "Reef dive".to_owned(),
            scheduled_at,
            90,
            "Nha Trang".to_owned(),
            4,
            now,
        )
    }

    async fn inbox(
        store: &InMemoryNotificationStore,
        recipient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Vec<Notification> {
        store
            .list_for_recipient(recipient_id, NotificationFilter::default(), Page::default(), now)
            .await
            .unwrap()
    }

    struct StaticWeather(Option<WeatherReport>);

    #[async_trait]
    impl WeatherProvider for StaticWeather {
        async fn check(&self, _location: &str) -> Result<Option<WeatherReport>, DomainError> {
            Ok(self.0.clone())
        }
    }

    struct FailingWeather;

    #[async_trait]
    impl WeatherProvider for FailingWeather {
        async fn check(&self, _location: &str) -> Result<Option<WeatherReport>, DomainError> {
            Err(DomainError::Infrastructure("weather api down".to_owned()))
        }
    }

    struct StaticSampler(Option<u64>);

    impl ResourceSampler for StaticSampler {
        fn rss_bytes(&self) -> Option<u64> {
            self.0
        }
    }

    // --- experience reminders ---

    #[tokio::test]
    async fn test_experience_reminders_fire_once_within_lookahead() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::default();
        let experiences = InMemoryExperienceStore::default();
        let notifications = InMemoryNotificationStore::default();
        let customer_id = Uuid::new_v4();
        let booking = seeded_booking(customer_id, clock.0);
        bookings.insert(&booking).await.unwrap();
        let soon = seeded_experience(booking.id, clock.0 + Duration::hours(6), clock.0);
        let far = seeded_experience(booking.id, clock.0 + Duration::hours(48), clock.0);
        experiences.insert(&soon).await.unwrap();
        experiences.insert(&far).await.unwrap();

        // Act
        let sent = send_experience_reminders(
            &clock,
            &experiences,
            &bookings,
            &notifications,
            &NoopPush,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(sent, 1);
        let claimed = experiences.find(soon.id).await.unwrap().unwrap();
        assert!(claimed.reminder_sent);
        let untouched = experiences.find(far.id).await.unwrap().unwrap();
        assert!(!untouched.reminder_sent);
        let received = inbox(&notifications, customer_id, clock.0).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, NotificationKind::ExperienceReminder);
        assert!(received[0].message.contains("6 hours"));
        assert_eq!(received[0].related_experience_id, Some(soon.id));

        // Act: a second run finds nothing left to remind.
        let again = send_experience_reminders(
            &clock,
            &experiences,
            &bookings,
            &notifications,
            &NoopPush,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();
        assert_eq!(again, 0);
        assert_eq!(inbox(&notifications, customer_id, clock.0).await.len(), 1);
    }

    // --- overdue auto-completion ---

    #[tokio::test]
    async fn test_auto_complete_finishes_only_overdue_sessions() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::default();
        let experiences = InMemoryExperienceStore::default();
        let notifications = InMemoryNotificationStore::default();
        let customer_id = Uuid::new_v4();
        let booking = seeded_booking(customer_id, clock.0);
        bookings.insert(&booking).await.unwrap();
        let mut stuck = seeded_experience(booking.id, clock.0 - Duration::hours(7), clock.0);
        stuck.status = ExperienceStatus::InProgress;
        let mut running = seeded_experience(booking.id, clock.0 - Duration::hours(2), clock.0);
        running.status = ExperienceStatus::InProgress;
        experiences.insert(&stuck).await.unwrap();
        experiences.insert(&running).await.unwrap();

        // Act
        let completed = auto_complete_overdue(
            &clock,
            &experiences,
            &bookings,
            &notifications,
            &NoopPush,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(completed, 1);
        let finished = experiences.find(stuck.id).await.unwrap().unwrap();
        assert_eq!(finished.status, ExperienceStatus::Completed);
        let still_running = experiences.find(running.id).await.unwrap().unwrap();
        assert_eq!(still_running.status, ExperienceStatus::InProgress);
        let received = inbox(&notifications, customer_id, clock.0).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, NotificationKind::ExperienceUpdate);
        assert!(received[0].message.contains("automatically"));
    }

    // --- payment reminders ---

    #[tokio::test]
    async fn test_payment_reminder_marks_crossed_thresholds() {
        // Arrange: unpaid for three days, never reminded.
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::default();
        let notifications = InMemoryNotificationStore::default();
        let customer_id = Uuid::new_v4();
        let booking = seeded_booking(customer_id, clock.0 - Duration::days(3));
        bookings.insert(&booking).await.unwrap();

        // Act
        let sent = send_payment_reminders(
            &clock,
            &bookings,
            &notifications,
            &NoopPush,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        // Assert: one reminder, both crossed thresholds recorded.
        assert_eq!(sent, 1);
        let reminded = bookings.find(booking.id).await.unwrap().unwrap();
        assert_eq!(reminded.payment_reminders_sent, vec![1, 3]);
        let received = inbox(&notifications, customer_id, clock.0).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, NotificationKind::PaymentReminder);
        assert!(received[0].message.contains("3 days"));

        // Act: the next daily run has no new threshold to report.
        let again = send_payment_reminders(
            &clock,
            &bookings,
            &notifications,
            &NoopPush,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();
        assert_eq!(again, 0);
        assert_eq!(inbox(&notifications, customer_id, clock.0).await.len(), 1);
    }

    #[tokio::test]
    async fn test_payment_reminder_subsumes_missed_thresholds_and_skips_paid() {
        // Arrange: one booking unpaid for eight days, one already paid.
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::default();
        let notifications = InMemoryNotificationStore::default();
        let customer_id = Uuid::new_v4();
        let neglected = seeded_booking(customer_id, clock.0 - Duration::days(8));
        bookings.insert(&neglected).await.unwrap();
        let mut paid = seeded_booking(Uuid::new_v4(), clock.0 - Duration::days(9));
        paid.payment_status = PaymentStatus::Paid;
        paid.status = BookingStatus::Confirmed;
        bookings.insert(&paid).await.unwrap();

        // Act
        let sent = send_payment_reminders(
            &clock,
            &bookings,
            &notifications,
            &NoopPush,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        // Assert: one reminder covering all three missed thresholds.
        assert_eq!(sent, 1);
        let reminded = bookings.find(neglected.id).await.unwrap().unwrap();
        assert_eq!(reminded.payment_reminders_sent, vec![1, 3, 7]);
        let received = inbox(&notifications, customer_id, clock.0).await;
        assert_eq!(received.len(), 1);
        assert!(received[0].message.contains("8 days"));
        assert!(inbox(&notifications, paid.customer_id, clock.0).await.is_empty());
    }

    // --- growth updates ---

    #[tokio::test]
    async fn test_growth_updates_fire_on_weekly_anniversaries_only() {
        // Arrange: one booking fourteen days into cultivation, one five.
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::default();
        let notifications = InMemoryNotificationStore::default();
        let customer_id = Uuid::new_v4();
        let mut due = seeded_booking(customer_id, clock.0 - Duration::days(20));
        due.status = BookingStatus::Growing;
        due.fulfillment.start_date = Some(clock.0 - Duration::days(14));
        bookings.insert(&due).await.unwrap();
        let mut midweek = seeded_booking(Uuid::new_v4(), clock.0 - Duration::days(10));
        midweek.status = BookingStatus::Growing;
        midweek.fulfillment.start_date = Some(clock.0 - Duration::days(5));
        bookings.insert(&midweek).await.unwrap();

        // Act
        let sent = send_growth_updates(
            &clock,
            &bookings,
            &notifications,
            &NoopPush,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(sent, 1);
        let updated = bookings.find(due.id).await.unwrap().unwrap();
        assert_eq!(updated.last_growth_update_day, Some(14));
        let received = inbox(&notifications, customer_id, clock.0).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, NotificationKind::GrowthUpdate);
        assert!(received[0].message.contains("14 days"));
        assert!(inbox(&notifications, midweek.customer_id, clock.0).await.is_empty());

        // Act: rerunning on the same day stays quiet.
        let again = send_growth_updates(
            &clock,
            &bookings,
            &notifications,
            &NoopPush,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();
        assert_eq!(again, 0);
    }

    // --- notification cleanup ---

    #[tokio::test]
    async fn test_cleanup_purges_only_expired_read_notifications() {
        // Arrange: one expired and read, one expired but unread.
        let clock = fixed_clock();
        let notifications = InMemoryNotificationStore::default();
        let recipient_id = Uuid::new_v4();
        let mut fields = NewNotification::new(
            recipient_id,
            NotificationKind::Announcement,
            "Old news",
            "This announcement has run its course.",
            Priority::Low,
        );
        fields.expires_at = Some(clock.0 - Duration::days(1));
        let mut gone = Notification::create(Uuid::new_v4(), fields.clone(), clock.0 - Duration::days(10));
        gone.mark_read(clock.0 - Duration::days(5));
        notifications.insert(&gone).await.unwrap();
        let kept = Notification::create(Uuid::new_v4(), fields, clock.0 - Duration::days(10));
        notifications.insert(&kept).await.unwrap();

        // Act
        let removed = cleanup_notifications(&clock, &notifications).await.unwrap();

        // Assert
        assert_eq!(removed, 1);
        assert!(notifications.find(gone.id).await.unwrap().is_none());
        assert!(notifications.find(kept.id).await.unwrap().is_some());
    }

    // --- scheduled dispatch ---

    #[tokio::test]
    async fn test_dispatch_delivers_due_scheduled_to_live_recipients() {
        // Arrange: a held notification whose hold time has passed, with
        // its recipient connected.
        let clock = fixed_clock();
        let notifications = InMemoryNotificationStore::default();
        let hub = Hub::default();
        let recipient_id = Uuid::new_v4();
        let mut live = hub.register(recipient_id, Role::Customer).unwrap();
        let mut fields = NewNotification::new(
            recipient_id,
            NotificationKind::Promotion,
            "Reef gear sale",
            "Our annual reef gear sale starts now.",
            Priority::Low,
        );
        fields.scheduled_for = Some(clock.0 - Duration::minutes(1));
        let held = Notification::create(Uuid::new_v4(), fields, clock.0 - Duration::hours(1));
        notifications.insert(&held).await.unwrap();

        // Act
        let dispatched = dispatch_scheduled(&clock, &notifications, &hub).await.unwrap();

        // Assert: claimed, recorded, and pushed.
        assert_eq!(dispatched, 1);
        let stored = notifications.find(held.id).await.unwrap().unwrap();
        assert!(stored.dispatched_at.is_some());
        assert!(stored.channels.in_app.sent);
        match live.outbox.try_recv().unwrap() {
            ServerMessage::NewNotification { notification } => {
                assert_eq!(notification.id, held.id);
            }
            other => panic!("expected NewNotification, got {other:?}"),
        }

        // Act: nothing is left to claim.
        let again = dispatch_scheduled(&clock, &notifications, &hub).await.unwrap();
        assert_eq!(again, 0);
    }

    // --- weather monitoring ---

    #[tokio::test]
    async fn test_weather_alert_notifies_owner_and_live_rooms_once() {
        // Arrange: an upcoming session with one spectator in its room.
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::default();
        let experiences = InMemoryExperienceStore::default();
        let notifications = InMemoryNotificationStore::default();
        let hub = Hub::default();
        let customer_id = Uuid::new_v4();
        let booking = seeded_booking(customer_id, clock.0);
        bookings.insert(&booking).await.unwrap();
        let session = seeded_experience(booking.id, clock.0 + Duration::hours(24), clock.0);
        experiences.insert(&session).await.unwrap();
        let mut owner = hub.register(customer_id, Role::Customer).unwrap();
        let mut spectator = hub.register(Uuid::new_v4(), Role::Customer).unwrap();
        assert!(hub.join_room(spectator.connection_id, &Room::Experience(session.id)));
        let provider = StaticWeather(Some(WeatherReport {
            severity: "moderate".to_owned(),
            conditions: "strong wind and rough seas".to_owned(),
            wind_speed: Some("25-35 km/h".to_owned()),
            wave_height: Some("1.5-2.5m".to_owned()),
        }));

        // Act
        let alerted = monitor_weather(
            &clock,
            &experiences,
            &bookings,
            &notifications,
            &provider,
            &hub,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(alerted, 1);
        let marked = experiences.find(session.id).await.unwrap().unwrap();
        assert!(marked.weather_alerted);
        let received = inbox(&notifications, customer_id, clock.0).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, NotificationKind::WeatherAlert);
        assert_eq!(received[0].priority, Priority::Urgent);
        assert!(received[0].title.contains("Nha Trang"));
        match owner.outbox.try_recv().unwrap() {
            ServerMessage::NewNotification { notification } => {
                assert_eq!(notification.kind, "weather_alert");
            }
            other => panic!("expected NewNotification, got {other:?}"),
        }
        match spectator.outbox.try_recv().unwrap() {
            ServerMessage::WeatherAlert { location, severity, .. } => {
                assert_eq!(location, "Nha Trang");
                assert_eq!(severity, "moderate");
            }
            other => panic!("expected WeatherAlert, got {other:?}"),
        }

        // Act: the next poll leaves the already-alerted session alone.
        let again = monitor_weather(
            &clock,
            &experiences,
            &bookings,
            &notifications,
            &provider,
            &hub,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();
        assert_eq!(again, 0);
        assert_eq!(inbox(&notifications, customer_id, clock.0).await.len(), 1);
    }

    #[tokio::test]
    async fn test_weather_provider_failure_is_contained() {
        // Arrange
        let clock = fixed_clock();
        let bookings = InMemoryBookingStore::default();
        let experiences = InMemoryExperienceStore::default();
        let notifications = InMemoryNotificationStore::default();
        let hub = Hub::default();
        let customer_id = Uuid::new_v4();
        let booking = seeded_booking(customer_id, clock.0);
        bookings.insert(&booking).await.unwrap();
        let session = seeded_experience(booking.id, clock.0 + Duration::hours(24), clock.0);
        experiences.insert(&session).await.unwrap();

        // Act
        let alerted = monitor_weather(
            &clock,
            &experiences,
            &bookings,
            &notifications,
            &FailingWeather,
            &hub,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        // Assert: the sweep finishes and the session stays unalerted.
        assert_eq!(alerted, 0);
        let untouched = experiences.find(session.id).await.unwrap().unwrap();
        assert!(!untouched.weather_alerted);
        assert!(inbox(&notifications, customer_id, clock.0).await.is_empty());
    }

    // --- system health ---

    #[tokio::test]
    async fn test_health_sweep_alerts_every_admin_above_threshold() {
        // Arrange
        let clock = fixed_clock();
        let notifications = InMemoryNotificationStore::default();
        let admin_a = Uuid::new_v4();
        let admin_b = Uuid::new_v4();
        let directory = StaticDirectory::new().with_admin(admin_a).with_admin(admin_b);
        let sampler = StaticSampler(Some(600 * 1024 * 1024));

        // Act
        let sent = check_system_health(
            &clock,
            &sampler,
            &directory,
            &notifications,
            &NoopPush,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(sent, 2);
        let received = inbox(&notifications, admin_a, clock.0).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, NotificationKind::SystemHealth);
        assert_eq!(received[0].priority, Priority::Urgent);
        assert!(received[0].message.contains("600 MB"));
        assert_eq!(inbox(&notifications, admin_b, clock.0).await.len(), 1);
    }

    #[tokio::test]
    async fn test_health_sweep_is_quiet_below_threshold_or_unsampled() {
        // Arrange
        let clock = fixed_clock();
        let notifications = InMemoryNotificationStore::default();
        let admin_id = Uuid::new_v4();
        let directory = StaticDirectory::new().with_admin(admin_id);

        // Act
        let nominal = check_system_health(
            &clock,
            &StaticSampler(Some(100 * 1024 * 1024)),
            &directory,
            &notifications,
            &NoopPush,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();
        let unsampled = check_system_health(
            &clock,
            &StaticSampler(None),
            &directory,
            &notifications,
            &NoopPush,
            &BusinessPolicy::default(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(nominal, 0);
        assert_eq!(unsampled, 0);
        assert!(inbox(&notifications, admin_id, clock.0).await.is_empty());
    }
}
