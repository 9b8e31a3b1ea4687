//! Command handlers for the notification store.
//!
//! Creation persists first and pushes second: the stored record is the
//! source of truth, and a dead fan-out never loses a notification. The
//! recipient-facing operations (mark read, delete, track) are scoped by
//! the acting user's id, so a foreign record behaves like a missing one.

use std::collections::HashMap;

use uuid::Uuid;

use reefbook_core::actor::{Actor, Role};
use reefbook_core::authz::{self, Action, Resource};
use reefbook_core::clock::Clock;
use reefbook_core::directory::RecipientDirectory;
use reefbook_core::error::DomainError;

use crate::domain::notification::{
    Channel, ChannelOutcome, Interaction, NewNotification, Notification, Priority,
};
use crate::domain::template;
use crate::push::LivePush;
use crate::store::NotificationStore;

/// Persist a notification and, unless it is scheduled for later, hand it
/// to live fan-out. This is the single create path: command handlers, the
/// event notifier, and scheduler sweeps all come through here.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty title or message, or
/// whatever the store reports. Push failures are not errors.
pub async fn create_and_dispatch(
    fields: NewNotification,
    clock: &dyn Clock,
    store: &dyn NotificationStore,
    push: &dyn LivePush,
) -> Result<Notification, DomainError> {
    if fields.title.trim().is_empty() || fields.message.trim().is_empty() {
        return Err(DomainError::Validation(
            "notification title and message must not be empty".to_owned(),
        ));
    }

    let now = clock.now();
    let mut notification = Notification::create(Uuid::new_v4(), fields, now);
    if !notification.is_held(now) {
        notification.record_channel(Channel::InApp, ChannelOutcome::Sent, now);
        notification.dispatched_at = Some(now);
    }
    store.insert(&notification).await?;

    if notification.dispatched_at.is_some() {
        push.push_notification(&notification);
    } else {
        tracing::debug!(
            notification_id = %notification.id,
            scheduled_for = ?notification.scheduled_for,
            "notification held for scheduled dispatch"
        );
    }

    Ok(notification)
}

/// Admin command: send a notification to one user.
#[derive(Debug)]
pub struct SendNotification {
    /// The acting administrator.
    pub actor: Actor,
    /// The notification to create.
    pub fields: NewNotification,
}

/// Handles `SendNotification`.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` for non-admin actors.
pub async fn handle_send_notification(
    command: SendNotification,
    clock: &dyn Clock,
    store: &dyn NotificationStore,
    push: &dyn LivePush,
) -> Result<Notification, DomainError> {
    authz::authorize(&command.actor, Action::SendNotifications, Resource::Platform)?;
    create_and_dispatch(command.fields, clock, store, push).await
}

/// Who a broadcast goes to.
#[derive(Debug, Clone)]
pub enum BroadcastAudience {
    /// Every user holding a role.
    Role(Role),
    /// An explicit recipient list.
    Users(Vec<Uuid>),
}

/// Admin command: send the same notification to many users.
#[derive(Debug)]
pub struct BroadcastNotification {
    /// The acting administrator.
    pub actor: Actor,
    /// Who receives it.
    pub audience: BroadcastAudience,
    /// The notification content; `recipient_id` is ignored and replaced
    /// per recipient.
    pub fields: NewNotification,
}

/// Handles `BroadcastNotification`: one independent record per
/// recipient. Returns how many were created.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty explicit recipient
/// list and `DomainError::Unauthorized` for non-admin actors.
pub async fn handle_broadcast(
    command: BroadcastNotification,
    clock: &dyn Clock,
    store: &dyn NotificationStore,
    directory: &dyn RecipientDirectory,
    push: &dyn LivePush,
) -> Result<u64, DomainError> {
    authz::authorize(&command.actor, Action::SendNotifications, Resource::Platform)?;

    let recipients = match command.audience {
        BroadcastAudience::Role(role) => directory.ids_with_role(role).await?,
        BroadcastAudience::Users(users) => users,
    };
    if recipients.is_empty() {
        return Err(DomainError::Validation(
            "broadcast requires at least one recipient".to_owned(),
        ));
    }

    let mut created = 0u64;
    for recipient_id in recipients {
        let fields = NewNotification {
            recipient_id,
            ..command.fields.clone()
        };
        create_and_dispatch(fields, clock, store, push).await?;
        created += 1;
    }

    tracing::info!(created, kind = command.fields.kind.as_str(), "broadcast sent");
    Ok(created)
}

/// Admin command: render a built-in template and send it.
#[derive(Debug)]
pub struct SendTemplated {
    /// The acting administrator.
    pub actor: Actor,
    /// Registry key of the template.
    pub template_name: String,
    /// Who receives it.
    pub recipient_id: Uuid,
    /// `{variable}` substitutions.
    pub variables: HashMap<String, String>,
    /// Related booking, when there is one.
    pub related_booking_id: Option<Uuid>,
    /// Related experience, when there is one.
    pub related_experience_id: Option<Uuid>,
}

/// Handles `SendTemplated`: renders the template, then follows the
/// normal create path with the template's kind and priority.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an unknown template name.
pub async fn handle_send_templated(
    command: SendTemplated,
    clock: &dyn Clock,
    store: &dyn NotificationStore,
    push: &dyn LivePush,
) -> Result<Notification, DomainError> {
    authz::authorize(&command.actor, Action::SendNotifications, Resource::Platform)?;

    let Some(found) = template::find(&command.template_name) else {
        return Err(DomainError::Validation(format!(
            "unknown template {}",
            command.template_name
        )));
    };

    let mut fields = NewNotification::new(
        command.recipient_id,
        found.kind,
        template::render(found.title, &command.variables),
        template::render(found.message, &command.variables),
        found.priority,
    );
    fields.related_booking_id = command.related_booking_id;
    fields.related_experience_id = command.related_experience_id;
    create_and_dispatch(fields, clock, store, push).await
}

/// Marks one of the actor's notifications read. Idempotent: an
/// already-read record is acknowledged without change. Returns whether
/// this call changed it.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for a missing or foreign id.
pub async fn handle_mark_read(
    actor: &Actor,
    notification_id: Uuid,
    clock: &dyn Clock,
    store: &dyn NotificationStore,
) -> Result<bool, DomainError> {
    store
        .mark_read(notification_id, actor.user_id, clock.now())
        .await
}

/// Marks all of the actor's unread notifications read. Returns the
/// number changed.
///
/// # Errors
///
/// Propagates store failures.
pub async fn handle_mark_all_read(
    actor: &Actor,
    clock: &dyn Clock,
    store: &dyn NotificationStore,
) -> Result<u64, DomainError> {
    let changed = store.mark_all_read(actor.user_id, clock.now()).await?;
    tracing::debug!(user_id = %actor.user_id, changed, "marked all notifications read");
    Ok(changed)
}

/// Deletes one of the actor's notifications.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for a missing or foreign id.
pub async fn handle_delete(
    actor: &Actor,
    notification_id: Uuid,
    store: &dyn NotificationStore,
) -> Result<(), DomainError> {
    store.delete_own(notification_id, actor.user_id).await
}

/// Records an interaction on one of the actor's notifications.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for a missing or foreign id.
pub async fn handle_track(
    actor: &Actor,
    notification_id: Uuid,
    interaction: Interaction,
    clock: &dyn Clock,
    store: &dyn NotificationStore,
) -> Result<(), DomainError> {
    store
        .record_interaction(notification_id, actor.user_id, interaction, clock.now())
        .await
}

/// Admin command: purge expired, read notifications now instead of
/// waiting for the nightly sweep. Returns the number removed.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` for non-admin actors.
pub async fn handle_cleanup(
    actor: &Actor,
    clock: &dyn Clock,
    store: &dyn NotificationStore,
) -> Result<u64, DomainError> {
    authz::authorize(actor, Action::RunMaintenance, Resource::Platform)?;
    let removed = store.purge_expired_read(clock.now()).await?;
    tracing::info!(removed, "notification cleanup ran");
    Ok(removed)
}

/// Convenience for internal senders: a normal-priority notification
/// about a booking.
#[must_use]
pub fn booking_notice(
    recipient_id: Uuid,
    kind: crate::domain::notification::NotificationKind,
    title: impl Into<String>,
    message: impl Into<String>,
    booking_id: Uuid,
) -> NewNotification {
    let mut fields = NewNotification::new(recipient_id, kind, title, message, Priority::Normal);
    fields.related_booking_id = Some(booking_id);
    fields
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use reefbook_core::actor::{Actor, Role};
    use reefbook_core::error::DomainError;
    use reefbook_store::memory::InMemoryNotificationStore;
    use reefbook_test_support::{FixedClock, StaticDirectory};

    use super::*;
    use crate::domain::notification::NotificationKind;
    use crate::push::NoopPush;
    use crate::store::NotificationStore as _;

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Admin)
    }

    fn plain_fields(recipient_id: Uuid) -> NewNotification {
        NewNotification::new(
            recipient_id,
            NotificationKind::Announcement,
            "Reef news",
            "The nursery expanded to a second bay.",
            Priority::Normal,
        )
    }

    #[tokio::test]
    async fn test_create_and_dispatch_marks_in_app_sent() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryNotificationStore::new();
        let recipient = Uuid::new_v4();

        // Act
        let notification = create_and_dispatch(plain_fields(recipient), &clock, &store, &NoopPush)
            .await
            .unwrap();

        // Assert
        assert!(notification.channels.in_app.sent);
        assert_eq!(notification.dispatched_at, Some(clock.0));
        let stored = store.find(notification.id).await.unwrap().unwrap();
        assert!(stored.channels.in_app.sent);
        assert!(!stored.read);
    }

    #[tokio::test]
    async fn test_scheduled_notification_is_not_dispatched_at_create() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryNotificationStore::new();
        let mut fields = plain_fields(Uuid::new_v4());
        fields.scheduled_for = Some(clock.0 + chrono::Duration::hours(6));

        // Act
        let notification = create_and_dispatch(fields, &clock, &store, &NoopPush)
            .await
            .unwrap();

        // Assert
        assert!(notification.dispatched_at.is_none());
        assert!(!notification.channels.in_app.sent);
    }

    #[tokio::test]
    async fn test_send_notification_requires_admin() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryNotificationStore::new();
        let command = SendNotification {
            actor: Actor::new(Uuid::new_v4(), Role::Customer),
            fields: plain_fields(Uuid::new_v4()),
        };

        // Act
        let result = handle_send_notification(command, &clock, &store, &NoopPush).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_broadcast_to_role_creates_independent_records() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryNotificationStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let directory = StaticDirectory::new()
            .with_user(first, Role::Customer, "An", Some("an@example.com"))
            .with_user(second, Role::Customer, "Binh", None)
            .with_admin(Uuid::new_v4());

        let command = BroadcastNotification {
            actor: admin(),
            audience: BroadcastAudience::Role(Role::Customer),
            fields: plain_fields(Uuid::nil()),
        };

        // Act
        let created = handle_broadcast(command, &clock, &store, &directory, &NoopPush)
            .await
            .unwrap();

        // Assert — marking one recipient's copy read leaves the other's.
        assert_eq!(created, 2);
        assert_eq!(store.unread_count(first, clock.0).await.unwrap(), 1);
        let changed = store.mark_all_read(first, clock.0).await.unwrap();
        assert_eq!(changed, 1);
        assert_eq!(store.unread_count(first, clock.0).await.unwrap(), 0);
        assert_eq!(store.unread_count(second, clock.0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_templated_send_renders_variables() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryNotificationStore::new();
        let recipient = Uuid::new_v4();
        let command = SendTemplated {
            actor: admin(),
            template_name: "experience_reminder".to_owned(),
            recipient_id: recipient,
            variables: HashMap::from([
                ("title".to_owned(), "Night dive".to_owned()),
                ("location".to_owned(), "Hon Mun".to_owned()),
                ("hours".to_owned(), "12".to_owned()),
            ]),
            related_booking_id: None,
            related_experience_id: Some(Uuid::new_v4()),
        };

        // Act
        let notification = handle_send_templated(command, &clock, &store, &NoopPush)
            .await
            .unwrap();

        // Assert
        assert_eq!(notification.kind, NotificationKind::ExperienceReminder);
        assert_eq!(notification.priority, Priority::High);
        assert_eq!(notification.title, "Upcoming experience: Night dive");
        assert!(notification.message.contains("starts in 12 hours"));
    }

    #[tokio::test]
    async fn test_templated_send_with_unknown_template_is_a_validation_error() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryNotificationStore::new();
        let command = SendTemplated {
            actor: admin(),
            template_name: "no_such_template".to_owned(),
            recipient_id: Uuid::new_v4(),
            variables: HashMap::new(),
            related_booking_id: None,
            related_experience_id: None,
        };

        // Act
        let result = handle_send_templated(command, &clock, &store, &NoopPush).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_mark_read_is_scoped_to_the_recipient() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryNotificationStore::new();
        let recipient = Uuid::new_v4();
        let notification = create_and_dispatch(plain_fields(recipient), &clock, &store, &NoopPush)
            .await
            .unwrap();
        let stranger = Actor::new(Uuid::new_v4(), Role::Customer);
        let owner = Actor::new(recipient, Role::Customer);

        // Act — a stranger sees NotFound, the owner marks it.
        let foreign = handle_mark_read(&stranger, notification.id, &clock, &store).await;
        let first = handle_mark_read(&owner, notification.id, &clock, &store)
            .await
            .unwrap();
        let second = handle_mark_read(&owner, notification.id, &clock, &store)
            .await
            .unwrap();

        // Assert
        assert!(matches!(foreign, Err(DomainError::NotFound { .. })));
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_cleanup_requires_admin_and_reports_count() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryNotificationStore::new();
        let recipient = Uuid::new_v4();
        let mut fields = plain_fields(recipient);
        fields.expires_at = Some(clock.0 - chrono::Duration::days(1));
        let expired = create_and_dispatch(fields, &clock, &store, &NoopPush)
            .await
            .unwrap();
        store.mark_read(expired.id, recipient, clock.0).await.unwrap();

        // Act
        let denied = handle_cleanup(
            &Actor::new(Uuid::new_v4(), Role::Business),
            &clock,
            &store,
        )
        .await;
        let removed = handle_cleanup(&admin(), &clock, &store).await.unwrap();

        // Assert
        assert!(matches!(denied, Err(DomainError::Unauthorized { .. })));
        assert_eq!(removed, 1);
        assert!(store.find(expired.id).await.unwrap().is_none());
    }
}
