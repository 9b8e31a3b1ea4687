//! Query handlers for the notification store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use reefbook_core::actor::Actor;
use reefbook_core::authz::{self, Action, Resource};
use reefbook_core::clock::Clock;
use reefbook_core::error::DomainError;

use crate::domain::notification::{Notification, Priority};
use crate::store::{AnalyticsSummary, NotificationFilter, NotificationStore, Page};

/// Read-only view of a notification, shaped for the recipient.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    /// The record identifier.
    pub id: Uuid,
    /// What it is about.
    pub kind: &'static str,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Delivery urgency.
    pub priority: Priority,
    /// Whether the recipient has read it.
    pub read: bool,
    /// When it was read.
    pub read_at: Option<DateTime<Utc>>,
    /// Related booking, when there is one.
    pub related_booking_id: Option<Uuid>,
    /// Related experience, when there is one.
    pub related_experience_id: Option<Uuid>,
    /// Client navigation target.
    pub action_url: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl NotificationView {
    /// Build the recipient-facing view of a stored notification.
    #[must_use]
    pub fn from_notification(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind.as_str(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            priority: notification.priority,
            read: notification.read,
            read_at: notification.read_at,
            related_booking_id: notification.related_booking_id,
            related_experience_id: notification.related_experience_id,
            action_url: notification.action_url.clone(),
            created_at: notification.created_at,
        }
    }
}

/// Lists the actor's notifications, newest first.
///
/// # Errors
///
/// Propagates store failures.
pub async fn list_notifications(
    actor: &Actor,
    filter: NotificationFilter,
    page: Page,
    clock: &dyn Clock,
    store: &dyn NotificationStore,
) -> Result<Vec<NotificationView>, DomainError> {
    let notifications = store
        .list_for_recipient(actor.user_id, filter, page, clock.now())
        .await?;
    Ok(notifications
        .iter()
        .map(NotificationView::from_notification)
        .collect())
}

/// The actor's unread notification count.
///
/// # Errors
///
/// Propagates store failures.
pub async fn unread_count(
    actor: &Actor,
    clock: &dyn Clock,
    store: &dyn NotificationStore,
) -> Result<u64, DomainError> {
    store.unread_count(actor.user_id, clock.now()).await
}

/// Platform-wide notification analytics.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` for non-admin actors.
pub async fn get_analytics(
    actor: &Actor,
    store: &dyn NotificationStore,
) -> Result<AnalyticsSummary, DomainError> {
    authz::authorize(actor, Action::SendNotifications, Resource::Platform)?;
    store.analytics_summary().await
}
