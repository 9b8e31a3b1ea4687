//! Store port for notifications.
//!
//! Read-state mutations are focused single-document operations (mark one
//! read, mark all read, bump a counter) rather than whole-record writes,
//! so concurrent markers and the cleanup sweep cannot trample each other.
//! Recipient-scoped operations take the recipient id and treat a foreign
//! record the same as a missing one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use reefbook_core::error::DomainError;
pub use reefbook_core::page::Page;

use crate::domain::notification::{
    Channel, ChannelOutcome, Interaction, Notification, NotificationKind,
};

/// Filter for recipient-facing lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationFilter {
    /// Only this kind.
    pub kind: Option<NotificationKind>,
    /// Only unread records.
    pub unread_only: bool,
    /// Include records past their `expires_at`.
    pub include_expired: bool,
}

/// Per-kind analytics row.
#[derive(Debug, Clone, Serialize)]
pub struct KindStats {
    /// The notification kind.
    pub kind: NotificationKind,
    /// Records of this kind.
    pub total: u64,
    /// Read records of this kind.
    pub read: u64,
}

/// Store-computed analytics summary.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    /// All records.
    pub total: u64,
    /// Read records.
    pub read: u64,
    /// `read / total`, zero when empty.
    pub read_rate: f64,
    /// Total impressions.
    pub impressions: u64,
    /// Total clicks.
    pub clicks: u64,
    /// Total conversions.
    pub conversions: u64,
    /// Per-kind breakdown, descending by total.
    pub per_kind: Vec<KindStats>,
}

/// Persistence port for notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a new notification.
    async fn insert(&self, notification: &Notification) -> Result<(), DomainError>;

    /// Load a notification by id.
    async fn find(&self, id: Uuid) -> Result<Option<Notification>, DomainError>;

    /// List a recipient's notifications, newest first. Held (future
    /// `scheduled_for`) records never appear; expired records appear only
    /// when the filter asks for them.
    async fn list_for_recipient(
        &self,
        recipient_id: Uuid,
        filter: NotificationFilter,
        page: Page,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, DomainError>;

    /// Unread, non-expired, non-held records for a recipient.
    async fn unread_count(&self, recipient_id: Uuid, now: DateTime<Utc>)
    -> Result<u64, DomainError>;

    /// Mark one notification read. Returns whether this call changed it;
    /// a missing or foreign id is `NotFound`.
    async fn mark_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// Mark all of a recipient's unread notifications read. Returns the
    /// number of records changed.
    async fn mark_all_read(
        &self,
        recipient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError>;

    /// Delete one of the recipient's notifications.
    async fn delete_own(&self, id: Uuid, recipient_id: Uuid) -> Result<(), DomainError>;

    /// Bump an interaction counter on one of the recipient's
    /// notifications.
    async fn record_interaction(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        interaction: Interaction,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Record a channel delivery outcome. Set-once per flag.
    async fn record_channel(
        &self,
        id: Uuid,
        channel: Channel,
        outcome: ChannelOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Record that the notification was handed to fan-out.
    async fn mark_dispatched(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), DomainError>;

    /// Atomically claim due scheduled notifications (due, not yet
    /// dispatched), marking them dispatched. Two concurrent sweeps never
    /// claim the same record.
    async fn claim_due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Notification>, DomainError>;

    /// Delete records that are both expired and read. Returns the number
    /// removed.
    async fn purge_expired_read(&self, now: DateTime<Utc>) -> Result<u64, DomainError>;

    /// Compute the platform-wide analytics summary.
    async fn analytics_summary(&self) -> Result<AnalyticsSummary, DomainError>;
}
