//! In-memory store implementations.
//!
//! HashMap-backed stores for tests and single-node development. The
//! conditional semantics are the real ones: revision checks, capacity
//! guards, and scheduled-dispatch claims behave exactly as the
//! PostgreSQL stores do, so handler tests against these stores exercise
//! the same contracts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use reefbook_core::error::DomainError;
use reefbook_core::page::Page;
use reefbook_ledger::domain::booking::{Booking, BookingStatus, PaymentMethod, PaymentStatus};
use reefbook_ledger::domain::experience::{Experience, ExperienceStatus};
use reefbook_ledger::domain::package::Package;
use reefbook_ledger::domain::progress::ProgressEntry;
use reefbook_ledger::store::{BookingStore, ExperienceStore, PackageStore};
use reefbook_notifications::domain::notification::{
    Channel, ChannelOutcome, Interaction, Notification, NotificationKind,
};
use reefbook_notifications::store::{
    AnalyticsSummary, KindStats, NotificationFilter, NotificationStore,
};

fn page_slice<T: Clone>(mut items: Vec<T>, page: Page) -> Vec<T> {
    let page = page.clamped();
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    if offset >= items.len() {
        return Vec::new();
    }
    items.drain(..offset);
    items.truncate(page.size as usize);
    items
}

/// In-memory booking store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<Uuid, Booking>>>,
    progress: Arc<RwLock<Vec<ProgressEntry>>>,
}

impl InMemoryBookingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<(), DomainError> {
        let mut map = self.bookings.write().unwrap();
        if map.contains_key(&booking.id) {
            return Err(DomainError::Conflict(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        map.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Booking>, DomainError> {
        Ok(self.bookings.read().unwrap().get(&id).cloned())
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Booking>, DomainError> {
        Ok(self
            .bookings
            .read()
            .unwrap()
            .values()
            .find(|b| b.booking_number == number)
            .cloned())
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Booking>, DomainError> {
        Ok(self
            .bookings
            .read()
            .unwrap()
            .values()
            .find(|b| b.payment_id.as_deref() == Some(payment_id))
            .cloned())
    }

    async fn update(&self, booking: &mut Booking) -> Result<(), DomainError> {
        let mut map = self.bookings.write().unwrap();
        let Some(stored) = map.get(&booking.id) else {
            return Err(DomainError::NotFound {
                entity: "booking",
                id: booking.id.to_string(),
            });
        };
        if stored.revision != booking.revision {
            return Err(DomainError::RevisionConflict {
                entity: "booking",
                id: booking.id,
                expected: booking.revision,
            });
        }
        booking.revision += 1;
        map.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(self.bookings.read().unwrap().len() as u64)
    }

    async fn list_for_customer(
        &self,
        customer_id: Uuid,
        page: Page,
    ) -> Result<Vec<Booking>, DomainError> {
        let mut list: Vec<Booking> = self
            .bookings
            .read()
            .unwrap()
            .values()
            .filter(|b| b.customer_id == customer_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_slice(list, page))
    }

    async fn list_unpaid_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, DomainError> {
        Ok(self
            .bookings
            .read()
            .unwrap()
            .values()
            .filter(|b| {
                b.status == BookingStatus::Pending
                    && b.payment_status == PaymentStatus::Pending
                    && b.created_at < cutoff
            })
            .cloned()
            .collect())
    }

    async fn list_growing(&self) -> Result<Vec<Booking>, DomainError> {
        Ok(self
            .bookings
            .read()
            .unwrap()
            .values()
            .filter(|b| b.status == BookingStatus::Growing)
            .cloned()
            .collect())
    }

    async fn list_pending_bank_transfers(&self) -> Result<Vec<Booking>, DomainError> {
        Ok(self
            .bookings
            .read()
            .unwrap()
            .values()
            .filter(|b| {
                b.payment_method == Some(PaymentMethod::BankTransfer)
                    && b.payment_status == PaymentStatus::Pending
            })
            .cloned()
            .collect())
    }

    async fn append_progress(&self, entry: &ProgressEntry) -> Result<(), DomainError> {
        self.progress.write().unwrap().push(entry.clone());
        Ok(())
    }

    async fn list_progress(&self, booking_id: Uuid) -> Result<Vec<ProgressEntry>, DomainError> {
        let mut entries: Vec<ProgressEntry> = self
            .progress
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.booking_id == booking_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.reported_at.cmp(&b.reported_at));
        Ok(entries)
    }
}

/// In-memory package store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPackageStore {
    packages: Arc<RwLock<HashMap<Uuid, Package>>>,
}

impl InMemoryPackageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn package_not_found(id: Uuid) -> DomainError {
    DomainError::NotFound {
        entity: "package",
        id: id.to_string(),
    }
}

#[async_trait]
impl PackageStore for InMemoryPackageStore {
    async fn insert(&self, package: &Package) -> Result<(), DomainError> {
        let mut map = self.packages.write().unwrap();
        if map.contains_key(&package.id) {
            return Err(DomainError::Conflict(format!(
                "package {} already exists",
                package.id
            )));
        }
        map.insert(package.id, package.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Package>, DomainError> {
        Ok(self.packages.read().unwrap().get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Package>, DomainError> {
        let mut list: Vec<Package> = self
            .packages
            .read()
            .unwrap()
            .values()
            .filter(|p| p.active)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<(), DomainError> {
        let mut map = self.packages.write().unwrap();
        let package = map.get_mut(&id).ok_or_else(|| package_not_found(id))?;
        package.active = active;
        Ok(())
    }

    async fn consume_capacity(&self, id: Uuid, quantity: u32) -> Result<(), DomainError> {
        let mut map = self.packages.write().unwrap();
        let package = map.get_mut(&id).ok_or_else(|| package_not_found(id))?;
        if package.current_bookings + quantity > package.max_capacity {
            return Err(DomainError::Conflict(format!(
                "package {} has {} of {} units booked; {} more do not fit",
                package.name, package.current_bookings, package.max_capacity, quantity
            )));
        }
        package.current_bookings += quantity;
        Ok(())
    }

    async fn release_capacity(&self, id: Uuid, quantity: u32) -> Result<(), DomainError> {
        let mut map = self.packages.write().unwrap();
        let package = map.get_mut(&id).ok_or_else(|| package_not_found(id))?;
        package.current_bookings = package.current_bookings.saturating_sub(quantity);
        Ok(())
    }

    async fn add_revenue(&self, id: Uuid, amount: i64) -> Result<(), DomainError> {
        let mut map = self.packages.write().unwrap();
        let package = map.get_mut(&id).ok_or_else(|| package_not_found(id))?;
        package.total_revenue += amount;
        Ok(())
    }

    async fn subtract_revenue(&self, id: Uuid, amount: i64) -> Result<(), DomainError> {
        let mut map = self.packages.write().unwrap();
        let package = map.get_mut(&id).ok_or_else(|| package_not_found(id))?;
        package.total_revenue = (package.total_revenue - amount).max(0);
        Ok(())
    }
}

/// In-memory experience store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryExperienceStore {
    experiences: Arc<RwLock<HashMap<Uuid, Experience>>>,
}

impl InMemoryExperienceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExperienceStore for InMemoryExperienceStore {
    async fn insert(&self, experience: &Experience) -> Result<(), DomainError> {
        let mut map = self.experiences.write().unwrap();
        if map.contains_key(&experience.id) {
            return Err(DomainError::Conflict(format!(
                "experience {} already exists",
                experience.id
            )));
        }
        map.insert(experience.id, experience.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Experience>, DomainError> {
        Ok(self.experiences.read().unwrap().get(&id).cloned())
    }

    async fn update(&self, experience: &mut Experience) -> Result<(), DomainError> {
        let mut map = self.experiences.write().unwrap();
        let Some(stored) = map.get(&experience.id) else {
            return Err(DomainError::NotFound {
                entity: "experience",
                id: experience.id.to_string(),
            });
        };
        if stored.revision != experience.revision {
            return Err(DomainError::RevisionConflict {
                entity: "experience",
                id: experience.id,
                expected: experience.revision,
            });
        }
        experience.revision += 1;
        map.insert(experience.id, experience.clone());
        Ok(())
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<Experience>, DomainError> {
        let mut list: Vec<Experience> = self
            .experiences
            .read()
            .unwrap()
            .values()
            .filter(|e| e.booking_id == booking_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(list)
    }

    async fn list_reminder_due(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Experience>, DomainError> {
        Ok(self
            .experiences
            .read()
            .unwrap()
            .values()
            .filter(|e| {
                matches!(
                    e.status,
                    ExperienceStatus::Scheduled | ExperienceStatus::Confirmed
                ) && !e.reminder_sent
                    && e.scheduled_at >= from
                    && e.scheduled_at <= until
            })
            .cloned()
            .collect())
    }

    async fn list_overdue_in_progress(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Experience>, DomainError> {
        Ok(self
            .experiences
            .read()
            .unwrap()
            .values()
            .filter(|e| e.status == ExperienceStatus::InProgress && e.scheduled_at < older_than)
            .cloned()
            .collect())
    }

    async fn list_upcoming_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Experience>, DomainError> {
        Ok(self
            .experiences
            .read()
            .unwrap()
            .values()
            .filter(|e| {
                matches!(
                    e.status,
                    ExperienceStatus::Scheduled | ExperienceStatus::Confirmed
                ) && e.scheduled_at >= from
                    && e.scheduled_at <= until
            })
            .cloned()
            .collect())
    }
}

/// In-memory notification store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryNotificationStore {
    notifications: Arc<RwLock<HashMap<Uuid, Notification>>>,
}

impl InMemoryNotificationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn notification_not_found(id: Uuid) -> DomainError {
    DomainError::NotFound {
        entity: "notification",
        id: id.to_string(),
    }
}

fn visible(n: &Notification, recipient_id: Uuid, now: DateTime<Utc>) -> bool {
    n.recipient_id == recipient_id && !n.is_held(now)
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, notification: &Notification) -> Result<(), DomainError> {
        let mut map = self.notifications.write().unwrap();
        if map.contains_key(&notification.id) {
            return Err(DomainError::Conflict(format!(
                "notification {} already exists",
                notification.id
            )));
        }
        map.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Notification>, DomainError> {
        Ok(self.notifications.read().unwrap().get(&id).cloned())
    }

    async fn list_for_recipient(
        &self,
        recipient_id: Uuid,
        filter: NotificationFilter,
        page: Page,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, DomainError> {
        let mut list: Vec<Notification> = self
            .notifications
            .read()
            .unwrap()
            .values()
            .filter(|n| visible(n, recipient_id, now))
            .filter(|n| filter.include_expired || !n.is_expired(now))
            .filter(|n| filter.kind.is_none_or(|kind| n.kind == kind))
            .filter(|n| !filter.unread_only || !n.read)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_slice(list, page))
    }

    async fn unread_count(
        &self,
        recipient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        Ok(self
            .notifications
            .read()
            .unwrap()
            .values()
            .filter(|n| visible(n, recipient_id, now) && !n.is_expired(now) && !n.read)
            .count() as u64)
    }

    async fn mark_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let mut map = self.notifications.write().unwrap();
        match map.get_mut(&id) {
            Some(n) if n.recipient_id == recipient_id => Ok(n.mark_read(now)),
            _ => Err(notification_not_found(id)),
        }
    }

    async fn mark_all_read(
        &self,
        recipient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let mut map = self.notifications.write().unwrap();
        let mut changed = 0u64;
        for n in map.values_mut() {
            if n.recipient_id == recipient_id && !n.is_held(now) && n.mark_read(now) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_own(&self, id: Uuid, recipient_id: Uuid) -> Result<(), DomainError> {
        let mut map = self.notifications.write().unwrap();
        match map.get(&id) {
            Some(n) if n.recipient_id == recipient_id => {
                map.remove(&id);
                Ok(())
            }
            _ => Err(notification_not_found(id)),
        }
    }

    async fn record_interaction(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        interaction: Interaction,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut map = self.notifications.write().unwrap();
        match map.get_mut(&id) {
            Some(n) if n.recipient_id == recipient_id => {
                n.record_interaction(interaction, now);
                Ok(())
            }
            _ => Err(notification_not_found(id)),
        }
    }

    async fn record_channel(
        &self,
        id: Uuid,
        channel: Channel,
        outcome: ChannelOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut map = self.notifications.write().unwrap();
        let n = map.get_mut(&id).ok_or_else(|| notification_not_found(id))?;
        n.record_channel(channel, outcome, now);
        Ok(())
    }

    async fn mark_dispatched(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        let mut map = self.notifications.write().unwrap();
        let n = map.get_mut(&id).ok_or_else(|| notification_not_found(id))?;
        if n.dispatched_at.is_none() {
            n.dispatched_at = Some(now);
        }
        Ok(())
    }

    async fn claim_due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Notification>, DomainError> {
        let mut map = self.notifications.write().unwrap();
        let mut due: Vec<Uuid> = map
            .values()
            .filter(|n| {
                n.dispatched_at.is_none()
                    && n.scheduled_for.is_some_and(|at| at <= now)
            })
            .map(|n| n.id)
            .collect();
        due.sort_by_key(|id| map[id].scheduled_for);
        due.truncate(limit as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            if let Some(n) = map.get_mut(&id) {
                n.dispatched_at = Some(now);
                n.record_channel(Channel::InApp, ChannelOutcome::Sent, now);
                claimed.push(n.clone());
            }
        }
        Ok(claimed)
    }

    async fn purge_expired_read(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut map = self.notifications.write().unwrap();
        let before = map.len();
        map.retain(|_, n| !(n.is_expired(now) && n.read));
        Ok((before - map.len()) as u64)
    }

    async fn analytics_summary(&self) -> Result<AnalyticsSummary, DomainError> {
        let map = self.notifications.read().unwrap();
        let total = map.len() as u64;
        let read = map.values().filter(|n| n.read).count() as u64;
        let impressions = map.values().map(|n| n.interactions.impressions).sum();
        let clicks = map.values().map(|n| n.interactions.clicks).sum();
        let conversions = map.values().map(|n| n.interactions.conversions).sum();

        let mut by_kind: HashMap<NotificationKind, (u64, u64)> = HashMap::new();
        for n in map.values() {
            let entry = by_kind.entry(n.kind).or_default();
            entry.0 += 1;
            if n.read {
                entry.1 += 1;
            }
        }
        let mut per_kind: Vec<KindStats> = by_kind
            .into_iter()
            .map(|(kind, (total, read))| KindStats { kind, total, read })
            .collect();
        per_kind.sort_by(|a, b| b.total.cmp(&a.total).then(a.kind.as_str().cmp(b.kind.as_str())));

        Ok(AnalyticsSummary {
            total,
            read,
            read_rate: if total == 0 {
                0.0
            } else {
                read as f64 / total as f64
            },
            impressions,
            clicks,
            conversions,
            per_kind,
        })
    }
}
