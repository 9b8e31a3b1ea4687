//! Store ports for the Booking Ledger context.
//!
//! All mutations are conditional: booking and experience writes carry the
//! revision the caller observed and fail with a revision conflict if
//! another writer got there first, and package counters move through
//! guarded single-document operations. Per-document atomicity is the only
//! concurrency primitive these ports assume of an implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use reefbook_core::error::DomainError;
pub use reefbook_core::page::Page;

use crate::domain::booking::Booking;
use crate::domain::experience::Experience;
use crate::domain::package::Package;
use crate::domain::progress::ProgressEntry;

/// Persistence port for bookings and their progress timeline.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a new booking. The booking number must be unique.
    async fn insert(&self, booking: &Booking) -> Result<(), DomainError>;

    /// Load a booking by id.
    async fn find(&self, id: Uuid) -> Result<Option<Booking>, DomainError>;

    /// Load a booking by its human-readable number.
    async fn find_by_number(&self, number: &str) -> Result<Option<Booking>, DomainError>;

    /// Load a booking by its gateway order id or transfer code.
    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Booking>, DomainError>;

    /// Persist a mutated booking only if the stored revision still equals
    /// `booking.revision`; bumps `booking.revision` on success.
    async fn update(&self, booking: &mut Booking) -> Result<(), DomainError>;

    /// Total number of bookings ever created (feeds booking numbers).
    async fn count(&self) -> Result<u64, DomainError>;

    /// Bookings of one customer, newest first.
    async fn list_for_customer(
        &self,
        customer_id: Uuid,
        page: Page,
    ) -> Result<Vec<Booking>, DomainError>;

    /// Unpaid, still-pending bookings created before `cutoff`.
    async fn list_unpaid_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, DomainError>;

    /// Bookings currently `growing` with a fulfillment start date.
    async fn list_growing(&self) -> Result<Vec<Booking>, DomainError>;

    /// Bookings awaiting bank-transfer confirmation.
    async fn list_pending_bank_transfers(&self) -> Result<Vec<Booking>, DomainError>;

    /// Append a progress entry. Entries are never updated or deleted.
    async fn append_progress(&self, entry: &ProgressEntry) -> Result<(), DomainError>;

    /// Timeline of a booking, oldest first.
    async fn list_progress(&self, booking_id: Uuid) -> Result<Vec<ProgressEntry>, DomainError>;
}

/// Persistence port for the package catalog.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Insert a new package.
    async fn insert(&self, package: &Package) -> Result<(), DomainError>;

    /// Load a package by id.
    async fn find(&self, id: Uuid) -> Result<Option<Package>, DomainError>;

    /// Packages currently on sale.
    async fn list_active(&self) -> Result<Vec<Package>, DomainError>;

    /// Put a package on or off sale.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<(), DomainError>;

    /// Atomically reserve capacity: fails with a conflict when
    /// `current_bookings + quantity` would exceed the maximum.
    async fn consume_capacity(&self, id: Uuid, quantity: u32) -> Result<(), DomainError>;

    /// Atomically release capacity, clamped at zero.
    async fn release_capacity(&self, id: Uuid, quantity: u32) -> Result<(), DomainError>;

    /// Attribute verified revenue to the package.
    async fn add_revenue(&self, id: Uuid, amount: i64) -> Result<(), DomainError>;

    /// Deduct refunded revenue, clamped at zero.
    async fn subtract_revenue(&self, id: Uuid, amount: i64) -> Result<(), DomainError>;
}

/// Persistence port for experience sessions.
#[async_trait]
pub trait ExperienceStore: Send + Sync {
    /// Insert a new session.
    async fn insert(&self, experience: &Experience) -> Result<(), DomainError>;

    /// Load a session by id.
    async fn find(&self, id: Uuid) -> Result<Option<Experience>, DomainError>;

    /// Persist a mutated session only if the stored revision still equals
    /// `experience.revision`; bumps `experience.revision` on success.
    async fn update(&self, experience: &mut Experience) -> Result<(), DomainError>;

    /// Sessions of one booking, soonest first.
    async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<Experience>, DomainError>;

    /// Upcoming sessions in `[from, until]` that have not been reminded,
    /// in `scheduled` or `confirmed` status.
    async fn list_reminder_due(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Experience>, DomainError>;

    /// Sessions still `in_progress` whose start is older than
    /// `older_than`.
    async fn list_overdue_in_progress(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Experience>, DomainError>;

    /// Upcoming `scheduled`/`confirmed` sessions in `[from, until]`,
    /// regardless of reminder state. Feeds weather alerting.
    async fn list_upcoming_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Experience>, DomainError>;
}
