//! The purchasable package catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable cultivation offering.
///
/// Capacity and revenue counters live here; both are only ever moved
/// through conditional store operations so concurrent bookings cannot
/// oversell a package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Aggregate identifier.
    pub id: Uuid,
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
    /// Units currently held by non-cancelled bookings.
    pub current_bookings: u32,
    /// Verified revenue attributed to this package.
    pub total_revenue: i64,
    /// Whether the package can be booked.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Package {
    /// Creates an active package with empty counters.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        name: String,
        coral_species: String,
        location: String,
        unit_price: i64,
        currency: String,
        duration_months: u32,
        max_capacity: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            coral_species,
            location,
            unit_price,
            currency,
            duration_months,
            max_capacity,
            current_bookings: 0,
            total_revenue: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Units still available for booking.
    #[must_use]
    pub fn remaining_capacity(&self) -> u32 {
        self.max_capacity.saturating_sub(self.current_bookings)
    }
}
