//! The append-only progress timeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::booking::BookingStatus;

/// One entry in a booking's progress timeline.
///
/// Entries are separate records referencing the booking, appended and
/// never edited. They form the audit trail of the fulfillment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// The booking this entry belongs to.
    pub booking_id: Uuid,
    /// Lifecycle status at the time of the entry.
    pub stage: BookingStatus,
    /// What happened.
    pub description: String,
    /// Attached media references (photos, video).
    pub media: Vec<String>,
    /// The actor who reported it.
    pub reported_by: Uuid,
    /// When it was reported.
    pub reported_at: DateTime<Utc>,
}

impl ProgressEntry {
    /// Creates a timeline entry.
    #[must_use]
    pub fn new(
        booking_id: Uuid,
        stage: BookingStatus,
        description: String,
        media: Vec<String>,
        reported_by: Uuid,
        reported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            stage,
            description,
            media,
            reported_by,
            reported_at,
        }
    }
}
