//! Test clock — deterministic `Clock` implementation for tests.

use chrono::{DateTime, Duration, Utc};
use reefbook_core::clock::Clock;

/// A clock pinned to one instant. Handlers observing it agree on "now",
/// so expiry windows and reminder thresholds assert exactly.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// The same clock shifted into the past, for seeding records that
    /// must predate the instant under test.
    #[must_use]
    pub fn earlier_by(self, delta: Duration) -> Self {
        Self(self.0 - delta)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
