//! Time source abstraction.
//!
//! Booking numbers, payment order ids, reminder windows, and expiry
//! checks all derive from "now". Handlers take a `Clock` so tests can
//! pin the instant instead of racing the wall clock.

use chrono::{DateTime, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
