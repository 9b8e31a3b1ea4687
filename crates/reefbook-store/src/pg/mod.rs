//! PostgreSQL store implementations.
//!
//! All queries are runtime-checked `sqlx::query` calls against the
//! tables in [`crate::schema`]. Conditional writes never read first:
//! revision checks, capacity guards, and scheduled claims are single
//! statements, so two API instances can share one database without an
//! external lock.

mod bookings;
mod experiences;
mod notifications;
mod packages;

pub use bookings::PgBookingStore;
pub use experiences::PgExperienceStore;
pub use notifications::PgNotificationStore;
pub use packages::PgPackageStore;

use reefbook_core::error::DomainError;

pub(crate) fn db_err(e: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(e.to_string())
}

/// Maps a stored text value that no longer parses into a domain enum.
pub(crate) fn bad_column(column: &'static str, value: &str) -> DomainError {
    DomainError::Infrastructure(format!("stored {column} value {value:?} is not recognized"))
}
