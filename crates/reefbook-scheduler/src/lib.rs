//! Reefbook — periodic maintenance sweeps.
//!
//! Stateless time-driven tasks over the ledger and notification stores:
//! reminders, overdue auto-completion, scheduled dispatch, cleanup,
//! weather and health alerting. Every sweep is idempotent and safe to
//! overlap with user-driven writes because it claims its work through
//! conditional updates before acting on it.

pub mod health;
pub mod runner;
pub mod sweeps;
pub mod weather;
