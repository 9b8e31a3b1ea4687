//! Reefbook — Booking Ledger bounded context.
//!
//! Owns the Booking aggregate and its state machine, the package catalog,
//! experience sub-bookings, and the append-only progress timeline. The
//! single source of truth for booking status and payment status.

pub mod application;
pub mod domain;
pub mod store;
