//! Reefbook Notifications — durable notification store and templates.
//!
//! Notifications are the system's outbound memory: every booking, payment,
//! and fulfillment event lands here first, and real-time fan-out works from
//! the stored record. Each per-channel delivery outcome is tracked
//! independently, and interaction counters feed the analytics summary.

pub mod application;
pub mod domain;
pub mod push;
pub mod store;
