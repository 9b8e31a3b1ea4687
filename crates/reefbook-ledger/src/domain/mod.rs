//! Domain model for the Booking Ledger context.

pub mod booking;
pub mod commands;
pub mod events;
pub mod experience;
pub mod package;
pub mod progress;
