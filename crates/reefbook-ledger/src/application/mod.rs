//! Application layer for the Booking Ledger context.

pub mod command_handlers;
pub mod query_handlers;
