//! Application layer for the Payment Reconciliation context.

pub mod command_handlers;
pub mod query_handlers;
