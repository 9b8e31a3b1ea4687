//! Reefbook — Payment Reconciliation bounded context.
//!
//! Adapts the hosted payment gateway (HMAC-signed wire contract, webhook
//! reconciliation) and manual bank transfers onto the Booking Ledger.
//! Verified payments drive the ledger's `pending → confirmed` transition;
//! this crate never moves money itself.

pub mod application;
pub mod commands;
pub mod config;
pub mod gateway;
pub mod signature;
pub mod wire;
