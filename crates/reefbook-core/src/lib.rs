//! Reefbook Core — shared domain abstractions.
//!
//! This crate defines the fundamental types that all bounded contexts
//! depend on: the error taxonomy, the clock abstraction, actors and
//! authorization, business policy, money arithmetic, and the recipient
//! directory port. It contains no infrastructure code.

pub mod actor;
pub mod authz;
pub mod clock;
pub mod directory;
pub mod error;
pub mod money;
pub mod page;
pub mod policy;
