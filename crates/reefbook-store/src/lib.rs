//! Reefbook Store — store port implementations.
//!
//! Two families: `memory` keeps everything in process-local maps and is
//! the backend for tests and single-node development; `pg` persists to
//! PostgreSQL. Both enforce the same conditional-update contracts, so
//! handler behavior is identical across them.

pub mod memory;
pub mod pg;
pub mod schema;
