//! Reefbook — live fan-out over WebSocket connections.
//!
//! Holds every live connection in rooms (personal, role, per-booking,
//! per-experience) and pushes ledger and notification events to them.
//! Fan-out is best-effort and sits outside the transactional boundary:
//! a record is durable before it is pushed, and a client that missed a
//! push reconciles by pull on reconnect.

pub mod hub;
pub mod messages;
pub mod rooms;
