//! Live delivery port.
//!
//! Fan-out is a separate subsystem; the notification handlers only need a
//! way to hand a freshly stored record to it. Push is best-effort by
//! contract: implementations must never block and never report failure
//! back into the write path.

use crate::domain::notification::Notification;

/// Best-effort in-app delivery of stored notifications.
pub trait LivePush: Send + Sync {
    /// Push a stored notification to any live connections. Must not
    /// block; delivery failures are the implementation's problem.
    fn push_notification(&self, notification: &Notification);
}

/// A push target that drops everything. For tests and headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPush;

impl LivePush for NoopPush {
    fn push_notification(&self, _notification: &Notification) {}
}
