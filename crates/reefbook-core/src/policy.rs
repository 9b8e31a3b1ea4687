//! Business policy knobs.
//!
//! These values are configuration, not law: the defaults preserve the
//! constants the business launched with, and deployments may override any
//! of them through the environment.

use serde::{Deserialize, Serialize};

/// Tunable business policy shared across contexts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessPolicy {
    /// Percentage discount applied when a referral code is presented.
    pub referral_discount_pct: f64,
    /// Refund percentage when cancelling a booking still `pending`.
    pub pending_refund_pct: f64,
    /// Refund percentage when cancelling a booking already `confirmed`.
    pub confirmed_refund_pct: f64,
    /// Days after creation at which unpaid bookings are reminded.
    pub payment_reminder_days: Vec<i64>,
    /// How far ahead the experience reminder sweep looks, in hours.
    pub experience_reminder_lookahead_hours: i64,
    /// Hours past the scheduled start after which an in-progress
    /// experience is completed automatically.
    pub auto_complete_overdue_hours: i64,
    /// How far ahead weather alerts consider upcoming experiences, in hours.
    pub weather_alert_lookahead_hours: i64,
    /// Cadence of growth updates for growing bookings, in days.
    pub growth_update_interval_days: i64,
    /// Resident memory above which admins are alerted, in megabytes.
    pub memory_alert_threshold_mb: u64,
}

impl Default for BusinessPolicy {
    fn default() -> Self {
        Self {
            referral_discount_pct: 10.0,
            pending_refund_pct: 100.0,
            confirmed_refund_pct: 80.0,
            payment_reminder_days: vec![1, 3, 7],
            experience_reminder_lookahead_hours: 24,
            auto_complete_overdue_hours: 6,
            weather_alert_lookahead_hours: 48,
            growth_update_interval_days: 7,
            memory_alert_threshold_mb: 512,
        }
    }
}
