//! The Notification record and its per-channel delivery tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a notification is about. Closed set; clients switch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A booking was created and awaits payment.
    BookingCreated,
    /// Payment verified, booking confirmed.
    BookingConfirmed,
    /// A gateway payment attempt failed.
    PaymentFailed,
    /// The booking is still unpaid after a reminder threshold.
    PaymentReminder,
    /// The booking moved to another fulfillment stage.
    BookingStatus,
    /// The booking was cancelled.
    BookingCancelled,
    /// A refund was processed.
    RefundProcessed,
    /// Manual transfer instructions for a pending payment.
    BankTransferInfo,
    /// An experience session is coming up.
    ExperienceReminder,
    /// An experience session changed.
    ExperienceUpdate,
    /// Periodic cultivation progress note.
    GrowthUpdate,
    /// The completion certificate is ready.
    CertificateReady,
    /// Adverse weather at an upcoming session's site.
    WeatherAlert,
    /// Platform health alert for administrators.
    SystemHealth,
    /// Marketing promotion.
    Promotion,
    /// General announcement.
    Announcement,
}

impl NotificationKind {
    /// Wire representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingCreated => "booking_created",
            NotificationKind::BookingConfirmed => "booking_confirmed",
            NotificationKind::PaymentFailed => "payment_failed",
            NotificationKind::PaymentReminder => "payment_reminder",
            NotificationKind::BookingStatus => "booking_status",
            NotificationKind::BookingCancelled => "booking_cancelled",
            NotificationKind::RefundProcessed => "refund_processed",
            NotificationKind::BankTransferInfo => "bank_transfer_info",
            NotificationKind::ExperienceReminder => "experience_reminder",
            NotificationKind::ExperienceUpdate => "experience_update",
            NotificationKind::GrowthUpdate => "growth_update",
            NotificationKind::CertificateReady => "certificate_ready",
            NotificationKind::WeatherAlert => "weather_alert",
            NotificationKind::SystemHealth => "system_health",
            NotificationKind::Promotion => "promotion",
            NotificationKind::Announcement => "announcement",
        }
    }

    /// Parse a kind from its wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<NotificationKind> {
        match s {
            "booking_created" => Some(NotificationKind::BookingCreated),
            "booking_confirmed" => Some(NotificationKind::BookingConfirmed),
            "payment_failed" => Some(NotificationKind::PaymentFailed),
            "payment_reminder" => Some(NotificationKind::PaymentReminder),
            "booking_status" => Some(NotificationKind::BookingStatus),
            "booking_cancelled" => Some(NotificationKind::BookingCancelled),
            "refund_processed" => Some(NotificationKind::RefundProcessed),
            "bank_transfer_info" => Some(NotificationKind::BankTransferInfo),
            "experience_reminder" => Some(NotificationKind::ExperienceReminder),
            "experience_update" => Some(NotificationKind::ExperienceUpdate),
            "growth_update" => Some(NotificationKind::GrowthUpdate),
            "certificate_ready" => Some(NotificationKind::CertificateReady),
            "weather_alert" => Some(NotificationKind::WeatherAlert),
            "system_health" => Some(NotificationKind::SystemHealth),
            "promotion" => Some(NotificationKind::Promotion),
            "announcement" => Some(NotificationKind::Announcement),
            _ => None,
        }
    }
}

/// Delivery urgency. Clients use it for ordering and styling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Informational.
    Low,
    /// Everyday traffic.
    #[default]
    Normal,
    /// Needs attention soon.
    High,
    /// Needs attention now.
    Urgent,
}

impl Priority {
    /// Wire representation of the priority.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Parse a priority from its wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Priority> {
        match s {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// A delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Stored and served through the API and live fan-out.
    InApp,
    /// Email, delivered by an external collaborator.
    Email,
    /// SMS, delivered by an external collaborator.
    Sms,
    /// Mobile push, delivered by an external collaborator.
    Push,
}

impl Channel {
    /// Wire representation of the channel.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
        }
    }

    /// Parse a channel from its wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Channel> {
        match s {
            "in_app" => Some(Channel::InApp),
            "email" => Some(Channel::Email),
            "sms" => Some(Channel::Sms),
            "push" => Some(Channel::Push),
            _ => None,
        }
    }
}

/// A delivery outcome reported back by a channel collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOutcome {
    /// Handed to the channel.
    Sent,
    /// The channel confirmed delivery.
    Delivered,
    /// The recipient opened it.
    Opened,
    /// The recipient clicked through.
    Clicked,
}

/// Delivery state of one channel. Flags only ever go from false to true.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChannelDelivery {
    /// Handed to the channel.
    pub sent: bool,
    /// When it was handed over.
    pub sent_at: Option<DateTime<Utc>>,
    /// The channel confirmed delivery.
    pub delivered: bool,
    /// When delivery was confirmed.
    pub delivered_at: Option<DateTime<Utc>>,
    /// The recipient opened it.
    pub opened: bool,
    /// When it was opened.
    pub opened_at: Option<DateTime<Utc>>,
    /// The recipient clicked through.
    pub clicked: bool,
    /// When it was clicked.
    pub clicked_at: Option<DateTime<Utc>>,
}

impl ChannelDelivery {
    fn apply(&mut self, outcome: ChannelOutcome, now: DateTime<Utc>) {
        match outcome {
            ChannelOutcome::Sent => {
                if !self.sent {
                    self.sent = true;
                    self.sent_at = Some(now);
                }
            }
            ChannelOutcome::Delivered => {
                if !self.delivered {
                    self.delivered = true;
                    self.delivered_at = Some(now);
                }
            }
            ChannelOutcome::Opened => {
                if !self.opened {
                    self.opened = true;
                    self.opened_at = Some(now);
                }
            }
            ChannelOutcome::Clicked => {
                if !self.clicked {
                    self.clicked = true;
                    self.clicked_at = Some(now);
                }
            }
        }
    }
}

/// Per-channel delivery tracking. Channels never influence each other.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChannelState {
    /// In-app channel.
    pub in_app: ChannelDelivery,
    /// Email channel.
    pub email: ChannelDelivery,
    /// SMS channel.
    pub sms: ChannelDelivery,
    /// Push channel.
    pub push: ChannelDelivery,
}

impl ChannelState {
    /// The delivery sub-record for `channel`.
    #[must_use]
    pub fn channel(&self, channel: Channel) -> &ChannelDelivery {
        match channel {
            Channel::InApp => &self.in_app,
            Channel::Email => &self.email,
            Channel::Sms => &self.sms,
            Channel::Push => &self.push,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut ChannelDelivery {
        match channel {
            Channel::InApp => &mut self.in_app,
            Channel::Email => &mut self.email,
            Channel::Sms => &mut self.sms,
            Channel::Push => &mut self.push,
        }
    }
}

/// A recorded recipient interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    /// The notification was rendered on screen.
    Impression,
    /// The recipient clicked it.
    Click,
    /// The click led to the intended action.
    Conversion,
}

impl Interaction {
    /// Parse an interaction from its wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Interaction> {
        match s {
            "impression" => Some(Interaction::Impression),
            "click" => Some(Interaction::Click),
            "conversion" => Some(Interaction::Conversion),
            _ => None,
        }
    }
}

/// Monotonic interaction counters for analytics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InteractionCounters {
    /// Times rendered on screen.
    pub impressions: u64,
    /// Times clicked.
    pub clicks: u64,
    /// Times converted.
    pub conversions: u64,
    /// Most recent interaction of any type.
    pub last_interaction_at: Option<DateTime<Utc>>,
}

/// Fields for creating a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    /// Who receives it.
    pub recipient_id: Uuid,
    /// What it is about.
    pub kind: NotificationKind,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Delivery urgency.
    pub priority: Priority,
    /// Related booking, when there is one.
    pub related_booking_id: Option<Uuid>,
    /// Related experience session, when there is one.
    pub related_experience_id: Option<Uuid>,
    /// Client navigation target.
    pub action_url: Option<String>,
    /// Hold delivery until this time.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Drop from lists and allow purging after this time.
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewNotification {
    /// Minimal constructor; optional fields default to `None`.
    #[must_use]
    pub fn new(
        recipient_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            recipient_id,
            kind,
            title: title.into(),
            message: message.into(),
            priority,
            related_booking_id: None,
            related_experience_id: None,
            action_url: None,
            scheduled_for: None,
            expires_at: None,
        }
    }
}

/// One stored notification addressed to one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Record identifier.
    pub id: Uuid,
    /// Who receives it.
    pub recipient_id: Uuid,
    /// What it is about.
    pub kind: NotificationKind,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Delivery urgency.
    pub priority: Priority,
    /// Whether the recipient has read it.
    pub read: bool,
    /// When it was read.
    pub read_at: Option<DateTime<Utc>>,
    /// Per-channel delivery tracking.
    pub channels: ChannelState,
    /// Related booking, when there is one.
    pub related_booking_id: Option<Uuid>,
    /// Related experience session, when there is one.
    pub related_experience_id: Option<Uuid>,
    /// Client navigation target.
    pub action_url: Option<String>,
    /// Hold delivery until this time.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Drop from lists and allow purging after this time.
    pub expires_at: Option<DateTime<Utc>>,
    /// When it was handed to fan-out.
    pub dispatched_at: Option<DateTime<Utc>>,
    /// Interaction counters.
    pub interactions: InteractionCounters,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Materialize a new notification record.
    #[must_use]
    pub fn create(id: Uuid, fields: NewNotification, now: DateTime<Utc>) -> Self {
        Self {
            id,
            recipient_id: fields.recipient_id,
            kind: fields.kind,
            title: fields.title,
            message: fields.message,
            priority: fields.priority,
            read: false,
            read_at: None,
            channels: ChannelState::default(),
            related_booking_id: fields.related_booking_id,
            related_experience_id: fields.related_experience_id,
            action_url: fields.action_url,
            scheduled_for: fields.scheduled_for,
            expires_at: fields.expires_at,
            dispatched_at: None,
            interactions: InteractionCounters::default(),
            created_at: now,
        }
    }

    /// Mark as read. Returns whether this call changed anything.
    pub fn mark_read(&mut self, now: DateTime<Utc>) -> bool {
        if self.read {
            return false;
        }
        self.read = true;
        self.read_at = Some(now);
        true
    }

    /// True while `scheduled_for` lies in the future.
    #[must_use]
    pub fn is_held(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for.is_some_and(|at| at > now)
    }

    /// True once `expires_at` has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Record a delivery outcome on one channel. Set-once; repeated
    /// reports keep the first timestamp.
    pub fn record_channel(&mut self, channel: Channel, outcome: ChannelOutcome, now: DateTime<Utc>) {
        self.channels.channel_mut(channel).apply(outcome, now);
    }

    /// Bump an interaction counter.
    pub fn record_interaction(&mut self, interaction: Interaction, now: DateTime<Utc>) {
        match interaction {
            Interaction::Impression => self.interactions.impressions += 1,
            Interaction::Click => self.interactions.clicks += 1,
            Interaction::Conversion => self.interactions.conversions += 1,
        }
        self.interactions.last_interaction_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn sample() -> Notification {
        Notification::create(
            Uuid::new_v4(),
            NewNotification::new(
                Uuid::new_v4(),
                NotificationKind::BookingConfirmed,
                "Booking confirmed",
                "Your coral booking CR1 is confirmed.",
                Priority::Normal,
            ),
            fixed_now(),
        )
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        // Arrange
        let mut notification = sample();

        // Act
        let first = notification.mark_read(fixed_now());
        let second = notification.mark_read(fixed_now() + chrono::Duration::hours(1));

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(notification.read_at, Some(fixed_now()));
    }

    #[test]
    fn test_channel_outcomes_are_independent_and_set_once() {
        // Arrange
        let mut notification = sample();

        // Act
        notification.record_channel(Channel::Email, ChannelOutcome::Sent, fixed_now());
        notification.record_channel(
            Channel::Email,
            ChannelOutcome::Sent,
            fixed_now() + chrono::Duration::hours(1),
        );
        notification.record_channel(Channel::Email, ChannelOutcome::Opened, fixed_now());

        // Assert
        assert!(notification.channels.email.sent);
        assert_eq!(notification.channels.email.sent_at, Some(fixed_now()));
        assert!(notification.channels.email.opened);
        assert!(!notification.channels.sms.sent);
        assert!(!notification.channels.in_app.sent);
    }

    #[test]
    fn test_scheduled_notification_is_held_until_due() {
        // Arrange
        let mut notification = sample();
        notification.scheduled_for = Some(fixed_now() + chrono::Duration::hours(2));

        // Act & Assert
        assert!(notification.is_held(fixed_now()));
        assert!(!notification.is_held(fixed_now() + chrono::Duration::hours(2)));
    }

    #[test]
    fn test_interactions_accumulate_with_last_timestamp() {
        // Arrange
        let mut notification = sample();
        let later = fixed_now() + chrono::Duration::minutes(5);

        // Act
        notification.record_interaction(Interaction::Impression, fixed_now());
        notification.record_interaction(Interaction::Impression, later);
        notification.record_interaction(Interaction::Click, later);

        // Assert
        assert_eq!(notification.interactions.impressions, 2);
        assert_eq!(notification.interactions.clicks, 1);
        assert_eq!(notification.interactions.conversions, 0);
        assert_eq!(notification.interactions.last_interaction_at, Some(later));
    }
}
