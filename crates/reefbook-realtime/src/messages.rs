//! Wire messages for the live channel.
//!
//! Both directions are JSON objects carrying a `type` tag. The server
//! catalog covers room pushes and direct replies; anything a client can
//! send is in [`ClientMessage`], and unknown types fail to parse.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reefbook_notifications::application::query_handlers::NotificationView;

/// Server→client events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greets a freshly admitted connection.
    Connected {
        /// The user's current unread notification count.
        unread_count: u64,
    },
    /// A notification was stored for this user.
    NewNotification {
        /// The stored record, recipient-shaped.
        notification: NotificationView,
    },
    /// One notification was marked read.
    NotificationRead {
        /// The record that changed.
        notification_id: Uuid,
    },
    /// All of the user's notifications were marked read.
    NotificationsReadAll {
        /// How many records changed.
        count: u64,
    },
    /// A page of the user's notifications, answering `list_notifications`.
    NotificationsLoaded {
        /// Newest first.
        notifications: Vec<NotificationView>,
    },
    /// A booking changed stage or progressed.
    BookingUpdated {
        /// The booking.
        booking_id: Uuid,
        /// Lifecycle stage after the change.
        status: &'static str,
        /// Display progress after the change.
        progress_pct: u8,
    },
    /// An experience session changed.
    ExperienceUpdated {
        /// The session.
        experience_id: Uuid,
        /// The owning booking.
        booking_id: Uuid,
        /// Session title.
        title: String,
        /// Status after the change.
        status: &'static str,
    },
    /// Adverse weather at an experience site.
    WeatherAlert {
        /// The affected site.
        location: String,
        /// Provider-reported severity.
        severity: String,
        /// Human-readable alert text.
        message: String,
    },
    /// A user came online or went offline. Admin room only.
    Presence {
        /// The user whose presence changed.
        user_id: Uuid,
        /// True on the first connection, false after the last disconnect.
        online: bool,
    },
    /// Answers a client `ping`.
    Pong,
    /// A client request failed.
    Error {
        /// What went wrong.
        message: String,
    },
}

/// Client→server requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a room by wire name.
    JoinRoom {
        /// Room wire name, e.g. `"booking:<uuid>"`.
        room: String,
    },
    /// Unsubscribe from a room.
    LeaveRoom {
        /// Room wire name.
        room: String,
    },
    /// Mark one notification read.
    MarkRead {
        /// The record to mark.
        notification_id: Uuid,
    },
    /// Mark all notifications read.
    MarkAllRead,
    /// Request the first page of notifications.
    ListNotifications {
        /// Only unread records.
        #[serde(default)]
        unread_only: bool,
    },
    /// Keep-alive probe.
    Ping,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_server_messages_carry_type_tags() {
        // Arrange
        let booking_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        // Act & Assert
        assert_eq!(
            serde_json::to_value(ServerMessage::Connected { unread_count: 3 }).unwrap(),
            json!({ "type": "connected", "unread_count": 3 })
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::BookingUpdated {
                booking_id,
                status: "growing",
                progress_pct: 55,
            })
            .unwrap(),
            json!({
                "type": "booking_updated",
                "booking_id": booking_id,
                "status": "growing",
                "progress_pct": 55,
            })
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Presence {
                user_id,
                online: true,
            })
            .unwrap(),
            json!({ "type": "presence", "user_id": user_id, "online": true })
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Pong).unwrap(),
            json!({ "type": "pong" })
        );
    }

    #[test]
    fn test_client_messages_parse_from_tagged_json() {
        // Arrange
        let booking_id = Uuid::new_v4();
        let notification_id = Uuid::new_v4();

        // Act
        let join: ClientMessage = serde_json::from_value(json!({
            "type": "join_room",
            "room": format!("booking:{booking_id}"),
        }))
        .unwrap();
        let mark: ClientMessage = serde_json::from_value(json!({
            "type": "mark_read",
            "notification_id": notification_id,
        }))
        .unwrap();
        let list_default: ClientMessage =
            serde_json::from_value(json!({ "type": "list_notifications" })).unwrap();
        let ping: ClientMessage = serde_json::from_value(json!({ "type": "ping" })).unwrap();

        // Assert
        assert_eq!(
            join,
            ClientMessage::JoinRoom {
                room: format!("booking:{booking_id}"),
            }
        );
        assert_eq!(mark, ClientMessage::MarkRead { notification_id });
        assert_eq!(
            list_default,
            ClientMessage::ListNotifications { unread_only: false }
        );
        assert_eq!(ping, ClientMessage::Ping);
    }

    #[test]
    fn test_unknown_client_message_is_rejected() {
        // Act
        let result: Result<ClientMessage, _> =
            serde_json::from_value(json!({ "type": "broadcast_system_message" }));

        // Assert
        assert!(result.is_err());
    }
}
