//! Connection registry and room fan-out.
//!
//! The hub owns every live connection's outbound queue. Pushing is
//! synchronous and best-effort: a `try_send` onto a bounded channel,
//! where a full or closed queue drops the message for that connection
//! only. Nothing here blocks or fails the caller, which lets the hub
//! implement the notification store's `LivePush` port directly from the
//! write path.
//!
//! Presence is in-memory only. It is rebuilt from scratch as clients
//! reconnect and is never a source of truth for business state.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use reefbook_core::actor::Role;
use reefbook_core::error::DomainError;
use reefbook_notifications::application::query_handlers::NotificationView;
use reefbook_notifications::domain::notification::Notification;
use reefbook_notifications::push::LivePush;

use crate::messages::ServerMessage;
use crate::rooms::Room;

/// Default global connection cap.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

/// How long a connection may stay silent before the server closes it.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the server pings each connection.
pub const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Outbound queue depth per connection.
const OUTBOX_CAPACITY: usize = 256;

#[derive(Debug)]
struct Connection {
    user_id: Uuid,
    outbox: mpsc::Sender<ServerMessage>,
    rooms: HashSet<String>,
}

#[derive(Debug, Default)]
struct HubState {
    connections: HashMap<Uuid, Connection>,
    rooms: HashMap<String, HashSet<Uuid>>,
    online: HashMap<Uuid, usize>,
}

/// One admitted connection: its hub-assigned id and the outbound queue
/// the socket task drains.
#[derive(Debug)]
pub struct Registration {
    /// Identifies this connection to the hub.
    pub connection_id: Uuid,
    /// Messages the hub queued for this connection.
    pub outbox: mpsc::Receiver<ServerMessage>,
}

/// One online user, as reported to administrators.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PresenceEntry {
    /// The online user.
    pub user_id: Uuid,
    /// Live connections held by this user.
    pub connections: usize,
}

/// Live connection registry with room-based fan-out.
#[derive(Debug)]
pub struct Hub {
    max_connections: usize,
    state: RwLock<HubState>,
}

impl Hub {
    /// A hub refusing registrations beyond `max_connections`.
    #[must_use]
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            state: RwLock::new(HubState::default()),
        }
    }

    /// Admit a connection for `user_id`.
    ///
    /// The connection joins the user's personal room immediately; staff
    /// also join their role room. A user's first connection pushes an
    /// online presence event to the admin room.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` when the global connection cap
    /// is reached.
    pub fn register(&self, user_id: Uuid, role: Role) -> Result<Registration, DomainError> {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let connection_id = Uuid::new_v4();

        let admin_outboxes = {
            let mut state = self.state.write().unwrap();
            if state.connections.len() >= self.max_connections {
                return Err(DomainError::Conflict(format!(
                    "live connection limit of {} reached",
                    self.max_connections
                )));
            }

            state.connections.insert(
                connection_id,
                Connection {
                    user_id,
                    outbox: tx,
                    rooms: HashSet::new(),
                },
            );
            join_room_locked(&mut state, connection_id, Room::Personal(user_id).name());
            if matches!(role, Role::Admin | Role::Business) {
                join_room_locked(&mut state, connection_id, Room::Role(role).name());
            }

            let count = state.online.entry(user_id).or_insert(0);
            *count += 1;
            if *count == 1 {
                room_outboxes(&state, &Room::Role(Role::Admin).name(), Some(connection_id))
            } else {
                Vec::new()
            }
        };

        deliver(
            &admin_outboxes,
            &ServerMessage::Presence {
                user_id,
                online: true,
            },
        );
        tracing::debug!(
            connection_id = %connection_id,
            user_id = %user_id,
            role = role.as_str(),
            "connection registered"
        );
        Ok(Registration {
            connection_id,
            outbox: rx,
        })
    }

    /// Drop a connection and its room memberships. A user's last
    /// disconnect pushes an offline presence event to the admin room.
    pub fn unregister(&self, connection_id: Uuid) {
        let offline = {
            let mut state = self.state.write().unwrap();
            let Some(connection) = state.connections.remove(&connection_id) else {
                return;
            };
            for room_name in &connection.rooms {
                remove_member_locked(&mut state, room_name, connection_id);
            }

            let remaining = state
                .online
                .get(&connection.user_id)
                .map_or(0, |count| count.saturating_sub(1));
            if remaining == 0 {
                state.online.remove(&connection.user_id);
                Some((
                    connection.user_id,
                    room_outboxes(&state, &Room::Role(Role::Admin).name(), None),
                ))
            } else {
                state.online.insert(connection.user_id, remaining);
                None
            }
        };

        if let Some((user_id, admin_outboxes)) = offline {
            deliver(
                &admin_outboxes,
                &ServerMessage::Presence {
                    user_id,
                    online: false,
                },
            );
        }
        tracing::debug!(connection_id = %connection_id, "connection dropped");
    }

    /// Subscribe a connection to a room. Capability checks for entity
    /// rooms happen at the call site; the hub only tracks membership.
    /// Returns `false` when the connection is gone.
    pub fn join_room(&self, connection_id: Uuid, room: &Room) -> bool {
        let mut state = self.state.write().unwrap();
        if !state.connections.contains_key(&connection_id) {
            return false;
        }
        join_room_locked(&mut state, connection_id, room.name());
        true
    }

    /// Unsubscribe a connection from a room.
    pub fn leave_room(&self, connection_id: Uuid, room: &Room) {
        let room_name = room.name();
        let mut state = self.state.write().unwrap();
        if let Some(connection) = state.connections.get_mut(&connection_id) {
            connection.rooms.remove(&room_name);
        }
        remove_member_locked(&mut state, &room_name, connection_id);
    }

    /// Push to every member of a room. Returns connections reached.
    pub fn broadcast_room(&self, room: &Room, message: &ServerMessage) -> usize {
        let outboxes = {
            let state = self.state.read().unwrap();
            room_outboxes(&state, &room.name(), None)
        };
        deliver(&outboxes, message)
    }

    /// Push to every connection of one user. Returns connections
    /// reached.
    pub fn send_to_user(&self, user_id: Uuid, message: &ServerMessage) -> usize {
        self.broadcast_room(&Room::Personal(user_id), message)
    }

    /// Push to one connection. Returns whether the message was queued.
    pub fn send_to_connection(&self, connection_id: Uuid, message: &ServerMessage) -> bool {
        let outbox = {
            let state = self.state.read().unwrap();
            state
                .connections
                .get(&connection_id)
                .map(|connection| (connection_id, connection.outbox.clone()))
        };
        outbox.is_some_and(|entry| deliver(&[entry], message) == 1)
    }

    /// True while the user holds at least one live connection.
    #[must_use]
    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.state.read().unwrap().online.contains_key(&user_id)
    }

    /// Online users with their connection counts, sorted by user id.
    #[must_use]
    pub fn online_users(&self) -> Vec<PresenceEntry> {
        let state = self.state.read().unwrap();
        let mut entries: Vec<PresenceEntry> = state
            .online
            .iter()
            .map(|(user_id, connections)| PresenceEntry {
                user_id: *user_id,
                connections: *connections,
            })
            .collect();
        entries.sort_by_key(|entry| entry.user_id);
        entries
    }

    /// Total live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.read().unwrap().connections.len()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS)
    }
}

impl LivePush for Hub {
    fn push_notification(&self, notification: &Notification) {
        let reached = self.send_to_user(
            notification.recipient_id,
            &ServerMessage::NewNotification {
                notification: NotificationView::from_notification(notification),
            },
        );
        tracing::debug!(
            notification_id = %notification.id,
            recipient_id = %notification.recipient_id,
            reached,
            "notification pushed"
        );
    }
}

fn join_room_locked(state: &mut HubState, connection_id: Uuid, room_name: String) {
    if let Some(connection) = state.connections.get_mut(&connection_id) {
        connection.rooms.insert(room_name.clone());
        state.rooms.entry(room_name).or_default().insert(connection_id);
    }
}

fn remove_member_locked(state: &mut HubState, room_name: &str, connection_id: Uuid) {
    let emptied = state.rooms.get_mut(room_name).is_some_and(|members| {
        members.remove(&connection_id);
        members.is_empty()
    });
    if emptied {
        state.rooms.remove(room_name);
    }
}

fn room_outboxes(
    state: &HubState,
    room_name: &str,
    except: Option<Uuid>,
) -> Vec<(Uuid, mpsc::Sender<ServerMessage>)> {
    let Some(members) = state.rooms.get(room_name) else {
        return Vec::new();
    };
    members
        .iter()
        .filter(|connection_id| except != Some(**connection_id))
        .filter_map(|connection_id| {
            state
                .connections
                .get(connection_id)
                .map(|connection| (*connection_id, connection.outbox.clone()))
        })
        .collect()
}

fn deliver(outboxes: &[(Uuid, mpsc::Sender<ServerMessage>)], message: &ServerMessage) -> usize {
    let mut reached = 0;
    for (connection_id, outbox) in outboxes {
        match outbox.try_send(message.clone()) {
            Ok(()) => reached += 1,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(connection_id = %connection_id, "outbox full; dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
    reached
}
