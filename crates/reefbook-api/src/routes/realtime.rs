//! The live WebSocket endpoint.
//!
//! A connection authenticates before the upgrade, registers with the
//! hub, and is greeted with its unread count. From then on one task per
//! connection drains the hub outbox into the socket and answers client
//! requests. Room joins are capability-checked here; the hub itself
//! only tracks membership.
//!
//! Browsers cannot set headers on WebSocket requests, so the token may
//! also arrive as a `?token=` query parameter.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{Instant, interval, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use reefbook_core::actor::Actor;
use reefbook_core::authz::{self, Action, Resource};
use reefbook_core::clock::Clock as _;
use reefbook_core::error::DomainError;
use reefbook_ledger::store::{BookingStore as _, ExperienceStore as _};
use reefbook_notifications::application::{command_handlers, query_handlers};
use reefbook_notifications::store::{NotificationFilter, Page};
use reefbook_realtime::hub::{IDLE_TIMEOUT, PING_INTERVAL, Registration};
use reefbook_realtime::messages::{ClientMessage, ServerMessage};
use reefbook_realtime::rooms::Room;

use crate::auth;
use crate::error::ErrorBody;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct WsParams {
    #[serde(default)]
    token: Option<String>,
}

/// GET /api/ws
async fn live(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = auth::bearer_token(&headers).or(params.token.as_deref());
    let Some(actor) = token.and_then(|token| state.verifier.verify(token, state.clock.now()))
    else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new(
                "unauthenticated",
                "a valid bearer token is required",
            )),
        )
            .into_response();
    };
    ws.on_upgrade(move |socket| run_connection(state, socket, actor))
}

async fn run_connection(state: AppState, socket: WebSocket, actor: Actor) {
    let registration = match state.hub.register(actor.user_id, actor.role) {
        Ok(registration) => registration,
        Err(error) => {
            warn!(user_id = %actor.user_id, error = %error, "connection refused");
            let (mut sender, _) = socket.split();
            let refusal = ServerMessage::Error {
                message: "connection limit reached".to_owned(),
            };
            if let Ok(json) = serde_json::to_string(&refusal) {
                let _ = sender.send(Message::Text(json.into())).await;
            }
            let _ = sender.close().await;
            return;
        }
    };
    let connection_id = registration.connection_id;
    info!(user_id = %actor.user_id, connection_id = %connection_id, "live connection opened");

    let unread_count = query_handlers::unread_count(&actor, &*state.clock, &*state.notifications)
        .await
        .unwrap_or_else(|error| {
            warn!(user_id = %actor.user_id, error = %error, "unread count unavailable at connect");
            0
        });
    state
        .hub
        .send_to_connection(connection_id, &ServerMessage::Connected { unread_count });

    if let Err(error) = drive_socket(&state, socket, &actor, connection_id, registration).await {
        debug!(connection_id = %connection_id, error = %error, "socket error");
    }

    state.hub.unregister(connection_id);
    info!(user_id = %actor.user_id, connection_id = %connection_id, "live connection closed");
}

/// Pump the hub outbox into the socket and client frames back into the
/// handlers, until the peer closes, errs, or goes idle.
async fn drive_socket(
    state: &AppState,
    socket: WebSocket,
    actor: &Actor,
    connection_id: Uuid,
    mut registration: Registration,
) -> Result<(), axum::Error> {
    let (mut sender, mut receiver) = socket.split();
    let mut ping = interval(PING_INTERVAL);
    let idle = sleep(IDLE_TIMEOUT);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            queued = registration.outbox.recv() => {
                // A closed outbox means the hub dropped this connection.
                let Some(message) = queued else { break };
                match serde_json::to_string(&message) {
                    Ok(json) => sender.send(Message::Text(json.into())).await?,
                    Err(error) => {
                        warn!(connection_id = %connection_id, error = %error, "outbound message did not serialize");
                    }
                }
            }
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        idle.as_mut().reset(Instant::now() + IDLE_TIMEOUT);
                        handle_client_text(state, actor, connection_id, &text).await;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        idle.as_mut().reset(Instant::now() + IDLE_TIMEOUT);
                    }
                    Some(Ok(Message::Binary(_))) => {
                        idle.as_mut().reset(Instant::now() + IDLE_TIMEOUT);
                        state.hub.send_to_connection(
                            connection_id,
                            &ServerMessage::Error {
                                message: "unrecognized message".to_owned(),
                            },
                        );
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(error)) => return Err(error),
                }
            }
            _ = ping.tick() => {
                sender.send(Message::Ping(Bytes::new())).await?;
            }
            () = &mut idle => {
                debug!(connection_id = %connection_id, "connection idle, closing");
                break;
            }
        }
    }
    Ok(())
}

async fn handle_client_text(state: &AppState, actor: &Actor, connection_id: Uuid, text: &str) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(_) => {
            state.hub.send_to_connection(
                connection_id,
                &ServerMessage::Error {
                    message: "unrecognized message".to_owned(),
                },
            );
            return;
        }
    };

    match message {
        ClientMessage::JoinRoom { room } => {
            join(state, actor, connection_id, &room).await;
        }
        ClientMessage::LeaveRoom { room } => {
            if let Some(room) = Room::parse(&room) {
                state.hub.leave_room(connection_id, &room);
            }
        }
        ClientMessage::MarkRead { notification_id } => {
            match command_handlers::handle_mark_read(
                actor,
                notification_id,
                &*state.clock,
                &*state.notifications,
            )
            .await
            {
                Ok(true) => {
                    state.hub.send_to_user(
                        actor.user_id,
                        &ServerMessage::NotificationRead { notification_id },
                    );
                }
                Ok(false) => {}
                Err(error) => reply_error(state, connection_id, &error),
            }
        }
        ClientMessage::MarkAllRead => {
            match command_handlers::handle_mark_all_read(actor, &*state.clock, &*state.notifications)
                .await
            {
                Ok(count) if count > 0 => {
                    state
                        .hub
                        .send_to_user(actor.user_id, &ServerMessage::NotificationsReadAll { count });
                }
                Ok(_) => {}
                Err(error) => reply_error(state, connection_id, &error),
            }
        }
        ClientMessage::ListNotifications { unread_only } => {
            let filter = NotificationFilter {
                unread_only,
                ..NotificationFilter::default()
            };
            match query_handlers::list_notifications(
                actor,
                filter,
                Page::default(),
                &*state.clock,
                &*state.notifications,
            )
            .await
            {
                Ok(notifications) => {
                    state.hub.send_to_connection(
                        connection_id,
                        &ServerMessage::NotificationsLoaded { notifications },
                    );
                }
                Err(error) => reply_error(state, connection_id, &error),
            }
        }
        ClientMessage::Ping => {
            state
                .hub
                .send_to_connection(connection_id, &ServerMessage::Pong);
        }
    }
}

async fn join(state: &AppState, actor: &Actor, connection_id: Uuid, raw: &str) {
    let Some(room) = Room::parse(raw) else {
        state.hub.send_to_connection(
            connection_id,
            &ServerMessage::Error {
                message: format!("unknown room {raw}"),
            },
        );
        return;
    };
    match may_observe(state, actor, &room).await {
        Ok(true) => {
            state.hub.join_room(connection_id, &room);
        }
        Ok(false) => {
            state.hub.send_to_connection(
                connection_id,
                &ServerMessage::Error {
                    message: "you do not have access to this room".to_owned(),
                },
            );
        }
        Err(error) => reply_error(state, connection_id, &error),
    }
}

/// Whether `actor` may subscribe to `room`. Entity rooms resolve the
/// owning booking and reuse the ledger's observation capability; a
/// missing entity reads as no access rather than an error.
async fn may_observe(state: &AppState, actor: &Actor, room: &Room) -> Result<bool, DomainError> {
    match room {
        Room::Personal(user_id) => Ok(*user_id == actor.user_id || actor.is_admin()),
        Room::Role(role) => Ok(actor.is_admin() || (actor.is_staff() && *role == actor.role)),
        Room::Booking(booking_id) => {
            let Some(booking) = state.bookings.find(*booking_id).await? else {
                return Ok(false);
            };
            Ok(observes(actor, booking.customer_id))
        }
        Room::Experience(experience_id) => {
            let Some(experience) = state.experiences.find(*experience_id).await? else {
                return Ok(false);
            };
            let Some(booking) = state.bookings.find(experience.booking_id).await? else {
                return Ok(false);
            };
            Ok(observes(actor, booking.customer_id))
        }
    }
}

fn observes(actor: &Actor, owner: Uuid) -> bool {
    authz::authorize(actor, Action::ObserveEntity, Resource::Booking { owner }).is_ok()
}

fn reply_error(state: &AppState, connection_id: Uuid, error: &DomainError) {
    let message = match error {
        DomainError::Unauthorized { .. } => "forbidden".to_owned(),
        other => other.to_string(),
    };
    state
        .hub
        .send_to_connection(connection_id, &ServerMessage::Error { message });
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(live))
}
