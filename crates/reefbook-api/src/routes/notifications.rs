//! Routes for the notification inbox and admin sending.
//!
//! Inbox reads and read-state writes are scoped to the bearer of the
//! token; the send, broadcast, templated, and analytics endpoints are
//! admin surfaces. Read-state changes are mirrored to the user's live
//! connections so open tabs converge without refetching.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use reefbook_core::actor::Role;
use reefbook_core::error::DomainError;
use reefbook_core::page::Page;
use reefbook_notifications::application::command_handlers::{
    self, BroadcastAudience, BroadcastNotification, SendNotification, SendTemplated,
};
use reefbook_notifications::application::query_handlers::{self, NotificationView};
use reefbook_notifications::domain::notification::{
    Interaction, NewNotification, NotificationKind, Priority,
};
use reefbook_notifications::store::{AnalyticsSummary, NotificationFilter};
use reefbook_realtime::messages::ServerMessage;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::routes::{default_size, first_page};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct InboxParams {
    kind: Option<String>,
    #[serde(default)]
    unread_only: bool,
    #[serde(default)]
    include_expired: bool,
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default = "default_size")]
    size: u32,
}

fn parse_kind(raw: &str) -> Result<NotificationKind, DomainError> {
    NotificationKind::parse(raw)
        .ok_or_else(|| DomainError::Validation(format!("unknown notification kind {raw}")))
}

fn parse_priority(raw: &str) -> Result<Priority, DomainError> {
    Priority::parse(raw)
        .ok_or_else(|| DomainError::Validation(format!("unknown priority {raw}")))
}

/// GET /api/notifications
async fn list_inbox(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<InboxParams>,
) -> Result<Json<Vec<NotificationView>>, ApiError> {
    let kind = params.kind.as_deref().map(parse_kind).transpose()?;
    let filter = NotificationFilter {
        kind,
        unread_only: params.unread_only,
        include_expired: params.include_expired,
    };
    let page = Page {
        number: params.page,
        size: params.size,
    };
    let notifications = query_handlers::list_notifications(
        &user.0,
        filter,
        page,
        &*state.clock,
        &*state.notifications,
    )
    .await?;
    Ok(Json(notifications))
}

#[derive(Debug, Serialize)]
struct UnreadCountResponse {
    unread: u64,
}

/// GET /api/notifications/unread-count
async fn unread_count(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread =
        query_handlers::unread_count(&user.0, &*state.clock, &*state.notifications).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

#[derive(Debug, Serialize)]
struct MarkReadResponse {
    notification_id: Uuid,
    changed: bool,
}

/// POST /api/notifications/{id}/read
async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let changed =
        command_handlers::handle_mark_read(&user.0, id, &*state.clock, &*state.notifications)
            .await?;
    if changed {
        state.hub.send_to_user(
            user.0.user_id,
            &ServerMessage::NotificationRead { notification_id: id },
        );
    }
    Ok(Json(MarkReadResponse {
        notification_id: id,
        changed,
    }))
}

#[derive(Debug, Serialize)]
struct MarkAllReadResponse {
    count: u64,
}

/// POST /api/notifications/read-all
async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let count =
        command_handlers::handle_mark_all_read(&user.0, &*state.clock, &*state.notifications)
            .await?;
    if count > 0 {
        state
            .hub
            .send_to_user(user.0.user_id, &ServerMessage::NotificationsReadAll { count });
    }
    Ok(Json(MarkAllReadResponse { count }))
}

/// DELETE /api/notifications/{id}
async fn delete_notification(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    command_handlers::handle_delete(&user.0, id, &*state.notifications).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct TrackRequest {
    interaction: String,
}

/// POST /api/notifications/{id}/track
async fn track_interaction(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TrackRequest>,
) -> Result<StatusCode, ApiError> {
    let interaction = Interaction::parse(&request.interaction).ok_or_else(|| {
        DomainError::Validation(format!("unknown interaction {}", request.interaction))
    })?;
    command_handlers::handle_track(&user.0, id, interaction, &*state.clock, &*state.notifications)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    recipient_id: Uuid,
    kind: String,
    title: String,
    message: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    related_booking_id: Option<Uuid>,
    #[serde(default)]
    related_experience_id: Option<Uuid>,
    #[serde(default)]
    action_url: Option<String>,
    #[serde(default)]
    scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl SendRequest {
    fn into_fields(self) -> Result<NewNotification, DomainError> {
        let kind = parse_kind(&self.kind)?;
        let priority = match self.priority.as_deref() {
            Some(raw) => parse_priority(raw)?,
            None => Priority::Normal,
        };
        let mut fields =
            NewNotification::new(self.recipient_id, kind, self.title, self.message, priority);
        fields.related_booking_id = self.related_booking_id;
        fields.related_experience_id = self.related_experience_id;
        fields.action_url = self.action_url;
        fields.scheduled_for = self.scheduled_for;
        fields.expires_at = self.expires_at;
        Ok(fields)
    }
}

/// POST /api/notifications/send
#[instrument(skip(state, user, request))]
async fn send_notification(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<SendRequest>,
) -> Result<Json<NotificationView>, ApiError> {
    let command = SendNotification {
        actor: user.0,
        fields: request.into_fields()?,
    };
    let notification = command_handlers::handle_send_notification(
        command,
        &*state.clock,
        &*state.notifications,
        &*state.hub,
    )
    .await?;
    info!(notification_id = %notification.id, recipient_id = %notification.recipient_id, "notification sent");
    Ok(Json(NotificationView::from_notification(&notification)))
}

#[derive(Debug, Deserialize)]
struct BroadcastRequest {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    user_ids: Option<Vec<Uuid>>,
    kind: String,
    title: String,
    message: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    action_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct BroadcastResponse {
    created: u64,
}

/// POST /api/notifications/broadcast
#[instrument(skip(state, user, request))]
async fn broadcast(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<BroadcastRequest>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    let audience = match (&request.role, &request.user_ids) {
        (Some(raw), None) => {
            let role = Role::parse(raw)
                .ok_or_else(|| DomainError::Validation(format!("unknown role {raw}")))?;
            BroadcastAudience::Role(role)
        }
        (None, Some(user_ids)) => BroadcastAudience::Users(user_ids.clone()),
        _ => {
            return Err(DomainError::Validation(
                "specify exactly one of role or user_ids".to_owned(),
            )
            .into());
        }
    };

    let kind = parse_kind(&request.kind)?;
    let priority = match request.priority.as_deref() {
        Some(raw) => parse_priority(raw)?,
        None => Priority::Normal,
    };
    let mut fields =
        NewNotification::new(Uuid::nil(), kind, request.title, request.message, priority);
    fields.action_url = request.action_url;

    let command = BroadcastNotification {
        actor: user.0,
        audience,
        fields,
    };
    let created = command_handlers::handle_broadcast(
        command,
        &*state.clock,
        &*state.notifications,
        &*state.directory,
        &*state.hub,
    )
    .await?;
    Ok(Json(BroadcastResponse { created }))
}

#[derive(Debug, Deserialize)]
struct TemplatedRequest {
    template_name: String,
    recipient_id: Uuid,
    #[serde(default)]
    variables: HashMap<String, String>,
    #[serde(default)]
    related_booking_id: Option<Uuid>,
    #[serde(default)]
    related_experience_id: Option<Uuid>,
}

/// POST /api/notifications/templated
#[instrument(skip(state, user, request), fields(template = %request.template_name))]
async fn send_templated(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<TemplatedRequest>,
) -> Result<Json<NotificationView>, ApiError> {
    let command = SendTemplated {
        actor: user.0,
        template_name: request.template_name,
        recipient_id: request.recipient_id,
        variables: request.variables,
        related_booking_id: request.related_booking_id,
        related_experience_id: request.related_experience_id,
    };
    let notification = command_handlers::handle_send_templated(
        command,
        &*state.clock,
        &*state.notifications,
        &*state.hub,
    )
    .await?;
    Ok(Json(NotificationView::from_notification(&notification)))
}

/// GET /api/notifications/admin/analytics
async fn analytics(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<AnalyticsSummary>, ApiError> {
    let summary = query_handlers::get_analytics(&user.0, &*state.notifications).await?;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
struct CleanupResponse {
    removed: u64,
}

/// POST /api/notifications/admin/cleanup
#[instrument(skip(state, user))]
async fn run_cleanup(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<CleanupResponse>, ApiError> {
    let removed =
        command_handlers::handle_cleanup(&user.0, &*state.clock, &*state.notifications).await?;
    Ok(Json(CleanupResponse { removed }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_inbox))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/send", post(send_notification))
        .route("/broadcast", post(broadcast))
        .route("/templated", post(send_templated))
        .route("/admin/analytics", get(analytics))
        .route("/admin/cleanup", post(run_cleanup))
        .route("/{id}", delete(delete_notification))
        .route("/{id}/read", post(mark_read))
        .route("/{id}/track", post(track_interaction))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use reefbook_core::actor::Actor;

    use crate::testing;

    use super::*;

    async fn json_of(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, auth: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, auth)
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn get_authed(uri: &str, auth: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    async fn send_as_admin(
        app: &Router,
        state: &AppState,
        recipient: Uuid,
        kind: &str,
        title: &str,
    ) -> Uuid {
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let response = app
            .clone()
            .oneshot(post_json(
                "/send",
                &testing::bearer(state, admin),
                &serde_json::json!({
                    "recipient_id": recipient,
                    "kind": kind,
                    "title": title,
                    "message": "body",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_of(response).await;
        body["id"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_inbox_lists_newest_first_and_filters_by_kind() {
        // Arrange
        let state = testing::state();
        let app = router().with_state(state.clone());
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        send_as_admin(&app, &state, customer.user_id, "growth_update", "Week 1").await;
        send_as_admin(&app, &state, customer.user_id, "announcement", "News").await;
        let auth = testing::bearer(&state, customer);

        // Act
        let all = app
            .clone()
            .oneshot(get_authed("/", &auth))
            .await
            .unwrap();
        let filtered = app
            .clone()
            .oneshot(get_authed("/?kind=growth_update", &auth))
            .await
            .unwrap();
        let count = app
            .oneshot(get_authed("/unread-count", &auth))
            .await
            .unwrap();

        // Assert
        let all = json_of(all).await;
        assert_eq!(all.as_array().unwrap().len(), 2);
        let filtered = json_of(filtered).await;
        assert_eq!(filtered.as_array().unwrap().len(), 1);
        assert_eq!(filtered[0]["kind"], "growth_update");
        assert_eq!(json_of(count).await["unread"], 2);
    }

    #[tokio::test]
    async fn test_unknown_kind_filter_is_rejected() {
        // Arrange
        let state = testing::state();
        let app = router().with_state(state.clone());
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);

        // Act
        let response = app
            .oneshot(get_authed("/?kind=carrier_pigeon", &testing::bearer(&state, customer)))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_mark_read_acknowledges_live_connections() {
        // Arrange
        let state = testing::state();
        let app = router().with_state(state.clone());
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        let mut live = state.hub.register(customer.user_id, Role::Customer).unwrap();
        let id = send_as_admin(&app, &state, customer.user_id, "announcement", "News").await;
        // Drain the live copy of the notification itself.
        live.outbox.try_recv().unwrap();
        let auth = testing::bearer(&state, customer);

        // Act
        let first = app
            .clone()
            .oneshot(post_json(
                &format!("/{id}/read"),
                &auth,
                &serde_json::json!({}),
            ))
            .await
            .unwrap();
        let second = app
            .oneshot(post_json(
                &format!("/{id}/read"),
                &auth,
                &serde_json::json!({}),
            ))
            .await
            .unwrap();

        // Assert
        assert_eq!(json_of(first).await["changed"], true);
        assert_eq!(json_of(second).await["changed"], false);
        match live.outbox.try_recv().unwrap() {
            ServerMessage::NotificationRead { notification_id } => assert_eq!(notification_id, id),
            other => panic!("expected a read ack, got {other:?}"),
        }
        // The idempotent repeat did not push a second ack.
        assert!(live.outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_read_all_reports_and_pushes_the_count() {
        // Arrange
        let state = testing::state();
        let app = router().with_state(state.clone());
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        send_as_admin(&app, &state, customer.user_id, "announcement", "One").await;
        send_as_admin(&app, &state, customer.user_id, "announcement", "Two").await;
        let mut live = state.hub.register(customer.user_id, Role::Customer).unwrap();
        let auth = testing::bearer(&state, customer);

        // Act
        let response = app
            .oneshot(post_json("/read-all", &auth, &serde_json::json!({})))
            .await
            .unwrap();

        // Assert
        assert_eq!(json_of(response).await["count"], 2);
        match live.outbox.try_recv().unwrap() {
            ServerMessage::NotificationsReadAll { count } => assert_eq!(count, 2),
            other => panic!("expected a read-all ack, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_foreign_notification_behaves_like_missing() {
        // Arrange
        let state = testing::state();
        let app = router().with_state(state.clone());
        let recipient = Actor::new(Uuid::new_v4(), Role::Customer);
        let stranger = Actor::new(Uuid::new_v4(), Role::Customer);
        let id = send_as_admin(&app, &state, recipient.user_id, "announcement", "News").await;
        let auth = testing::bearer(&state, stranger);

        // Act
        let read = app
            .clone()
            .oneshot(post_json(
                &format!("/{id}/read"),
                &auth,
                &serde_json::json!({}),
            ))
            .await
            .unwrap();
        let deleted = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/{id}"))
                    .header(header::AUTHORIZATION, &auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Assert
        assert_eq!(read.status(), StatusCode::NOT_FOUND);
        assert_eq!(deleted.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_is_an_admin_surface() {
        // Arrange
        let state = testing::state();
        let app = router().with_state(state.clone());
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);

        // Act
        let response = app
            .oneshot(post_json(
                "/send",
                &testing::bearer(&state, customer),
                &serde_json::json!({
                    "recipient_id": Uuid::new_v4(),
                    "kind": "announcement",
                    "title": "Hi",
                    "message": "there",
                }),
            ))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_broadcast_audience_is_exactly_one_of_role_or_users() {
        // Arrange
        let state = testing::state();
        let app = router().with_state(state.clone());
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let auth = testing::bearer(&state, admin);
        let base = serde_json::json!({
            "kind": "promotion",
            "title": "Reef week",
            "message": "Ten percent off",
        });

        // Act
        let mut both = base.clone();
        both["role"] = "customer".into();
        both["user_ids"] = serde_json::json!([Uuid::new_v4()]);
        let both = app
            .clone()
            .oneshot(post_json("/broadcast", &auth, &both))
            .await
            .unwrap();
        let neither = app
            .clone()
            .oneshot(post_json("/broadcast", &auth, &base))
            .await
            .unwrap();

        let mut explicit = base;
        explicit["user_ids"] = serde_json::json!([Uuid::new_v4(), Uuid::new_v4()]);
        let explicit = app
            .oneshot(post_json("/broadcast", &auth, &explicit))
            .await
            .unwrap();

        // Assert
        assert_eq!(both.status(), StatusCode::BAD_REQUEST);
        assert_eq!(neither.status(), StatusCode::BAD_REQUEST);
        assert_eq!(explicit.status(), StatusCode::OK);
        assert_eq!(json_of(explicit).await["created"], 2);
    }

    #[tokio::test]
    async fn test_templated_send_renders_variables() {
        // Arrange
        let state = testing::state();
        let app = router().with_state(state.clone());
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let recipient = Uuid::new_v4();

        // Act
        let response = app
            .oneshot(post_json(
                "/templated",
                &testing::bearer(&state, admin),
                &serde_json::json!({
                    "template_name": "experience_reminder",
                    "recipient_id": recipient,
                    "variables": {
                        "title": "Night dive",
                        "location": "Hon Mun",
                        "hours": "12",
                    },
                }),
            ))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["title"], "Upcoming experience: Night dive");
        assert_eq!(body["priority"], "high");
    }

    #[tokio::test]
    async fn test_unknown_interaction_is_rejected() {
        // Arrange
        let state = testing::state();
        let app = router().with_state(state.clone());
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        let id = send_as_admin(&app, &state, customer.user_id, "announcement", "News").await;

        // Act
        let response = app
            .oneshot(post_json(
                &format!("/{id}/track"),
                &testing::bearer(&state, customer),
                &serde_json::json!({ "interaction": "smoke_signal" }),
            ))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analytics_and_cleanup_are_admin_gated() {
        // Arrange
        let state = testing::state();
        let app = router().with_state(state.clone());
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        send_as_admin(&app, &state, customer.user_id, "announcement", "News").await;

        // Act
        let denied = app
            .clone()
            .oneshot(get_authed(
                "/admin/analytics",
                &testing::bearer(&state, customer),
            ))
            .await
            .unwrap();
        let summary = app
            .clone()
            .oneshot(get_authed("/admin/analytics", &testing::bearer(&state, admin)))
            .await
            .unwrap();
        let cleaned = app
            .oneshot(post_json(
                "/admin/cleanup",
                &testing::bearer(&state, admin),
                &serde_json::json!({}),
            ))
            .await
            .unwrap();

        // Assert
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(summary.status(), StatusCode::OK);
        assert_eq!(json_of(summary).await["total"], 1);
        assert_eq!(json_of(cleaned).await["removed"], 0);
    }
}
