//! Operator-only routes.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use reefbook_core::authz::{self, Action, Resource};
use reefbook_realtime::hub::PresenceEntry;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub online: Vec<PresenceEntry>,
    pub connections: usize,
}

/// GET /api/admin/presence
async fn presence(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<PresenceResponse>, ApiError> {
    authz::authorize(&user.0, Action::ViewPresence, Resource::Platform)?;
    Ok(Json(PresenceResponse {
        online: state.hub.online_users(),
        connections: state.hub.connection_count(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/presence", get(presence))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;
    use uuid::Uuid;

    use reefbook_core::actor::{Actor, Role};

    use crate::testing;

    use super::*;

    fn get_authed(uri: &str, auth: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_presence_reports_online_users_to_admins_only() {
        // Arrange
        let state = testing::state();
        let watcher = Actor::new(Uuid::new_v4(), Role::Customer);
        let _live = state.hub.register(watcher.user_id, Role::Customer).unwrap();
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let app = router().with_state(state.clone());

        // Act
        let denied = app
            .clone()
            .oneshot(get_authed("/presence", &testing::bearer(&state, watcher)))
            .await
            .unwrap();
        let allowed = app
            .oneshot(get_authed("/presence", &testing::bearer(&state, admin)))
            .await
            .unwrap();

        // Assert
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(allowed.status(), StatusCode::OK);
        let bytes = to_bytes(allowed.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["connections"], 1);
        assert_eq!(body["online"][0]["user_id"], watcher.user_id.to_string());
    }
}
