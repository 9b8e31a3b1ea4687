//! Routes for the cultivation package catalog.
//!
//! The catalog is public to read; creating and retiring packages is
//! platform administration.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use reefbook_ledger::application::command_handlers;
use reefbook_ledger::application::query_handlers::{self, PackageView};
use reefbook_ledger::domain::commands::{CreatePackage, DeactivatePackage};

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePackageRequest {
    pub name: String,
    pub coral_species: String,
    pub location: String,
    pub unit_price: i64,
    pub currency: String,
    pub duration_months: u32,
    pub max_capacity: u32,
}

#[derive(Debug, Serialize)]
pub struct PackageCreatedResponse {
    pub id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub currency: String,
    pub max_capacity: u32,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct PackageDeactivatedResponse {
    pub id: Uuid,
    pub active: bool,
}

/// POST /api/packages
#[instrument(skip(state, user, request), fields(name = %request.name))]
async fn create_package(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreatePackageRequest>,
) -> Result<Json<PackageCreatedResponse>, ApiError> {
    let command = CreatePackage {
        actor: user.0,
        name: request.name,
        coral_species: request.coral_species,
        location: request.location,
        unit_price: request.unit_price,
        currency: request.currency,
        duration_months: request.duration_months,
        max_capacity: request.max_capacity,
    };
    let package =
        command_handlers::handle_create_package(&command, &*state.clock, &*state.packages).await?;

    info!(package_id = %package.id, "package created");

    Ok(Json(PackageCreatedResponse {
        id: package.id,
        name: package.name,
        unit_price: package.unit_price,
        currency: package.currency,
        max_capacity: package.max_capacity,
        active: package.active,
    }))
}

/// GET /api/packages
async fn list_packages(
    State(state): State<AppState>,
) -> Result<Json<Vec<PackageView>>, ApiError> {
    let packages = query_handlers::list_active_packages(&*state.packages).await?;
    Ok(Json(packages))
}

/// GET /api/packages/{id}
async fn get_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PackageView>, ApiError> {
    let package = query_handlers::get_package(id, &*state.packages).await?;
    Ok(Json(package))
}

/// DELETE /api/packages/{id}
///
/// Retires a package from sale. Existing bookings keep running.
#[instrument(skip(state, user))]
async fn deactivate_package(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PackageDeactivatedResponse>, ApiError> {
    let command = DeactivatePackage {
        actor: user.0,
        package_id: id,
    };
    command_handlers::handle_deactivate_package(&command, &*state.packages).await?;

    info!(package_id = %id, "package deactivated");

    Ok(Json(PackageDeactivatedResponse { id, active: false }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_packages).post(create_package))
        .route("/{id}", get(get_package).delete(deactivate_package))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use reefbook_core::actor::{Actor, Role};

    use crate::testing;

    use super::*;

    fn create_body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "name": "Brain coral sponsorship",
            "coral_species": "Platygyra daedalea",
            "location": "Hon Mun",
            "unit_price": 750_000,
            "currency": "VND",
            "duration_months": 12,
            "max_capacity": 20,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_admin_creates_package_and_catalog_lists_it() {
        // Arrange
        let state = testing::state();
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let app = router().with_state(state.clone());

        // Act
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, testing::bearer(&state, admin))
                    .body(Body::from(create_body()))
                    .unwrap(),
            )
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let created: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(created["active"], true);

        // The catalog is public.
        let listed = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(listed.status(), StatusCode::OK);
        let bytes = to_bytes(listed.into_body(), usize::MAX).await.unwrap();
        let catalog: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(catalog.as_array().unwrap().len(), 1);
        assert_eq!(catalog[0]["remaining_capacity"], 20);
    }

    #[tokio::test]
    async fn test_customer_cannot_create_packages() {
        // Arrange
        let state = testing::state();
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        let app = router().with_state(state.clone());

        // Act
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, testing::bearer(&state, customer))
                    .body(Body::from(create_body()))
                    .unwrap(),
            )
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_deactivated_package_leaves_the_catalog() {
        // Arrange
        let state = testing::state();
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let package = testing::seeded_package(&state).await;
        let app = router().with_state(state.clone());

        // Act
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/{}", package.id))
                    .header(header::AUTHORIZATION, testing::bearer(&state, admin))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);

        let listed = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(listed.into_body(), usize::MAX).await.unwrap();
        let catalog: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(catalog.as_array().unwrap().is_empty());

        // Direct reads still work for existing bookings.
        let fetched = app
            .oneshot(
                Request::builder()
                    .uri(format!("/{}", package.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        let bytes = to_bytes(fetched.into_body(), usize::MAX).await.unwrap();
        let view: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(view["active"], false);
    }

    #[tokio::test]
    async fn test_unknown_package_is_not_found() {
        // Arrange
        let app = router().with_state(testing::state());

        // Act
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
