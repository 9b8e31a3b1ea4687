//! Routes for the booking ledger.
//!
//! Customers create and cancel their own bookings; stage transitions
//! and progress reports are staff operations. Every mutation hands its
//! events to the notifier so the owner hears about it.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use reefbook_ledger::application::command_handlers;
use reefbook_ledger::application::query_handlers::{
    self, BookingDetailView, BookingView, CertificateView, ProgressEntryView,
};
use reefbook_ledger::domain::booking::BookingStatus;
use reefbook_ledger::domain::commands::{
    AdvanceBookingStage, CancelBooking, CreateBooking, RecordProgress,
};
use reefbook_core::error::DomainError;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::notifier;
use crate::routes::PageParams;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub package_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingCreatedResponse {
    pub id: Uuid,
    pub booking_number: String,
    pub status: &'static str,
    pub payment_status: &'static str,
    pub total_amount: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelBookingRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingCancelledResponse {
    pub id: Uuid,
    pub status: &'static str,
    pub refund_amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceStageRequest {
    pub to: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub final_report: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StageAdvancedResponse {
    pub id: Uuid,
    pub status: &'static str,
    pub progress_pct: u8,
}

#[derive(Debug, Deserialize)]
pub struct RecordProgressRequest {
    pub description: String,
    #[serde(default)]
    pub media: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgressRecordedResponse {
    pub booking_id: Uuid,
    pub stage: &'static str,
}

/// POST /api/bookings
#[instrument(skip(state, user, request), fields(package_id = %request.package_id))]
async fn create_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<BookingCreatedResponse>, ApiError> {
    let command = CreateBooking {
        customer_id: user.0.user_id,
        package_id: request.package_id,
        quantity: request.quantity,
        referral_code: request.referral_code,
    };
    let result = command_handlers::handle_create_booking(
        &command,
        &*state.clock,
        &*state.bookings,
        &*state.packages,
        &state.policy,
    )
    .await?;
    notifier::dispatch(&state, &result.events).await;

    let booking = result.booking;
    info!(booking_id = %booking.id, booking_number = %booking.booking_number, "booking created");

    Ok(Json(BookingCreatedResponse {
        id: booking.id,
        booking_number: booking.booking_number,
        status: booking.status.as_str(),
        payment_status: booking.payment_status.as_str(),
        total_amount: booking.total_amount,
        currency: booking.currency,
    }))
}

/// GET /api/bookings
async fn list_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<BookingView>>, ApiError> {
    let views = query_handlers::list_bookings_for_customer(
        &user.0,
        user.0.user_id,
        page.into(),
        &*state.bookings,
    )
    .await?;
    Ok(Json(views))
}

/// GET /api/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDetailView>, ApiError> {
    let detail = query_handlers::get_booking_detail(&user.0, id, &*state.bookings).await?;
    Ok(Json(detail))
}

/// POST /api/bookings/{id}/cancel
#[instrument(skip(state, user, request))]
async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<BookingCancelledResponse>, ApiError> {
    let command = CancelBooking {
        actor: user.0,
        booking_id: id,
        reason: request.reason,
    };
    let result = command_handlers::handle_cancel_booking(
        &command,
        &*state.clock,
        &*state.bookings,
        &*state.packages,
        &state.policy,
    )
    .await?;
    notifier::dispatch(&state, &result.events).await;

    let booking = result.booking;
    let refund_amount = booking
        .cancellation
        .as_ref()
        .map_or(0, |cancellation| cancellation.refund_amount);
    info!(booking_id = %booking.id, refund_amount, "booking cancelled");

    Ok(Json(BookingCancelledResponse {
        id: booking.id,
        status: booking.status.as_str(),
        refund_amount,
    }))
}

/// POST /api/bookings/{id}/status
#[instrument(skip(state, user, request), fields(to = %request.to))]
async fn advance_stage(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AdvanceStageRequest>,
) -> Result<Json<StageAdvancedResponse>, ApiError> {
    let to = BookingStatus::parse(&request.to).ok_or_else(|| {
        DomainError::Validation(format!("unknown booking status {:?}", request.to))
    })?;
    let command = AdvanceBookingStage {
        actor: user.0,
        booking_id: id,
        to,
        note: request.note,
        location: request.location,
        final_report: request.final_report,
    };
    let result = command_handlers::handle_advance_stage(
        &command,
        &*state.clock,
        &*state.bookings,
        &*state.packages,
    )
    .await?;
    notifier::dispatch(&state, &result.events).await;

    let booking = result.booking;
    Ok(Json(StageAdvancedResponse {
        id: booking.id,
        status: booking.status.as_str(),
        progress_pct: booking.progress_pct(),
    }))
}

/// POST /api/bookings/{id}/progress
#[instrument(skip(state, user, request))]
async fn record_progress(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<RecordProgressRequest>,
) -> Result<Json<ProgressRecordedResponse>, ApiError> {
    let command = RecordProgress {
        actor: user.0,
        booking_id: id,
        description: request.description,
        media: request.media,
    };
    let result =
        command_handlers::handle_record_progress(&command, &*state.clock, &*state.bookings)
            .await?;
    notifier::dispatch(&state, &result.events).await;

    Ok(Json(ProgressRecordedResponse {
        booking_id: result.booking.id,
        stage: result.booking.status.as_str(),
    }))
}

/// GET /api/bookings/{id}/progress
async fn list_progress(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProgressEntryView>>, ApiError> {
    let detail = query_handlers::get_booking_detail(&user.0, id, &*state.bookings).await?;
    Ok(Json(detail.timeline))
}

/// GET /api/bookings/{id}/certificate
async fn get_certificate(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CertificateView>, ApiError> {
    let certificate = query_handlers::get_certificate(&user.0, id, &*state.bookings).await?;
    Ok(Json(certificate))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route("/{id}", get(get_booking))
        .route("/{id}/cancel", post(cancel_booking))
        .route("/{id}/status", post(advance_stage))
        .route("/{id}/progress", post(record_progress).get(list_progress))
        .route("/{id}/certificate", get(get_certificate))
}
