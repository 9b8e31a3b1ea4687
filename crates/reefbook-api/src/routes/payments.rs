//! Routes for payment initiation and reconciliation.
//!
//! Everything here is authenticated except the gateway callback: that
//! endpoint is driven by the merchant gateway, proves itself with an
//! HMAC signature instead of a token, and always answers the ack shape
//! the gateway retries on. The error mapping in [`crate::error`] never
//! applies to it.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use reefbook_payments::application::command_handlers;
use reefbook_payments::application::query_handlers::{
    self, PaymentRecordView, PaymentStatusView,
};
use reefbook_payments::commands::{
    ConfirmBankTransfer, CreateBankTransfer, InitiateGatewayPayment,
};
use reefbook_payments::wire::{BankInstructions, GatewayCallback, WebhookAck};

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::notifier;
use crate::routes::PageParams;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GatewayCreateRequest {
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct GatewayCreateResponse {
    pub order_id: String,
    pub pay_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deeplink: Option<String>,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct BankTransferCreateRequest {
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BankTransferCreateResponse {
    pub booking_id: Uuid,
    pub instructions: BankInstructions,
}

#[derive(Debug, Deserialize)]
pub struct BankTransferConfirmRequest {
    pub booking_id: Uuid,
    pub transaction_id: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BankTransferConfirmedResponse {
    pub booking_id: Uuid,
    pub payment_status: &'static str,
}

/// POST /api/payments/gateway/create
#[instrument(skip(state, user, request), fields(booking_id = %request.booking_id))]
async fn gateway_create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<GatewayCreateRequest>,
) -> Result<Json<GatewayCreateResponse>, ApiError> {
    let command = InitiateGatewayPayment {
        actor: user.0,
        booking_id: request.booking_id,
    };
    let result = command_handlers::handle_initiate_gateway_payment(
        &command,
        &*state.clock,
        &*state.bookings,
        &*state.gateway,
        &state.gateway_config,
    )
    .await?;

    info!(booking_id = %result.booking.id, order_id = %result.order_id, "gateway payment created");

    Ok(Json(GatewayCreateResponse {
        order_id: result.order_id,
        pay_url: result.pay_url,
        qr_code_url: result.qr_code_url,
        deeplink: result.deeplink,
        amount: result.booking.total_amount,
        currency: result.booking.currency,
    }))
}

/// POST /api/payments/gateway/callback
///
/// The public webhook. Whatever happens, the gateway gets back the ack
/// shape it understands; a payload that does not even parse as a
/// callback is acknowledged as an internal error so the gateway
/// retries it.
#[instrument(skip(state, payload))]
async fn gateway_callback(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Json<WebhookAck> {
    let callback: GatewayCallback = match serde_json::from_value(payload) {
        Ok(callback) => callback,
        Err(error) => {
            warn!(error = %error, "gateway callback payload did not parse");
            return Json(WebhookAck::internal_error());
        }
    };
    let outcome = command_handlers::handle_gateway_callback(
        &callback,
        &*state.clock,
        &*state.bookings,
        &*state.packages,
        &state.gateway_config,
    )
    .await;
    notifier::dispatch(&state, &outcome.events).await;
    Json(outcome.ack)
}

/// GET /api/payments/status/{order_id}
async fn payment_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentStatusView>, ApiError> {
    let view = query_handlers::get_payment_status(
        &user.0,
        &order_id,
        &*state.bookings,
        &*state.gateway,
        &state.gateway_config,
    )
    .await?;
    Ok(Json(view))
}

/// GET /api/payments/history
async fn payment_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<PaymentRecordView>>, ApiError> {
    let records = query_handlers::list_payment_history(
        &user.0,
        user.0.user_id,
        page.into(),
        &*state.bookings,
    )
    .await?;
    Ok(Json(records))
}

/// POST /api/payments/bank-transfer/create
#[instrument(skip(state, user, request), fields(booking_id = %request.booking_id))]
async fn bank_transfer_create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<BankTransferCreateRequest>,
) -> Result<Json<BankTransferCreateResponse>, ApiError> {
    let command = CreateBankTransfer {
        actor: user.0,
        booking_id: request.booking_id,
    };
    let result = command_handlers::handle_create_bank_transfer(
        &command,
        &*state.clock,
        &*state.bookings,
        &*state.directory,
        &state.bank,
    )
    .await?;
    notifier::dispatch(&state, &result.events).await;

    info!(booking_id = %result.booking.id, "bank transfer instructions issued");

    Ok(Json(BankTransferCreateResponse {
        booking_id: result.booking.id,
        instructions: result.instructions,
    }))
}

/// POST /api/payments/bank-transfer/confirm
#[instrument(skip(state, user, request), fields(booking_id = %request.booking_id))]
async fn bank_transfer_confirm(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<BankTransferConfirmRequest>,
) -> Result<Json<BankTransferConfirmedResponse>, ApiError> {
    let command = ConfirmBankTransfer {
        actor: user.0,
        booking_id: request.booking_id,
        transaction_id: request.transaction_id,
        note: request.note,
    };
    let result = command_handlers::handle_confirm_bank_transfer(
        &command,
        &*state.clock,
        &*state.bookings,
        &*state.packages,
    )
    .await?;
    notifier::dispatch(&state, &result.events).await;

    Ok(Json(BankTransferConfirmedResponse {
        booking_id: result.booking.id,
        payment_status: result.booking.payment_status.as_str(),
    }))
}

/// GET /api/payments/admin/pending
async fn pending_bank_transfers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<PaymentRecordView>>, ApiError> {
    let records =
        query_handlers::list_pending_bank_transfers(&user.0, &*state.bookings).await?;
    Ok(Json(records))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/gateway/create", post(gateway_create))
        .route("/gateway/callback", post(gateway_callback))
        .route("/status/{order_id}", get(payment_status))
        .route("/history", get(payment_history))
        .route("/bank-transfer/create", post(bank_transfer_create))
        .route("/bank-transfer/confirm", post(bank_transfer_confirm))
        .route("/admin/pending", get(pending_bank_transfers))
}
