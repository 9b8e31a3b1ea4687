//! Command handlers for the Payment Reconciliation context.
//!
//! Opening a payment attaches an order id to the booking; the money
//! itself is only ever recognized through the webhook or an admin's
//! bank-transfer confirmation. Webhook deliveries are at-least-once, so
//! every application is a compare-and-set on the current payment status
//! with bounded retry: a redelivered payload finds the booking already
//! paid (or already failed) and acknowledges without applying again.

use uuid::Uuid;

use reefbook_core::authz::{self, Action, Resource};
use reefbook_core::clock::Clock;
use reefbook_core::directory::RecipientDirectory;
use reefbook_core::error::DomainError;

use reefbook_ledger::domain::booking::{Booking, PaymentMethod, PaymentStatus};
use reefbook_ledger::domain::events::LedgerEvent;
use reefbook_ledger::domain::progress::ProgressEntry;
use reefbook_ledger::store::{BookingStore, PackageStore};

use crate::commands::{ConfirmBankTransfer, CreateBankTransfer, InitiateGatewayPayment};
use crate::config::{BankTransferConfig, GatewayConfig};
use crate::gateway::PaymentGateway;
use crate::wire::{BankInstructions, GatewayCallback, WebhookAck};

/// How many times a handler reloads after losing a revision race.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Result of opening a hosted-checkout payment.
#[derive(Debug)]
pub struct GatewayPaymentInitiated {
    /// The booking with the order id attached.
    pub booking: Booking,
    /// The order id submitted to the gateway.
    pub order_id: String,
    /// Hosted checkout URL for the customer.
    pub pay_url: String,
    /// QR-code variant, when the gateway returned one.
    pub qr_code_url: Option<String>,
    /// Mobile-app deeplink variant, when the gateway returned one.
    pub deeplink: Option<String>,
}

/// Result of issuing bank transfer instructions.
#[derive(Debug)]
pub struct BankTransferInitiated {
    /// The booking with the transfer code attached.
    pub booking: Booking,
    /// What the customer must wire, where, and with which description.
    pub instructions: BankInstructions,
    /// Events for notification and fan-out dispatch.
    pub events: Vec<LedgerEvent>,
}

/// Result of a successfully applied payment confirmation.
#[derive(Debug)]
pub struct PaymentCommandResult {
    /// The booking after the write.
    pub booking: Booking,
    /// Events for notification and fan-out dispatch.
    pub events: Vec<LedgerEvent>,
}

/// Outcome of one webhook delivery: the acknowledgment to answer with
/// and any events to fan out.
#[derive(Debug)]
pub struct CallbackOutcome {
    /// Acknowledgment for the gateway.
    pub ack: WebhookAck,
    /// Events for notification and fan-out dispatch.
    pub events: Vec<LedgerEvent>,
}

impl CallbackOutcome {
    fn ack_only(ack: WebhookAck) -> Self {
        Self { ack, events: Vec::new() }
    }
}

async fn load_booking(
    bookings: &dyn BookingStore,
    booking_id: Uuid,
) -> Result<Booking, DomainError> {
    bookings
        .find(booking_id)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "booking",
            id: booking_id.to_string(),
        })
}

async fn load_booking_by_order(
    bookings: &dyn BookingStore,
    order_id: &str,
) -> Result<Booking, DomainError> {
    bookings
        .find_by_payment_id(order_id)
        .await?
        .ok_or_else(|| DomainError::NotFound {
            entity: "booking",
            id: order_id.to_owned(),
        })
}

fn ensure_payment_pending(booking: &Booking) -> Result<(), DomainError> {
    if booking.payment_status != PaymentStatus::Pending {
        return Err(DomainError::Conflict(format!(
            "booking {} payment is {}; only pending payments can be opened",
            booking.booking_number,
            booking.payment_status.as_str()
        )));
    }
    Ok(())
}

/// Handles `InitiateGatewayPayment`: submits a signed creation request
/// for a pending booking and attaches the resulting order id as the
/// booking's payment id.
///
/// The order id is derived from the booking number and the current
/// unix-millisecond timestamp, so retries produce distinct orders.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` for a foreign booking,
/// `DomainError::Conflict` unless the payment is `pending`,
/// `DomainError::Validation` when the gateway declines, and
/// `DomainError::UpstreamTimeout` when the gateway does not answer.
pub async fn handle_initiate_gateway_payment(
    command: &InitiateGatewayPayment,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    gateway: &dyn PaymentGateway,
    config: &GatewayConfig,
) -> Result<GatewayPaymentInitiated, DomainError> {
    let booking = load_booking(bookings, command.booking_id).await?;
    authz::authorize(
        &command.actor,
        Action::InitiatePayment,
        Resource::Booking {
            owner: booking.customer_id,
        },
    )?;
    ensure_payment_pending(&booking)?;

    let now = clock.now();
    let order_id = format!("{}-{}", booking.booking_number, now.timestamp_millis());
    let order_info = format!("Coral cultivation booking {}", booking.booking_number);
    let request = config.signed_create_request(
        booking.total_amount,
        &order_id,
        &order_info,
        &Uuid::new_v4().to_string(),
    );

    let response = gateway.create_payment(&request).await?;
    if response.result_code != 0 {
        return Err(DomainError::Validation(format!(
            "gateway declined the payment: {}",
            response.message
        )));
    }
    let pay_url = response.pay_url.ok_or_else(|| {
        DomainError::Infrastructure("gateway accepted the payment without a pay url".to_owned())
    })?;

    let mut attempts = 0;
    let booking = loop {
        attempts += 1;
        let mut booking = load_booking(bookings, command.booking_id).await?;
        ensure_payment_pending(&booking)?;
        booking.open_payment(PaymentMethod::Gateway, order_id.clone(), clock.now())?;
        match bookings.update(&mut booking).await {
            Ok(()) => break booking,
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    tracing::info!(
        booking_id = %booking.id,
        order_id = %order_id,
        amount = booking.total_amount,
        "gateway payment opened"
    );

    Ok(GatewayPaymentInitiated {
        booking,
        order_id,
        pay_url,
        qr_code_url: response.qr_code_url,
        deeplink: response.deeplink,
    })
}

/// Handles one gateway webhook delivery.
///
/// Never fails outward: whatever happens, the gateway gets an
/// acknowledgment it understands. Signature mismatches and unknown
/// orders are acknowledged with their dedicated codes and change
/// nothing; internal errors are logged and acknowledged with `"99"` so
/// the gateway redelivers later.
pub async fn handle_gateway_callback(
    callback: &GatewayCallback,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    packages: &dyn PackageStore,
    config: &GatewayConfig,
) -> CallbackOutcome {
    match reconcile_callback(callback, clock, bookings, packages, config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                order_id = %callback.order_id,
                error = %e,
                "gateway callback processing failed"
            );
            CallbackOutcome::ack_only(WebhookAck::internal_error())
        }
    }
}

async fn reconcile_callback(
    callback: &GatewayCallback,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    packages: &dyn PackageStore,
    config: &GatewayConfig,
) -> Result<CallbackOutcome, DomainError> {
    if !config.verify_callback(callback) {
        tracing::warn!(order_id = %callback.order_id, "gateway callback signature mismatch");
        return Ok(CallbackOutcome::ack_only(WebhookAck::invalid_signature()));
    }
    if bookings.find_by_payment_id(&callback.order_id).await?.is_none() {
        tracing::warn!(order_id = %callback.order_id, "gateway callback for unknown order");
        return Ok(CallbackOutcome::ack_only(WebhookAck::booking_not_found()));
    }

    if callback.result_code == 0 {
        apply_payment_success(callback, clock, bookings, packages).await
    } else {
        apply_payment_failure(callback, clock, bookings).await
    }
}

async fn apply_payment_success(
    callback: &GatewayCallback,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    packages: &dyn PackageStore,
) -> Result<CallbackOutcome, DomainError> {
    let mut attempts = 0;
    let (booking, applied) = loop {
        attempts += 1;
        let mut booking = load_booking_by_order(bookings, &callback.order_id).await?;
        if booking.payment_status == PaymentStatus::Paid {
            break (booking, false);
        }
        match booking.confirm_payment(&callback.trans_id.to_string(), clock.now()) {
            Ok(()) => {}
            Err(DomainError::Conflict(reason)) => {
                tracing::warn!(
                    order_id = %callback.order_id,
                    %reason,
                    "verified payment arrived for a non-payable booking"
                );
                break (booking, false);
            }
            Err(e) => return Err(e),
        }
        match bookings.update(&mut booking).await {
            Ok(()) => break (booking, true),
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    if !applied {
        return Ok(CallbackOutcome::ack_only(WebhookAck::confirmed()));
    }

    packages
        .add_revenue(booking.package_id, booking.total_amount)
        .await?;
    bookings
        .append_progress(&ProgressEntry::new(
            booking.id,
            booking.status,
            format!(
                "Payment of {} {} received via gateway",
                booking.total_amount, booking.currency
            ),
            Vec::new(),
            booking.customer_id,
            clock.now(),
        ))
        .await?;

    tracing::info!(
        booking_id = %booking.id,
        order_id = %callback.order_id,
        transaction_id = callback.trans_id,
        "gateway payment reconciled"
    );

    let events = vec![LedgerEvent::PaymentReceived {
        booking_id: booking.id,
        booking_number: booking.booking_number.clone(),
        customer_id: booking.customer_id,
        amount: booking.total_amount,
        transaction_id: callback.trans_id.to_string(),
        method: PaymentMethod::Gateway,
    }];

    Ok(CallbackOutcome {
        ack: WebhookAck::confirmed(),
        events,
    })
}

async fn apply_payment_failure(
    callback: &GatewayCallback,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
) -> Result<CallbackOutcome, DomainError> {
    let mut attempts = 0;
    let (booking, applied) = loop {
        attempts += 1;
        let mut booking = load_booking_by_order(bookings, &callback.order_id).await?;
        if booking.payment_status == PaymentStatus::Failed {
            break (booking, false);
        }
        match booking.record_payment_failure(clock.now()) {
            Ok(()) => {}
            Err(DomainError::Conflict(reason)) => {
                tracing::warn!(
                    order_id = %callback.order_id,
                    %reason,
                    "gateway failure arrived for a settled booking"
                );
                break (booking, false);
            }
            Err(e) => return Err(e),
        }
        match bookings.update(&mut booking).await {
            Ok(()) => break (booking, true),
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    if !applied {
        return Ok(CallbackOutcome::ack_only(WebhookAck::confirmed()));
    }

    tracing::info!(
        booking_id = %booking.id,
        order_id = %callback.order_id,
        result_code = callback.result_code,
        "gateway payment failed"
    );

    let events = vec![LedgerEvent::PaymentFailed {
        booking_id: booking.id,
        booking_number: booking.booking_number.clone(),
        customer_id: booking.customer_id,
        reason: callback.message.clone(),
    }];

    Ok(CallbackOutcome {
        ack: WebhookAck::confirmed(),
        events,
    })
}

/// Handles `CreateBankTransfer`: assigns a transfer code to a pending
/// booking and returns the receiving-account instructions.
///
/// The transfer description quotes the code plus the customer's name so
/// an operator can match the incoming wire; when the directory has no
/// contact the booking number stands in for the name.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` for a foreign booking and
/// `DomainError::Conflict` unless the payment is `pending`.
pub async fn handle_create_bank_transfer(
    command: &CreateBankTransfer,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    directory: &dyn RecipientDirectory,
    bank: &BankTransferConfig,
) -> Result<BankTransferInitiated, DomainError> {
    let booking = load_booking(bookings, command.booking_id).await?;
    authz::authorize(
        &command.actor,
        Action::InitiatePayment,
        Resource::Booking {
            owner: booking.customer_id,
        },
    )?;
    ensure_payment_pending(&booking)?;

    let now = clock.now();
    let transfer_code = format!(
        "CT{}{:04}",
        booking.booking_number,
        now.timestamp_millis() % 10_000
    );

    let mut attempts = 0;
    let booking = loop {
        attempts += 1;
        let mut booking = load_booking(bookings, command.booking_id).await?;
        ensure_payment_pending(&booking)?;
        booking.open_payment(PaymentMethod::BankTransfer, transfer_code.clone(), clock.now())?;
        match bookings.update(&mut booking).await {
            Ok(()) => break booking,
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    let holder = directory
        .find_contact(booking.customer_id)
        .await?
        .map(|contact| contact.name);
    let transfer_content = match holder {
        Some(name) => format!("{transfer_code} {name}"),
        None => format!("{transfer_code} {}", booking.booking_number),
    };
    let instructions = BankInstructions {
        bank_name: bank.bank_name.clone(),
        bank_branch: bank.bank_branch.clone(),
        account_number: bank.account_number.clone(),
        account_name: bank.account_name.clone(),
        amount: booking.total_amount,
        transfer_code: transfer_code.clone(),
        transfer_content,
        note: bank.note.clone(),
    };

    tracing::info!(
        booking_id = %booking.id,
        transfer_code = %transfer_code,
        amount = booking.total_amount,
        "bank transfer instructions issued"
    );

    let events = vec![LedgerEvent::BankTransferInstructed {
        booking_id: booking.id,
        customer_id: booking.customer_id,
        transfer_code,
        amount: booking.total_amount,
    }];

    Ok(BankTransferInitiated {
        booking,
        instructions,
        events,
    })
}

/// Handles `ConfirmBankTransfer`: an administrator records that the
/// wire arrived, with the bank-side transaction reference as evidence.
/// Applies the same paid transition and side effects as a verified
/// gateway callback.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` for non-admin actors,
/// `DomainError::Validation` for missing evidence, and
/// `DomainError::Conflict` when the booking is already paid.
pub async fn handle_confirm_bank_transfer(
    command: &ConfirmBankTransfer,
    clock: &dyn Clock,
    bookings: &dyn BookingStore,
    packages: &dyn PackageStore,
) -> Result<PaymentCommandResult, DomainError> {
    if command.transaction_id.trim().is_empty() {
        return Err(DomainError::Validation(
            "transfer evidence transaction id must not be empty".to_owned(),
        ));
    }

    let mut attempts = 0;
    let booking = loop {
        attempts += 1;
        let mut booking = load_booking(bookings, command.booking_id).await?;
        authz::authorize(
            &command.actor,
            Action::ConfirmBankTransfer,
            Resource::Booking {
                owner: booking.customer_id,
            },
        )?;

        booking.confirm_payment(&command.transaction_id, clock.now())?;
        if booking.payment_method.is_none() {
            booking.payment_method = Some(PaymentMethod::BankTransfer);
        }
        match bookings.update(&mut booking).await {
            Ok(()) => break booking,
            Err(DomainError::RevisionConflict { .. }) if attempts < MAX_WRITE_ATTEMPTS => {}
            Err(e) => return Err(e),
        }
    };

    packages
        .add_revenue(booking.package_id, booking.total_amount)
        .await?;
    let description = match &command.note {
        Some(note) => format!("Bank transfer confirmed: {note}"),
        None => "Bank transfer confirmed".to_owned(),
    };
    bookings
        .append_progress(&ProgressEntry::new(
            booking.id,
            booking.status,
            description,
            Vec::new(),
            command.actor.user_id,
            clock.now(),
        ))
        .await?;

    tracing::info!(
        booking_id = %booking.id,
        booking_number = %booking.booking_number,
        transaction_id = %command.transaction_id,
        "bank transfer confirmed"
    );

    let events = vec![LedgerEvent::PaymentReceived {
        booking_id: booking.id,
        booking_number: booking.booking_number.clone(),
        customer_id: booking.customer_id,
        amount: booking.total_amount,
        transaction_id: command.transaction_id.clone(),
        method: booking
            .payment_method
            .unwrap_or(PaymentMethod::BankTransfer),
    }];

    Ok(PaymentCommandResult { booking, events })
}
