//! Query handlers for the Payment Reconciliation context.
//!
//! Read-only views over bookings seen as payment records, plus the
//! status poll that consults the gateway. The gateway is an optional
//! informant here: when it cannot be reached the local snapshot is
//! still served, with the gateway section degraded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use reefbook_core::actor::Actor;
use reefbook_core::authz::{self, Action, Resource};
use reefbook_core::error::DomainError;
use reefbook_core::page::Page;

use reefbook_ledger::domain::booking::Booking;
use reefbook_ledger::store::BookingStore;

use crate::config::GatewayConfig;
use crate::gateway::PaymentGateway;
use crate::wire::StatusQueryResponse;

/// Gateway-reported status, or a degraded marker when the gateway
/// cannot be reached.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GatewaySection {
    /// The gateway answered the status query.
    Reported(StatusQueryResponse),
    /// The gateway could not be reached; only the local snapshot holds.
    Unavailable {
        /// Static description of the degradation.
        error: String,
    },
}

/// Local booking snapshot plus the gateway's view of one order.
#[derive(Debug, Serialize)]
pub struct PaymentStatusView {
    /// The booking the order pays for.
    pub booking_id: Uuid,
    /// Human-readable external reference.
    pub booking_number: String,
    /// Lifecycle status.
    pub booking_status: &'static str,
    /// Payment status as reconciled locally.
    pub payment_status: &'static str,
    /// Payment method, when a payment was opened.
    pub payment_method: Option<&'static str>,
    /// Amount due or paid.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Verified transaction reference, once paid.
    pub transaction_id: Option<String>,
    /// When the payment was verified.
    pub paid_at: Option<DateTime<Utc>>,
    /// What the gateway says, or the degraded marker.
    pub gateway: GatewaySection,
}

/// One booking seen as a payment record.
#[derive(Debug, Serialize)]
pub struct PaymentRecordView {
    /// The booking the record belongs to.
    pub booking_id: Uuid,
    /// Human-readable external reference.
    pub booking_number: String,
    /// Amount due or paid.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Payment status.
    pub payment_status: &'static str,
    /// Payment method, when a payment was opened.
    pub payment_method: Option<&'static str>,
    /// Order id or transfer code attached to the booking.
    pub payment_id: Option<String>,
    /// Verified transaction reference, once paid.
    pub transaction_id: Option<String>,
    /// When the payment was verified.
    pub paid_at: Option<DateTime<Utc>>,
    /// When the booking was created.
    pub created_at: DateTime<Utc>,
}

impl PaymentRecordView {
    fn from_booking(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            booking_number: booking.booking_number.clone(),
            amount: booking.total_amount,
            currency: booking.currency.clone(),
            payment_status: booking.payment_status.as_str(),
            payment_method: booking.payment_method.map(|m| m.as_str()),
            payment_id: booking.payment_id.clone(),
            transaction_id: booking.transaction_id.clone(),
            paid_at: booking.paid_at,
            created_at: booking.created_at,
        }
    }
}

/// Retrieves the payment status of one order, asking the gateway for
/// its view and degrading gracefully when it does not answer.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown order id and
/// `DomainError::Unauthorized` for a foreign booking. Gateway failures
/// do not error; they degrade the gateway section instead.
pub async fn get_payment_status(
    actor: &Actor,
    order_id: &str,
    bookings: &dyn BookingStore,
    gateway: &dyn PaymentGateway,
    config: &GatewayConfig,
) -> Result<PaymentStatusView, DomainError> {
    let booking = bookings
        .find_by_payment_id(order_id)
        .await?
        .ok_or_else(|| DomainError::NotFound {
            entity: "booking",
            id: order_id.to_owned(),
        })?;
    authz::authorize(
        actor,
        Action::ViewBooking,
        Resource::Booking {
            owner: booking.customer_id,
        },
    )?;

    let request = config.signed_status_query(order_id, &Uuid::new_v4().to_string());
    let gateway_section = match gateway.query_status(&request).await {
        Ok(response) => GatewaySection::Reported(response),
        Err(e @ (DomainError::UpstreamTimeout(_) | DomainError::Infrastructure(_))) => {
            tracing::warn!(order_id, error = %e, "gateway status query unavailable");
            GatewaySection::Unavailable {
                error: "unable to query the payment gateway".to_owned(),
            }
        }
        Err(e) => return Err(e),
    };

    Ok(PaymentStatusView {
        booking_id: booking.id,
        booking_number: booking.booking_number.clone(),
        booking_status: booking.status.as_str(),
        payment_status: booking.payment_status.as_str(),
        payment_method: booking.payment_method.map(|m| m.as_str()),
        amount: booking.total_amount,
        currency: booking.currency.clone(),
        transaction_id: booking.transaction_id.clone(),
        paid_at: booking.paid_at,
        gateway: gateway_section,
    })
}

/// Lists a customer's payment records, newest booking first.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` when a customer asks for another
/// customer's records.
pub async fn list_payment_history(
    actor: &Actor,
    customer_id: Uuid,
    page: Page,
    bookings: &dyn BookingStore,
) -> Result<Vec<PaymentRecordView>, DomainError> {
    authz::authorize(
        actor,
        Action::ViewBooking,
        Resource::Booking { owner: customer_id },
    )?;
    let records = bookings.list_for_customer(customer_id, page).await?;
    Ok(records.iter().map(PaymentRecordView::from_booking).collect())
}

/// Lists bank transfers still awaiting an administrator's confirmation.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` for non-admin actors.
pub async fn list_pending_bank_transfers(
    actor: &Actor,
    bookings: &dyn BookingStore,
) -> Result<Vec<PaymentRecordView>, DomainError> {
    authz::authorize(actor, Action::ConfirmBankTransfer, Resource::Platform)?;
    let records = bookings.list_pending_bank_transfers().await?;
    Ok(records.iter().map(PaymentRecordView::from_booking).collect())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use reefbook_core::actor::{Actor, Role};
    use reefbook_ledger::domain::booking::PaymentMethod;
    use reefbook_ledger::store::BookingStore as _;
    use reefbook_store::memory::InMemoryBookingStore;
    use reefbook_test_support::FixedClock;

    use super::*;
    use crate::gateway::MockGateway;

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn gateway_config() -> GatewayConfig {
        GatewayConfig {
            partner_code: "REEF".to_owned(),
            access_key: "F8BBA842ECF85".to_owned(),
            secret_key: "K951B6PE1waDMi640xX08PD3vg6EkVlz".to_owned(),
            create_endpoint: "https://gateway.test/v2/create".to_owned(),
            query_endpoint: "https://gateway.test/v2/query".to_owned(),
            redirect_url: "https://reefbook.test/payments/return".to_owned(),
            ipn_url: "https://reefbook.test/api/payments/gateway/callback".to_owned(),
            request_timeout_secs: 10,
        }
    }

    /// Helper to seed a booking with an open gateway order.
    async fn seeded_order(
        bookings: &InMemoryBookingStore,
        customer_id: Uuid,
        order_id: &str,
    ) -> Booking {
        let now = fixed_clock().0;
        let mut booking = Booking::new(
            Uuid::new_v4(),
            format!("CR{}", &Uuid::new_v4().simple().to_string()[..10]),
            customer_id,
            Uuid::new_v4(),
            1,
            500_000,
            0.0,
            "VND".to_owned(),
            now,
        );
        booking
            .open_payment(PaymentMethod::Gateway, order_id.to_owned(), now)
            .unwrap();
        bookings.insert(&booking).await.unwrap();
        booking
    }

    #[tokio::test]
    async fn test_get_payment_status_reports_gateway_answer() {
        // Arrange
        let bookings = InMemoryBookingStore::new();
        let customer = Uuid::new_v4();
        seeded_order(&bookings, customer, "CR1-1768471200000").await;

        // Act
        let view = get_payment_status(
            &Actor::new(customer, Role::Customer),
            "CR1-1768471200000",
            &bookings,
            &MockGateway::accepting(),
            &gateway_config(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(view.payment_status, "pending");
        assert_eq!(view.amount, 500_000);
        match view.gateway {
            GatewaySection::Reported(response) => assert_eq!(response.result_code, 0),
            GatewaySection::Unavailable { .. } => panic!("expected a gateway report"),
        }
    }

    #[tokio::test]
    async fn test_get_payment_status_degrades_on_gateway_timeout() {
        // Arrange
        let bookings = InMemoryBookingStore::new();
        let customer = Uuid::new_v4();
        seeded_order(&bookings, customer, "CR2-1768471200000").await;

        // Act
        let view = get_payment_status(
            &Actor::new(customer, Role::Customer),
            "CR2-1768471200000",
            &bookings,
            &MockGateway::timing_out(),
            &gateway_config(),
        )
        .await
        .unwrap();

        // Assert — the local snapshot still answers.
        assert_eq!(view.payment_status, "pending");
        assert!(matches!(view.gateway, GatewaySection::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_get_payment_status_rejects_foreign_customer() {
        // Arrange
        let bookings = InMemoryBookingStore::new();
        seeded_order(&bookings, Uuid::new_v4(), "CR3-1768471200000").await;

        // Act
        let result = get_payment_status(
            &Actor::new(Uuid::new_v4(), Role::Customer),
            "CR3-1768471200000",
            &bookings,
            &MockGateway::accepting(),
            &gateway_config(),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_list_payment_history_is_owner_scoped() {
        // Arrange
        let bookings = InMemoryBookingStore::new();
        let customer = Uuid::new_v4();
        seeded_order(&bookings, customer, "CR4-1").await;
        seeded_order(&bookings, customer, "CR4-2").await;
        seeded_order(&bookings, Uuid::new_v4(), "CR4-3").await;

        // Act
        let own = list_payment_history(
            &Actor::new(customer, Role::Customer),
            customer,
            Page::default(),
            &bookings,
        )
        .await
        .unwrap();
        let foreign = list_payment_history(
            &Actor::new(Uuid::new_v4(), Role::Customer),
            customer,
            Page::default(),
            &bookings,
        )
        .await;

        // Assert
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|r| r.payment_method == Some("gateway")));
        assert!(matches!(foreign, Err(DomainError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_list_pending_bank_transfers_requires_admin() {
        // Arrange
        let bookings = InMemoryBookingStore::new();
        let now = fixed_clock().0;
        let mut wire = Booking::new(
            Uuid::new_v4(),
            "CR5001".to_owned(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            1,
            500_000,
            0.0,
            "VND".to_owned(),
            now,
        );
        wire.open_payment(PaymentMethod::BankTransfer, "CTCR50011234".to_owned(), now)
            .unwrap();
        bookings.insert(&wire).await.unwrap();
        seeded_order(&bookings, Uuid::new_v4(), "CR5-1").await;

        // Act
        let denied =
            list_pending_bank_transfers(&Actor::new(Uuid::new_v4(), Role::Business), &bookings)
                .await;
        let listed = list_pending_bank_transfers(&Actor::new(Uuid::new_v4(), Role::Admin), &bookings)
            .await
            .unwrap();

        // Assert — only the unconfirmed wire shows up.
        assert!(matches!(denied, Err(DomainError::Unauthorized { .. })));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].payment_id.as_deref(), Some("CTCR50011234"));
    }
}
