//! In-process fixtures shared by router tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use reefbook_core::actor::Actor;
use reefbook_core::policy::BusinessPolicy;
use reefbook_ledger::domain::booking::Booking;
use reefbook_ledger::domain::package::Package;
use reefbook_ledger::store::{BookingStore as _, PackageStore as _};
use reefbook_payments::config::{BankTransferConfig, GatewayConfig};
use reefbook_payments::gateway::MockGateway;
use reefbook_realtime::hub::Hub;
use reefbook_store::memory::{
    InMemoryBookingStore, InMemoryExperienceStore, InMemoryNotificationStore, InMemoryPackageStore,
};
use reefbook_test_support::FixedClock;

use crate::auth::TokenVerifier;
use crate::directory::RosterDirectory;
use crate::state::AppState;

/// The moment every router test runs at.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// Gateway sandbox credentials used across tests.
pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        partner_code: "REEF".to_owned(),
        access_key: "F8BBA842ECF85".to_owned(),
        secret_key: "K951B6PE1waDMi640xX08PD3vg6EkVlz".to_owned(),
        create_endpoint: "https://gateway.test/create".to_owned(),
        query_endpoint: "https://gateway.test/query".to_owned(),
        redirect_url: "https://reefbook.test/payments/return".to_owned(),
        ipn_url: "https://reefbook.test/api/payments/gateway/callback".to_owned(),
        request_timeout_secs: 5,
    }
}

fn bank_config() -> BankTransferConfig {
    BankTransferConfig {
        bank_name: "Vietcombank".to_owned(),
        bank_branch: "Nha Trang".to_owned(),
        account_number: "0071000888888".to_owned(),
        account_name: "REEFBOOK MARINE JSC".to_owned(),
        note: "Cite the transfer code in the wire description".to_owned(),
    }
}

/// An in-process state with memory stores and an accepting gateway.
pub fn state() -> AppState {
    state_with_gateway(MockGateway::accepting())
}

/// Same as [`state`], with the given gateway double.
pub fn state_with_gateway(gateway: MockGateway) -> AppState {
    AppState {
        clock: Arc::new(FixedClock(fixed_now())),
        bookings: Arc::new(InMemoryBookingStore::new()),
        packages: Arc::new(InMemoryPackageStore::new()),
        experiences: Arc::new(InMemoryExperienceStore::new()),
        notifications: Arc::new(InMemoryNotificationStore::new()),
        directory: Arc::new(RosterDirectory::default()),
        gateway: Arc::new(gateway),
        hub: Arc::new(Hub::default()),
        gateway_config: gateway_config(),
        bank: bank_config(),
        verifier: TokenVerifier::new("router-test-secret", chrono::Duration::hours(1)),
        policy: BusinessPolicy::default(),
    }
}

/// `Authorization` header value authenticating `actor`.
pub fn bearer(state: &AppState, actor: Actor) -> String {
    format!(
        "Bearer {}",
        state.verifier.issue(actor.user_id, actor.role, fixed_now())
    )
}

static BOOKING_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_booking_number() -> String {
    let seq = BOOKING_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("CR1737{seq:010}")
}

/// Insert an on-sale package and return it.
pub async fn seeded_package(state: &AppState) -> Package {
    let package = Package::new(
        Uuid::new_v4(),
        "Staghorn starter".to_owned(),
        "Acropora cervicornis".to_owned(),
        "Nha Trang".to_owned(),
        500_000,
        "VND".to_owned(),
        6,
        10,
        fixed_now(),
    );
    state.packages.insert(&package).await.unwrap();
    package
}

/// Insert a pending booking for `customer_id` under `package_id`.
pub async fn seeded_booking(state: &AppState, customer_id: Uuid, package_id: Uuid) -> Booking {
    let booking = Booking::new(
        Uuid::new_v4(),
        next_booking_number(),
        customer_id,
        package_id,
        2,
        500_000,
        0.0,
        "VND".to_owned(),
        fixed_now(),
    );
    state.bookings.insert(&booking).await.unwrap();
    booking
}

/// Insert a paid, confirmed booking.
pub async fn seeded_paid_booking(state: &AppState, customer_id: Uuid, package_id: Uuid) -> Booking {
    let mut booking = Booking::new(
        Uuid::new_v4(),
        next_booking_number(),
        customer_id,
        package_id,
        2,
        500_000,
        0.0,
        "VND".to_owned(),
        fixed_now(),
    );
    booking.confirm_payment("GW-SEED", fixed_now()).unwrap();
    state.bookings.insert(&booking).await.unwrap();
    booking
}
