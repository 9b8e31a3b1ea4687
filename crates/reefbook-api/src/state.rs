//! Shared application state.

use std::sync::Arc;

use sqlx::PgPool;

use reefbook_core::clock::{Clock, SystemClock};
use reefbook_core::directory::RecipientDirectory;
use reefbook_core::policy::BusinessPolicy;
use reefbook_ledger::store::{BookingStore, ExperienceStore, PackageStore};
use reefbook_notifications::store::NotificationStore;
use reefbook_payments::config::{BankTransferConfig, GatewayConfig};
use reefbook_payments::gateway::{HttpPaymentGateway, PaymentGateway};
use reefbook_realtime::hub::Hub;
use reefbook_store::memory::{
    InMemoryBookingStore, InMemoryExperienceStore, InMemoryNotificationStore, InMemoryPackageStore,
};
use reefbook_store::pg::{
    PgBookingStore, PgExperienceStore, PgNotificationStore, PgPackageStore,
};

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::directory::RosterDirectory;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Booking records.
    pub bookings: Arc<dyn BookingStore>,
    /// Catalog packages.
    pub packages: Arc<dyn PackageStore>,
    /// Experience sessions.
    pub experiences: Arc<dyn ExperienceStore>,
    /// Notification records.
    pub notifications: Arc<dyn NotificationStore>,
    /// User roster for broadcasts and contact lookups.
    pub directory: Arc<dyn RecipientDirectory>,
    /// Payment gateway client.
    pub gateway: Arc<dyn PaymentGateway>,
    /// Live connection registry.
    pub hub: Arc<Hub>,
    /// Merchant gateway settings.
    pub gateway_config: GatewayConfig,
    /// Receiving account for bank transfers.
    pub bank: BankTransferConfig,
    /// Bearer token verifier.
    pub verifier: TokenVerifier,
    /// Business policy knobs.
    pub policy: BusinessPolicy,
}

impl AppState {
    /// State backed by PostgreSQL stores.
    #[must_use]
    pub fn postgres(pool: PgPool, config: &Config, hub: Arc<Hub>) -> Self {
        Self::with_stores(
            config,
            hub,
            Arc::new(PgBookingStore::new(pool.clone())),
            Arc::new(PgPackageStore::new(pool.clone())),
            Arc::new(PgExperienceStore::new(pool.clone())),
            Arc::new(PgNotificationStore::new(pool)),
        )
    }

    /// State backed by in-process stores. Used when `DATABASE_URL` is
    /// unset; everything is lost on restart.
    #[must_use]
    pub fn in_memory(config: &Config, hub: Arc<Hub>) -> Self {
        Self::with_stores(
            config,
            hub,
            Arc::new(InMemoryBookingStore::new()),
            Arc::new(InMemoryPackageStore::new()),
            Arc::new(InMemoryExperienceStore::new()),
            Arc::new(InMemoryNotificationStore::new()),
        )
    }

    fn with_stores(
        config: &Config,
        hub: Arc<Hub>,
        bookings: Arc<dyn BookingStore>,
        packages: Arc<dyn PackageStore>,
        experiences: Arc<dyn ExperienceStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            bookings,
            packages,
            experiences,
            notifications,
            directory: Arc::new(RosterDirectory::new(
                config.admin_ids.clone(),
                config.business_ids.clone(),
            )),
            gateway: Arc::new(HttpPaymentGateway::new(config.gateway.clone())),
            hub,
            gateway_config: config.gateway.clone(),
            bank: config.bank.clone(),
            verifier: TokenVerifier::new(
                config.auth_token_secret.clone(),
                chrono::Duration::seconds(config.auth_token_ttl_secs),
            ),
            policy: config.policy.clone(),
        }
    }
}
