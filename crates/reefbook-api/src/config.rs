//! Environment configuration.
//!
//! Every setting has a default so a bare `reefbook-api` starts against
//! in-process stores with the gateway's public sandbox credentials.
//! Deployments override through the environment; a variable that is
//! set but unparseable fails startup instead of being ignored.

use std::time::Duration;

use uuid::Uuid;

use reefbook_core::policy::BusinessPolicy;
use reefbook_payments::config::{BankTransferConfig, GatewayConfig};
use reefbook_realtime::hub::DEFAULT_MAX_CONNECTIONS;
use reefbook_scheduler::runner::SchedulerConfig;

use crate::error::AppError;

/// Runtime configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// PostgreSQL connection string; in-process stores when unset.
    pub database_url: Option<String>,
    /// Connection pool cap.
    pub db_max_connections: u32,
    /// Shared secret bearer tokens are signed with.
    pub auth_token_secret: String,
    /// Lifetime of issued tokens, in seconds.
    pub auth_token_ttl_secs: i64,
    /// Cap on concurrent live connections.
    pub max_live_connections: usize,
    /// Administrators known to this deployment.
    pub admin_ids: Vec<Uuid>,
    /// Operational staff known to this deployment.
    pub business_ids: Vec<Uuid>,
    /// Merchant gateway settings.
    pub gateway: GatewayConfig,
    /// Receiving account for bank transfers.
    pub bank: BankTransferConfig,
    /// Background sweep cadences.
    pub scheduler: SchedulerConfig,
    /// Business policy knobs.
    pub policy: BusinessPolicy,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a set variable fails to parse.
    pub fn from_env() -> Result<Config, AppError> {
        let policy_defaults = BusinessPolicy::default();
        let sweep_defaults = SchedulerConfig::default();

        Ok(Config {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parsed("PORT")?.unwrap_or(3000),
            database_url: var("DATABASE_URL"),
            db_max_connections: parsed("DATABASE_MAX_CONNECTIONS")?.unwrap_or(10),
            auth_token_secret: var("AUTH_TOKEN_SECRET")
                .unwrap_or_else(|| "reefbook-dev-secret".to_owned()),
            auth_token_ttl_secs: parsed("AUTH_TOKEN_TTL_SECS")?.unwrap_or(86_400),
            max_live_connections: parsed("MAX_LIVE_CONNECTIONS")?
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            admin_ids: id_list("ADMIN_USER_IDS")?,
            business_ids: id_list("BUSINESS_USER_IDS")?,
            gateway: GatewayConfig {
                partner_code: var("GATEWAY_PARTNER_CODE").unwrap_or_else(|| "MOMO".to_owned()),
                access_key: var("GATEWAY_ACCESS_KEY")
                    .unwrap_or_else(|| "F8BBA842ECF85".to_owned()),
                secret_key: var("GATEWAY_SECRET_KEY")
                    .unwrap_or_else(|| "K951B6PE1waDMi640xX08PD3vg6EkVlz".to_owned()),
                create_endpoint: var("GATEWAY_CREATE_ENDPOINT").unwrap_or_else(|| {
                    "https://test-payment.momo.vn/v2/gateway/api/create".to_owned()
                }),
                query_endpoint: var("GATEWAY_QUERY_ENDPOINT").unwrap_or_else(|| {
                    "https://test-payment.momo.vn/v2/gateway/api/query".to_owned()
                }),
                redirect_url: var("GATEWAY_REDIRECT_URL")
                    .unwrap_or_else(|| "http://localhost:3000/payments/return".to_owned()),
                ipn_url: var("GATEWAY_IPN_URL").unwrap_or_else(|| {
                    "http://localhost:3000/api/payments/gateway/callback".to_owned()
                }),
                request_timeout_secs: parsed("GATEWAY_TIMEOUT_SECS")?.unwrap_or(10),
            },
            bank: BankTransferConfig {
                bank_name: var("BANK_NAME").unwrap_or_else(|| "Vietcombank".to_owned()),
                bank_branch: var("BANK_BRANCH").unwrap_or_else(|| "Nha Trang".to_owned()),
                account_number: var("BANK_ACCOUNT_NUMBER")
                    .unwrap_or_else(|| "0071000888888".to_owned()),
                account_name: var("BANK_ACCOUNT_NAME")
                    .unwrap_or_else(|| "REEFBOOK MARINE JSC".to_owned()),
                note: var("BANK_NOTE").unwrap_or_else(|| {
                    "Cite the transfer code in the wire description".to_owned()
                }),
            },
            scheduler: SchedulerConfig {
                reminder_interval: interval("REMINDER_SWEEP_SECS", sweep_defaults.reminder_interval)?,
                auto_complete_interval: interval(
                    "AUTO_COMPLETE_SWEEP_SECS",
                    sweep_defaults.auto_complete_interval,
                )?,
                payment_reminder_interval: interval(
                    "PAYMENT_REMINDER_SWEEP_SECS",
                    sweep_defaults.payment_reminder_interval,
                )?,
                growth_interval: interval("GROWTH_SWEEP_SECS", sweep_defaults.growth_interval)?,
                cleanup_interval: interval("CLEANUP_SWEEP_SECS", sweep_defaults.cleanup_interval)?,
                dispatch_interval: interval("DISPATCH_SWEEP_SECS", sweep_defaults.dispatch_interval)?,
                weather_interval: interval("WEATHER_SWEEP_SECS", sweep_defaults.weather_interval)?,
                health_interval: interval("HEALTH_SWEEP_SECS", sweep_defaults.health_interval)?,
            },
            policy: BusinessPolicy {
                referral_discount_pct: parsed("REFERRAL_DISCOUNT_PCT")?
                    .unwrap_or(policy_defaults.referral_discount_pct),
                pending_refund_pct: parsed("PENDING_REFUND_PCT")?
                    .unwrap_or(policy_defaults.pending_refund_pct),
                confirmed_refund_pct: parsed("CONFIRMED_REFUND_PCT")?
                    .unwrap_or(policy_defaults.confirmed_refund_pct),
                payment_reminder_days: day_list(
                    "PAYMENT_REMINDER_DAYS",
                    policy_defaults.payment_reminder_days,
                )?,
                experience_reminder_lookahead_hours: parsed("EXPERIENCE_REMINDER_LOOKAHEAD_HOURS")?
                    .unwrap_or(policy_defaults.experience_reminder_lookahead_hours),
                auto_complete_overdue_hours: parsed("AUTO_COMPLETE_OVERDUE_HOURS")?
                    .unwrap_or(policy_defaults.auto_complete_overdue_hours),
                weather_alert_lookahead_hours: parsed("WEATHER_ALERT_LOOKAHEAD_HOURS")?
                    .unwrap_or(policy_defaults.weather_alert_lookahead_hours),
                growth_update_interval_days: parsed("GROWTH_UPDATE_INTERVAL_DAYS")?
                    .unwrap_or(policy_defaults.growth_update_interval_days),
                memory_alert_threshold_mb: parsed("MEMORY_ALERT_THRESHOLD_MB")?
                    .unwrap_or(policy_defaults.memory_alert_threshold_mb),
            },
        })
    }
}

/// A set, non-empty environment variable, trimmed.
fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, AppError>
where
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
        })
        .transpose()
}

fn interval(key: &str, default: Duration) -> Result<Duration, AppError> {
    Ok(parsed::<u64>(key)?.map_or(default, Duration::from_secs))
}

fn id_list(key: &str) -> Result<Vec<Uuid>, AppError> {
    match var(key) {
        Some(raw) => {
            split_ids(&raw).map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
        }
        None => Ok(Vec::new()),
    }
}

fn day_list(key: &str, default: Vec<i64>) -> Result<Vec<i64>, AppError> {
    match var(key) {
        Some(raw) => {
            split_days(&raw).map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
        }
        None => Ok(default),
    }
}

fn split_ids(raw: &str) -> Result<Vec<Uuid>, uuid::Error> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Uuid::parse_str)
        .collect()
}

fn split_days(raw: &str) -> Result<Vec<i64>, std::num::ParseIntError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}
