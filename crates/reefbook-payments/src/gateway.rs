//! Outbound gateway port and adapters.
//!
//! Command handlers talk to the gateway through [`PaymentGateway`] so
//! reconciliation logic stays testable without a network. The HTTP
//! adapter distinguishes timeouts from other transport failures because
//! only timeouts are retryable for the caller.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use reefbook_core::error::DomainError;

use crate::config::GatewayConfig;
use crate::wire::{
    CreatePaymentRequest, CreatePaymentResponse, StatusQueryRequest, StatusQueryResponse,
};

/// Outbound port to the hosted payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submit a signed creation request, returning the gateway's answer.
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<CreatePaymentResponse, DomainError>;

    /// Submit a signed status query, returning the gateway's answer.
    async fn query_status(
        &self,
        request: &StatusQueryRequest,
    ) -> Result<StatusQueryResponse, DomainError>;
}

/// HTTP adapter for the real gateway.
pub struct HttpPaymentGateway {
    config: GatewayConfig,
    http_client: reqwest::Client,
}

impl HttpPaymentGateway {
    /// Build an adapter against the configured endpoints.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }
}

fn transport_error(e: &reqwest::Error) -> DomainError {
    if e.is_timeout() {
        DomainError::UpstreamTimeout(format!("payment gateway: {e}"))
    } else {
        DomainError::Infrastructure(format!("payment gateway: {e}"))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<CreatePaymentResponse, DomainError> {
        tracing::debug!(order_id = %request.order_id, amount = request.amount, "submitting gateway payment");
        let response = self
            .http_client
            .post(&self.config.create_endpoint)
            .timeout(self.timeout())
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        response
            .json::<CreatePaymentResponse>()
            .await
            .map_err(|e| transport_error(&e))
    }

    async fn query_status(
        &self,
        request: &StatusQueryRequest,
    ) -> Result<StatusQueryResponse, DomainError> {
        tracing::debug!(order_id = %request.order_id, "querying gateway payment status");
        let response = self
            .http_client
            .post(&self.config.query_endpoint)
            .timeout(self.timeout())
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        response
            .json::<StatusQueryResponse>()
            .await
            .map_err(|e| transport_error(&e))
    }
}

/// Deterministic gateway double for tests and local development.
///
/// The default accepts every payment with a synthetic pay URL. Declining
/// and timing-out variants exercise the unhappy paths. Every creation
/// request is recorded so tests can inspect what was sent.
#[derive(Debug, Default)]
pub struct MockGateway {
    decline: Option<(i64, String)>,
    time_out: bool,
    create_requests: Mutex<Vec<CreatePaymentRequest>>,
}

impl MockGateway {
    /// A gateway that accepts every payment.
    #[must_use]
    pub fn accepting() -> Self {
        Self::default()
    }

    /// A gateway that declines every payment with the given code.
    #[must_use]
    pub fn declining(result_code: i64, message: &str) -> Self {
        Self {
            decline: Some((result_code, message.to_owned())),
            ..Self::default()
        }
    }

    /// A gateway that times out on every request.
    #[must_use]
    pub fn timing_out() -> Self {
        Self {
            time_out: true,
            ..Self::default()
        }
    }

    /// The creation requests submitted so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn create_requests(&self) -> Vec<CreatePaymentRequest> {
        self.create_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<CreatePaymentResponse, DomainError> {
        self.create_requests.lock().unwrap().push(request.clone());
        if self.time_out {
            return Err(DomainError::UpstreamTimeout(
                "payment gateway: mock timed out".to_owned(),
            ));
        }
        if let Some((result_code, message)) = &self.decline {
            return Ok(CreatePaymentResponse {
                result_code: *result_code,
                message: message.clone(),
                pay_url: None,
                qr_code_url: None,
                deeplink: None,
            });
        }
        Ok(CreatePaymentResponse {
            result_code: 0,
            message: "Success".to_owned(),
            pay_url: Some(format!("https://pay.gateway.test/{}", request.order_id)),
            qr_code_url: Some(format!("https://pay.gateway.test/{}/qr", request.order_id)),
            deeplink: None,
        })
    }

    async fn query_status(
        &self,
        _request: &StatusQueryRequest,
    ) -> Result<StatusQueryResponse, DomainError> {
        if self.time_out {
            return Err(DomainError::UpstreamTimeout(
                "payment gateway: mock timed out".to_owned(),
            ));
        }
        Ok(StatusQueryResponse {
            result_code: 0,
            message: "Success".to_owned(),
            trans_id: Some(4_021_337),
            amount: None,
            pay_type: Some("qr".to_owned()),
        })
    }
}
