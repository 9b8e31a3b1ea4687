//! Payment adapter configuration.
//!
//! Merchant credentials and endpoints for the hosted gateway, and the
//! static receiving-account details handed out for manual bank
//! transfers. Values are loaded from the environment by the API crate;
//! this module owns the request signing done with them.

use serde::{Deserialize, Serialize};

use crate::signature;
use crate::wire::{
    CreatePaymentRequest, GatewayCallback, StatusQueryRequest, GATEWAY_LANG, REQUEST_TYPE,
};

/// Merchant-side gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Merchant identifier issued by the gateway.
    pub partner_code: String,
    /// Access key quoted inside signed canonical strings.
    pub access_key: String,
    /// HMAC secret. Never leaves this process.
    pub secret_key: String,
    /// Endpoint for payment creation.
    pub create_endpoint: String,
    /// Endpoint for status queries.
    pub query_endpoint: String,
    /// Where the customer lands after hosted checkout.
    pub redirect_url: String,
    /// Public webhook URL the gateway posts results to.
    pub ipn_url: String,
    /// Outbound request timeout, seconds.
    pub request_timeout_secs: u64,
}

impl GatewayConfig {
    /// Build a signed creation request for one order.
    #[must_use]
    pub fn signed_create_request(
        &self,
        amount: i64,
        order_id: &str,
        order_info: &str,
        request_id: &str,
    ) -> CreatePaymentRequest {
        let mut request = CreatePaymentRequest {
            partner_code: self.partner_code.clone(),
            access_key: self.access_key.clone(),
            request_id: request_id.to_owned(),
            amount,
            order_id: order_id.to_owned(),
            order_info: order_info.to_owned(),
            redirect_url: self.redirect_url.clone(),
            ipn_url: self.ipn_url.clone(),
            extra_data: String::new(),
            request_type: REQUEST_TYPE.to_owned(),
            signature: String::new(),
            lang: GATEWAY_LANG.to_owned(),
        };
        request.signature = signature::sign(&self.secret_key, &request.canonical_string());
        request
    }

    /// Build a signed status query for one order.
    #[must_use]
    pub fn signed_status_query(&self, order_id: &str, request_id: &str) -> StatusQueryRequest {
        let mut request = StatusQueryRequest {
            partner_code: self.partner_code.clone(),
            request_id: request_id.to_owned(),
            order_id: order_id.to_owned(),
            signature: String::new(),
            lang: GATEWAY_LANG.to_owned(),
        };
        request.signature =
            signature::sign(&self.secret_key, &request.canonical_string(&self.access_key));
        request
    }

    /// Verify a webhook payload against its own fields. A payload whose
    /// signature does not match must not change anything.
    #[must_use]
    pub fn verify_callback(&self, callback: &GatewayCallback) -> bool {
        signature::verify(
            &self.secret_key,
            &callback.canonical_string(&self.access_key),
            &callback.signature,
        )
    }
}

/// Receiving-account details for manual bank transfers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransferConfig {
    /// Receiving bank.
    pub bank_name: String,
    /// Receiving branch.
    pub bank_branch: String,
    /// Account to wire to.
    pub account_number: String,
    /// Account holder.
    pub account_name: String,
    /// Operator guidance included with every instruction set.
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
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

    #[test]
    fn test_signed_create_request_carries_verifiable_signature() {
        // Arrange
        let config = config();

        // Act
        let request = config.signed_create_request(900_000, "CR1-1", "Coral booking", "req-1");

        // Assert
        assert_eq!(request.amount, 900_000);
        assert_eq!(request.request_type, "payWithMethod");
        assert_eq!(request.lang, "vi");
        assert!(signature::verify(
            &config.secret_key,
            &request.canonical_string(),
            &request.signature
        ));
    }

    #[test]
    fn test_signed_status_query_carries_verifiable_signature() {
        // Arrange
        let config = config();

        // Act
        let request = config.signed_status_query("CR1-1", "req-2");

        // Assert
        assert!(signature::verify(
            &config.secret_key,
            &request.canonical_string(&config.access_key),
            &request.signature
        ));
    }

    #[test]
    fn test_verify_callback_rejects_tampered_amount() {
        // Arrange
        let config = config();
        let mut callback = GatewayCallback {
            partner_code: "REEF".to_owned(),
            order_id: "CR1-1".to_owned(),
            request_id: "req-1".to_owned(),
            amount: 900_000,
            order_info: "Coral booking".to_owned(),
            order_type: "momo_wallet".to_owned(),
            trans_id: 4_021_337,
            result_code: 0,
            message: "Successful.".to_owned(),
            pay_type: "qr".to_owned(),
            response_time: 1_768_471_260_000,
            extra_data: String::new(),
            signature: String::new(),
        };
        callback.signature = signature::sign(
            &config.secret_key,
            &callback.canonical_string(&config.access_key),
        );

        // Act & Assert
        assert!(config.verify_callback(&callback));
        callback.amount = 1;
        assert!(!config.verify_callback(&callback));
    }
}
