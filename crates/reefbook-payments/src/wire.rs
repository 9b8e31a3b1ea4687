//! Gateway wire contract.
//!
//! Request, response, and webhook payload shapes exchanged with the
//! hosted payment gateway, plus the fixed acknowledgment the webhook
//! must answer with. Field names on the wire are camelCase; the
//! canonical strings signed by [`crate::signature`] order their fields
//! alphabetically by wire name, which is a fixed layout and not
//! something to recompute from the struct.

use serde::{Deserialize, Serialize};

/// Fixed request type for hosted-checkout creation.
pub const REQUEST_TYPE: &str = "payWithMethod";

/// Locale sent with gateway requests.
pub const GATEWAY_LANG: &str = "vi";

/// Payment creation request submitted to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    /// Merchant identifier.
    pub partner_code: String,
    /// Merchant access key.
    pub access_key: String,
    /// Per-request idempotency token.
    pub request_id: String,
    /// Amount in whole currency units.
    pub amount: i64,
    /// Merchant-side order reference, stored as the booking's payment id.
    pub order_id: String,
    /// Human-readable description shown on the checkout page.
    pub order_info: String,
    /// Where the customer lands after checkout.
    pub redirect_url: String,
    /// Where the gateway posts the payment result.
    pub ipn_url: String,
    /// Opaque passthrough data, may be empty.
    pub extra_data: String,
    /// Always [`REQUEST_TYPE`].
    pub request_type: String,
    /// Lowercase hex HMAC over [`Self::canonical_string`].
    pub signature: String,
    /// Always [`GATEWAY_LANG`].
    pub lang: String,
}

impl CreatePaymentRequest {
    /// The canonical string this request is signed over.
    #[must_use]
    pub fn canonical_string(&self) -> String {
        format!(
            "accessKey={}&amount={}&extraData={}&ipnUrl={}&orderId={}&orderInfo={}&partnerCode={}&redirectUrl={}&requestId={}&requestType={}",
            self.access_key,
            self.amount,
            self.extra_data,
            self.ipn_url,
            self.order_id,
            self.order_info,
            self.partner_code,
            self.redirect_url,
            self.request_id,
            self.request_type,
        )
    }
}

/// Gateway answer to a creation request. `resultCode == 0` is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    /// Zero on acceptance, gateway-defined codes otherwise.
    pub result_code: i64,
    /// Gateway-supplied explanation.
    #[serde(default)]
    pub message: String,
    /// Hosted checkout URL, present on acceptance.
    #[serde(default)]
    pub pay_url: Option<String>,
    /// QR-code variant of the checkout URL.
    #[serde(default)]
    pub qr_code_url: Option<String>,
    /// Mobile-app deeplink variant.
    #[serde(default)]
    pub deeplink: Option<String>,
}

/// Webhook payload the gateway posts after the customer pays (or fails
/// to). All reconciliation decisions start from these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCallback {
    /// Merchant identifier.
    pub partner_code: String,
    /// The order reference issued at creation time.
    pub order_id: String,
    /// The idempotency token issued at creation time.
    pub request_id: String,
    /// Amount the gateway settled.
    pub amount: i64,
    /// Description echoed back.
    pub order_info: String,
    /// Gateway-side order classification.
    pub order_type: String,
    /// Gateway transaction identifier.
    pub trans_id: i64,
    /// Zero for a successful payment.
    pub result_code: i64,
    /// Gateway-supplied explanation.
    pub message: String,
    /// Instrument the customer used.
    pub pay_type: String,
    /// Gateway-side settlement time, unix milliseconds.
    pub response_time: i64,
    /// Opaque passthrough data echoed back.
    pub extra_data: String,
    /// Lowercase hex HMAC over [`Self::canonical_string`].
    pub signature: String,
}

impl GatewayCallback {
    /// The canonical string the gateway signed this payload over. The
    /// access key is the merchant's, not carried in the payload.
    #[must_use]
    pub fn canonical_string(&self, access_key: &str) -> String {
        format!(
            "accessKey={access_key}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}&orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}&resultCode={}&transId={}",
            self.amount,
            self.extra_data,
            self.message,
            self.order_id,
            self.order_info,
            self.order_type,
            self.partner_code,
            self.pay_type,
            self.request_id,
            self.response_time,
            self.result_code,
            self.trans_id,
        )
    }
}

/// Status query request submitted to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQueryRequest {
    /// Merchant identifier.
    pub partner_code: String,
    /// Fresh idempotency token for the query itself.
    pub request_id: String,
    /// The order reference to look up.
    pub order_id: String,
    /// Lowercase hex HMAC over [`Self::canonical_string`].
    pub signature: String,
    /// Always [`GATEWAY_LANG`].
    pub lang: String,
}

impl StatusQueryRequest {
    /// The canonical string this query is signed over. The access key
    /// is part of the signature but not of the request body.
    #[must_use]
    pub fn canonical_string(&self, access_key: &str) -> String {
        format!(
            "accessKey={access_key}&orderId={}&partnerCode={}&requestId={}",
            self.order_id, self.partner_code, self.request_id,
        )
    }
}

/// Gateway answer to a status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQueryResponse {
    /// Zero when the payment settled.
    pub result_code: i64,
    /// Gateway-supplied explanation.
    #[serde(default)]
    pub message: String,
    /// Gateway transaction identifier, when settled.
    #[serde(default)]
    pub trans_id: Option<i64>,
    /// Settled amount, when settled.
    #[serde(default)]
    pub amount: Option<i64>,
    /// Instrument the customer used.
    #[serde(default)]
    pub pay_type: Option<String>,
}

/// Fixed two-field acknowledgment the webhook answers with. The gateway
/// retries delivery until it reads `RspCode: "00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    /// Gateway-defined acknowledgment code.
    #[serde(rename = "RspCode")]
    pub rsp_code: &'static str,
    /// Human-readable companion text.
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl WebhookAck {
    /// The payload's signature did not verify. Nothing was changed.
    #[must_use]
    pub fn invalid_signature() -> Self {
        Self { rsp_code: "97", message: "Invalid signature" }
    }

    /// No booking carries the payload's order id.
    #[must_use]
    pub fn booking_not_found() -> Self {
        Self { rsp_code: "01", message: "Booking not found" }
    }

    /// The payload was handled, whether it applied or was a duplicate.
    #[must_use]
    pub fn confirmed() -> Self {
        Self { rsp_code: "00", message: "Confirm Success" }
    }

    /// Processing failed for an internal reason; the gateway may retry.
    #[must_use]
    pub fn internal_error() -> Self {
        Self { rsp_code: "99", message: "Internal error" }
    }
}

/// Static wiring details handed to a customer for a manual bank
/// transfer, assembled from configuration plus the booking's amount and
/// transfer code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankInstructions {
    /// Receiving bank.
    pub bank_name: String,
    /// Receiving branch.
    pub bank_branch: String,
    /// Account to wire to.
    pub account_number: String,
    /// Account holder.
    pub account_name: String,
    /// Amount to wire, whole currency units.
    pub amount: i64,
    /// Code identifying the booking, quoted in the wire.
    pub transfer_code: String,
    /// Exact text the customer must put in the transfer description.
    pub transfer_content: String,
    /// Operator guidance, e.g. expected confirmation delay.
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback() -> GatewayCallback {
        GatewayCallback {
            partner_code: "REEF".to_owned(),
            order_id: "CR17684712000000001-1768471200000".to_owned(),
            request_id: "req-1".to_owned(),
            amount: 900_000,
            order_info: "Coral cultivation booking".to_owned(),
            order_type: "momo_wallet".to_owned(),
            trans_id: 4_021_337,
            result_code: 0,
            message: "Successful.".to_owned(),
            pay_type: "qr".to_owned(),
            response_time: 1_768_471_260_000,
            extra_data: String::new(),
            signature: String::new(),
        }
    }

    #[test]
    fn test_create_request_serializes_camel_case() {
        // Arrange
        let request = CreatePaymentRequest {
            partner_code: "REEF".to_owned(),
            access_key: "F8BBA842ECF85".to_owned(),
            request_id: "req-1".to_owned(),
            amount: 900_000,
            order_id: "CR1-1".to_owned(),
            order_info: "Coral cultivation booking".to_owned(),
            redirect_url: "https://reefbook.test/payments/return".to_owned(),
            ipn_url: "https://reefbook.test/api/payments/gateway/callback".to_owned(),
            extra_data: String::new(),
            request_type: REQUEST_TYPE.to_owned(),
            signature: "abc".to_owned(),
            lang: GATEWAY_LANG.to_owned(),
        };

        // Act
        let value = serde_json::to_value(&request).unwrap();

        // Assert
        assert_eq!(value["partnerCode"], "REEF");
        assert_eq!(value["accessKey"], "F8BBA842ECF85");
        assert_eq!(value["requestId"], "req-1");
        assert_eq!(value["orderId"], "CR1-1");
        assert_eq!(value["redirectUrl"], "https://reefbook.test/payments/return");
        assert_eq!(value["ipnUrl"], "https://reefbook.test/api/payments/gateway/callback");
        assert_eq!(value["requestType"], "payWithMethod");
        assert_eq!(value["lang"], "vi");
    }

    #[test]
    fn test_create_canonical_string_has_fixed_field_order() {
        // Arrange
        let request = CreatePaymentRequest {
            partner_code: "REEF".to_owned(),
            access_key: "AK".to_owned(),
            request_id: "RID".to_owned(),
            amount: 50_000,
            order_id: "OID".to_owned(),
            order_info: "INFO".to_owned(),
            redirect_url: "RURL".to_owned(),
            ipn_url: "IURL".to_owned(),
            extra_data: String::new(),
            request_type: REQUEST_TYPE.to_owned(),
            signature: String::new(),
            lang: GATEWAY_LANG.to_owned(),
        };

        // Act
        let canonical = request.canonical_string();

        // Assert
        assert_eq!(
            canonical,
            "accessKey=AK&amount=50000&extraData=&ipnUrl=IURL&orderId=OID&orderInfo=INFO\
             &partnerCode=REEF&redirectUrl=RURL&requestId=RID&requestType=payWithMethod"
        );
    }

    #[test]
    fn test_callback_canonical_string_has_fixed_field_order() {
        // Act
        let canonical = callback().canonical_string("AK");

        // Assert
        assert_eq!(
            canonical,
            "accessKey=AK&amount=900000&extraData=&message=Successful.\
             &orderId=CR17684712000000001-1768471200000&orderInfo=Coral cultivation booking\
             &orderType=momo_wallet&partnerCode=REEF&payType=qr&requestId=req-1\
             &responseTime=1768471260000&resultCode=0&transId=4021337"
        );
    }

    #[test]
    fn test_callback_deserializes_from_gateway_json() {
        // Arrange
        let body = r#"{
            "partnerCode": "REEF",
            "orderId": "CR1-1",
            "requestId": "req-1",
            "amount": 900000,
            "orderInfo": "Coral cultivation booking",
            "orderType": "momo_wallet",
            "transId": 4021337,
            "resultCode": 0,
            "message": "Successful.",
            "payType": "qr",
            "responseTime": 1768471260000,
            "extraData": "",
            "signature": "deadbeef"
        }"#;

        // Act
        let parsed: GatewayCallback = serde_json::from_str(body).unwrap();

        // Assert
        assert_eq!(parsed.order_id, "CR1-1");
        assert_eq!(parsed.trans_id, 4_021_337);
        assert_eq!(parsed.result_code, 0);
    }

    #[test]
    fn test_webhook_ack_serializes_gateway_field_names() {
        // Act
        let value = serde_json::to_value(WebhookAck::confirmed()).unwrap();

        // Assert
        assert_eq!(value["RspCode"], "00");
        assert_eq!(value["Message"], "Confirm Success");
        assert_eq!(WebhookAck::invalid_signature().rsp_code, "97");
        assert_eq!(WebhookAck::booking_not_found().rsp_code, "01");
        assert_eq!(WebhookAck::internal_error().rsp_code, "99");
    }

    #[test]
    fn test_status_query_canonical_string_has_fixed_field_order() {
        // Arrange
        let request = StatusQueryRequest {
            partner_code: "REEF".to_owned(),
            request_id: "RID".to_owned(),
            order_id: "OID".to_owned(),
            signature: String::new(),
            lang: GATEWAY_LANG.to_owned(),
        };

        // Act & Assert
        assert_eq!(
            request.canonical_string("AK"),
            "accessKey=AK&orderId=OID&partnerCode=REEF&requestId=RID"
        );
    }
}
