//! Khalti ePayment integration via REST API (no SDK dependency)
//!
//! Two operations are consumed: `initiate` (returns a hosted payment page URL
//! plus the `pidx` correlation id) and `lookup` (server-side verification of a
//! payment's actual state — the redirect callback's own status parameter is
//! never trusted).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A hung gateway must not block a checkout request indefinitely.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Customer details forwarded to the gateway's payment page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Payment initiation request (amounts in paisa, the gateway's minor unit)
#[derive(Debug, Clone, Serialize)]
pub struct InitiateRequest {
    pub amount: i64,
    pub return_url: String,
    pub website_url: String,
    pub purchase_order_id: String,
    pub purchase_order_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_info: Option<CustomerInfo>,
}

/// Successful initiation: correlation id + hosted payment page
#[derive(Debug, Clone, Deserialize)]
pub struct InitiateResponse {
    pub pidx: String,
    pub payment_url: String,
}

/// Verified payment state as reported by the gateway's lookup endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LookupResponse {
    pub pidx: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub total_amount: Option<i64>,
}

impl LookupResponse {
    pub fn lookup_status(&self) -> LookupStatus {
        LookupStatus::parse(&self.status)
    }
}

/// Typed lookup states. Khalti reports these as free-form strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupStatus {
    Completed,
    Pending,
    Initiated,
    Expired,
    UserCanceled,
    Refunded,
    Other(String),
}

impl LookupStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "Completed" => Self::Completed,
            "Pending" => Self::Pending,
            "Initiated" => Self::Initiated,
            "Expired" => Self::Expired,
            "User canceled" => Self::UserCanceled,
            "Refunded" | "Partially refunded" => Self::Refunded,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Seam over the external payment provider, mockable in tests.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Start a payment; returns the correlation id and redirect URL.
    async fn initiate(&self, req: &InitiateRequest) -> Result<InitiateResponse, BoxError>;

    /// Verify a payment's server-side state by correlation id.
    async fn lookup(&self, pidx: &str) -> Result<LookupResponse, BoxError>;
}

/// Khalti ePayment REST client
pub struct KhaltiClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl KhaltiClient {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Result<Self, BoxError> {
        let http = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            secret_key: secret_key.into(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.secret_key)
    }
}

#[async_trait]
impl PaymentGateway for KhaltiClient {
    async fn initiate(&self, req: &InitiateRequest) -> Result<InitiateResponse, BoxError> {
        let resp: serde_json::Value = self
            .http
            .post(format!("{}/epayment/initiate/", self.base_url))
            .header("Authorization", self.auth_header())
            .json(req)
            .send()
            .await?
            .json()
            .await?;

        match (resp["pidx"].as_str(), resp["payment_url"].as_str()) {
            (Some(pidx), Some(payment_url)) => Ok(InitiateResponse {
                pidx: pidx.to_string(),
                payment_url: payment_url.to_string(),
            }),
            _ => Err(format!("Khalti initiate failed: {resp}").into()),
        }
    }

    async fn lookup(&self, pidx: &str) -> Result<LookupResponse, BoxError> {
        let resp: serde_json::Value = self
            .http
            .post(format!("{}/epayment/lookup/", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({ "pidx": pidx }))
            .send()
            .await?
            .json()
            .await?;

        if resp["status"].as_str().is_none() {
            return Err(format!("Khalti lookup failed: {resp}").into());
        }
        Ok(serde_json::from_value(resp)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_status_parse() {
        assert_eq!(LookupStatus::parse("Completed"), LookupStatus::Completed);
        assert_eq!(LookupStatus::parse("Pending"), LookupStatus::Pending);
        assert_eq!(LookupStatus::parse("Initiated"), LookupStatus::Initiated);
        assert_eq!(LookupStatus::parse("Expired"), LookupStatus::Expired);
        assert_eq!(
            LookupStatus::parse("User canceled"),
            LookupStatus::UserCanceled
        );
        assert_eq!(LookupStatus::parse("Refunded"), LookupStatus::Refunded);
        assert_eq!(
            LookupStatus::parse("Partially refunded"),
            LookupStatus::Refunded
        );
        assert_eq!(
            LookupStatus::parse("Bank processing"),
            LookupStatus::Other("Bank processing".to_string())
        );
    }

    #[test]
    fn test_initiate_request_serialization() {
        let req = InitiateRequest {
            amount: 100_000,
            return_url: "https://shop.example/api/orders/payment/verify".into(),
            website_url: "https://shop.example".into(),
            purchase_order_id: "42".into(),
            purchase_order_name: "Order #42".into(),
            customer_info: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["amount"], 100_000);
        assert_eq!(json["purchase_order_id"], "42");
        // Absent customer info is omitted entirely, not sent as null
        assert!(json.get("customer_info").is_none());
    }

    #[test]
    fn test_lookup_response_deserialization() {
        let json = r#"{
            "pidx": "HT6o6PEZRWFJ5ygavzHWd5",
            "total_amount": 100000,
            "status": "Completed",
            "transaction_id": "GFq9PFS7b2iYvL8Lir9oXe",
            "fee": 3000,
            "refunded": false
        }"#;
        let resp: LookupResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.pidx, "HT6o6PEZRWFJ5ygavzHWd5");
        assert_eq!(resp.lookup_status(), LookupStatus::Completed);
        assert_eq!(resp.transaction_id.as_deref(), Some("GFq9PFS7b2iYvL8Lir9oXe"));
        assert_eq!(resp.total_amount, Some(100_000));
    }

    #[test]
    fn test_lookup_response_without_transaction() {
        let json = r#"{"pidx": "abc", "status": "Expired", "transaction_id": null}"#;
        let resp: LookupResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.lookup_status(), LookupStatus::Expired);
        assert!(resp.transaction_id.is_none());
    }
}
