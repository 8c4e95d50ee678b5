use std::collections::HashMap;

use anyhow::Result;
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

/// Minimal Stripe client built on reqwest: webhook signature verification
/// plus the subscription listing the reconciler needs.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// The checkout session fields the classifier and payment reconciler read.
#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: Option<String>,
    pub mode: Option<String>,
    pub customer: Option<String>,
    pub payment_intent: Option<String>,
    pub payment_status: Option<String>,
    pub amount_subtotal: Option<i64>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    pub cancel_at_period_end: Option<bool>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub billing_cycle_anchor: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
    pub default_payment_method: Option<StripePaymentMethod>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub price: Option<StripePrice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

/// `default_payment_method` arrives as an id string unless the list call
/// expands it. Card display fields are only available on the expanded form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StripePaymentMethod {
    Expanded(StripePaymentMethodObject),
    Reference(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentMethodObject {
    pub id: Option<String>,
    pub card: Option<StripeCard>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCard {
    pub brand: Option<String>,
    pub last4: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscriptionList {
    #[serde(default)]
    data: Vec<StripeSubscription>,
}

impl StripeSubscription {
    /// Returns the subscription period start timestamp, falling back to the
    /// first item or the billing cycle anchor when the top-level field is absent.
    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start
            .or_else(|| {
                self.items
                    .data
                    .first()
                    .and_then(|item| item.current_period_start)
            })
            .or(self.billing_cycle_anchor)
    }

    /// Returns the subscription period end timestamp, falling back to the first item when needed.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }

    pub fn price_id(&self) -> Option<String> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.clone())
    }

    /// Card details, present only when the payment method came back expanded.
    pub fn card(&self) -> Option<&StripeCard> {
        match self.default_payment_method.as_ref()? {
            StripePaymentMethod::Expanded(object) => object.card.as_ref(),
            StripePaymentMethod::Reference(_) => None,
        }
    }
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (stripe_error_type, stripe_error_code, stripe_error_param, stripe_error_message) =
            match serde_json::from_str::<StripeErrorEnvelope>(&body) {
                Ok(envelope) => {
                    let details = envelope.error;
                    (details.type_, details.code, details.param, details.message)
                }
                Err(_) => (None, None, None, None),
            };

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?stripe_error_type,
            stripe_error_code = ?stripe_error_code,
            stripe_error_param = ?stripe_error_param,
            stripe_error_message = ?stripe_error_message,
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    /// Verifies the webhook signature over the exact raw body bytes.
    /// https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        let mut timestamp: Option<String> = None;
        let mut signature: Option<String> = None;

        for part in signature_header.split(',') {
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest.to_string());
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signature = Some(rest.to_string());
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?;
        let signature =
            signature.ok_or_else(|| anyhow::anyhow!("missing v1 in stripe-signature"))?;

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(signed_payload.as_bytes());
        let expected = mac.finalize().into_bytes();
        let provided = hex::decode(signature)?;

        if expected[..] != provided[..] {
            anyhow::bail!("invalid webhook signature");
        }

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }

    /// Lists the customer's subscriptions, newest first, with the default
    /// payment method expanded so card brand/last4 are readable.
    /// https://stripe.com/docs/api/subscriptions/list
    pub async fn list_subscriptions(&self, customer_id: &str) -> Result<Vec<StripeSubscription>> {
        let resp = self
            .http
            .get("https://api.stripe.com/v1/subscriptions")
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(&[
                ("customer", customer_id),
                ("limit", "1"),
                ("status", "all"),
                ("expand[]", "data.default_payment_method"),
            ])
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "list subscriptions").await?;

        let list: StripeSubscriptionList = resp.json().await?;
        Ok(list.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, String::from_utf8_lossy(payload)).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn client() -> StripeClient {
        StripeClient::new("sk_test_123".to_string(), "whsec_test".to_string())
    }

    #[test]
    fn test_verify_webhook_signature_accepts_valid_signature() {
        let payload =
            br#"{"type":"customer.subscription.updated","data":{"object":{"customer":"cus_1"}}}"#;
        let header = format!("t=1700000000,v1={}", sign("whsec_test", "1700000000", payload));

        let event = client()
            .verify_webhook_signature(payload, &header)
            .expect("valid signature should verify");
        assert_eq!(event.type_, "customer.subscription.updated");
    }

    #[test]
    fn test_verify_webhook_signature_rejects_wrong_secret() {
        let payload = br#"{"type":"checkout.session.completed","data":{"object":{}}}"#;
        let header = format!(
            "t=1700000000,v1={}",
            sign("whsec_other", "1700000000", payload)
        );

        assert!(client().verify_webhook_signature(payload, &header).is_err());
    }

    #[test]
    fn test_verify_webhook_signature_rejects_tampered_payload() {
        let payload = br#"{"type":"checkout.session.completed","data":{"object":{}}}"#;
        let header = format!("t=1700000000,v1={}", sign("whsec_test", "1700000000", payload));
        let tampered =
            br#"{"type":"checkout.session.completed","data":{"object":{"amount_total":1}}}"#;

        assert!(client().verify_webhook_signature(tampered, &header).is_err());
    }

    #[test]
    fn test_verify_webhook_signature_requires_header_parts() {
        let payload = br#"{}"#;
        assert!(client().verify_webhook_signature(payload, "v1=abcd").is_err());
        assert!(client().verify_webhook_signature(payload, "t=1700000000").is_err());
        assert!(client().verify_webhook_signature(payload, "").is_err());
    }

    #[test]
    fn test_subscription_period_falls_back_to_items_and_anchor() {
        let subscription: StripeSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "status": "active",
            "billing_cycle_anchor": 1700000000i64,
            "items": {
                "data": [{
                    "current_period_end": 1702592000i64,
                    "price": { "id": "price_1" }
                }]
            }
        }))
        .unwrap();

        assert_eq!(subscription.period_start(), Some(1700000000));
        assert_eq!(subscription.period_end(), Some(1702592000));
        assert_eq!(subscription.price_id(), Some("price_1".to_string()));
    }

    #[test]
    fn test_card_requires_expanded_payment_method() {
        let expanded: StripeSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "status": "active",
            "default_payment_method": {
                "id": "pm_1",
                "card": { "brand": "visa", "last4": "4242" }
            }
        }))
        .unwrap();
        let referenced: StripeSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_2",
            "status": "active",
            "default_payment_method": "pm_2"
        }))
        .unwrap();

        assert_eq!(expanded.card().and_then(|c| c.brand.clone()), Some("visa".to_string()));
        assert!(referenced.card().is_none());
    }
}
