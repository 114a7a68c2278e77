//! Stripe integration via REST API (no SDK dependency)

use hmac::{Hmac, Mac};
use sha2::Sha256;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A created PaymentIntent
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Create a PaymentIntent for an order total (amount in cents)
pub async fn create_payment_intent(
    secret_key: &str,
    amount_cents: i64,
    currency: &str,
    order_id: &str,
    user_id: &str,
) -> Result<PaymentIntent, BoxError> {
    let client = reqwest::Client::new();
    let amount = amount_cents.to_string();
    let resp: serde_json::Value = client
        .post("https://api.stripe.com/v1/payment_intents")
        .basic_auth(secret_key, None::<&str>)
        .form(&[
            ("amount", amount.as_str()),
            ("currency", currency),
            ("metadata[order_id]", order_id),
            ("metadata[user_id]", user_id),
        ])
        .send()
        .await?
        .json()
        .await?;

    match (resp["id"].as_str(), resp["client_secret"].as_str()) {
        (Some(id), Some(client_secret)) => Ok(PaymentIntent {
            id: id.to_string(),
            client_secret: client_secret.to_string(),
        }),
        _ => Err(format!("Stripe create_payment_intent failed: {resp}").into()),
    }
}

/// Refund a PaymentIntent (amount in cents); returns the refund id
pub async fn create_refund(
    secret_key: &str,
    payment_intent_id: &str,
    amount_cents: i64,
    reason: Option<&str>,
) -> Result<String, BoxError> {
    let client = reqwest::Client::new();
    let amount = amount_cents.to_string();
    let mut form = vec![
        ("payment_intent", payment_intent_id),
        ("amount", amount.as_str()),
    ];
    // Stripe only accepts its own reason vocabulary; anything else goes in metadata
    if let Some(r) = reason
        && matches!(r, "duplicate" | "fraudulent" | "requested_by_customer")
    {
        form.push(("reason", r));
    }

    let resp: serde_json::Value = client
        .post("https://api.stripe.com/v1/refunds")
        .basic_auth(secret_key, None::<&str>)
        .form(&form)
        .send()
        .await?
        .json()
        .await?;

    resp["id"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| format!("Stripe create_refund failed: {resp}").into())
}

/// Create a Stripe Customer
pub async fn create_customer(
    secret_key: &str,
    email: &str,
    user_id: &str,
) -> Result<String, BoxError> {
    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post("https://api.stripe.com/v1/customers")
        .basic_auth(secret_key, None::<&str>)
        .form(&[("email", email), ("metadata[user_id]", user_id)])
        .send()
        .await?
        .json()
        .await?;

    resp["id"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| format!("Stripe create_customer failed: {resp}").into())
}

/// Create a Stripe Checkout Session (subscription mode)
pub async fn create_checkout_session(
    secret_key: &str,
    customer_id: &str,
    price_id: &str,
    plan: &str,
    success_url: &str,
    cancel_url: &str,
) -> Result<String, BoxError> {
    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post("https://api.stripe.com/v1/checkout/sessions")
        .basic_auth(secret_key, None::<&str>)
        .form(&[
            ("customer", customer_id),
            ("mode", "subscription"),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("allow_promotion_codes", "true"),
            ("metadata[plan]", plan),
        ])
        .send()
        .await?
        .json()
        .await?;

    resp["url"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| format!("Stripe create_checkout failed: {resp}").into())
}

/// Create a Stripe Billing Portal session
pub async fn create_billing_portal_session(
    secret_key: &str,
    customer_id: &str,
    return_url: &str,
) -> Result<String, BoxError> {
    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post("https://api.stripe.com/v1/billing_portal/sessions")
        .basic_auth(secret_key, None::<&str>)
        .form(&[("customer", customer_id), ("return_url", return_url)])
        .send()
        .await?
        .json()
        .await?;

    resp["url"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| format!("Stripe billing portal failed: {resp}").into())
}

/// Flag a subscription to end at the current period boundary
pub async fn cancel_subscription_at_period_end(
    secret_key: &str,
    subscription_id: &str,
) -> Result<(), BoxError> {
    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post(format!(
            "https://api.stripe.com/v1/subscriptions/{subscription_id}"
        ))
        .basic_auth(secret_key, None::<&str>)
        .form(&[("cancel_at_period_end", "true")])
        .send()
        .await?
        .json()
        .await?;

    if resp["id"].as_str().is_some() {
        Ok(())
    } else {
        Err(format!("Stripe cancel_subscription failed: {resp}").into())
    }
}

/// Verify Stripe webhook signature (HMAC-SHA256)
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }

    if timestamp.is_empty() || signature.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let signed_payload = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap_or(""));
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(signed_payload.as_bytes());

    // Decode hex signature and use constant-time comparison via hmac::verify_slice
    let sig_bytes = hex::decode(signature).map_err(|_| "Invalid signature hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Webhook signature mismatch")?;

    // Reject events older than 5 minutes to prevent replay attacks
    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > 300 {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], timestamp: i64, secret: &str) -> String {
        let signed_payload = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap());
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(payload, ts, "whsec_test");
        let header = format!("t={ts},v1={sig}");
        assert!(verify_webhook_signature(payload, &header, "whsec_test").is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(payload, ts, "whsec_test");
        let header = format!("t={ts},v1={sig}");
        let tampered = br#"{"id":"evt_2","type":"payment_intent.succeeded"}"#;
        assert_eq!(
            verify_webhook_signature(tampered, &header, "whsec_test"),
            Err("Webhook signature mismatch")
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"{}";
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(payload, ts, "whsec_a");
        let header = format!("t={ts},v1={sig}");
        assert!(verify_webhook_signature(payload, &header, "whsec_b").is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let ts = chrono::Utc::now().timestamp() - 600;
        let sig = sign(payload, ts, "whsec_test");
        let header = format!("t={ts},v1={sig}");
        assert_eq!(
            verify_webhook_signature(payload, &header, "whsec_test"),
            Err("Webhook timestamp too old")
        );
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(verify_webhook_signature(b"{}", "", "whsec_test").is_err());
        assert!(verify_webhook_signature(b"{}", "t=123", "whsec_test").is_err());
        assert!(verify_webhook_signature(b"{}", "v1=abcd", "whsec_test").is_err());
        assert!(verify_webhook_signature(b"{}", "t=123,v1=not-hex", "whsec_test").is_err());
    }
}
