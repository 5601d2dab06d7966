//! Webhook signature verification and event payloads.
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`.
//! Each `v1` is an HMAC-SHA256 over `"{t}.{raw body}"` keyed with the
//! endpoint secret; any one matching is enough.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::error::{SignatureError, StripeError};

type HmacSha256 = Hmac<Sha256>;

struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for item in header.split(',') {
        let Some((key, value)) = item.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }
    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(SignatureHeader {
            timestamp,
            signatures,
        }),
        _ => Err(SignatureError::Malformed),
    }
}

/// Verify a signature header against the raw body at a given time.
pub fn verify_signature_at(
    secret: &str,
    header: Option<&str>,
    body: &[u8],
    now_unix: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    let parsed = parse_header(header)?;

    let matched = parsed.signatures.iter().any(|sig| {
        let Ok(expected) = hex::decode(sig) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(parsed.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    });
    if !matched {
        return Err(SignatureError::NoMatch);
    }

    if (now_unix - parsed.timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

/// Verify the signature, then parse the event.
pub fn construct_event(
    secret: &str,
    header: Option<&str>,
    body: &[u8],
    tolerance_secs: i64,
) -> Result<Event, StripeError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    verify_signature_at(secret, header, body, now, tolerance_secs)?;
    Ok(serde_json::from_slice(body)?)
}

/// Produce a header value for `body`. Used by tests and local tooling.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return format!("t={}", timestamp),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

/// A webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
    #[serde(default)]
    pub created: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl Event {
    /// The event object as a payment intent, for `payment_intent.*` events.
    pub fn payment_intent(&self) -> Option<PaymentIntent> {
        if !self.event_type.starts_with("payment_intent.") {
            return None;
        }
        serde_json::from_value(self.data.object.clone()).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Minor units.
    #[serde(default)]
    pub amount: i64,
    /// Minor units actually captured.
    #[serde(default)]
    pub amount_received: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub last_payment_error: Option<Value>,
}

impl PaymentIntent {
    /// Dashboard user the intent was created for.
    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get("user_id")
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Received amount in major units.
    pub fn received_major(&self) -> f64 {
        self.amount_received as f64 / 100.0
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.last_payment_error.as_ref()?.get("message")?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1","amount_received":2500,"currency":"usd","status":"succeeded","metadata":{"user_id":"u1"}}}}"#;

    #[test]
    fn test_valid_signature() {
        let header = sign_payload(SECRET, 1_700_000_000, BODY);
        assert_eq!(
            verify_signature_at(SECRET, Some(&header), BODY, 1_700_000_100, 300),
            Ok(())
        );
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign_payload(SECRET, 1_700_000_000, BODY);
        let tampered = String::from_utf8_lossy(BODY).replace("2500", "250000");
        assert_eq!(
            verify_signature_at(SECRET, Some(&header), tampered.as_bytes(), 1_700_000_000, 300),
            Err(SignatureError::NoMatch)
        );
    }

    #[test]
    fn test_expired_timestamp_rejected() {
        let header = sign_payload(SECRET, 1_700_000_000, BODY);
        assert_eq!(
            verify_signature_at(SECRET, Some(&header), BODY, 1_700_000_301, 300),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_wrong_secret_and_bad_headers() {
        let header = sign_payload("whsec_other", 1_700_000_000, BODY);
        assert_eq!(
            verify_signature_at(SECRET, Some(&header), BODY, 1_700_000_000, 300),
            Err(SignatureError::NoMatch)
        );
        assert_eq!(
            verify_signature_at(SECRET, None, BODY, 0, 300),
            Err(SignatureError::MissingHeader)
        );
        assert_eq!(
            verify_signature_at(SECRET, Some("v1=abc"), BODY, 0, 300),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_any_v1_may_match() {
        let good = sign_payload(SECRET, 1_700_000_000, BODY);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=1700000000,v1=deadbeef,v1={}", good_sig);
        assert!(verify_signature_at(SECRET, Some(&header), BODY, 1_700_000_000, 300).is_ok());
    }

    #[test]
    fn test_payment_intent_from_event() {
        let event: Event = serde_json::from_slice(BODY).unwrap();
        let intent = event.payment_intent().unwrap();
        assert_eq!(intent.user_id(), Some("u1"));
        assert_eq!(intent.received_major(), 25.0);
    }
}
