//! REST resource types.

use serde::{Deserialize, Serialize};

/// A number offered for purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableNumber {
    pub phone_number: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailableNumbersPage {
    #[serde(default)]
    pub available_phone_numbers: Vec<AvailableNumber>,
}

/// A number owned by the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingNumber {
    pub sid: String,
    pub phone_number: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub voice_url: Option<String>,
    #[serde(default)]
    pub sms_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IncomingNumbersPage {
    #[serde(default)]
    pub incoming_phone_numbers: Vec<IncomingNumber>,
}

/// Webhook URLs configured on an incoming number.
#[derive(Debug, Clone)]
pub struct NumberWebhooks {
    pub voice_url: String,
    pub sms_url: Option<String>,
}

impl NumberWebhooks {
    pub(crate) fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("VoiceUrl", self.voice_url.clone()),
            ("VoiceMethod", "POST".to_string()),
        ];
        if let Some(sms) = &self.sms_url {
            form.push(("SmsUrl", sms.clone()));
            form.push(("SmsMethod", "POST".to_string()));
        }
        form
    }
}

/// A call record. `price` is negative for charges, as Twilio reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub price_unit: Option<String>,
}

impl CallRecord {
    /// Absolute charged amount, when Twilio has priced the call.
    pub fn charge(&self) -> Option<f64> {
        self.price.as_deref()?.parse::<f64>().ok().map(f64::abs)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TwilioErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_charge_is_absolute() {
        let record = CallRecord {
            sid: "CA1".to_string(),
            status: Some("completed".to_string()),
            duration: Some("61".to_string()),
            price: Some("-0.0085".to_string()),
            price_unit: Some("USD".to_string()),
        };
        assert_eq!(record.charge(), Some(0.0085));
    }

    #[test]
    fn test_unpriced_call() {
        let record: CallRecord = serde_json::from_str(r#"{"sid":"CA2","price":null}"#).unwrap();
        assert_eq!(record.charge(), None);
    }
}
