//! HTTP client for the payments REST API.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::config::StripeConfig;
use crate::error::StripeError;
use crate::webhook::PaymentIntent;

/// One currency bucket of the account balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceAmount {
    /// Minor units.
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default)]
    pub available: Vec<BalanceAmount>,
    #[serde(default)]
    pub pending: Vec<BalanceAmount>,
}

/// Result of a Connect OAuth code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectToken {
    pub access_token: String,
    pub stripe_user_id: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Result<Self, StripeError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    fn post(&self, url: String) -> RequestBuilder {
        self.http.post(url).bearer_auth(self.config.secret_key())
    }

    /// Create an intent for a wallet top-up. The user id travels in
    /// metadata so the webhook can credit the right wallet.
    #[instrument(skip(self))]
    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        user_id: &str,
    ) -> Result<PaymentIntent, StripeError> {
        let form = [
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_string()),
            ("metadata[user_id]", user_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        let url = format!("{}/v1/payment_intents", self.config.base_url);
        send_json(self.post(url).form(&form)).await
    }

    /// Balance of the platform account, or of a connected account when
    /// `connected_account` is set.
    pub async fn retrieve_balance(
        &self,
        connected_account: Option<&str>,
    ) -> Result<Balance, StripeError> {
        let mut req = self
            .http
            .get(format!("{}/v1/balance", self.config.base_url))
            .bearer_auth(self.config.secret_key());
        if let Some(account) = connected_account {
            req = req.header("Stripe-Account", account);
        }
        send_json(req).await
    }

    /// Connect onboarding URL. `None` when no client id is configured.
    pub fn connect_authorize_url(&self, redirect_uri: &str, state: &str) -> Option<String> {
        let client_id = self.config.client_id.as_deref()?;
        Some(format!(
            "{}/oauth/authorize?response_type=code&client_id={}&scope=read_write&redirect_uri={}&state={}",
            self.config.connect_url,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
        ))
    }

    #[instrument(skip(self, code))]
    pub async fn exchange_connect_code(&self, code: &str) -> Result<ConnectToken, StripeError> {
        let form = [("grant_type", "authorization_code"), ("code", code)];
        let url = format!("{}/oauth/token", self.config.connect_url);
        send_json(self.post(url).form(&form)).await
    }
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, StripeError> {
    let resp = req.send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        warn!(status = status.as_u16(), "Stripe request failed");
        return Err(StripeError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}
