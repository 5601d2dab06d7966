//! HTTP client for the telephony REST API.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{info, instrument, warn};

use crate::config::TwilioConfig;
use crate::error::TwilioError;
use crate::types::{
    AvailableNumber, AvailableNumbersPage, CallRecord, IncomingNumber, IncomingNumbersPage,
    NumberWebhooks, TwilioErrorBody,
};

#[derive(Clone)]
pub struct TwilioClient {
    http: Client,
    config: TwilioConfig,
}

impl TwilioClient {
    pub fn new(config: TwilioConfig) -> Result<Self, TwilioError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TwilioConfig {
        &self.config
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.config.account_sid, Some(self.config.auth_token()))
    }

    /// Local numbers available in a country, optionally by area code.
    pub async fn available_numbers(
        &self,
        country: &str,
        area_code: Option<&str>,
        limit: u32,
    ) -> Result<Vec<AvailableNumber>, TwilioError> {
        let mut query = vec![("PageSize", limit.to_string())];
        if let Some(code) = area_code {
            query.push(("AreaCode", code.to_string()));
        }
        let url = self
            .config
            .account_url(&format!("/AvailablePhoneNumbers/{}/Local.json", country));
        let page: AvailableNumbersPage =
            send_json(self.authed(self.http.get(url)).query(&query)).await?;
        Ok(page.available_phone_numbers)
    }

    /// Buy a number and point its webhooks at the dashboard.
    #[instrument(skip(self, webhooks))]
    pub async fn buy_number(
        &self,
        phone_number: &str,
        webhooks: &NumberWebhooks,
    ) -> Result<IncomingNumber, TwilioError> {
        let mut form = webhooks.form();
        form.push(("PhoneNumber", phone_number.to_string()));
        let url = self.config.account_url("/IncomingPhoneNumbers.json");
        let number: IncomingNumber = send_json(self.authed(self.http.post(url)).form(&form)).await?;
        info!(sid = %number.sid, "Purchased number");
        Ok(number)
    }

    /// Look up an owned number by its E.164 value.
    pub async fn find_incoming_number(
        &self,
        phone_number: &str,
    ) -> Result<Option<IncomingNumber>, TwilioError> {
        let url = self.config.account_url("/IncomingPhoneNumbers.json");
        let page: IncomingNumbersPage = send_json(
            self.authed(self.http.get(url))
                .query(&[("PhoneNumber", phone_number)]),
        )
        .await?;
        Ok(page.incoming_phone_numbers.into_iter().next())
    }

    #[instrument(skip(self, webhooks))]
    pub async fn update_webhooks(
        &self,
        sid: &str,
        webhooks: &NumberWebhooks,
    ) -> Result<IncomingNumber, TwilioError> {
        let url = self
            .config
            .account_url(&format!("/IncomingPhoneNumbers/{}.json", sid));
        send_json(self.authed(self.http.post(url)).form(&webhooks.form())).await
    }

    /// Release an owned number.
    #[instrument(skip(self))]
    pub async fn release_number(&self, sid: &str) -> Result<(), TwilioError> {
        let url = self
            .config
            .account_url(&format!("/IncomingPhoneNumbers/{}.json", sid));
        let resp = self.authed(self.http.delete(url)).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), body))
    }

    pub async fn get_call(&self, call_sid: &str) -> Result<CallRecord, TwilioError> {
        let url = self.config.account_url(&format!("/Calls/{}.json", call_sid));
        send_json(self.authed(self.http.get(url))).await
    }
}

fn api_error(status: u16, body: String) -> TwilioError {
    let code = serde_json::from_str::<TwilioErrorBody>(&body)
        .ok()
        .and_then(|b| b.code);
    warn!(status, ?code, "Twilio request failed");
    TwilioError::Api { status, code, body }
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, TwilioError> {
    let resp = req.send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(api_error(status.as_u16(), body));
    }
    Ok(serde_json::from_str(&body)?)
}
