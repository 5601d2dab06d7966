//! HTTP client for the CRM REST API.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::GhlConfig;
use crate::error::GhlError;
use crate::types::{
    parse_free_slots, Appointment, Contact, ContactEnvelope, ContactUpdate, DaySlots,
    EventsEnvelope, Location, LocationEnvelope, LocationsEnvelope, NewAppointment, NewTask, Task,
    TaskEnvelope, TokenResponse, UpsertContact, UserType,
};

/// Client for the CRM platform.
///
/// Holds two HTTP clients: one for the token endpoints with the short
/// token timeout, one for everything else.
#[derive(Clone)]
pub struct GhlClient {
    http: Client,
    token_http: Client,
    config: GhlConfig,
}

impl GhlClient {
    pub fn new(config: GhlConfig) -> Result<Self, GhlError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let token_http = Client::builder().timeout(config.token_timeout).build()?;
        Ok(Self {
            http,
            token_http,
            config,
        })
    }

    pub fn config(&self) -> &GhlConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        builder
            .bearer_auth(access_token)
            .header("Version", &self.config.api_version)
            .header("Accept", "application/json")
    }

    /// Exchange an authorization code from the consent redirect.
    #[instrument(skip(self, code), fields(user_type = user_type.as_str()))]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        user_type: UserType,
    ) -> Result<TokenResponse, GhlError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("user_type", user_type.as_str()),
        ];
        self.token_request(&form).await
    }

    /// Trade a refresh token for a new access/refresh pair.
    ///
    /// The caller must persist the returned refresh token before using the
    /// access token; the one passed in is spent.
    #[instrument(skip(self, refresh_token), fields(user_type = user_type.as_str()))]
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        user_type: UserType,
    ) -> Result<TokenResponse, GhlError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("user_type", user_type.as_str()),
        ];
        self.token_request(&form).await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, GhlError> {
        let resp = self
            .token_http
            .post(self.url("/oauth/token"))
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?;
        token_response(resp).await
    }

    /// Mint a sub-account token from an agency access token.
    #[instrument(skip(self, agency_access_token))]
    pub async fn location_token(
        &self,
        agency_access_token: &str,
        company_id: &str,
        location_id: &str,
    ) -> Result<TokenResponse, GhlError> {
        let form = [("companyId", company_id), ("locationId", location_id)];
        let resp = self
            .authed(
                self.token_http.post(self.url("/oauth/locationToken")),
                agency_access_token,
            )
            .form(&form)
            .send()
            .await?;
        token_response(resp).await
    }

    /// List the agency's sub-accounts.
    pub async fn search_locations(
        &self,
        agency_access_token: &str,
        company_id: &str,
    ) -> Result<Vec<Location>, GhlError> {
        let req = self
            .authed(self.http.get(self.url("/locations/search")), agency_access_token)
            .query(&[("companyId", company_id), ("limit", "100")]);
        let envelope: LocationsEnvelope = send_json(req).await?;
        Ok(envelope.locations)
    }

    pub async fn get_location(
        &self,
        access_token: &str,
        location_id: &str,
    ) -> Result<Location, GhlError> {
        let req = self.authed(
            self.http
                .get(self.url(&format!("/locations/{}", location_id))),
            access_token,
        );
        let envelope: LocationEnvelope = send_json(req).await?;
        Ok(envelope.location)
    }

    /// Find an existing contact by phone number. `Ok(None)` when there is none.
    pub async fn find_contact_by_phone(
        &self,
        access_token: &str,
        location_id: &str,
        phone: &str,
    ) -> Result<Option<Contact>, GhlError> {
        self.find_duplicate(access_token, &[("locationId", location_id), ("number", phone)])
            .await
    }

    async fn find_duplicate(
        &self,
        access_token: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Contact>, GhlError> {
        let req = self
            .authed(
                self.http.get(self.url("/contacts/search/duplicate")),
                access_token,
            )
            .query(query);
        let envelope: ContactEnvelope = send_json(req).await?;
        Ok(envelope.contact)
    }

    /// Create or update a contact matched on email/phone.
    #[instrument(skip(self, access_token, contact), fields(location_id = %contact.location_id))]
    pub async fn upsert_contact(
        &self,
        access_token: &str,
        contact: &UpsertContact,
    ) -> Result<Contact, GhlError> {
        let req = self
            .authed(self.http.post(self.url("/contacts/upsert")), access_token)
            .json(contact);
        let envelope: ContactEnvelope = send_json(req).await?;
        envelope.contact.ok_or_else(|| GhlError::Api {
            status: 200,
            body: "upsert response carried no contact".to_string(),
        })
    }

    #[instrument(skip(self, access_token, update))]
    pub async fn update_contact(
        &self,
        access_token: &str,
        contact_id: &str,
        update: &ContactUpdate,
    ) -> Result<Contact, GhlError> {
        let req = self
            .authed(
                self.http.put(self.url(&format!("/contacts/{}", contact_id))),
                access_token,
            )
            .json(update);
        let envelope: ContactEnvelope = send_json(req).await?;
        envelope.contact.ok_or_else(|| GhlError::Api {
            status: 200,
            body: "update response carried no contact".to_string(),
        })
    }

    /// Free slots for a calendar between two epoch-millisecond instants.
    pub async fn free_slots(
        &self,
        access_token: &str,
        calendar_id: &str,
        start_ms: i64,
        end_ms: i64,
        timezone: Option<&str>,
    ) -> Result<Vec<DaySlots>, GhlError> {
        let mut query = vec![
            ("startDate", start_ms.to_string()),
            ("endDate", end_ms.to_string()),
        ];
        if let Some(tz) = timezone {
            query.push(("timezone", tz.to_string()));
        }
        let req = self
            .authed(
                self.http
                    .get(self.url(&format!("/calendars/{}/free-slots", calendar_id))),
                access_token,
            )
            .query(&query);
        let body: Value = send_json(req).await?;
        let days = parse_free_slots(&body);
        debug!(calendar_id, days = days.len(), "Fetched free slots");
        Ok(days)
    }

    #[instrument(skip(self, access_token, appointment), fields(calendar_id = %appointment.calendar_id))]
    pub async fn create_appointment(
        &self,
        access_token: &str,
        appointment: &NewAppointment,
    ) -> Result<Appointment, GhlError> {
        let req = self
            .authed(
                self.http.post(self.url("/calendars/events/appointments")),
                access_token,
            )
            .json(appointment);
        send_json(req).await
    }

    /// Events on a calendar between two epoch-millisecond instants.
    pub async fn list_events(
        &self,
        access_token: &str,
        location_id: &str,
        calendar_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Appointment>, GhlError> {
        let req = self
            .authed(self.http.get(self.url("/calendars/events")), access_token)
            .query(&[
                ("locationId", location_id.to_string()),
                ("calendarId", calendar_id.to_string()),
                ("startTime", start_ms.to_string()),
                ("endTime", end_ms.to_string()),
            ]);
        let envelope: EventsEnvelope = send_json(req).await?;
        Ok(envelope.events)
    }

    #[instrument(skip(self, access_token, task))]
    pub async fn create_task(
        &self,
        access_token: &str,
        contact_id: &str,
        task: &NewTask,
    ) -> Result<Task, GhlError> {
        let req = self
            .authed(
                self.http
                    .post(self.url(&format!("/contacts/{}/tasks", contact_id))),
                access_token,
            )
            .json(task);
        let envelope: TaskEnvelope = send_json(req).await?;
        Ok(envelope.task)
    }
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, GhlError> {
    let resp = req.send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        warn!(status = status.as_u16(), "CRM request failed");
        return Err(GhlError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

async fn token_response(resp: Response) -> Result<TokenResponse, GhlError> {
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_success() {
        return Ok(serde_json::from_str(&body)?);
    }

    let code = status.as_u16();
    if matches!(code, 400 | 401 | 403) {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("error_description")
                    .or_else(|| v.get("message"))
                    .or_else(|| v.get("error"))
                    .and_then(|m| m.as_str().map(str::to_string))
            })
            .unwrap_or(body);
        warn!(status = code, %message, "CRM token endpoint rejected grant");
        return Err(GhlError::TokenRejected {
            status: code,
            message,
        });
    }
    Err(GhlError::Api { status: code, body })
}
