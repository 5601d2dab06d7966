//! Shared harness: the full router over an in-memory database, with every
//! vendor pointed at one mock server.

#![allow(dead_code)]

use agent_tools::ToolsConfig;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use dashboard::auth::issue_access_token;
use dashboard::{app, AppState, Config, Vendors};
use database::assistant::{self, NewAssistant};
use database::models::NewUser;
use database::{billing, number, sub_account, user, Database};
use ghl_client::{GhlClient, GhlConfig};
use serde_json::Value;
use stripe_client::{StripeClient, StripeConfig};
use tower::ServiceExt;
use twilio_client::{TwilioClient, TwilioConfig};
use vapi_client::{VapiClient, VapiConfig};
use wiremock::MockServer;

pub const USER_ID: &str = "user-1";
pub const ACCOUNT_ID: &str = "loc-1";
pub const ASSISTANT_ID: &str = "asst-1";
pub const PHONE: &str = "+15550001111";
pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const TWILIO_SID: &str = "AC123";
pub const TWILIO_TOKEN: &str = "twilio-token";
pub const VAPI_SECRET: &str = "vapi-server-secret";

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub server: MockServer,
    pub config: Config,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }

    pub fn location(&self) -> String {
        self.headers
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }
}

impl TestApp {
    /// Router with a registered user and nothing else.
    pub async fn new() -> Self {
        let db = Database::in_memory().await.unwrap();
        let server = MockServer::start().await;
        let config = Config::new("test-jwt-secret")
            .with_public_url("https://dash.example.com")
            .with_frontend_url("https://app.example.com");

        let vendors = Vendors {
            ghl: GhlClient::new(GhlConfig::new("client-id", "client-secret").with_base_url(server.uri()))
                .unwrap(),
            vapi: VapiClient::new(
                VapiConfig::new("vapi-key")
                    .with_base_url(server.uri())
                    .with_server_secret(VAPI_SECRET),
            )
            .unwrap(),
            twilio: TwilioClient::new(
                TwilioConfig::new(TWILIO_SID, TWILIO_TOKEN).with_base_url(server.uri()),
            )
            .unwrap(),
            stripe: StripeClient::new(
                StripeConfig::new("sk_test", WEBHOOK_SECRET).with_base_url(server.uri()),
            )
            .unwrap(),
            tools: ToolsConfig::default(),
            mailer: None,
        };
        let state = AppState::new(db.clone(), config.clone(), vendors).unwrap();

        user::create_user(
            db.pool(),
            &NewUser {
                id: USER_ID.to_string(),
                email: "owner@agency.io".to_string(),
                name: "Owner".to_string(),
                password_hash: "unused".to_string(),
            },
        )
        .await
        .unwrap();

        Self {
            router: app(state),
            db,
            server,
            config,
        }
    }

    /// Router with a connected sub-account, an assistant and one number.
    pub async fn with_assistant() -> Self {
        let app = Self::new().await;
        let pool = app.db.pool();
        sub_account::import_sub_account(pool, USER_ID, ACCOUNT_ID, "Clinic", "refresh-0", 86_400)
            .await
            .unwrap();
        assistant::create_assistant(
            pool,
            &NewAssistant {
                assistant_id: ASSISTANT_ID.to_string(),
                user_id: USER_ID.to_string(),
                account_id: ACCOUNT_ID.to_string(),
                name: "Front desk".to_string(),
                calendar_id: Some("cal-1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        number::add_number(pool, ASSISTANT_ID, PHONE, "vapi-num-1", "PN111")
            .await
            .unwrap();
        app
    }

    pub async fn fund_wallet(&self, amount: f64) {
        billing::record_payment(self.db.pool(), USER_ID, "pi_seed", amount, "usd", "succeeded")
            .await
            .unwrap();
    }

    pub async fn balance(&self) -> f64 {
        user::wallet_balance(self.db.pool(), USER_ID).await.unwrap()
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", issue_access_token(USER_ID, &self.config).unwrap())
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(
            Request::get(uri)
                .header(header::AUTHORIZATION, self.bearer())
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(header::AUTHORIZATION, self.bearer())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(
            Request::delete(uri)
                .header(header::AUTHORIZATION, self.bearer())
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// JSON post carrying the AI platform's shared secret.
    pub async fn webhook(&self, uri: &str, body: Value) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .header(vapi_client::SECRET_HEADER, VAPI_SECRET)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Form post signed the way the telephony provider signs it.
    pub fn twilio_request(&self, uri: &str, params: &[(&str, &str)]) -> Request<Body> {
        let owned: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let signature = twilio_client::sign_request(TWILIO_TOKEN, &self.config.public(uri), &owned);
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(twilio_client::SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap()
    }
}
