//! HTTP-level tests against a mock telephony server.

use serde_json::json;
use twilio_client::{NumberWebhooks, TwilioClient, TwilioConfig, TwilioError};
use wiremock::matchers::{body_string_contains, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCOUNT: &str = "AC123";

fn client_for(server: &MockServer) -> TwilioClient {
    TwilioClient::new(TwilioConfig::new(ACCOUNT, "auth-token").with_base_url(server.uri())).unwrap()
}

fn account_path(rest: &str) -> String {
    format!("/2010-04-01/Accounts/{}{}", ACCOUNT, rest)
}

#[tokio::test]
async fn test_available_numbers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(account_path("/AvailablePhoneNumbers/US/Local.json")))
        .and(query_param("AreaCode", "512"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "available_phone_numbers": [
                {"phone_number": "+15125550100", "friendly_name": "(512) 555-0100",
                 "locality": "Austin", "region": "TX"}
            ]
        })))
        .mount(&server)
        .await;

    let numbers = client_for(&server)
        .available_numbers("US", Some("512"), 10)
        .await
        .unwrap();
    assert_eq!(numbers.len(), 1);
    assert_eq!(numbers[0].locality.as_deref(), Some("Austin"));
}

#[tokio::test]
async fn test_buy_number_sets_voice_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(account_path("/IncomingPhoneNumbers.json")))
        .and(body_string_contains("PhoneNumber=%2B15125550100"))
        .and(body_string_contains("VoiceMethod=POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "sid": "PN1",
            "phone_number": "+15125550100",
            "voice_url": "https://dash.example.com/webhooks/twilio/loc/asst"
        })))
        .mount(&server)
        .await;

    let webhooks = NumberWebhooks {
        voice_url: "https://dash.example.com/webhooks/twilio/loc/asst".to_string(),
        sms_url: None,
    };
    let number = client_for(&server)
        .buy_number("+15125550100", &webhooks)
        .await
        .unwrap();
    assert_eq!(number.sid, "PN1");
}

#[tokio::test]
async fn test_release_number_error_carries_code() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(account_path("/IncomingPhoneNumbers/PN404.json")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 20404,
            "message": "The requested resource was not found",
            "status": 404
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).release_number("PN404").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, TwilioError::Api { code: Some(20404), .. }));
}

#[tokio::test]
async fn test_find_incoming_number_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(account_path("/IncomingPhoneNumbers.json")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"incoming_phone_numbers": []})),
        )
        .mount(&server)
        .await;

    let found = client_for(&server)
        .find_incoming_number("+15125550199")
        .await
        .unwrap();
    assert!(found.is_none());
}
