//! Phone numbers and call-leg lookups across the AI platform and telephony provider.

mod common;

use axum::http::StatusCode;
use common::{TestApp, ACCOUNT_ID, ASSISTANT_ID, PHONE, TWILIO_SID};
use database::number;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn number_uri() -> String {
    format!(
        "/assistants/{}/{}/numbers/%2B15550001111",
        ACCOUNT_ID, ASSISTANT_ID
    )
}

fn twilio_number_path(sid: &str) -> String {
    format!(
        "/2010-04-01/Accounts/{}/IncomingPhoneNumbers/{}.json",
        TWILIO_SID, sid
    )
}

async fn still_attached(app: &TestApp) -> bool {
    number::number_exists(app.db.pool(), PHONE).await.unwrap()
}

#[tokio::test]
async fn test_delete_removes_everywhere() {
    let app = TestApp::with_assistant().await;
    Mock::given(method("DELETE"))
        .and(path("/phone-number/vapi-num-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(twilio_number_path("PN111")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&app.server)
        .await;

    let resp = app.delete(&number_uri()).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["status"], true);
    assert_eq!(body["data"]["platform"]["status"], "removed");
    assert_eq!(body["data"]["telephony"]["status"], "removed");
    assert_eq!(body["data"]["local"]["status"], "removed");
    assert!(!still_attached(&app).await);
}

#[tokio::test]
async fn test_delete_keeps_row_when_platform_fails() {
    let app = TestApp::with_assistant().await;
    Mock::given(method("DELETE"))
        .and(path("/phone-number/vapi-num-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&app.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(twilio_number_path("PN111")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&app.server)
        .await;

    let resp = app.delete(&number_uri()).await;
    assert_eq!(resp.status, StatusCode::BAD_GATEWAY);
    let body = resp.json();
    assert_eq!(body["status"], false);
    assert!(body["message"].as_str().unwrap().contains("AI platform"));
    let steps = &body["data"]["steps"];
    assert_eq!(steps["platform"]["status"], "failed");
    assert!(steps["platform"]["error"].is_string());
    assert_eq!(steps["telephony"]["status"], "removed");
    assert_eq!(steps["local"]["status"], "skipped");
    assert!(still_attached(&app).await);
}

#[tokio::test]
async fn test_delete_treats_missing_vendor_records_as_done() {
    let app = TestApp::with_assistant().await;
    Mock::given(method("DELETE"))
        .and(path("/phone-number/vapi-num-1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&app.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(twilio_number_path("PN111")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&app.server)
        .await;

    let resp = app.delete(&number_uri()).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["data"]["platform"]["status"], "already_gone");
    assert_eq!(body["data"]["telephony"]["status"], "already_gone");
    assert!(!still_attached(&app).await);
}

#[tokio::test]
async fn test_delete_unknown_number_is_not_found() {
    let app = TestApp::with_assistant().await;
    let resp = app
        .delete(&format!(
            "/assistants/{}/{}/numbers/%2B15559999999",
            ACCOUNT_ID, ASSISTANT_ID
        ))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(app.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_purchase_of_number_in_use_conflicts() {
    let app = TestApp::with_assistant().await;
    let resp = app
        .post_json(
            &format!("/assistants/{}/{}/numbers/purchase", ACCOUNT_ID, ASSISTANT_ID),
            json!({"phoneNumber": "(555) 000-1111"}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert!(app.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_purchase_releases_number_when_platform_rejects_it() {
    let app = TestApp::with_assistant().await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/2010-04-01/Accounts/{}/IncomingPhoneNumbers.json",
            TWILIO_SID
        )))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "sid": "PN222",
            "phone_number": "+15550002222"
        })))
        .expect(1)
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/phone-number"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad credentials"))
        .mount(&app.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(twilio_number_path("PN222")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&app.server)
        .await;

    let resp = app
        .post_json(
            &format!("/assistants/{}/{}/numbers/purchase", ACCOUNT_ID, ASSISTANT_ID),
            json!({"phoneNumber": "+15550002222"}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_GATEWAY);
    assert!(!number::number_exists(app.db.pool(), "+15550002222")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_call_detail_includes_telephony_cost() {
    let app = TestApp::with_assistant().await;
    Mock::given(method("GET"))
        .and(path("/call/call-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "call-7",
            "assistantId": ASSISTANT_ID,
            "status": "ended",
            "cost": 0.42,
            "phoneCallProviderId": "CA777"
        })))
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/2010-04-01/Accounts/{}/Calls/CA777.json", TWILIO_SID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sid": "CA777",
            "status": "completed",
            "duration": "95",
            "price": "-0.0170",
            "price_unit": "USD"
        })))
        .mount(&app.server)
        .await;

    let resp = app
        .get(&format!("/assistants/{}/{}/calls/call-7", ACCOUNT_ID, ASSISTANT_ID))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = &resp.json()["data"];
    assert_eq!(data["id"], "call-7");
    assert_eq!(data["telephonyCost"], 0.017);
    assert_eq!(data["telephonyCostUnit"], "USD");
}

#[tokio::test]
async fn test_call_of_another_assistant_is_not_found() {
    let app = TestApp::with_assistant().await;
    Mock::given(method("GET"))
        .and(path("/call/call-8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "call-8",
            "assistantId": "someone-else"
        })))
        .mount(&app.server)
        .await;

    let resp = app
        .get(&format!("/assistants/{}/{}/calls/call-8", ACCOUNT_ID, ASSISTANT_ID))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
