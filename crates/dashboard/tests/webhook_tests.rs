//! Vendor webhooks: billing, tool calls, payments and inbound calls.

mod common;

use std::time::{SystemTime, UNIX_EPOCH};

use agent_tools::MALFORMED_CALL;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{TestApp, ACCOUNT_ID, ASSISTANT_ID, USER_ID, WEBHOOK_SECRET};
use dashboard::routes::webhooks::INSUFFICIENT_FUNDS_MESSAGE;
use database::{assistant, billing};
use serde_json::{json, Value};
use stripe_client::sign_payload;
use twilio_client::twiml;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

fn billing_message(app: &TestApp, event_type: &str, cost: f64) -> Value {
    json!({
        "message": {
            "type": event_type,
            "call": {
                "id": "abc123",
                "assistantId": ASSISTANT_ID,
                "cost": cost,
                "monitor": {"controlUrl": format!("{}/control/abc123", app.server.uri())}
            }
        }
    })
}

#[tokio::test]
async fn test_billing_redelivery_charges_once() {
    let app = TestApp::with_assistant().await;
    app.fund_wallet(10.0).await;

    let first = app
        .webhook("/webhooks/vapi/billing", billing_message(&app, "call.ended", 1.25))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["message"], "Charged");

    let again = app
        .webhook("/webhooks/vapi/billing", billing_message(&app, "call.ended", 1.25))
        .await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.json()["message"], "Already billed");

    assert_eq!(app.balance().await, 8.75);
    let events = billing::list_billing_events(app.db.pool(), USER_ID, 10).await.unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_later_stage_charges_only_the_difference() {
    let app = TestApp::with_assistant().await;
    app.fund_wallet(10.0).await;

    app.webhook("/webhooks/vapi/billing", billing_message(&app, "call.ended", 1.25))
        .await;
    let report = app
        .webhook(
            "/webhooks/vapi/billing",
            billing_message(&app, "end-of-call-report", 1.5),
        )
        .await;
    assert_eq!(report.json()["message"], "Charged");
    assert_eq!(app.balance().await, 8.5);
}

#[tokio::test]
async fn test_non_billable_event_is_acknowledged() {
    let app = TestApp::with_assistant().await;
    app.fund_wallet(10.0).await;

    let resp = app
        .webhook("/webhooks/vapi/billing", billing_message(&app, "status-update", 3.0))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], true);
    assert_eq!(app.balance().await, 10.0);
}

#[tokio::test]
async fn test_empty_wallet_terminates_call_without_billing() {
    let app = TestApp::with_assistant().await;
    Mock::given(method("POST"))
        .and(path("/control/abc123"))
        .and(body_partial_json(json!({"type": "end-call"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.server)
        .await;

    let resp = app
        .webhook("/webhooks/vapi/billing", billing_message(&app, "call.ended", 0.4))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["message"], "Wallet empty, call terminated");

    assert_eq!(app.balance().await, 0.0);
    let events = billing::list_billing_events(app.db.pool(), USER_ID, 10).await.unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_unparseable_billing_body_still_answers_200() {
    let app = TestApp::with_assistant().await;
    let resp = app
        .send(
            Request::post("/webhooks/vapi/billing")
                .header(header::CONTENT_TYPE, "application/json")
                .header(vapi_client::SECRET_HEADER, common::VAPI_SECRET)
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], false);
}

fn tool_calls(app: &TestApp, assistant_id: &str) -> Value {
    json!({
        "message": {
            "type": "tool-calls",
            "toolCalls": [
                {"id": "tc-1", "function": {"name": "add_team_note", "arguments": {"note": "Caller wants a callback"}}},
                {"id": "tc-2", "function": {"name": "teleport", "arguments": "{}"}}
            ],
            "call": {
                "id": "abc123",
                "assistantId": assistant_id,
                "customer": {"number": "+15559990000"},
                "monitor": {"controlUrl": format!("{}/control/abc123", app.server.uri())}
            }
        }
    })
}

#[tokio::test]
async fn test_tool_calls_dispatch_in_order() {
    let app = TestApp::with_assistant().await;
    app.fund_wallet(5.0).await;

    let resp = app
        .webhook("/webhooks/vapi/tools", tool_calls(&app, ASSISTANT_ID))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["toolCallId"], "tc-1");
    assert_eq!(results[0]["result"], "Note saved for the team.");
    assert_eq!(results[1]["toolCallId"], "tc-2");
    assert_eq!(results[1]["error"], "Unknown tool: teleport");

    let notes = assistant::list_team_notes(app.db.pool(), ASSISTANT_ID, 10).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].call_id.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_tool_calls_with_empty_wallet_are_refused() {
    let app = TestApp::with_assistant().await;
    Mock::given(method("POST"))
        .and(path("/control/abc123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.server)
        .await;

    let resp = app
        .webhook("/webhooks/vapi/tools", tool_calls(&app, ASSISTANT_ID))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    for (entry, id) in results.iter().zip(["tc-1", "tc-2"]) {
        assert_eq!(entry["toolCallId"], id);
        assert_eq!(entry["error"], INSUFFICIENT_FUNDS_MESSAGE);
        assert!(entry.get("result").is_none());
    }

    let notes = assistant::list_team_notes(app.db.pool(), ASSISTANT_ID, 10).await.unwrap();
    assert!(notes.is_empty());
}

#[tokio::test]
async fn test_tool_calls_for_unknown_assistant() {
    let app = TestApp::with_assistant().await;
    let resp = app
        .webhook("/webhooks/vapi/tools", tool_calls(&app, "asst-unknown"))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["error"], "Unknown assistant");
    assert_eq!(results[1]["error"], "Unknown assistant");
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn payment_event(event_type: &str) -> String {
    json!({
        "id": "evt_1",
        "type": event_type,
        "created": now(),
        "data": {"object": {
            "id": "pi_1",
            "amount": 2000,
            "amount_received": 2000,
            "currency": "usd",
            "status": "succeeded",
            "metadata": {"user_id": USER_ID}
        }}
    })
    .to_string()
}

async fn post_stripe(app: &TestApp, body: &str, signature: &str) -> common::TestResponse {
    app.send(
        Request::post("/webhooks/stripe")
            .header(header::CONTENT_TYPE, "application/json")
            .header("stripe-signature", signature)
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_signed_payment_credits_wallet_once() {
    let app = TestApp::new().await;
    let body = payment_event("payment_intent.succeeded");
    let signature = sign_payload(WEBHOOK_SECRET, now(), body.as_bytes());

    let resp = post_stripe(&app, &body, &signature).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["message"], "Payment succeeded");
    assert_eq!(app.balance().await, 20.0);

    let replay = post_stripe(&app, &body, &signature).await;
    assert_eq!(replay.status, StatusCode::OK);
    assert_eq!(replay.json()["message"], "Already recorded");
    assert_eq!(app.balance().await, 20.0);
}

#[tokio::test]
async fn test_tampered_payment_is_rejected() {
    let app = TestApp::new().await;
    let body = payment_event("payment_intent.succeeded");
    let signature = sign_payload(WEBHOOK_SECRET, now(), body.as_bytes());
    let tampered = body.replace("2000", "900000");

    let resp = post_stripe(&app, &tampered, &signature).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["status"], false);
    assert_eq!(app.balance().await, 0.0);
}

#[tokio::test]
async fn test_stale_payment_signature_is_rejected() {
    let app = TestApp::new().await;
    let body = payment_event("payment_intent.succeeded");
    let signature = sign_payload(WEBHOOK_SECRET, now() - 3_600, body.as_bytes());

    let resp = post_stripe(&app, &body, &signature).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.balance().await, 0.0);
}

#[tokio::test]
async fn test_failed_payment_is_recorded_without_credit() {
    let app = TestApp::new().await;
    let body = payment_event("payment_intent.payment_failed");
    let signature = sign_payload(WEBHOOK_SECRET, now(), body.as_bytes());

    let resp = post_stripe(&app, &body, &signature).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["message"], "Payment failed");
    assert_eq!(app.balance().await, 0.0);
    let payments = billing::list_payments(app.db.pool(), USER_ID, 10).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, "failed");
}

fn inbound_call(app: &TestApp, uri: &str) -> Request<Body> {
    app.twilio_request(
        uri,
        &[("From", "+15559990000"), ("To", "+15550001111"), ("CallSid", "CA1")],
    )
}

#[tokio::test]
async fn test_inbound_call_relays_platform_twiml() {
    let app = TestApp::with_assistant().await;
    let twiml = "<Response><Connect><Stream url=\"wss://media\"/></Connect></Response>";
    Mock::given(method("POST"))
        .and(path("/call"))
        .and(body_partial_json(json!({
            "phoneCallProviderBypassEnabled": true,
            "phoneNumberId": "vapi-num-1",
            "assistantId": ASSISTANT_ID,
            "customer": {"number": "+15559990000"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "call-9",
            "phoneCallProviderDetails": {"twiml": twiml}
        })))
        .expect(1)
        .mount(&app.server)
        .await;

    let uri = format!("/webhooks/twilio/{}/{}", ACCOUNT_ID, ASSISTANT_ID);
    let resp = app.send(inbound_call(&app, &uri)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.headers.get(header::CONTENT_TYPE).unwrap(), "text/xml");
    assert_eq!(resp.body, twiml);
}

#[tokio::test]
async fn test_inbound_call_setup_failure_says_error() {
    let app = TestApp::with_assistant().await;
    Mock::given(method("POST"))
        .and(path("/call"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&app.server)
        .await;

    let uri = format!("/webhooks/twilio/{}/{}", ACCOUNT_ID, ASSISTANT_ID);
    let resp = app.send(inbound_call(&app, &uri)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, twiml::connect_error());

    let unknown = app
        .send(inbound_call(&app, &format!("/webhooks/twilio/{}/asst-other", ACCOUNT_ID)))
        .await;
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(unknown.body, twiml::connect_error());
}

#[tokio::test]
async fn test_inbound_sms_is_acknowledged() {
    let app = TestApp::with_assistant().await;
    let uri = format!("/webhooks/twilio/{}/{}/sms", ACCOUNT_ID, ASSISTANT_ID);
    let resp = app
        .send(app.twilio_request(&uri, &[("From", "+15559990000"), ("Body", "hello")]))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, twiml::empty());
}

#[tokio::test]
async fn test_unsigned_inbound_call_is_forbidden() {
    let app = TestApp::with_assistant().await;
    let uri = format!("/webhooks/twilio/{}/{}", ACCOUNT_ID, ASSISTANT_ID);

    let unsigned = app
        .send(
            Request::post(uri.as_str())
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("From=%2B15559990000&To=%2B15550001111&CallSid=CA1"))
                .unwrap(),
        )
        .await;
    assert_eq!(unsigned.status, StatusCode::FORBIDDEN);

    // Signed for another assistant's URL.
    let mut replayed = inbound_call(&app, &format!("/webhooks/twilio/{}/asst-other", ACCOUNT_ID));
    *replayed.uri_mut() = uri.parse().unwrap();
    let resp = app.send(replayed).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    assert!(app.server.received_requests().await.unwrap().is_empty());
}

fn server_message(uri: &str, body: &Value, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        builder = builder.header(vapi_client::SECRET_HEADER, secret);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_forged_billing_event_is_rejected() {
    let app = TestApp::with_assistant().await;
    app.fund_wallet(10.0).await;
    let forged = billing_message(&app, "call.ended", 1_000_000_000.0);

    for secret in [None, Some("guess")] {
        let resp = app
            .send(server_message("/webhooks/vapi/billing", &forged, secret))
            .await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp.json()["status"], false);
    }

    assert_eq!(app.balance().await, 10.0);
    let events = billing::list_billing_events(app.db.pool(), USER_ID, 10).await.unwrap();
    assert!(events.is_empty());
    assert!(app.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_forged_tool_calls_are_rejected() {
    let app = TestApp::with_assistant().await;
    app.fund_wallet(5.0).await;

    let resp = app
        .send(server_message(
            "/webhooks/vapi/tools",
            &tool_calls(&app, ASSISTANT_ID),
            Some("guess"),
        ))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let notes = assistant::list_team_notes(app.db.pool(), ASSISTANT_ID, 10).await.unwrap();
    assert!(notes.is_empty());
}

#[tokio::test]
async fn test_malformed_tool_call_does_not_drop_the_batch() {
    let app = TestApp::with_assistant().await;
    app.fund_wallet(5.0).await;

    let resp = app
        .webhook(
            "/webhooks/vapi/tools",
            json!({
                "message": {
                    "type": "tool-calls",
                    "toolCalls": [
                        {"id": "tc-ok", "function": {"name": "add_team_note", "arguments": {"note": "hello"}}},
                        {"id": "tc-bad", "function": {"arguments": {}}}
                    ],
                    "call": {"id": "abc123", "assistantId": ASSISTANT_ID}
                }
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["toolCallId"], "tc-ok");
    assert_eq!(results[0]["result"], "Note saved for the team.");
    assert_eq!(results[1]["toolCallId"], "tc-bad");
    assert_eq!(results[1]["error"], MALFORMED_CALL);
}
