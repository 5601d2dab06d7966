//! End-to-end dispatch of tool-call batches against a mock CRM.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use agent_tools::{
    default_registry, CallScope, MALFORMED_CALL, TokenSource, ToolContext, ToolError, ToolServices, ToolsConfig,
};
use async_trait::async_trait;
use database::assistant::{self, NewAssistant};
use database::models::NewUser;
use database::{sub_account, user, Database};
use ghl_client::{GhlClient, GhlConfig};
use mailer::{Email, MailSender, MailerError};
use serde_json::{json, Value};
use vapi_client::ToolCall;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FixedToken {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenSource for FixedToken {
    async fn location_token(&self, _user_id: &str, _account_id: &str) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("loc-token".to_string())
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

struct Harness {
    db: Database,
    server: MockServer,
    tokens: Arc<FixedToken>,
    mailer: Arc<RecordingMailer>,
}

impl Harness {
    async fn new() -> Self {
        let db = Database::in_memory().await.unwrap();
        user::create_user(
            db.pool(),
            &NewUser {
                id: "u1".to_string(),
                email: "owner@agency.io".to_string(),
                name: "Owner".to_string(),
                password_hash: "x".to_string(),
            },
        )
        .await
        .unwrap();
        sub_account::import_sub_account(db.pool(), "u1", "loc-1", "Clinic", "r", 3600)
            .await
            .unwrap();
        assistant::create_assistant(
            db.pool(),
            &NewAssistant {
                assistant_id: "asst-1".to_string(),
                user_id: "u1".to_string(),
                account_id: "loc-1".to_string(),
                name: "Front desk".to_string(),
                calendar_id: Some("cal-1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        Self {
            db,
            server: MockServer::start().await,
            tokens: Arc::new(FixedToken {
                calls: AtomicUsize::new(0),
            }),
            mailer: Arc::new(RecordingMailer::default()),
        }
    }

    fn context(&self) -> Arc<ToolContext> {
        let ghl = GhlClient::new(
            GhlConfig::new("id", "secret").with_base_url(self.server.uri()),
        )
        .unwrap();
        let services = ToolServices::new(
            self.db.pool().clone(),
            ghl,
            self.tokens.clone(),
            ToolsConfig::default().with_tavily("tvly-key", self.server.uri()),
        )
        .unwrap()
        .with_mailer(self.mailer.clone());

        let scope = CallScope {
            user_id: "u1".to_string(),
            account_id: "loc-1".to_string(),
            assistant_id: "asst-1".to_string(),
            calendar_id: Some("cal-1".to_string()),
            timezone: Some("America/New_York".to_string()),
            call_id: Some("call-1".to_string()),
            customer_number: Some("+15551230000".to_string()),
        };
        Arc::new(ToolContext::new(scope, Arc::new(services)))
    }
}

fn calls(value: Value) -> Vec<ToolCall> {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_check_availability_returns_slots_json() {
    let h = Harness::new().await;
    Mock::given(method("GET"))
        .and(path("/calendars/cal-1/free-slots"))
        .and(query_param("startDate", "1736485200000"))
        .and(query_param("endDate", "1736571599999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "2025-01-10": {"slots": ["2025-01-10T09:00:00-05:00", "2025-01-10T10:00:00-05:00"]},
            "traceId": "t"
        })))
        .mount(&h.server)
        .await;

    let registry = default_registry();
    let results = registry
        .dispatch(
            &calls(json!([{"id": "tc1", "function": {"name": "check_availability",
                "arguments": {"startTime": "2025-01-10"}}}])),
            h.context(),
        )
        .await;

    let body = serde_json::to_value(&results).unwrap();
    assert_eq!(
        body,
        json!({"results": [{
            "toolCallId": "tc1",
            "result": "[\"2025-01-10T09:00:00-05:00\",\"2025-01-10T10:00:00-05:00\"]"
        }]})
    );
}

#[tokio::test]
async fn test_check_availability_no_slots() {
    let h = Harness::new().await;
    Mock::given(method("GET"))
        .and(path("/calendars/cal-1/free-slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"traceId": "t"})))
        .mount(&h.server)
        .await;

    let results = default_registry()
        .dispatch(
            &calls(json!([{"id": "tc1", "function": {"name": "check_availability",
                "arguments": "{\"startTime\":\"2025-01-10\"}"}}])),
            h.context(),
        )
        .await;
    assert_eq!(results.results[0].result.as_deref(), Some("No slots found."));
}

#[tokio::test]
async fn test_batch_keeps_order_and_isolates_failures() {
    let h = Harness::new().await;

    let results = default_registry()
        .dispatch(
            &calls(json!([
                {"id": "a", "function": {"name": "add_team_note", "arguments": {"note": "Caller wants a quote"}}},
                {"id": "b", "function": {"name": "book_appointment", "arguments": {"startTime": "2025-01-10T09:00:00-05:00"}}},
                {"id": "c", "function": {"name": "teleport", "arguments": {}}},
                {"id": "d", "function": {"name": "check_availability", "arguments": {}}}
            ])),
            h.context(),
        )
        .await;

    let ids: Vec<_> = results.results.iter().map(|r| r.tool_call_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert_eq!(results.results[0].result.as_deref(), Some("Note saved for the team."));
    assert_eq!(
        results.results[1].error.as_deref(),
        Some("Missing required parameter: phone or email")
    );
    assert_eq!(results.results[2].error.as_deref(), Some("Unknown tool: teleport"));
    assert_eq!(
        results.results[3].error.as_deref(),
        Some("Missing required parameter: startTime")
    );

    let notes = assistant::list_team_notes(h.db.pool(), "asst-1", 10).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].call_id.as_deref(), Some("call-1"));
    assert_eq!(h.tokens.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_book_appointment_upserts_then_books_with_one_token() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/contacts/upsert"))
        .and(body_partial_json(json!({"locationId": "loc-1", "phone": "+15125550100"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "new": true,
            "contact": {"id": "c-1", "firstName": "Ada"}
        })))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars/events/appointments"))
        .and(body_partial_json(json!({"calendarId": "cal-1", "contactId": "c-1"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "appt-9"})))
        .expect(2)
        .mount(&h.server)
        .await;

    let results = default_registry()
        .dispatch(
            &calls(json!([
                {"id": "b1", "function": {"name": "book_appointment", "arguments": {
                    "startTime": "2025-01-10T09:00:00-05:00", "phone": "(512) 555-0100", "firstName": "Ada"}}},
                {"id": "b2", "function": {"name": "self_schedule", "arguments": {
                    "startTime": "2025-01-10T10:00:00-05:00", "phone": "5125550100", "name": "Ada Lovelace"}}}
            ])),
            h.context(),
        )
        .await;

    assert!(results.results[0]
        .result
        .as_deref()
        .unwrap()
        .contains("confirmation appt-9"));
    assert!(results.results[1].result.is_some());
    assert_eq!(h.tokens.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_update_contact_by_phone_lookup_miss() {
    let h = Harness::new().await;
    Mock::given(method("GET"))
        .and(path("/contacts/search/duplicate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"contact": null})))
        .mount(&h.server)
        .await;

    let results = default_registry()
        .dispatch(
            &calls(json!([{"id": "u", "function": {"name": "update_contact", "arguments": {
                "phone": "+15125550100", "city": "Austin"}}}])),
            h.context(),
        )
        .await;
    assert_eq!(
        results.results[0].error.as_deref(),
        Some("No contact found with phone +15125550100.")
    );
}

#[tokio::test]
async fn test_send_email_and_web_search() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({"query": "clinic hours", "max_results": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "Open 9 to 5.",
            "results": []
        })))
        .mount(&h.server)
        .await;

    let results = default_registry()
        .dispatch(
            &calls(json!([
                {"id": "e", "function": {"name": "send_email", "arguments": {
                    "to": "lead@example.com", "subject": "Your visit", "body": "See you soon."}}},
                {"id": "e2", "function": {"name": "send_email", "arguments": {
                    "to": "nope", "subject": "s", "body": "b"}}},
                {"id": "w", "function": {"name": "web_search", "arguments": {
                    "query": "clinic hours", "maxResults": 2}}}
            ])),
            h.context(),
        )
        .await;

    assert_eq!(results.results[0].result.as_deref(), Some("Email sent to lead@example.com."));
    assert!(results.results[1].error.as_deref().unwrap().contains("'to'"));
    assert_eq!(results.results[2].result.as_deref(), Some("Open 9 to 5."));
    let sent = h.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Your visit");
}

#[tokio::test]
async fn test_scrape_without_credentials_is_not_configured() {
    let h = Harness::new().await;
    let results = default_registry()
        .dispatch(
            &calls(json!([{"id": "s", "function": {"name": "scrape_website", "arguments": {
                "url": "https://93.184.216.34/"}}}])),
            h.context(),
        )
        .await;
    assert_eq!(
        results.results[0].error.as_deref(),
        Some("Website scraping is not configured")
    );
}

#[tokio::test]
async fn test_scrape_returns_title_and_markdown() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({"url": "https://93.184.216.34/"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"markdown": "  Open Monday to Friday.  ", "metadata": {"title": "Hours"}}
        })))
        .mount(&h.server)
        .await;

    let ctx = {
        let base = h.context();
        let services = ToolServices::new(
            h.db.pool().clone(),
            base.services.ghl.clone(),
            h.tokens.clone(),
            ToolsConfig::default().with_firecrawl("fc-key", h.server.uri()),
        )
        .unwrap();
        Arc::new(ToolContext::new(base.scope.clone(), Arc::new(services)))
    };
    let results = default_registry()
        .dispatch(
            &calls(json!([{"id": "s", "function": {"name": "scrape_website", "arguments": {
                "url": "https://93.184.216.34/"}}}])),
            ctx,
        )
        .await;
    assert_eq!(
        results.results[0].result.as_deref(),
        Some("Hours\n\nOpen Monday to Friday.")
    );
}

#[tokio::test]
async fn test_naive_start_time_is_booked_in_assistant_zone() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/contacts/upsert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contact": {"id": "c-1"}
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars/events/appointments"))
        .and(body_partial_json(json!({"startTime": "2025-01-10T09:00:00-05:00"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "appt-3"})))
        .expect(1)
        .mount(&h.server)
        .await;

    let results = default_registry()
        .dispatch(
            &calls(json!([{"id": "b", "function": {"name": "book_appointment", "arguments": {
                "startTime": "2025-01-10T09:00:00", "phone": "5125550100"}}}])),
            h.context(),
        )
        .await;
    assert_eq!(
        results.results[0].result.as_deref(),
        Some("Appointment booked for 2025-01-10T09:00:00-05:00 (confirmation appt-3).")
    );
}

#[tokio::test]
async fn test_list_events_defaults_to_a_week() {
    let h = Harness::new().await;
    Mock::given(method("GET"))
        .and(path("/calendars/events"))
        .and(query_param("locationId", "loc-1"))
        .and(query_param("calendarId", "cal-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"events": []})))
        .expect(1)
        .mount(&h.server)
        .await;

    let results = default_registry()
        .dispatch(
            &calls(json!([{"id": "l", "function": {"name": "list_events", "arguments": {}}}])),
            h.context(),
        )
        .await;
    assert_eq!(results.results[0].result.as_deref(), Some("No events found."));

    let requests = h.server.received_requests().await.unwrap();
    let bound = |key: &str| -> i64 {
        requests[0]
            .url
            .query_pairs()
            .find(|(k, _)| k == key)
            .unwrap()
            .1
            .parse()
            .unwrap()
    };
    assert_eq!(bound("endTime") - bound("startTime"), 7 * 24 * 60 * 60 * 1000);
}

#[tokio::test]
async fn test_list_events_from_local_day() {
    let h = Harness::new().await;
    Mock::given(method("GET"))
        .and(path("/calendars/events"))
        .and(query_param("startTime", "1736485200000"))
        .and(query_param("endTime", "1737090000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"events": [{
            "id": "ev-1",
            "title": "Cleaning",
            "startTime": "2025-01-10T09:00:00-05:00",
            "endTime": "2025-01-10T09:30:00-05:00",
            "appointmentStatus": "confirmed"
        }]})))
        .mount(&h.server)
        .await;

    let results = default_registry()
        .dispatch(
            &calls(json!([{"id": "l", "function": {"name": "list_events", "arguments": {
                "startTime": "2025-01-10"}}}])),
            h.context(),
        )
        .await;
    let listed: Value =
        serde_json::from_str(results.results[0].result.as_deref().unwrap()).unwrap();
    assert_eq!(
        listed,
        json!([{
            "title": "Cleaning",
            "startTime": "2025-01-10T09:00:00-05:00",
            "endTime": "2025-01-10T09:30:00-05:00",
            "status": "confirmed"
        }])
    );
}

#[tokio::test]
async fn test_create_task_falls_back_to_caller() {
    let h = Harness::new().await;
    Mock::given(method("GET"))
        .and(path("/contacts/search/duplicate"))
        .and(query_param("number", "+15551230000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contact": {"id": "c-7"}
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/contacts/c-7/tasks"))
        .and(body_partial_json(json!({
            "title": "Call back about pricing",
            "dueDate": "2025-01-10T23:59:59-05:00",
            "completed": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "task": {"id": "t-1", "title": "Call back about pricing"}
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let results = default_registry()
        .dispatch(
            &calls(json!([
                {"id": "t", "function": {"name": "create_task", "arguments": {
                    "title": "Call back about pricing", "dueDate": "2025-01-10"}}},
                {"id": "t2", "function": {"name": "create_task", "arguments": {
                    "title": "Later", "dueDate": "whenever"}}}
            ])),
            h.context(),
        )
        .await;
    assert_eq!(
        results.results[0].result.as_deref(),
        Some("Task \"Call back about pricing\" created.")
    );
    assert!(results.results[1]
        .error
        .as_deref()
        .unwrap()
        .contains("dueDate"));
}

#[tokio::test]
async fn test_malformed_call_is_answered_in_place() {
    let h = Harness::new().await;
    let mut batch = calls(json!([
        {"id": "n", "function": {"name": "add_team_note", "arguments": {"note": "Wants a callback"}}}
    ]));
    batch.insert(0, ToolCall::malformed("bad"));

    let results = default_registry().dispatch(&batch, h.context()).await;
    let ids: Vec<_> = results.results.iter().map(|r| r.tool_call_id.as_str()).collect();
    assert_eq!(ids, vec!["bad", "n"]);
    assert_eq!(results.results[0].error.as_deref(), Some(MALFORMED_CALL));
    assert_eq!(results.results[1].result.as_deref(), Some("Note saved for the team."));
}
