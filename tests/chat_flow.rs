mod common;

use std::sync::Arc;

use assistant_chat::AppState;
use assistant_chat::config::AppConfig;
use assistant_chat::server::build_router;
use assistant_chat::session::{Message, Role};
use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use common::{FakeAssistant, PASSWORD, USERNAME, app_state, app_state_with_config};
use serde_json::json;

const COOKIE: &str = "chat_session";

fn server(fake: &Arc<FakeAssistant>) -> TestServer {
    server_with_state(fake).0
}

fn server_with_state(fake: &Arc<FakeAssistant>) -> (TestServer, AppState) {
    let state = app_state(Arc::clone(fake));
    let server = TestServer::new(build_router(state.clone())).unwrap();
    (server, state)
}

async fn login(server: &TestServer, username: &str, password: &str) -> TestResponse {
    server
        .post("/login")
        .form(&[("username", username), ("password", password)])
        .await
}

/// Sign in and return the session cookie response.
async fn signed_in(server: &TestServer) -> TestResponse {
    let resp = login(server, USERNAME, PASSWORD).await;
    resp.assert_status(StatusCode::SEE_OTHER);
    resp
}

/// Parse an SSE body into `(event, data)` pairs.
fn sse_events(body: &str) -> Vec<(String, serde_json::Value)> {
    body.split("\n\n")
        .filter(|frame| !frame.trim().is_empty())
        .map(|frame| {
            let mut event = String::new();
            let mut data = serde_json::Value::Null;
            for line in frame.lines() {
                if let Some(name) = line.strip_prefix("event: ") {
                    event = name.to_string();
                } else if let Some(json) = line.strip_prefix("data: ") {
                    data = serde_json::from_str(json).unwrap();
                }
            }
            (event, data)
        })
        .collect()
}

#[tokio::test]
async fn test_signed_out_index_shows_login_prompt() {
    let fake = FakeAssistant::replying(vec![]);
    let server = server(&fake);

    let resp = server.get("/").await;

    resp.assert_status_ok();
    let html = resp.text();
    assert!(html.contains("Please enter your username and password"));
    assert!(html.contains(r#"action="/login""#));
    assert_eq!(fake.threads_created(), 0);
}

#[tokio::test]
async fn test_signed_out_visits_store_no_session() {
    let fake = FakeAssistant::replying(vec![]);
    let (server, state) = server_with_state(&fake);

    for _ in 0..3 {
        let resp = server.get("/").await;
        assert!(resp.maybe_cookie(COOKIE).is_none());
    }
    server.post("/logout").await.assert_status_ok();
    login(&server, "", "").await.assert_status_ok();
    login(&server, USERNAME, "wrong")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    assert!(state.sessions.is_empty());
}

#[tokio::test]
async fn test_blank_login_is_pending() {
    let fake = FakeAssistant::replying(vec![]);
    let server = server(&fake);

    let resp = login(&server, "", "").await;

    resp.assert_status_ok();
    assert!(resp.text().contains("banner-warning"));
    assert!(!resp.text().contains("Username/password is incorrect"));
    assert!(resp.maybe_cookie(COOKIE).is_none());

    let chat = server
        .post("/api/chat")
        .json(&json!({ "message": "Hello" }))
        .await;
    chat.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(fake.threads_created(), 0);
}

#[tokio::test]
async fn test_wrong_password_is_denied() {
    let fake = FakeAssistant::replying(vec![]);
    let server = server(&fake);

    let resp = login(&server, USERNAME, "wrong").await;

    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert!(resp.text().contains("Username/password is incorrect"));
    assert!(resp.maybe_cookie(COOKIE).is_none());

    let messages = server.get("/api/chat/messages").await;
    messages.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(fake.threads_created(), 0);
}

#[tokio::test]
async fn test_login_starts_chat_automatically() {
    let fake = FakeAssistant::replying(vec![]);
    let server = server(&fake);

    let resp = signed_in(&server).await;
    assert_eq!(resp.header("location"), "/");
    assert_eq!(fake.threads_created(), 1);

    let page = server.get("/").add_cookie(resp.cookie(COOKIE)).await;
    page.assert_status_ok();
    let html = page.text();
    assert!(html.contains(r#"id="chat-form""#));
    assert!(html.contains("Peter Parker"));
    assert!(html.contains(r#"placeholder="Ask about xFLOWer""#));
}

#[tokio::test]
async fn test_login_issues_fresh_session_id() {
    let fake = FakeAssistant::replying(vec![]);
    let (server, state) = server_with_state(&fake);

    let before = signed_in(&server).await.cookie(COOKIE);
    let after = server
        .post("/login")
        .add_cookie(before.clone())
        .form(&[("username", USERNAME), ("password", PASSWORD)])
        .await
        .cookie(COOKIE);

    assert_ne!(before.value(), after.value());
    assert_eq!(state.sessions.len(), 1);
    server
        .get("/api/chat/messages")
        .add_cookie(before)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_end_to_end_turn() {
    let fake = FakeAssistant::replying(vec!["xFLOWer is ", "a workflow platform."]);
    let server = server(&fake);
    let cookie = signed_in(&server).await.cookie(COOKIE);

    let resp = server
        .post("/api/chat")
        .add_cookie(cookie.clone())
        .json(&json!({ "message": "What is xFLOWer?" }))
        .await;

    resp.assert_status_ok();
    assert_eq!(resp.header("content-type"), "text/event-stream");
    let events = sse_events(&resp.text());
    let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        ["stream.start", "message.delta", "message.delta", "done"]
    );
    assert_eq!(events[1].1["data"]["text"], "xFLOWer is ");

    let messages: Vec<Message> = server
        .get("/api/chat/messages")
        .add_cookie(cookie)
        .await
        .json();
    assert_eq!(
        messages,
        [
            Message::user("What is xFLOWer?"),
            Message::assistant("xFLOWer is a workflow platform."),
        ]
    );

    let posted = fake.posted.lock().unwrap();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1, Role::User);
    assert_eq!(fake.runs.lock().unwrap()[0].thread_id, posted[0].0);
    assert_eq!(fake.threads_created(), 1);
}

#[tokio::test]
async fn test_history_survives_reload() {
    let fake = FakeAssistant::replying(vec!["**Hi** there"]);
    let server = server(&fake);
    let cookie = signed_in(&server).await.cookie(COOKIE);

    server
        .post("/api/chat")
        .add_cookie(cookie.clone())
        .json(&json!({ "message": "Hello" }))
        .await
        .assert_status_ok();

    let html = server.get("/").add_cookie(cookie).await.text();
    assert!(html.contains("message-user"));
    assert!(html.contains("<strong>Hi</strong> there"));
    assert_eq!(fake.threads_created(), 1);
}

#[tokio::test]
async fn test_blank_message_rejected() {
    let fake = FakeAssistant::replying(vec![]);
    let server = server(&fake);
    let cookie = signed_in(&server).await.cookie(COOKIE);

    let resp = server
        .post("/api/chat")
        .add_cookie(cookie)
        .json(&json!({ "message": "   " }))
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_then_idle() {
    let fake = FakeAssistant::replying(vec![]);
    let server = server(&fake);
    let cookie = signed_in(&server).await.cookie(COOKIE);

    server
        .post("/api/chat/reset")
        .add_cookie(cookie.clone())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let html = server.get("/").add_cookie(cookie.clone()).await.text();
    assert!(html.contains("Start a new chat to begin."));
    assert!(!html.contains(r#"id="chat-form""#));

    server
        .post("/api/chat")
        .add_cookie(cookie)
        .json(&json!({ "message": "Hello" }))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_new_chat_control_opens_new_thread() {
    let fake = FakeAssistant::replying(vec!["Hi"]);
    let server = server(&fake);
    let cookie = signed_in(&server).await.cookie(COOKIE);

    server
        .post("/api/chat")
        .add_cookie(cookie.clone())
        .json(&json!({ "message": "Hello" }))
        .await
        .assert_status_ok();

    server
        .post("/chat/new")
        .add_cookie(cookie.clone())
        .await
        .assert_status(StatusCode::SEE_OTHER);

    assert_eq!(fake.threads_created(), 2);
    let messages: Vec<Message> = server
        .get("/api/chat/messages")
        .add_cookie(cookie)
        .await
        .json();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_logout_clears_session() {
    let fake = FakeAssistant::replying(vec![]);
    let (server, state) = server_with_state(&fake);
    let cookie = signed_in(&server).await.cookie(COOKIE);
    assert_eq!(state.sessions.len(), 1);

    let resp = server.post("/logout").add_cookie(cookie.clone()).await;

    resp.assert_status_ok();
    assert!(resp.text().contains("Thanks for stopping by!"));
    assert!(state.sessions.is_empty());
    server
        .get("/api/chat/messages")
        .add_cookie(cookie)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_assistant_failure_is_reported_in_stream() {
    let fake = FakeAssistant::replying(vec![]);
    let server = server(&fake);
    let cookie = signed_in(&server).await.cookie(COOKIE);
    fake.set_script(common::Script::FailPost);

    let resp = server
        .post("/api/chat")
        .add_cookie(cookie.clone())
        .json(&json!({ "message": "Hello" }))
        .await;

    resp.assert_status_ok();
    let events = sse_events(&resp.text());
    assert!(events.iter().any(|(name, _)| name == "error"));
    assert_eq!(events.last().unwrap().0, "done");

    let messages: Vec<Message> = server
        .get("/api/chat/messages")
        .add_cookie(cookie)
        .await
        .json();
    assert_eq!(messages, [Message::user("Hello")]);
}

#[tokio::test]
async fn test_login_attempts_are_throttled() {
    let fake = FakeAssistant::replying(vec![]);
    let mut config = AppConfig::defaults().unwrap();
    config.auth.login_burst = 1.0;
    config.auth.login_requests_per_second = 0.001;
    let server =
        TestServer::new(build_router(app_state_with_config(Arc::clone(&fake), config))).unwrap();

    login(&server, USERNAME, "wrong")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    login(&server, USERNAME, PASSWORD)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}
