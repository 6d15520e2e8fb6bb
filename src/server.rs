use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use futures::StreamExt;
use serde::Deserialize;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::AppState;
use crate::assistant::{AssistantService, OpenAiAssistants};
use crate::auth::{AuthenticatedUser, CredentialTable, LoginOutcome};
use crate::chat::ChatTurn;
use crate::config::{AppConfig, ChatSettings};
use crate::error::AppError;
use crate::events::{ChatEvent, sse_event};
use crate::rate_limit::rate_limit_middleware;
use crate::session::{Message, Session};
use crate::ui::{Banner, chat_page, login_page};

/// Shown on the sign-in page before credentials are submitted.
const PENDING_PROMPT: &str = "Please enter your username and password";

/// Shown when credentials do not match.
const DENIED_MESSAGE: &str = "Username/password is incorrect";

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, settings: ChatSettings) -> anyhow::Result<()> {
    let credentials = CredentialTable::load(&config.auth.credentials_path).with_context(|| {
        format!("loading credentials from {}", config.auth.credentials_path)
    })?;
    info!(
        name: "auth.credentials.loaded",
        users = credentials.len(),
        "Credential table loaded"
    );

    let assistant = OpenAiAssistants::from_settings(&settings);
    let info = assistant
        .describe(&settings.assistant_id)
        .await
        .with_context(|| format!("retrieving assistant {}", settings.assistant_id))?;
    info!(
        name: "assistant.config.loaded",
        assistant_id = %info.id,
        assistant_name = ?info.name,
        model = %settings.model,
        "Assistant retrieved"
    );

    let state = AppState::new(
        Arc::clone(&config),
        Arc::new(settings),
        credentials,
        Arc::new(assistant),
    );

    spawn_session_cleanup(&state);

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    let mut app = Router::new()
        .route("/", get(index))
        .route(
            "/login",
            post(login).layer(axum::middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            )),
        )
        .route("/logout", post(logout))
        .route("/chat/new", post(new_chat))
        .route("/api/chat", post(api_chat))
        .route("/api/chat/reset", post(api_reset))
        .route("/api/chat/messages", get(api_messages))
        .nest_service("/static", ServeDir::new(&state.config.server.static_dir));

    if let Some(logo) = state.settings.logo_file() {
        app = app.route_service("/logo", ServeFile::new(logo));
    }

    app.layer(DefaultBodyLimit::max(64 * 1024))
        // Bounds the time to first byte; streamed bodies are not cut off.
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(timeout, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drop sessions idle past the configured timeout.
fn spawn_session_cleanup(state: &AppState) {
    let sessions = state.sessions.clone();
    let idle = Duration::from_secs(state.config.session.idle_timeout_minutes * 60);
    let every = Duration::from_secs(state.config.session.cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let removed = sessions.cleanup_expired_with_timeout(idle);
            if removed > 0 {
                info!(name: "session.cleanup", removed, remaining = sessions.len(), "Expired sessions removed");
            }
        }
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Session cookie
// ─────────────────────────────────────────────────────────────────────────────

/// The session named by the cookie, if the store still holds it. Never creates one.
fn cookie_session(state: &AppState, jar: &CookieJar) -> Option<Session> {
    jar.get(&state.config.auth.cookie_name)
        .and_then(|c| state.sessions.get(c.value()))
}

fn session_cookie(name: &str, id: &str, expiry_days: u32) -> Cookie<'static> {
    let max_age = u64::from(expiry_days) * 24 * 60 * 60;
    Cookie::parse(format!(
        "{name}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    ))
    .unwrap_or_else(|_| {
        Cookie::build((name.to_string(), id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    })
}

/// The cookie's session with a signed-in user, or 401. Never creates a session.
fn signed_in_session(state: &AppState, jar: &CookieJar) -> Result<(Session, AuthenticatedUser), AppError> {
    let session = cookie_session(state, jar).ok_or(AppError::Unauthorized)?;
    let user = session.user().ok_or(AppError::Unauthorized)?;
    Ok((session, user))
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET / - Login page when signed out, chat page otherwise.
async fn index(State(state): State<AppState>, jar: CookieJar) -> Html<String> {
    let page = match signed_in_session(&state, &jar) {
        Ok((session, user)) => chat_page(&state.settings, &user, &session.chat(), &[]),
        Err(_) => login_page(
            &state.settings,
            &[Banner::Warning(PENDING_PROMPT.to_string())],
        ),
    };
    Html(page)
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// POST /login - Check credentials; on success start a chat automatically.
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let gate = state.auth.clone();
    let username = form.username.clone();
    let outcome =
        tokio::task::spawn_blocking(move || gate.login(&form.username, &form.password)).await?;

    match outcome {
        LoginOutcome::Granted(user) => {
            // Fresh session id on every sign-in; the pre-login one is dropped.
            if let Some(old) = jar.get(&state.config.auth.cookie_name) {
                state.sessions.remove(old.value());
            }
            let session = state.sessions.create();
            let jar = jar.add(session_cookie(
                &state.config.auth.cookie_name,
                session.id(),
                state.config.auth.cookie_expiry_days,
            ));
            session.sign_in(user.clone());

            if let Err(e) = state.orchestrator.start_new_chat(&session).await {
                warn!(session_id = %session.id(), error = %e, "Could not start chat after login");
                let page = chat_page(
                    &state.settings,
                    &user,
                    &session.chat(),
                    &[Banner::Error(format!("Could not start a chat: {e}"))],
                );
                return Ok((StatusCode::BAD_GATEWAY, jar, Html(page)).into_response());
            }
            Ok((jar, Redirect::to("/")).into_response())
        }
        LoginOutcome::Denied => {
            let page = login_page(
                &state.settings,
                &[Banner::Error(DENIED_MESSAGE.to_string())],
            );
            tracing::debug!(username = %username, "Rendering denied login page");
            Ok((StatusCode::UNAUTHORIZED, Html(page)).into_response())
        }
        LoginOutcome::Pending => {
            let page = login_page(
                &state.settings,
                &[Banner::Warning(PENDING_PROMPT.to_string())],
            );
            Ok(Html(page).into_response())
        }
    }
}

/// POST /logout - Sign out, reset the chat and drop the session.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(session) = cookie_session(&state, &jar) {
        state.auth.logout(&session);
        state.sessions.remove(session.id());
    }
    let jar = jar.remove(Cookie::build((state.config.auth.cookie_name.clone(), "")).path("/"));
    let page = login_page(
        &state.settings,
        &[Banner::Info(state.settings.exit_message.clone())],
    );
    (jar, Html(page))
}

/// POST /chat/new - Manual start control: open a new thread.
async fn new_chat(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let Ok((session, user)) = signed_in_session(&state, &jar) else {
        return Ok(Redirect::to("/").into_response());
    };

    if let Err(e) = state.orchestrator.start_new_chat(&session).await {
        warn!(session_id = %session.id(), error = %e, "Could not start chat");
        let page = chat_page(
            &state.settings,
            &user,
            &session.chat(),
            &[Banner::Error(format!("Could not start a chat: {e}"))],
        );
        return Ok((StatusCode::BAD_GATEWAY, Html(page)).into_response());
    }
    Ok(Redirect::to("/").into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for chat API.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// User message content.
    message: String,
}

/// POST /api/chat - Submit input and stream the turn as SSE.
async fn api_chat(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let (session, _) = signed_in_session(&state, &jar)?;

    tracing::info!(
        session_id = %session.id(),
        message_length = req.message.len(),
        "Received chat request"
    );

    match state.orchestrator.submit(&session, &req.message).await? {
        ChatTurn::Recovered { notice } => {
            let payload = format!(
                "{}{}",
                sse_event(&ChatEvent::ThreadRecreated { notice }),
                sse_event(&ChatEvent::Done)
            );
            Ok(build_sse_response(axum::body::Body::from(payload)))
        }
        ChatTurn::Streaming(events) => {
            let body = axum::body::Body::from_stream(
                events.map(|event| Ok::<String, Infallible>(sse_event(&event))),
            );
            Ok(build_sse_response(body))
        }
    }
}

/// POST /api/chat/reset - Return the chat to idle.
async fn api_reset(State(state): State<AppState>, jar: CookieJar) -> Result<StatusCode, AppError> {
    let (session, _) = signed_in_session(&state, &jar)?;
    state.orchestrator.reset(&session);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/chat/messages - Message log of the current chat.
async fn api_messages(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<Message>>, AppError> {
    let (session, _) = signed_in_session(&state, &jar)?;
    Ok(Json(session.read_chat(|chat| chat.messages().to_vec())))
}

fn build_sse_response(body: axum::body::Body) -> Response {
    let mut resp = Response::new(body);
    let h = resp.headers_mut();
    h.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    h.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    h.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    resp
}
