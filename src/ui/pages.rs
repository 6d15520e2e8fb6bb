use std::fmt::Write as _;

use super::{escape_html, render_markdown};
use crate::auth::AuthenticatedUser;
use crate::config::ChatSettings;
use crate::session::{ChatSession, Message};

/// Status line shown above the page content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Info(String),
    Warning(String),
    Error(String),
}

impl Banner {
    fn render(&self) -> String {
        let (class, text) = match self {
            Self::Info(text) => ("banner banner-info", text),
            Self::Warning(text) => ("banner banner-warning", text),
            Self::Error(text) => ("banner banner-error", text),
        };
        format!(r#"<div class="{class}" role="status">{}</div>"#, escape_html(text))
    }
}

/// Generate the HTML shell for the application.
fn html_shell(title: &str, sidebar: &str, content: &str) -> String {
    let title = escape_html(title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <link rel="icon" href="data:image/svg+xml,<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 100 100'><text y='.9em' font-size='90'>💬</text></svg>">
    <link rel="stylesheet" href="/static/app.css">
    <script defer src="/static/app.js"></script>
</head>
<body>
    <div id="app-shell">
        <aside id="sidebar">{sidebar}</aside>
        <main id="app">
            <h1>{title}</h1>
            {content}
        </main>
    </div>
</body>
</html>"#
    )
}

fn banners_html(banners: &[Banner]) -> String {
    banners.iter().map(Banner::render).collect()
}

/// Sign-in page. `banners` carry the pending/denied/exit messages.
#[must_use]
pub fn login_page(settings: &ChatSettings, banners: &[Banner]) -> String {
    let content = format!(
        r#"{banners}
            <form id="login-form" class="card" method="post" action="/login">
                <h2>Login</h2>
                <label>Username <input type="text" name="username" autocomplete="username"></label>
                <label>Password <input type="password" name="password" autocomplete="current-password"></label>
                <button type="submit">Login</button>
            </form>"#,
        banners = banners_html(banners),
    );
    html_shell(&settings.page_title, &logo_html(settings), &content)
}

/// Chat page for a signed-in user.
///
/// Idle chats show the begin message and a start control; active chats
/// show the history and the input box.
#[must_use]
pub fn chat_page(
    settings: &ChatSettings,
    user: &AuthenticatedUser,
    chat: &ChatSession,
    banners: &[Banner],
) -> String {
    let mut sidebar = logo_html(settings);
    let _ = write!(
        sidebar,
        r#"
            <p class="welcome">Signed in as <strong>{name}</strong></p>
            <form method="post" action="/chat/new"><button type="submit">{start}</button></form>
            <form method="post" action="/logout"><button type="submit" class="secondary">Logout</button></form>"#,
        name = escape_html(&user.display_name),
        start = escape_html(&settings.start_chat_button),
    );

    let mut content = banners_html(banners);
    let _ = write!(
        content,
        r#"<h2 class="welcome-message">{}</h2>"#,
        escape_html(&settings.welcome_message)
    );

    if chat.start_chat() {
        content.push_str(r#"<div id="banners"></div><div id="messages">"#);
        for message in chat.messages() {
            content.push_str(&message_html(message));
        }
        let _ = write!(
            content,
            r#"</div>
            <form id="chat-form" method="post" action="/api/chat">
                <textarea name="message" rows="1" placeholder="{prompt}" required></textarea>
                <button type="submit">Send</button>
            </form>"#,
            prompt = escape_html(&settings.user_prompt),
        );
    } else {
        let _ = write!(
            content,
            r#"<p class="begin-message">{}</p>"#,
            escape_html(&settings.begin_message)
        );
    }

    if let Some(disclaimer) = disclaimer_html(settings) {
        let _ = write!(content, r#"<footer class="disclaimer">{disclaimer}</footer>"#);
    }

    html_shell(&settings.page_title, &sidebar, &content)
}

fn message_html(message: &Message) -> String {
    let role = message.role.as_str();
    format!(
        r#"<div class="message message-{role}" data-role="{role}">{}</div>"#,
        render_markdown(&message.content)
    )
}

fn logo_html(settings: &ChatSettings) -> String {
    if settings.logo_file().is_some() {
        r#"<img class="logo" src="/logo" alt="logo">"#.to_string()
    } else {
        String::new()
    }
}

/// Disclaimer markdown, when the configured file can be read.
fn disclaimer_html(settings: &ChatSettings) -> Option<String> {
    let path = settings.disclaimer_path.as_deref()?;
    match std::fs::read_to_string(path) {
        Ok(text) => Some(render_markdown(&text)),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Disclaimer not rendered");
            None
        }
    }
}
