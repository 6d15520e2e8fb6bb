//! Server-rendered pages.
//!
//! Plain HTML strings; the streaming client in `static/app.js` takes over
//! the chat form once the page has loaded.

mod markdown;
mod pages;

pub use markdown::{escape_html, render_markdown};
pub use pages::{Banner, chat_page, login_page};
