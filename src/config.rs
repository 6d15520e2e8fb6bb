//! Runtime configuration.
//!
//! Two layers are loaded at startup:
//!
//! - [`ChatSettings`]: assistant credentials and page copy, read from the
//!   process environment (after an optional `.env`). Missing values are fatal.
//! - [`AppConfig`]: server, auth and session settings layered with the
//!   `config` crate. Priority: CLI flag > `CHAT_` env var > config file > defaults.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

/// Base URL of the hosted assistant API when `OPENAI_BASE_URL` is unset.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Label of the manual new-chat control when `START_CHAT_BUTTON` is unset.
pub const DEFAULT_START_CHAT_BUTTON: &str = "New chat";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Credential file path
    #[arg(long, env = "CREDENTIALS_FILE")]
    pub credentials: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print an argon2 hash for a password, for use in the credential file.
    HashPassword {
        /// Plain-text password to hash.
        password: String,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub static_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub credentials_path: String,
    pub cookie_name: String,
    pub cookie_expiry_days: u32,
    pub login_requests_per_second: f32,
    pub login_burst: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// A signed-in session unused this long is dropped, which signs the user
    /// out. Defaults to the cookie lifetime.
    pub idle_timeout_minutes: u64,
    pub cleanup_interval_secs: u64,
}

impl AppConfig {
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Built-in defaults only, ignoring files, environment and flags.
    pub fn defaults() -> Result<Self, config::ConfigError> {
        Self::default_builder()?.build()?.try_deserialize()
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Self::default_builder()?;

        // Explicit file must exist; ./config.{yaml,toml,json} is picked up when present.
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // E.g. CHAT_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("CHAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(path) = &cli.credentials {
            builder = builder.set_override("auth.credentials_path", path.as_str())?;
        }

        builder.build()?.try_deserialize()
    }

    fn default_builder() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.request_timeout_secs", 120)?
            .set_default("server.static_dir", "static")?
            .set_default("auth.credentials_path", "credentials.yaml")?
            .set_default("auth.cookie_name", "chat_session")?
            .set_default("auth.cookie_expiry_days", 30)?
            .set_default("auth.login_requests_per_second", 1.0)?
            .set_default("auth.login_burst", 5.0)?
            .set_default("session.idle_timeout_minutes", 30 * 24 * 60)?
            .set_default("session.cleanup_interval_secs", 300)
    }
}

/// Errors raised while reading [`ChatSettings`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required env var: {0}")]
    Missing(&'static str),

    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("{key} is not a valid URL: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Assistant credentials and the text shown on the page.
#[derive(Clone)]
pub struct ChatSettings {
    /// Bearer key for the assistant service.
    pub api_key: String,
    /// Identifier of the hosted assistant.
    pub assistant_id: String,
    /// Model used for each run.
    pub model: String,
    /// Base URL of the assistant API.
    pub base_url: String,
    /// Run-level instructions; the assistant's own are used when unset.
    pub instructions: Option<String>,
    pub page_title: String,
    pub welcome_message: String,
    /// Placeholder of the chat input box.
    pub user_prompt: String,
    /// Shown instead of the conversation while no chat is active.
    pub begin_message: String,
    /// Shown after logout.
    pub exit_message: String,
    pub start_chat_button: String,
    /// Markdown file rendered under the chat, if it exists.
    pub disclaimer_path: Option<PathBuf>,
    /// Sidebar image, if it exists.
    pub logo_path: Option<PathBuf>,
}

impl fmt::Debug for ChatSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSettings")
            .field("assistant_id", &self.assistant_id)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("page_title", &self.page_title)
            .field("logo_path", &self.logo_path)
            .finish_non_exhaustive()
    }
}

impl ChatSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            let value = lookup(key).ok_or(ConfigError::Missing(key))?;
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(key));
            }
            Ok(value)
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url =
            optional("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        url::Url::parse(&base_url).map_err(|source| ConfigError::InvalidUrl {
            key: "OPENAI_BASE_URL",
            source,
        })?;

        Ok(Self {
            api_key: required("API_KEY")?,
            assistant_id: required("ASSISTANT_KEY")?,
            model: required("OPENAI_MODEL")?,
            base_url,
            instructions: optional("INSTRUCTIONS"),
            page_title: required("PAGE_TITLE")?,
            welcome_message: required("WELCOME_MESSAGE")?,
            user_prompt: required("USER_PROMPT")?,
            begin_message: required("BEGIN_MESSAGE")?,
            exit_message: required("EXIT_MESSAGE")?,
            start_chat_button: optional("START_CHAT_BUTTON")
                .unwrap_or_else(|| DEFAULT_START_CHAT_BUTTON.to_string()),
            disclaimer_path: optional("DISCLAIMER").map(PathBuf::from),
            logo_path: optional("LOGO").map(PathBuf::from),
        })
    }

    /// Logo path, only when it points at an existing file.
    #[must_use]
    pub fn logo_file(&self) -> Option<&std::path::Path> {
        self.logo_path.as_deref().filter(|p| p.is_file())
    }
}
