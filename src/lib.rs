use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub mod calendar;
pub mod occasions;
pub mod oauth;
pub mod session;
pub mod web;

/// Result type used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by all fallible operations within this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Exchanging an authorization code for an access token failed.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    /// Reading events from the calendar provider failed.
    #[error("failed to fetch calendar events: {0}")]
    UpstreamFetch(String),
    /// The calendar provider no longer accepts the access token.
    #[error("access token was rejected by the calendar provider")]
    TokenRejected,
    /// A calendar event has no date-only start and cannot be an occasion.
    #[error("event `{0}` has no all-day start date")]
    MalformedEvent(String),
}

/// Web server configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ServerConfig {
    /// Address on which the web server will listen.
    pub listen_addr: SocketAddr,
    /// Public origin of the site, e.g. `https://birthdays.example.org`.
    pub base_url: String,
    /// Automatically reload templates when they are modified.
    #[serde(default)]
    pub template_autoreload: bool,
    /// Path to the template directory.
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    /// Path to the static directory.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Number of HTTP worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl ServerConfig {
    /// The URI the identity provider redirects back to after consent.
    pub fn redirect_uri(&self) -> String {
        format!("{}/auth/google/callback", self.base_url.trim_end_matches('/'))
    }
}

/// OAuth client configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct OAuthConfig {
    /// The OAuth client identifier.
    pub client_id: String,
    /// The OAuth client secret.
    pub client_secret: String,
    /// The provider's authorization endpoint.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// The provider's token endpoint.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Timeout for requests to the token endpoint.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Calendar configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CalendarConfig {
    /// Source for calendar events.
    pub event_source: calendar::EventSourceKind,
    /// The calendar to read, `primary` being the signed-in user's default calendar.
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// Base URL of the Google Calendar API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Time zone that determines "today" and thus the year being queried.
    #[serde(default = "default_time_zone")]
    pub time_zone: chrono_tz::Tz,
    /// Rank occasions that already passed this year after the upcoming ones.
    #[serde(default)]
    pub roll_over_passed: bool,
    /// Timeout for requests to the calendar API.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Events used by the static event source.
    #[serde(default)]
    pub events: Vec<calendar::StaticEvent>,
}

/// Global application configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AppConfig {
    /// Server configuration section.
    pub server: ServerConfig,
    /// OAuth configuration section.
    pub oauth: OAuthConfig,
    /// Calendar configuration section.
    pub calendar: CalendarConfig,
}

impl AppConfig {
    /// Loads the application configuration from files in the `config/` directory and environment
    /// variables.
    pub fn load() -> Result<AppConfig> {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());

        log::info!("loading configuration using {} environment", app_env);

        let config: AppConfig = Config::builder()
            // Configuration defaults from `config/default.toml`.
            .add_source(File::with_name("config/default"))
            // Optional environment specific config overrides, e.g. `config/production.toml`.
            .add_source(File::with_name(&format!("config/{}", app_env)).required(false))
            // Optional local config overrides from `config/local.toml` (on .gitignore).
            .add_source(File::with_name("config/local").required(false))
            // Config from environment variables.
            .add_source(Environment::default().separator("__"))
            // Config from environment variables prefixed with `BIRTHDAYS_`.
            .add_source(
                Environment::with_prefix("BIRTHDAYS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        log::debug!(
            "loaded configuration: server={:?} calendar_source={:?}",
            config.server,
            config.calendar.event_source
        );

        Ok(config)
    }
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_workers() -> usize {
    2
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".into()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".into()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_calendar_id() -> String {
    "primary".into()
}

fn default_api_base_url() -> String {
    "https://www.googleapis.com/calendar/v3".into()
}

fn default_time_zone() -> chrono_tz::Tz {
    chrono_tz::UTC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_uri_ignores_trailing_slash() {
        let server = ServerConfig {
            listen_addr: "127.0.0.1:8080".parse().unwrap(),
            base_url: "https://birthdays.example.org/".into(),
            template_autoreload: false,
            template_dir: default_template_dir(),
            static_dir: default_static_dir(),
            workers: 1,
        };

        assert_eq!(
            server.redirect_uri(),
            "https://birthdays.example.org/auth/google/callback"
        );
    }
}
