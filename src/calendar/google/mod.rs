pub mod models;

use super::{EventSource, EventStart, EventType, RawCalendarEvent};
use crate::session::AccessToken;
use crate::{Error, Result};
use async_trait::async_trait;
use http::Extensions;
use indexmap::IndexMap;
use reqwest::header::{ACCEPT_ENCODING, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use std::time::Duration;
use url::Url;

/// Upper bound for general events fetched per year.
pub const MAX_GENERAL_EVENTS: u32 = 2500;

/// Upper bound for pages followed when fetching birthday events.
pub const MAX_BIRTHDAY_PAGES: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Error while making a http request.
    #[error("failure requesting remote resource: {0}")]
    Request(#[from] reqwest::Error),

    /// Error while executing some middleware code.
    #[error("request middleware failed with: {0}")]
    RequestMiddleware(#[from] reqwest_middleware::Error),

    /// Error while building http headers.
    #[error("encountered invalid HTTP header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    /// Error while parsing a JSON response.
    #[error("failed to parse response as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A request was sent without an access token in its extensions.
    #[error("no access token attached to request")]
    MissingToken,

    /// The API rejected the access token.
    #[error("access token was rejected")]
    Unauthorized,

    /// The API answered with an unexpected status.
    #[error("unexpected response status {0}: {1}")]
    Status(StatusCode, String),
}

impl From<ClientError> for reqwest_middleware::Error {
    fn from(err: ClientError) -> Self {
        reqwest_middleware::Error::Middleware(anyhow::Error::new(err))
    }
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unauthorized => Error::TokenRejected,
            err => Error::UpstreamFetch(err.to_string()),
        }
    }
}

/// Attaches the [`AccessToken`] found in the request extensions as bearer token.
struct AuthMiddleware;

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let token = extensions
            .get::<AccessToken>()
            .ok_or(ClientError::MissingToken)?;

        let mut header = HeaderValue::try_from(format!("Bearer {}", token.secret()))
            .map_err(ClientError::from)?;
        header.set_sensitive(true);
        req.headers_mut().insert(AUTHORIZATION, header);
        next.run(req, extensions).await
    }
}

/// Google calendar client for reading events on behalf of a signed-in user.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    client: ClientWithMiddleware,
    events_url: Url,
}

impl GoogleCalendarClient {
    /// Creates a client for the events of `calendar_id` below the API at `api_base_url`.
    pub fn new(
        api_base_url: &str,
        calendar_id: &str,
        timeout_secs: u64,
    ) -> Result<GoogleCalendarClient> {
        let mut events_url = Url::parse(api_base_url)?;
        events_url
            .path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events"]);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let client = ClientBuilder::new(
            reqwest::Client::builder()
                .default_headers(headers)
                .timeout(Duration::from_secs(timeout_secs))
                .build()?,
        )
        .with(AuthMiddleware)
        .build();

        Ok(GoogleCalendarClient { client, events_url })
    }

    /// Queries one page of events.
    pub async fn get_events(
        &self,
        token: &AccessToken,
        query: &IndexMap<&'static str, String>,
    ) -> Result<models::Events, ClientError> {
        let response = self
            .client
            .get(self.events_url.clone())
            .query(query)
            .with_extension(token.clone())
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }

        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status(status, body));
        }

        let events: models::Events = serde_json::from_str(&body)?;

        log::debug!("fetched {} events from Google Calendar", events.items.len());

        Ok(events)
    }
}

#[async_trait]
impl EventSource for GoogleCalendarClient {
    async fn fetch_birthday_events(
        &self,
        token: &AccessToken,
        year: i32,
    ) -> Result<Vec<RawCalendarEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_BIRTHDAY_PAGES {
            let query = build_query_parameters(year, Some("birthday"), None, page_token.as_deref());
            let page = self.get_events(token, &query).await?;

            events.extend(page.items.into_iter().map(RawCalendarEvent::from));

            match page.next_page_token {
                Some(next) if page_token.as_deref() == Some(next.as_str()) => {
                    log::warn!("calendar API repeated page token, stopping pagination");
                    return Ok(events);
                }
                Some(next) => page_token = Some(next),
                None => return Ok(events),
            }
        }

        log::warn!("stopped fetching birthday events after {MAX_BIRTHDAY_PAGES} pages");

        Ok(events)
    }

    async fn fetch_general_events(
        &self,
        token: &AccessToken,
        year: i32,
    ) -> Result<Vec<RawCalendarEvent>> {
        let query = build_query_parameters(year, None, Some(MAX_GENERAL_EVENTS), None);
        let page = self.get_events(token, &query).await?;

        Ok(page.items.into_iter().map(RawCalendarEvent::from).collect())
    }
}

impl From<models::Event> for RawCalendarEvent {
    fn from(ev: models::Event) -> Self {
        let start = match ev.start {
            Some(models::Timepoint {
                date: Some(date), ..
            }) => EventStart::Date(date),
            Some(models::Timepoint {
                date_time: Some(date_time),
                ..
            }) => EventStart::DateTime(date_time),
            _ => EventStart::Unspecified,
        };

        let event_type = match ev.event_type.as_deref() {
            Some("birthday") => EventType::Birthday,
            _ => EventType::Default,
        };

        RawCalendarEvent {
            summary: ev.summary,
            start,
            event_type,
        }
    }
}

fn build_query_parameters(
    year: i32,
    event_type: Option<&str>,
    max_results: Option<u32>,
    page_token: Option<&str>,
) -> IndexMap<&'static str, String> {
    // Google requires rfc3339 format for the times with a fixed offset
    // see: https://developers.google.com/calendar/api/v3/reference/events/list

    let mut query_parameters: IndexMap<&'static str, String> = IndexMap::from([
        // expand recurring events into single instances
        ("singleEvents", "true".to_owned()),
        // order ascending by start time
        ("orderBy", "startTime".to_owned()),
        // limit the events to the given year
        ("timeMin", format!("{year:04}-01-01T00:00:00Z")),
        ("timeMax", format!("{year:04}-12-31T23:59:59Z")),
    ]);

    if let Some(event_type) = event_type {
        query_parameters.insert("eventTypes", event_type.to_owned());
    }

    if let Some(count) = max_results {
        query_parameters.insert("maxResults", count.to_string());
    }

    if let Some(token) = page_token {
        // page token returned by previous request to fetch the next page
        query_parameters.insert("pageToken", token.to_owned());
    }

    query_parameters
}
