pub mod google;
pub mod templating;

use super::Result;
use crate::occasions::{self, OccasionList, SortOrder};
use crate::session::AccessToken;
use crate::{CalendarConfig, Error};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use google::GoogleCalendarClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Start of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStart {
    /// All-day event.
    Date(NaiveDate),
    /// Event with a time of day.
    DateTime(DateTime<Utc>),
    /// The provider sent no usable start.
    Unspecified,
}

/// Type of a calendar event as classified by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventType {
    /// Dedicated birthday event.
    Birthday,
    #[default]
    Default,
}

/// A calendar event as read from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCalendarEvent {
    /// The event subject.
    pub summary: String,
    pub start: EventStart,
    pub event_type: EventType,
}

impl RawCalendarEvent {
    /// Returns the all-day start date, or [`Error::MalformedEvent`] for events that have none.
    pub fn start_date(&self) -> Result<NaiveDate> {
        match self.start {
            EventStart::Date(date) => Ok(date),
            _ => Err(Error::MalformedEvent(self.summary.clone())),
        }
    }
}

/// A calendar event from the application configuration.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StaticEvent {
    /// The event subject.
    pub summary: String,
    /// Date of the all-day event.
    pub date: NaiveDate,
    /// Whether this is a dedicated birthday event.
    #[serde(default)]
    pub birthday: bool,
}

impl From<StaticEvent> for RawCalendarEvent {
    fn from(event: StaticEvent) -> Self {
        RawCalendarEvent {
            summary: event.summary,
            start: EventStart::Date(event.date),
            event_type: if event.birthday {
                EventType::Birthday
            } else {
                EventType::Default
            },
        }
    }
}

/// Represents sources of calendar events.
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum EventSourceKind {
    /// Use static events from the application configuration.
    Static,
    /// Load events from Google Calendar.
    GoogleCalendar,
}

/// Trait that needs to be implemented by a source of calendar events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetches the dedicated birthday events of `year`.
    async fn fetch_birthday_events(
        &self,
        token: &AccessToken,
        year: i32,
    ) -> Result<Vec<RawCalendarEvent>>;

    /// Fetches all events of `year`.
    async fn fetch_general_events(
        &self,
        token: &AccessToken,
        year: i32,
    ) -> Result<Vec<RawCalendarEvent>>;
}

/// An `EventSource` that returns events from a static list, regardless of year and token.
pub struct StaticEventSource {
    events: Vec<RawCalendarEvent>,
}

impl StaticEventSource {
    /// Creates a new `StaticEventSource` from an iterator.
    pub fn new<I>(iter: I) -> StaticEventSource
    where
        I: IntoIterator,
        I::Item: Into<RawCalendarEvent>,
    {
        StaticEventSource {
            events: iter.into_iter().map(Into::into).collect(),
        }
    }

    fn events_of_type(&self, event_type: EventType) -> Vec<RawCalendarEvent> {
        self.events
            .iter()
            .filter(|event| event.event_type == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSource for StaticEventSource {
    async fn fetch_birthday_events(
        &self,
        _token: &AccessToken,
        _year: i32,
    ) -> Result<Vec<RawCalendarEvent>> {
        Ok(self.events_of_type(EventType::Birthday))
    }

    async fn fetch_general_events(
        &self,
        _token: &AccessToken,
        _year: i32,
    ) -> Result<Vec<RawCalendarEvent>> {
        Ok(self.events_of_type(EventType::Default))
    }
}

#[async_trait]
impl<T> EventSource for Box<T>
where
    T: EventSource + ?Sized,
{
    async fn fetch_birthday_events(
        &self,
        token: &AccessToken,
        year: i32,
    ) -> Result<Vec<RawCalendarEvent>> {
        (**self).fetch_birthday_events(token, year).await
    }

    async fn fetch_general_events(
        &self,
        token: &AccessToken,
        year: i32,
    ) -> Result<Vec<RawCalendarEvent>> {
        (**self).fetch_general_events(token, year).await
    }
}

#[async_trait]
impl<T> EventSource for Arc<T>
where
    T: EventSource + ?Sized,
{
    async fn fetch_birthday_events(
        &self,
        token: &AccessToken,
        year: i32,
    ) -> Result<Vec<RawCalendarEvent>> {
        (**self).fetch_birthday_events(token, year).await
    }

    async fn fetch_general_events(
        &self,
        token: &AccessToken,
        year: i32,
    ) -> Result<Vec<RawCalendarEvent>> {
        (**self).fetch_general_events(token, year).await
    }
}

/// The `Calendar` type runs the occasion pipeline on top of an event source.
#[derive(Clone)]
pub struct Calendar {
    event_source: Arc<dyn EventSource>,
    time_zone: Tz,
    roll_over_passed: bool,
}

impl Calendar {
    /// Creates a new `Calendar` from an event source.
    pub fn new<T>(event_source: T) -> Calendar
    where
        T: EventSource + 'static,
    {
        Calendar {
            event_source: Arc::new(event_source),
            time_zone: chrono_tz::UTC,
            roll_over_passed: false,
        }
    }

    /// Sets the time zone that determines the current date.
    pub fn with_time_zone(mut self, time_zone: Tz) -> Calendar {
        self.time_zone = time_zone;
        self
    }

    /// Ranks occasions that already passed this year last.
    pub fn with_roll_over_passed(mut self, roll_over_passed: bool) -> Calendar {
        self.roll_over_passed = roll_over_passed;
        self
    }

    /// Creates a new `Calendar` from configuration.
    pub fn from_config(config: &CalendarConfig) -> Result<Calendar> {
        let event_source: Box<dyn EventSource> = match config.event_source {
            EventSourceKind::Static => Box::new(StaticEventSource::new(config.events.clone())),
            EventSourceKind::GoogleCalendar => Box::new(GoogleCalendarClient::new(
                &config.api_base_url,
                &config.calendar_id,
                config.request_timeout_secs,
            )?),
        };

        Ok(Calendar::new(event_source)
            .with_time_zone(config.time_zone)
            .with_roll_over_passed(config.roll_over_passed))
    }

    /// The current date in the calendar's time zone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.time_zone).date_naive()
    }

    /// Fetches and normalizes this year's occasions.
    pub async fn occasions(&self, token: &AccessToken) -> Result<OccasionList> {
        self.occasions_on(token, self.today()).await
    }

    /// Fetches and normalizes the occasions of the year `today` falls in. Any failed fetch
    /// fails the whole computation.
    pub async fn occasions_on(&self, token: &AccessToken, today: NaiveDate) -> Result<OccasionList> {
        let year = today.year();

        let (birthday_events, general_events) = tokio::try_join!(
            self.event_source.fetch_birthday_events(token, year),
            self.event_source.fetch_general_events(token, year),
        )?;

        log::debug!(
            "fetched {} birthday and {} general events for {year}",
            birthday_events.len(),
            general_events.len()
        );

        let order = if self.roll_over_passed {
            SortOrder::Upcoming { today }
        } else {
            SortOrder::CalendarYear
        };

        Ok(occasions::normalize(birthday_events, general_events, order))
    }
}
