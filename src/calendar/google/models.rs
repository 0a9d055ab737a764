use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

mod rfc3339_to_datetime_utc {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let offset_time = DateTime::parse_from_rfc3339(&s).map_err(serde::de::Error::custom)?;
        Ok(Some(offset_time.with_timezone(&Utc)))
    }
}

/// Start or end of an event. All-day events only carry `date`.
#[derive(Debug, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Timepoint {
    pub date: Option<NaiveDate>,
    #[serde(default, with = "rfc3339_to_datetime_utc")]
    pub date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Event {
    #[serde(default)]
    pub summary: String,
    pub start: Option<Timepoint>,
    pub event_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Events {
    #[serde(default)]
    pub items: Vec<Event>,
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_events_page() {
        let events: Events = serde_json::from_value(serde_json::json!({
            "kind": "calendar#events",
            "summary": "jane@example.org",
            "timeZone": "Europe/Berlin",
            "nextPageToken": "next",
            "items": [
                {
                    "id": "a",
                    "status": "confirmed",
                    "summary": "Jane's birthday",
                    "start": { "date": "2024-03-05" },
                    "end": { "date": "2024-03-06" },
                    "eventType": "birthday"
                },
                {
                    "id": "b",
                    "start": { "dateTime": "2024-03-05T10:00:00+01:00", "timeZone": "Europe/Berlin" }
                }
            ]
        }))
        .unwrap();

        assert_eq!(events.next_page_token.as_deref(), Some("next"));
        assert_eq!(events.items.len(), 2);

        let birthday = &events.items[0];
        let start = birthday.start.as_ref().unwrap();
        assert_eq!(start.date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(birthday.event_type.as_deref(), Some("birthday"));

        let meeting = &events.items[1];
        assert_eq!(meeting.summary, "");
        let start = meeting.start.as_ref().unwrap();
        assert_eq!(start.date, None);
        assert_eq!(
            start.date_time.unwrap().to_rfc3339(),
            "2024-03-05T09:00:00+00:00"
        );
    }

    #[test]
    fn deserialize_empty_page() {
        let events: Events = serde_json::from_str(r#"{"kind": "calendar#events"}"#).unwrap();

        assert!(events.items.is_empty());
        assert!(events.next_page_token.is_none());
    }
}
