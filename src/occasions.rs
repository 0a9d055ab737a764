//! Turns raw calendar events into a deduplicated, ordered list of birthdays and anniversaries.

use crate::calendar::RawCalendarEvent;
use chrono::{Datelike, NaiveDate};
use indexmap::IndexSet;
use serde::Serialize;
use std::fmt;
use std::ops::Deref;

/// Kind of a recurring occasion.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum OccasionKind {
    Birthday,
    Anniversary,
}

impl OccasionKind {
    /// Classifies an event by its subject.
    pub fn classify(summary: &str) -> OccasionKind {
        if is_anniversary(summary) {
            OccasionKind::Anniversary
        } else {
            OccasionKind::Birthday
        }
    }

    /// Returns the kind as a &str.
    pub fn as_str(&self) -> &str {
        match self {
            OccasionKind::Birthday => "birthday",
            OccasionKind::Anniversary => "anniversary",
        }
    }

    fn suffixes(&self) -> &'static [&'static str] {
        match self {
            OccasionKind::Birthday => &["'s birthday", "\u{2019}s birthday", " birthday"],
            OccasionKind::Anniversary => &[
                "'s anniversary",
                "\u{2019}s anniversary",
                " anniversary",
                "anniv",
            ],
        }
    }
}

impl fmt::Display for OccasionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// Whether a subject looks like an anniversary, i.e. contains "anniversary" or "anniv" in any
/// case.
pub fn is_anniversary(summary: &str) -> bool {
    summary.to_lowercase().contains("anniv")
}

/// Derives the display name of an occasion's subject by stripping the trailing phrase that
/// belongs to its kind, e.g. `Jane's birthday` becomes `Jane`.
///
/// Stripping repeats until no phrase matches, so the result is a fixed point. If nothing would
/// be left, the summary is returned unchanged.
pub fn canonical_name(summary: &str, kind: OccasionKind) -> String {
    let mut name = summary.trim();

    while let Some(stripped) = kind
        .suffixes()
        .iter()
        .find_map(|suffix| strip_suffix_ignore_case(name, suffix))
    {
        name = stripped.trim();
    }

    if name.is_empty() {
        summary.to_owned()
    } else {
        name.to_owned()
    }
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let start = text.len().checked_sub(suffix.len())?;

    if text.is_char_boundary(start) && text[start..].eq_ignore_ascii_case(suffix) {
        Some(&text[..start])
    } else {
        None
    }
}

/// A recurring date worth remembering.
///
/// Two occasions are the same if name, month, day and kind are equal.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Occasion {
    pub name: String,
    pub month: u32,
    pub day: u32,
    pub kind: OccasionKind,
}

impl Occasion {
    /// Builds an occasion from an event subject and its all-day start date.
    pub fn from_event(summary: &str, date: NaiveDate) -> Occasion {
        let kind = OccasionKind::classify(summary);

        Occasion {
            name: canonical_name(summary, kind),
            month: date.month(),
            day: date.day(),
            kind,
        }
    }

    fn month_day(&self) -> (u32, u32) {
        (self.month, self.day)
    }
}

impl fmt::Display for Occasion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}, {:02}-{:02})", self.name, self.kind, self.month, self.day)
    }
}

/// Normalized occasions in display order. Read-only once built.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct OccasionList(Vec<Occasion>);

impl Deref for OccasionList {
    type Target = [Occasion];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a OccasionList {
    type Item = &'a Occasion;
    type IntoIter = std::slice::Iter<'a, Occasion>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// How occasions are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending by month and day within the calendar year.
    CalendarYear,
    /// Like `CalendarYear`, but occasions before `today` rank after all others.
    Upcoming { today: NaiveDate },
}

impl SortOrder {
    /// Stable sort, occasions on the same day keep their relative order.
    fn sort(self, occasions: &mut [Occasion]) {
        match self {
            SortOrder::CalendarYear => occasions.sort_by_key(Occasion::month_day),
            SortOrder::Upcoming { today } => {
                let today = (today.month(), today.day());
                occasions.sort_by_key(|occasion| {
                    let month_day = occasion.month_day();
                    (month_day < today, month_day)
                });
            }
        }
    }
}

/// Merges birthday-typed events with the anniversary-like general events into a deduplicated
/// [`OccasionList`].
///
/// Events without an all-day start are skipped.
pub fn normalize(
    birthday_events: Vec<RawCalendarEvent>,
    general_events: Vec<RawCalendarEvent>,
    order: SortOrder,
) -> OccasionList {
    let anniversaries = general_events
        .into_iter()
        .filter(|event| is_anniversary(&event.summary));

    let mut occasions = IndexSet::new();

    for event in birthday_events.into_iter().chain(anniversaries) {
        match event.start_date() {
            Ok(date) => {
                occasions.insert(Occasion::from_event(&event.summary, date));
            }
            Err(err) => log::debug!("skipping event: {err}"),
        }
    }

    let mut occasions: Vec<Occasion> = occasions.into_iter().collect();
    order.sort(&mut occasions);

    log::debug!("normalized {} occasions", occasions.len());

    OccasionList(occasions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{EventStart, EventType};
    use chrono::{TimeZone, Utc};

    macro_rules! date {
        ($y:expr, $m:expr, $d:expr) => {
            NaiveDate::from_ymd_opt($y, $m, $d).unwrap()
        };
    }

    macro_rules! event {
        ($summary:expr, $y:expr, $m:expr, $d:expr) => {
            RawCalendarEvent {
                summary: $summary.into(),
                start: EventStart::Date(date!($y, $m, $d)),
                event_type: EventType::Default,
            }
        };
    }

    macro_rules! occasion {
        ($name:expr, $m:expr, $d:expr, $kind:ident) => {
            Occasion {
                name: $name.into(),
                month: $m,
                day: $d,
                kind: OccasionKind::$kind,
            }
        };
    }

    #[test]
    fn classification() {
        assert_eq!(OccasionKind::classify("10th Anniversary"), OccasionKind::Anniversary);
        assert_eq!(OccasionKind::classify("wedding ANNIV"), OccasionKind::Anniversary);
        assert_eq!(OccasionKind::classify("Jane's birthday"), OccasionKind::Birthday);
        assert_eq!(OccasionKind::classify("Dentist"), OccasionKind::Birthday);
    }

    #[test]
    fn birthday_names() {
        use OccasionKind::Birthday;

        assert_eq!(canonical_name("Jane's birthday", Birthday), "Jane");
        assert_eq!(canonical_name("Jane\u{2019}s Birthday", Birthday), "Jane");
        assert_eq!(canonical_name("  Jane Doe BIRTHDAY ", Birthday), "Jane Doe");
        assert_eq!(canonical_name("Jane", Birthday), "Jane");
        assert_eq!(canonical_name("Birthday", Birthday), "Birthday");
    }

    #[test]
    fn anniversary_names() {
        use OccasionKind::Anniversary;

        assert_eq!(canonical_name("10th anniversary", Anniversary), "10th");
        assert_eq!(canonical_name("Mum & Dad's Anniversary", Anniversary), "Mum & Dad");
        assert_eq!(canonical_name("Mum & Dad\u{2019}s anniversary", Anniversary), "Mum & Dad");
        assert_eq!(canonical_name("Wedding anniv", Anniversary), "Wedding");
    }

    #[test]
    fn empty_name_keeps_summary() {
        assert_eq!(
            canonical_name("Anniversary", OccasionKind::Anniversary),
            "Anniversary"
        );
        assert_eq!(
            canonical_name("'s birthday", OccasionKind::Birthday),
            "'s birthday"
        );
    }

    #[test]
    fn canonical_name_is_idempotent() {
        let cases = [
            ("Jane's birthday", OccasionKind::Birthday),
            ("Jane birthday birthday", OccasionKind::Birthday),
            ("Our anniv anniversary", OccasionKind::Anniversary),
            ("Anniv", OccasionKind::Anniversary),
            ("  spaced  ", OccasionKind::Birthday),
        ];

        for (summary, kind) in cases {
            let once = canonical_name(summary, kind);
            assert_eq!(canonical_name(&once, kind), once, "{summary}");
        }
    }

    #[test]
    fn normalize_collapses_duplicates() {
        let occasions = normalize(
            vec![
                event!("Jane's birthday", 2020, 3, 5),
                event!("Jane's birthday", 2024, 3, 5),
            ],
            vec![event!("10th anniversary", 2020, 7, 1)],
            SortOrder::CalendarYear,
        );

        assert_eq!(
            &*occasions,
            &[
                occasion!("Jane", 3, 5, Birthday),
                occasion!("10th", 7, 1, Anniversary),
            ]
        );
    }

    #[test]
    fn duplicates_collapse_across_spellings() {
        let occasions = normalize(
            vec![
                event!("Jane birthday", 2024, 3, 5),
                event!("Jane\u{2019}s birthday", 2024, 3, 5),
            ],
            vec![],
            SortOrder::CalendarYear,
        );

        assert_eq!(&*occasions, &[occasion!("Jane", 3, 5, Birthday)]);
    }

    #[test]
    fn same_name_with_other_kind_or_date_is_kept() {
        let occasions = normalize(
            vec![event!("Jane's birthday", 2024, 3, 5)],
            vec![
                event!("Jane's anniversary", 2024, 3, 5),
                event!("Jane's anniversary", 2024, 3, 6),
            ],
            SortOrder::CalendarYear,
        );

        assert_eq!(occasions.len(), 3);
    }

    #[test]
    fn general_events_need_anniversary_subject() {
        let occasions = normalize(
            vec![],
            vec![
                event!("Dentist", 2024, 2, 1),
                event!("Paul's birthday party", 2024, 2, 2),
                event!("Wedding Anniv", 2024, 2, 3),
            ],
            SortOrder::CalendarYear,
        );

        assert_eq!(&*occasions, &[occasion!("Wedding", 2, 3, Anniversary)]);
    }

    #[test]
    fn birthday_typed_events_are_classified_by_subject() {
        let occasions = normalize(
            vec![event!("Office anniversary", 2024, 9, 1)],
            vec![],
            SortOrder::CalendarYear,
        );

        assert_eq!(&*occasions, &[occasion!("Office", 9, 1, Anniversary)]);
    }

    #[test]
    fn events_without_all_day_start_are_skipped() {
        let timed = RawCalendarEvent {
            summary: "Jane's birthday dinner anniversary".into(),
            start: EventStart::DateTime(Utc.with_ymd_and_hms(2024, 3, 5, 19, 0, 0).unwrap()),
            event_type: EventType::Default,
        };
        let unspecified = RawCalendarEvent {
            summary: "Bob's birthday".into(),
            start: EventStart::Unspecified,
            event_type: EventType::Birthday,
        };

        let occasions = normalize(
            vec![unspecified, event!("Ann's birthday", 2024, 1, 1)],
            vec![timed],
            SortOrder::CalendarYear,
        );

        assert_eq!(&*occasions, &[occasion!("Ann", 1, 1, Birthday)]);
    }

    #[test]
    fn sorting_is_stable_by_month_and_day() {
        let occasions = normalize(
            vec![
                event!("Zoe's birthday", 2024, 12, 24),
                event!("Bob's birthday", 2024, 3, 5),
                event!("Amy's birthday", 2024, 3, 5),
                event!("Leap's birthday", 2024, 2, 29),
            ],
            vec![event!("Anniversary of us anniv", 2024, 3, 5)],
            SortOrder::CalendarYear,
        );

        let names: Vec<_> = occasions.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Leap", "Bob", "Amy", "Anniversary of us", "Zoe"]);
    }

    #[test]
    fn upcoming_order_rolls_passed_occasions_over() {
        let occasions = normalize(
            vec![
                event!("Jan's birthday", 2024, 1, 10),
                event!("Jun's birthday", 2024, 6, 1),
                event!("Today's birthday", 2024, 5, 20),
                event!("Dec's birthday", 2024, 12, 1),
            ],
            vec![],
            SortOrder::Upcoming {
                today: date!(2024, 5, 20),
            },
        );

        let names: Vec<_> = occasions.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Today", "Jun", "Dec", "Jan"]);
    }
}
