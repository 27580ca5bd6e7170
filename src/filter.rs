use serde::Deserialize;

use crate::models::Event;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    /// Case-insensitive substring of the name or location. Empty matches all.
    #[serde(default)]
    pub search: String,
    /// Exact weather tag. Empty matches all.
    #[serde(default)]
    pub weather: String,
}

impl EventQuery {
    pub fn new(search: impl Into<String>, weather: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            weather: weather.into(),
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.matches_search(&self.search.to_lowercase(), event) && self.matches_weather(event)
    }

    fn matches_search(&self, needle: &str, event: &Event) -> bool {
        needle.is_empty()
            || event.name.to_lowercase().contains(needle)
            || event.location.to_lowercase().contains(needle)
    }

    fn matches_weather(&self, event: &Event) -> bool {
        self.weather.is_empty() || event.weather == self.weather
    }
}

/// Read-only view of `events` matching `query`, in collection order.
pub fn filter_events<'a>(events: &'a [Event], query: &EventQuery) -> Vec<&'a Event> {
    let needle = query.search.to_lowercase();
    events
        .iter()
        .filter(|event| query.matches_search(&needle, event) && query.matches_weather(event))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::demo_events;
    use chrono::{DateTime, Utc};

    fn events() -> Vec<Event> {
        let now: DateTime<Utc> = DateTime::parse_from_rfc3339("2026-10-18T10:00:00Z")
            .expect("instant")
            .with_timezone(&Utc);
        demo_events(now.date_naive(), now)
    }

    fn names(filtered: &[&Event]) -> Vec<String> {
        filtered.iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn empty_query_returns_everything_in_order() {
        let events = events();
        let filtered = filter_events(&events, &EventQuery::default());
        let expected: Vec<&Event> = events.iter().collect();
        assert_eq!(filtered, expected);
    }

    #[test]
    fn search_matches_name_or_location_case_insensitively() {
        let events = events();
        assert_eq!(
            names(&filter_events(&events, &EventQuery::new("BAY", ""))),
            vec!["Marina Bay Deep Clean"]
        );
        assert_eq!(
            names(&filter_events(&events, &EventQuery::new("cove", ""))),
            vec!["Coral Reef Restoration"]
        );
        assert_eq!(
            names(&filter_events(&events, &EventQuery::new(", ca", ""))),
            vec!["Sunset Beach Cleanup", "Marina Bay Deep Clean"]
        );
        assert!(filter_events(&events, &EventQuery::new("glacier", "")).is_empty());
    }

    #[test]
    fn search_result_is_the_matching_subsequence() {
        let events = events();
        for term in ["a", "Clean", "reef", "hi", "zzz"] {
            let lowered = term.to_lowercase();
            let expected: Vec<&Event> = events
                .iter()
                .filter(|e| {
                    e.name.to_lowercase().contains(&lowered)
                        || e.location.to_lowercase().contains(&lowered)
                })
                .collect();
            assert_eq!(filter_events(&events, &EventQuery::new(term, "")), expected, "{term}");
        }
    }

    #[test]
    fn weather_tag_must_match_exactly_and_ands_with_search() {
        let events = events();
        assert_eq!(
            names(&filter_events(&events, &EventQuery::new("", "sunny"))),
            vec!["Sunset Beach Cleanup", "Coral Reef Restoration"]
        );
        assert!(filter_events(&events, &EventQuery::new("", "Sunny")).is_empty());
        assert_eq!(
            names(&filter_events(&events, &EventQuery::new("coral", "sunny"))),
            vec!["Coral Reef Restoration"]
        );
        assert!(filter_events(&events, &EventQuery::new("marina", "sunny")).is_empty());
        assert!(EventQuery::new("marina", "cloudy").matches(&events[1]));
    }
}
