use std::{collections::BTreeSet, fmt, num::NonZeroU32, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub type EventId = i64;

pub const DEFAULT_USER_NAME: &str = "Crew Member";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Moderate,
    Challenging,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Easy => "easy",
            Self::Moderate => "moderate",
            Self::Challenging => "challenging",
        })
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "moderate" => Ok(Self::Moderate),
            "challenging" => Ok(Self::Challenging),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// One planned cleanup. Serialized in the camelCase layout of the stored
/// `shoreSquadEvents` record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub time: NaiveTime,
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub capacity: Option<NonZeroU32>,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub weather: String,
    pub participants: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn has_participant(&self, name: &str) -> bool {
        self.participants.iter().any(|p| p == name)
    }

    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|cap| self.participants.len() >= capacity_len(cap))
    }

    /// Remaining seats, `None` when the event has no cap.
    pub fn spots_left(&self) -> Option<usize> {
        self.capacity
            .map(|cap| capacity_len(cap).saturating_sub(self.participants.len()))
    }
}

pub(crate) fn capacity_len(cap: NonZeroU32) -> usize {
    usize::try_from(cap.get()).unwrap_or(usize::MAX)
}

/// Raw creation input, as collected from a form. Coerced by `Board::create`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventDraft {
    pub name: String,
    pub date: String,
    pub time: String,
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capacity: String,
    #[serde(default)]
    pub difficulty: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub name: String,
    pub events_joined: BTreeSet<EventId>,
}

impl Default for UserIdentity {
    fn default() -> Self {
        Self {
            name: DEFAULT_USER_NAME.to_string(),
            events_joined: BTreeSet::new(),
        }
    }
}

impl UserIdentity {
    pub fn has_joined(&self, id: EventId) -> bool {
        self.events_joined.contains(&id)
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stats {
    pub event_count: usize,
    pub member_count: usize,
    pub trash_collected_lbs: u32,
}

mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).ok_or_else(|| serde::de::Error::custom(format!("bad time: {raw}")))
    }
}

/// Accepts `HH:MM` and `HH:MM:SS`. Seconds are dropped: events are stored
/// to the minute.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    ["%H:%M", "%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
        .and_then(|time| time.with_second(0))
        .and_then(|time| time.with_nanosecond(0))
}
