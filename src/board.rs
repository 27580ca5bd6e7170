use std::{collections::BTreeSet, num::NonZeroU32};

use chrono::{Duration, NaiveDate, NaiveTime};
use thiserror::Error;

use crate::clock::Clock;
use crate::db::Persistence;
use crate::models::{self, Difficulty, Event, EventDraft, EventId, Stats, UserIdentity};
use crate::weather::{WeatherPicker, CLOUDY, SUNNY};

const BASE_MEMBER_COUNT: usize = 237;
const TRASH_COLLECTED_LBS: u32 = 1540;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("{0}")]
    Validation(String),
    #[error("event {0} not found")]
    NotFound(EventId),
    #[error("event {id} is full ({capacity} participants)")]
    CapacityExceeded { id: EventId, capacity: NonZeroU32 },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// The event collection and the device's identity, kept consistent with
/// each other and written through `Persistence` after every mutation.
///
/// Newest events come first; that order is the default display order.
pub struct Board {
    pub(crate) events: Vec<Event>,
    pub(crate) identity: UserIdentity,
    pub(crate) persistence: Persistence,
    weather: Box<dyn WeatherPicker>,
    clock: Box<dyn Clock>,
}

impl Board {
    pub fn open(
        persistence: Persistence,
        weather: Box<dyn WeatherPicker>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let events = persistence.load_events().unwrap_or_default();
        let (name, joined) = persistence.load_identity();
        let identity = UserIdentity {
            name: name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| models::DEFAULT_USER_NAME.to_string()),
            events_joined: joined.unwrap_or_default(),
        };

        let mut board = Self {
            events,
            identity,
            persistence,
            weather,
            clock,
        };
        if board.reconcile_identity() {
            board.persistence.save_identity(&board.identity);
        }
        board
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn is_degraded(&self) -> bool {
        self.persistence.is_degraded()
    }

    pub fn find_by_id(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: EventId) -> Option<&mut Event> {
        self.events.iter_mut().find(|event| event.id == id)
    }

    pub fn create(&mut self, draft: EventDraft) -> Result<Event, BoardError> {
        let today = self.clock.today();
        let fields = validate_draft(draft, today)?;
        let creator = self.identity.name.clone();

        let event = Event {
            id: self.next_id(),
            name: fields.name,
            date: fields.date,
            time: fields.time,
            location: fields.location,
            description: fields.description,
            capacity: fields.capacity,
            difficulty: fields.difficulty,
            weather: self.weather.pick(),
            participants: vec![creator.clone()],
            created_by: creator,
            created_at: self.clock.now(),
        };

        self.events.insert(0, event.clone());
        self.identity.events_joined.insert(event.id);
        self.persistence.save_board(&self.events, &self.identity);
        tracing::info!(id = event.id, name = %event.name, "event created");
        Ok(event)
    }

    /// Installs `demo` as the collection on first run. Returns whether it did.
    pub fn seed_if_empty(&mut self, demo: Vec<Event>) -> bool {
        if !self.events.is_empty() {
            return false;
        }
        self.events = demo;
        self.reconcile_identity();
        self.persistence.save_board(&self.events, &self.identity);
        tracing::info!(count = self.events.len(), "seeded demo events");
        true
    }

    pub fn stats(&self) -> Stats {
        Stats {
            event_count: self.events.len(),
            member_count: BASE_MEMBER_COUNT + self.identity.events_joined.len() / 2,
            trash_collected_lbs: TRASH_COLLECTED_LBS,
        }
    }

    /// Changes the join identity. Joined ids are recomputed for the new name.
    pub fn rename(&mut self, name: &str) -> Result<&UserIdentity, BoardError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::Validation("name must not be empty".into()));
        }
        self.identity.name = name.to_string();
        self.identity.events_joined = self.joined_by(name);
        self.persistence.save_identity(&self.identity);
        tracing::debug!(name, joined = self.identity.events_joined.len(), "identity renamed");
        Ok(&self.identity)
    }

    fn joined_by(&self, name: &str) -> BTreeSet<EventId> {
        self.events
            .iter()
            .filter(|event| event.has_participant(name))
            .map(|event| event.id)
            .collect()
    }

    /// Recomputes `events_joined` from the participant lists. In memory only;
    /// returns whether anything changed so the caller can persist it.
    fn reconcile_identity(&mut self) -> bool {
        let derived = self.joined_by(&self.identity.name);
        if derived == self.identity.events_joined {
            return false;
        }
        tracing::debug!(
            stored = self.identity.events_joined.len(),
            derived = derived.len(),
            "joined events out of step with participants, reconciling"
        );
        self.identity.events_joined = derived;
        true
    }

    fn next_id(&self) -> EventId {
        let stamp = self.clock.now().timestamp_millis();
        match self.events.iter().map(|event| event.id).max() {
            Some(max) if max >= stamp => max.saturating_add(1),
            _ => stamp,
        }
    }
}

struct ValidDraft {
    name: String,
    date: NaiveDate,
    time: NaiveTime,
    location: String,
    description: String,
    capacity: Option<NonZeroU32>,
    difficulty: Difficulty,
}

fn validate_draft(draft: EventDraft, today: NaiveDate) -> Result<ValidDraft, BoardError> {
    let missing: Vec<&str> = [
        ("name", &draft.name),
        ("date", &draft.date),
        ("time", &draft.time),
        ("location", &draft.location),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| field)
    .collect();
    if !missing.is_empty() {
        return Err(BoardError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    let date = NaiveDate::parse_from_str(draft.date.trim(), "%Y-%m-%d")
        .map_err(|_| BoardError::Validation(format!("invalid date: {}", draft.date.trim())))?;
    if date < today {
        return Err(BoardError::Validation(format!(
            "date {date} is in the past"
        )));
    }

    let time = models::parse_time(&draft.time)
        .ok_or_else(|| BoardError::Validation(format!("invalid time: {}", draft.time.trim())))?;

    let capacity = match draft.capacity.trim() {
        "" => None,
        raw => Some(
            raw.parse::<NonZeroU32>()
                .map_err(|_| BoardError::Validation(format!("capacity must be a positive number: {raw}")))?,
        ),
    };

    let difficulty = match draft.difficulty.trim() {
        "" => Difficulty::default(),
        raw => raw.parse().map_err(BoardError::Validation)?,
    };

    Ok(ValidDraft {
        name: draft.name.trim().to_string(),
        date,
        time,
        location: draft.location.trim().to_string(),
        description: draft.description.trim().to_string(),
        capacity,
        difficulty,
    })
}

/// The three first-run cleanups, dated shortly after `today`.
pub fn demo_events(today: NaiveDate, created_at: chrono::DateTime<chrono::Utc>) -> Vec<Event> {
    let demo = |id: EventId,
                name: &str,
                days_out: i64,
                hour: u32,
                location: &str,
                description: &str,
                capacity: u32,
                difficulty: Difficulty,
                participants: &[&str],
                weather: &str| Event {
        id,
        name: name.to_string(),
        date: today + Duration::days(days_out),
        time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN),
        location: location.to_string(),
        description: description.to_string(),
        capacity: NonZeroU32::new(capacity),
        difficulty,
        weather: weather.to_string(),
        participants: participants.iter().map(|p| p.to_string()).collect(),
        created_by: participants.first().map(|p| p.to_string()).unwrap_or_default(),
        created_at,
    };

    vec![
        demo(
            1,
            "Sunset Beach Cleanup",
            3,
            17,
            "Sunset Beach, CA",
            "Evening cleanup with a beautiful ocean view. Bring your crew!",
            50,
            Difficulty::Easy,
            &["Alex", "Jordan", "Casey", "Morgan"],
            SUNNY,
        ),
        demo(
            2,
            "Marina Bay Deep Clean",
            8,
            9,
            "Marina Bay, CA",
            "Early morning cleanup. We'll tackle the rocky areas.",
            75,
            Difficulty::Moderate,
            &["Taylor", "Riley", "Sam", "Chris", "Pat"],
            CLOUDY,
        ),
        demo(
            3,
            "Coral Reef Restoration",
            10,
            14,
            "Coral Cove, HI",
            "Advanced cleanup focused on protecting marine life.",
            30,
            Difficulty::Challenging,
            &["Jordan", "Phoenix"],
            SUNNY,
        ),
    ]
}
