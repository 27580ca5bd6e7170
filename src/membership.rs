//! Join and leave transitions.
//!
//! Each transition checks its preconditions against the current board,
//! applies the participant change and the identity change together, then
//! writes both records in a single batch. A rejected join touches neither.

use serde::Serialize;

use crate::board::{Board, BoardError};
use crate::models::{capacity_len, Event, EventId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "event", rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined(Event),
    /// The name was already on the list; nothing changed.
    AlreadyJoined(Event),
}

impl JoinOutcome {
    pub fn event(&self) -> &Event {
        match self {
            Self::Joined(event) | Self::AlreadyJoined(event) => event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveOutcome {
    /// The event after the change, `None` if it no longer exists.
    pub event: Option<Event>,
    pub changed: bool,
}

impl Board {
    pub fn join(&mut self, event_id: EventId, user_name: &str) -> Result<JoinOutcome, BoardError> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(BoardError::Validation("name must not be empty".into()));
        }
        let is_identity = user_name == self.identity.name;
        let event = self
            .find_mut(event_id)
            .ok_or(BoardError::NotFound(event_id))?;

        if event.has_participant(user_name) {
            tracing::debug!(event_id, user_name, "already joined");
            return Ok(JoinOutcome::AlreadyJoined(event.clone()));
        }
        if let Some(capacity) = event.capacity {
            if event.participants.len() >= capacity_len(capacity) {
                tracing::debug!(event_id, user_name, %capacity, "join rejected, event full");
                return Err(BoardError::CapacityExceeded {
                    id: event_id,
                    capacity,
                });
            }
        }

        event.participants.push(user_name.to_string());
        let joined = event.clone();
        if is_identity {
            self.identity.events_joined.insert(event_id);
        }
        self.persistence.save_board(&self.events, &self.identity);
        tracing::debug!(event_id, user_name, count = joined.participants.len(), "joined");
        Ok(JoinOutcome::Joined(joined))
    }

    pub fn leave(&mut self, event_id: EventId, user_name: &str) -> LeaveOutcome {
        let user_name = user_name.trim();
        let is_identity = user_name == self.identity.name;
        let mut changed = false;

        let event = self.find_mut(event_id).map(|event| {
            let before = event.participants.len();
            event.participants.retain(|name| name != user_name);
            changed |= event.participants.len() != before;
            event.clone()
        });
        if is_identity {
            changed |= self.identity.events_joined.remove(&event_id);
        }

        if changed {
            self.persistence.save_board(&self.events, &self.identity);
            tracing::debug!(event_id, user_name, "left");
        }
        LeaveOutcome { event, changed }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::board::tests::{board_with, draft, seeded_board};
    use crate::board::demo_events;
    use crate::db::{KvStore, MemoryStore, Persistence, StoreError};

    fn joined_ids(board: &Board) -> BTreeSet<EventId> {
        board.identity().events_joined.clone()
    }

    fn derived_ids(board: &Board) -> BTreeSet<EventId> {
        let name = &board.identity().name;
        board
            .events()
            .iter()
            .filter(|event| event.has_participant(name))
            .map(|event| event.id)
            .collect()
    }

    fn participants(board: &Board, id: EventId) -> Vec<String> {
        board.find_by_id(id).expect("event").participants.clone()
    }

    #[test]
    fn demo_scenario_join_repeat_and_fill() {
        let mut board = seeded_board();
        assert_eq!(participants(&board, 3).len(), 2);

        let first = board.join(3, "NewUser").expect("join");
        assert!(matches!(first, JoinOutcome::Joined(_)));
        assert_eq!(first.event().participants.len(), 3);

        let again = board.join(3, "NewUser").expect("repeat join");
        assert!(matches!(again, JoinOutcome::AlreadyJoined(_)));
        assert_eq!(participants(&board, 3).len(), 3);

        for n in 0..27 {
            board.join(3, &format!("Volunteer {n}")).expect("fill");
        }
        assert_eq!(participants(&board, 3).len(), 30);
        assert!(board.find_by_id(3).expect("event").is_full());

        let err = board.join(3, "Latecomer").expect_err("full");
        assert_eq!(
            err,
            BoardError::CapacityExceeded {
                id: 3,
                capacity: std::num::NonZeroU32::new(30).expect("nonzero"),
            }
        );
        assert_eq!(participants(&board, 3).len(), 30);
    }

    #[test]
    fn join_is_idempotent_on_state() {
        let mut once = seeded_board();
        once.join(2, "Crew Member").expect("join");

        let mut twice = seeded_board();
        twice.join(2, "Crew Member").expect("join");
        twice.join(2, "Crew Member").expect("join again");

        assert_eq!(once.events(), twice.events());
        assert_eq!(once.identity(), twice.identity());
    }

    #[test]
    fn join_unknown_event_is_not_found() {
        let mut board = seeded_board();
        assert_eq!(
            board.join(404, "Crew Member"),
            Err(BoardError::NotFound(404))
        );
        assert!(board.identity().events_joined.is_empty());
    }

    #[test]
    fn full_event_rejects_the_identity_without_touching_it() {
        let mut board = seeded_board();
        for n in 0..28 {
            board.join(3, &format!("Diver {n}")).expect("fill");
        }
        let before = board.events().to_vec();

        assert!(board.join(3, "Crew Member").is_err());
        assert_eq!(board.events(), before.as_slice());
        assert!(!board.identity().has_joined(3));
    }

    #[test]
    fn identity_tracks_its_own_joins_only() {
        let mut board = seeded_board();
        board.join(1, "Crew Member").expect("join self");
        board.join(2, "Someone Else").expect("join other");

        let expected: BTreeSet<EventId> = [1].into_iter().collect();
        assert_eq!(joined_ids(&board), expected);
        assert!(participants(&board, 2).contains(&"Someone Else".to_string()));
    }

    #[test]
    fn padded_names_join_and_leave_as_the_identity() {
        let mut board = seeded_board();
        board.join(1, "  Crew Member ").expect("join");

        assert_eq!(participants(&board, 1).last().map(String::as_str), Some("Crew Member"));
        assert!(board.identity().has_joined(1));

        let again = board.join(1, "Crew Member").expect("repeat join");
        assert!(matches!(again, JoinOutcome::AlreadyJoined(_)));

        let left = board.leave(1, " Crew Member");
        assert!(left.changed);
        assert!(joined_ids(&board).is_empty());
        assert_eq!(joined_ids(&board), derived_ids(&board));
    }

    #[test]
    fn blank_names_cannot_join() {
        let mut board = seeded_board();
        let before = board.events().to_vec();
        assert!(matches!(board.join(1, "   "), Err(BoardError::Validation(_))));
        assert_eq!(board.events(), before.as_slice());
    }

    #[test]
    fn leave_removes_both_sides_and_is_idempotent() {
        let mut board = seeded_board();
        board.join(1, "Crew Member").expect("join");

        let left = board.leave(1, "Crew Member");
        assert!(left.changed);
        assert!(!left.event.expect("event").has_participant("Crew Member"));
        assert!(joined_ids(&board).is_empty());

        let snapshot = board.events().to_vec();
        let again = board.leave(1, "Crew Member");
        assert!(!again.changed);
        assert_eq!(board.events(), snapshot.as_slice());
    }

    #[test]
    fn leave_missing_event_still_clears_the_joined_id() {
        let mut board = seeded_board();
        board.identity.events_joined.insert(77);

        let outcome = board.leave(77, "Crew Member");
        assert!(outcome.changed);
        assert!(outcome.event.is_none());
        assert!(joined_ids(&board).is_empty());
    }

    #[test]
    fn mixed_sequences_keep_identity_consistent_and_unique() {
        let mut board = seeded_board();
        let created = board.create(draft("Pier Sweep")).expect("create");
        let ids = [1, 2, 3, created.id, 404];

        for step in 0..60usize {
            let id = ids[step % ids.len()];
            if step % 3 == 2 {
                board.leave(id, "Crew Member");
            } else {
                let _ = board.join(id, "Crew Member");
            }
            let _ = board.join(id, &format!("Guest {}", step % 4));

            assert_eq!(joined_ids(&board), derived_ids(&board), "step {step}");
            for event in board.events() {
                let unique: BTreeSet<&String> = event.participants.iter().collect();
                assert_eq!(unique.len(), event.participants.len(), "duplicates in {}", event.id);
                if let Some(cap) = event.capacity {
                    assert!(event.participants.len() <= capacity_len(cap));
                }
            }
        }
    }

    #[test]
    fn join_and_leave_persist_both_records() {
        let mut board = seeded_board();
        board.join(2, "Crew Member").expect("join");

        let reloaded = board_with(std::mem::replace(
            &mut board.persistence,
            Persistence::in_memory(),
        ));
        assert_eq!(reloaded.events(), board.events());
        assert!(reloaded.identity().has_joined(2));
    }

    struct FailingWrites(MemoryStore);

    impl KvStore for FailingWrites {
        fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.load(key)
        }

        fn save_all(&mut self, _entries: &[(&str, String)]) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("quota exceeded".into()))
        }
    }

    #[test]
    fn failed_writes_degrade_to_memory() {
        let mut store = MemoryStore::default();
        let demo = demo_events(
            crate::board::tests::instant().date_naive(),
            crate::board::tests::instant(),
        );
        store
            .save("shoreSquadEvents", serde_json::to_string(&demo).expect("encode"))
            .expect("save");

        let mut board = board_with(Persistence::new(Box::new(FailingWrites(store))));
        assert_eq!(board.events().len(), 3);

        let outcome = board.join(1, "Crew Member").expect("join in memory");
        assert!(matches!(outcome, JoinOutcome::Joined(_)));
        assert!(board.is_degraded());
        assert_eq!(joined_ids(&board), derived_ids(&board));
    }
}
