#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use duel_core::{
    ActionOutcome, MatchAction, MatchEngine, MatchEvent, MatchEventHandler, MatchRules, Transition,
};
use duel_types::{GuessReceipt, Match, MatchError, PlayerId};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const TEST_BUDGET_MS: u64 = 10_000;
pub const TEST_GRACE_MS: u64 = 5_000;

pub fn create_test_engine() -> MatchEngine {
    MatchEngine::new(MatchRules {
        clock_budget_ms: TEST_BUDGET_MS,
        disconnect_grace_ms: TEST_GRACE_MS,
    })
}

/// A match driven the way the server drives it: every action is preceded
/// by a settle pass, and rejected actions keep the settled state only when
/// settling decided something.
pub struct TestMatch {
    pub engine: MatchEngine,
    pub record: Match,
    pub host: PlayerId,
    pub guest: PlayerId,
    pub t0: DateTime<Utc>,
    pub events: EventCollector,
}

impl TestMatch {
    /// Host and guest seated, not started.
    pub fn lobby(word: &str) -> Self {
        let engine = create_test_engine();
        let t0 = Utc::now();
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let record = engine.new_match(Uuid::new_v4(), host, word.to_string(), t0);

        let mut test_match = Self {
            engine,
            record,
            host,
            guest,
            t0,
            events: EventCollector::new(),
        };
        test_match
            .act(MatchAction::Join { guest_id: guest }, 0)
            .expect("guest should be able to join");
        test_match
    }

    pub fn started(word: &str) -> Self {
        let mut test_match = Self::lobby(word);
        test_match
            .act(MatchAction::Start, 0)
            .expect("full lobby should start");
        test_match
    }

    pub fn at(&self, ms: i64) -> DateTime<Utc> {
        self.t0 + Duration::milliseconds(ms)
    }

    pub fn act(&mut self, action: MatchAction, at_ms: i64) -> Result<ActionOutcome, MatchError> {
        let now = self.at(at_ms);
        let mut settled = self.record.clone();
        let settle_events = self.engine.settle(&mut settled, now);

        match self.engine.apply(&settled, &action, now) {
            Ok(Transition { record, outcome, events }) => {
                self.record = record;
                self.collect(&settle_events);
                self.collect(&events);
                Ok(outcome)
            }
            Err(err) => {
                if settle_events.iter().any(MatchEvent::is_decisive) {
                    self.record = settled;
                    self.collect(&settle_events);
                }
                Err(err)
            }
        }
    }

    pub fn guess(&mut self, player_id: PlayerId, word: &str, at_ms: i64) -> Result<GuessReceipt, MatchError> {
        let action = MatchAction::Guess {
            player_id,
            word: word.to_string(),
        };
        match self.act(action, at_ms)? {
            ActionOutcome::Guessed(receipt) => Ok(receipt),
            other => panic!("guess produced {:?}", other),
        }
    }

    pub fn settle(&mut self, at_ms: i64) -> Vec<MatchEvent> {
        let now = self.at(at_ms);
        let events = self.engine.settle(&mut self.record, now);
        self.collect(&events);
        events
    }

    fn collect(&self, events: &[MatchEvent]) {
        for event in events {
            self.events.handle_event(event);
        }
    }
}

/// Event collector for testing event emissions
#[derive(Clone, Default)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<MatchEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_events(&self) -> Vec<MatchEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn has_event_type(&self, check_fn: impl Fn(&MatchEvent) -> bool) -> bool {
        self.events.lock().unwrap().iter().any(check_fn)
    }
}

impl MatchEventHandler for EventCollector {
    fn handle_event(&self, event: &MatchEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
