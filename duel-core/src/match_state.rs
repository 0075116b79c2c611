use chrono::{DateTime, Utc};
use duel_types::{
    FinishedState, Guess, GuessReceipt, Match, MatchError, MatchId, MatchStatus, MatchView,
    OpponentView, Player, PlayerId, PlayerView, MAX_GUESSES,
};
use tracing::debug;

use crate::{elapsed_ms, ChessClock, LetterEvaluator, MatchEvent, ResignReason, WordValidator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRules {
    pub clock_budget_ms: u64,
    pub disconnect_grace_ms: u64,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            clock_budget_ms: 300_000,    // 5 minutes each
            disconnect_grace_ms: 30_000, // 30 seconds to come back
        }
    }
}

/// One request against one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchAction {
    Join { guest_id: PlayerId },
    Start,
    Guess { player_id: PlayerId, word: String },
    SetConnection { player_id: PlayerId, connected: bool },
    Resign { player_id: PlayerId },
    /// Re-evaluate clocks and grace windows only.
    Settle,
}

impl MatchAction {
    pub fn name(&self) -> &'static str {
        match self {
            MatchAction::Join { .. } => "join",
            MatchAction::Start => "start",
            MatchAction::Guess { .. } => "guess",
            MatchAction::SetConnection { .. } => "set connection",
            MatchAction::Resign { .. } => "resign",
            MatchAction::Settle => "settle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Joined { player_id: PlayerId },
    Started,
    Guessed(GuessReceipt),
    ConnectionSet,
    Resigned,
    Settled,
}

/// Result of a successfully validated action: the next document plus
/// what happened on the way.
#[derive(Debug, Clone)]
pub struct Transition {
    pub record: Match,
    pub outcome: ActionOutcome,
    pub events: Vec<MatchEvent>,
}

/// The authoritative in-match rules. Never blocks and never does I/O; the
/// caller is responsible for serializing access to a match.
#[derive(Debug, Clone, Copy)]
pub struct MatchEngine {
    rules: MatchRules,
    clock: ChessClock,
}

impl MatchEngine {
    pub fn new(rules: MatchRules) -> Self {
        Self {
            rules,
            clock: ChessClock::new(rules.clock_budget_ms),
        }
    }

    /// A fresh lobby with the host seated.
    pub fn new_match(
        &self,
        id: MatchId,
        host_id: PlayerId,
        word: String,
        now: DateTime<Utc>,
    ) -> Match {
        Match {
            id,
            status: MatchStatus::Waiting,
            word,
            host: Player::new(host_id),
            guest: None,
            winner: None,
            created_at: now,
            started_at: None,
            ended_at: None,
        }
    }

    /// Bring a running match up to `now`: charge clocks, resign players
    /// whose grace window ran out, and finish the match if it is decided.
    pub fn settle(&self, record: &mut Match, now: DateTime<Utc>) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        if record.status != MatchStatus::InProgress {
            return events;
        }

        let match_id = record.id;
        let started_at = record.started_at.unwrap_or(now);

        for player in record.players_mut() {
            if !player.is_active() {
                continue;
            }

            if self.clock.charge(player, now) == 0 {
                player.finished_state = FinishedState::Timeout;
                events.push(MatchEvent::PlayerTimedOut {
                    match_id,
                    player_id: player.id,
                });
            }
        }

        for player in record.players_mut() {
            if !player.is_active() || player.connected {
                continue;
            }

            let away_since = player.disconnected_at.unwrap_or(now).max(started_at);
            if elapsed_ms(away_since, now) >= self.rules.disconnect_grace_ms {
                player.finished_state = FinishedState::Resign;
                events.push(MatchEvent::PlayerResigned {
                    match_id,
                    player_id: player.id,
                    reason: ResignReason::Disconnected,
                });
            }
        }

        self.conclude_if_decided(record, now, &mut events);
        events
    }

    /// Validate `action` against `record` and return the resulting document.
    /// `record` itself is never modified, so a rejection has no effect.
    pub fn apply(
        &self,
        record: &Match,
        action: &MatchAction,
        now: DateTime<Utc>,
    ) -> Result<Transition, MatchError> {
        let mut next = record.clone();
        let mut events = Vec::new();

        let outcome = match action {
            MatchAction::Join { guest_id } => self.join(&mut next, *guest_id, &mut events)?,
            MatchAction::Start => self.start(&mut next, now, &mut events)?,
            MatchAction::Guess { player_id, word } => {
                self.guess(&mut next, *player_id, word, now, &mut events)?
            }
            MatchAction::SetConnection {
                player_id,
                connected,
            } => self.set_connection(&mut next, *player_id, *connected, now, &mut events)?,
            MatchAction::Resign { player_id } => {
                self.resign(&mut next, *player_id, now, &mut events)?
            }
            MatchAction::Settle => {
                events.extend(self.settle(&mut next, now));
                ActionOutcome::Settled
            }
        };

        Ok(Transition {
            record: next,
            outcome,
            events,
        })
    }

    fn join(
        &self,
        record: &mut Match,
        guest_id: PlayerId,
        events: &mut Vec<MatchEvent>,
    ) -> Result<ActionOutcome, MatchError> {
        if record.status != MatchStatus::Waiting {
            return Err(MatchError::MatchNotWaiting {
                status: record.status,
            });
        }
        if record.is_full() {
            return Err(MatchError::MatchFull);
        }

        record.guest = Some(Player::new(guest_id));
        events.push(MatchEvent::PlayerJoined {
            match_id: record.id,
            player_id: guest_id,
        });

        Ok(ActionOutcome::Joined {
            player_id: guest_id,
        })
    }

    fn start(
        &self,
        record: &mut Match,
        now: DateTime<Utc>,
        events: &mut Vec<MatchEvent>,
    ) -> Result<ActionOutcome, MatchError> {
        match record.status {
            MatchStatus::Waiting => {}
            MatchStatus::InProgress => {
                return Err(MatchError::invalid_transition("start", record.status));
            }
            MatchStatus::Finished => return Err(MatchError::AlreadyFinished),
        }
        if !record.is_full() {
            return Err(MatchError::NotReady);
        }

        let clock = self.clock;
        for player in record.players_mut() {
            clock.start(player, now);
        }
        record.status = MatchStatus::InProgress;
        record.started_at = Some(now);

        events.push(MatchEvent::MatchStarted {
            match_id: record.id,
            clock_budget_ms: clock.budget_ms(),
        });

        Ok(ActionOutcome::Started)
    }

    fn guess(
        &self,
        record: &mut Match,
        player_id: PlayerId,
        word: &str,
        now: DateTime<Utc>,
        events: &mut Vec<MatchEvent>,
    ) -> Result<ActionOutcome, MatchError> {
        match record.status {
            MatchStatus::InProgress => {}
            MatchStatus::Waiting => {
                return Err(MatchError::invalid_transition("guess", record.status));
            }
            MatchStatus::Finished => return Err(MatchError::AlreadyFinished),
        }

        let match_id = record.id;
        let secret = record.word.clone();
        let clock = self.clock;
        let player = record
            .player_mut(player_id)
            .ok_or(MatchError::PlayerNotInMatch { player_id })?;

        match player.finished_state {
            FinishedState::None => {}
            FinishedState::Timeout => return Err(MatchError::ClockExhausted),
            FinishedState::Exhausted => return Err(MatchError::GuessLimitExceeded),
            _ => return Err(MatchError::AlreadyFinished),
        }
        if player.guesses.len() >= MAX_GUESSES {
            return Err(MatchError::GuessLimitExceeded);
        }

        // Clock first: a guess arriving after the flag fell does not count
        if clock.charge(player, now) == 0 {
            return Err(MatchError::ClockExhausted);
        }

        let word = WordValidator::normalize_guess(word)?;
        let evaluation = LetterEvaluator::evaluate(&secret, &word);
        player.guesses.push(Guess {
            word,
            evaluation,
            timestamp: now,
        });

        let guess_number = player.guesses.len();
        debug!(
            "Player {} guess {}/{} in match {}",
            player_id, guess_number, MAX_GUESSES, match_id
        );
        events.push(MatchEvent::GuessEvaluated {
            match_id,
            player_id,
            guess_number,
        });

        if LetterEvaluator::is_solved(&evaluation) {
            player.finished_state = FinishedState::Success;
            events.push(MatchEvent::PlayerSolved {
                match_id,
                player_id,
                guess_number,
            });
        } else if guess_number >= MAX_GUESSES {
            player.finished_state = FinishedState::Exhausted;
            events.push(MatchEvent::PlayerExhausted {
                match_id,
                player_id,
            });
        }

        self.conclude_if_decided(record, now, events);

        let finished_state = record
            .player(player_id)
            .map(|p| p.finished_state)
            .unwrap_or_default();

        Ok(ActionOutcome::Guessed(GuessReceipt {
            evaluation,
            guess_number,
            finished_state,
            match_status: record.status,
        }))
    }

    fn set_connection(
        &self,
        record: &mut Match,
        player_id: PlayerId,
        connected: bool,
        now: DateTime<Utc>,
        events: &mut Vec<MatchEvent>,
    ) -> Result<ActionOutcome, MatchError> {
        if record.status == MatchStatus::Finished {
            return Err(MatchError::AlreadyFinished);
        }

        let match_id = record.id;
        let player = record
            .player_mut(player_id)
            .ok_or(MatchError::PlayerNotInMatch { player_id })?;

        if player.connected == connected {
            return Ok(ActionOutcome::ConnectionSet);
        }

        player.connected = connected;
        if connected {
            player.disconnected_at = None;
            events.push(MatchEvent::PlayerReconnected {
                match_id,
                player_id,
            });
        } else {
            player.disconnected_at = Some(now);
            events.push(MatchEvent::PlayerDisconnected {
                match_id,
                player_id,
            });
        }

        Ok(ActionOutcome::ConnectionSet)
    }

    fn resign(
        &self,
        record: &mut Match,
        player_id: PlayerId,
        now: DateTime<Utc>,
        events: &mut Vec<MatchEvent>,
    ) -> Result<ActionOutcome, MatchError> {
        match record.status {
            MatchStatus::InProgress => {}
            MatchStatus::Waiting => {
                return Err(MatchError::invalid_transition("resign", record.status));
            }
            MatchStatus::Finished => return Err(MatchError::AlreadyFinished),
        }

        let match_id = record.id;
        let player = record
            .player_mut(player_id)
            .ok_or(MatchError::PlayerNotInMatch { player_id })?;
        if !player.is_active() {
            return Err(MatchError::AlreadyFinished);
        }

        player.finished_state = FinishedState::Resign;
        events.push(MatchEvent::PlayerResigned {
            match_id,
            player_id,
            reason: ResignReason::Voluntary,
        });

        self.conclude_if_decided(record, now, events);
        Ok(ActionOutcome::Resigned)
    }

    /// Finish the match if the players' states decide it. Non-winners still
    /// playing are force-concluded as timed out (no clock left) or lost.
    fn conclude_if_decided(&self, record: &mut Match, now: DateTime<Utc>, events: &mut Vec<MatchEvent>) {
        if record.status != MatchStatus::InProgress {
            return;
        }
        let Some(guest) = record.guest.as_ref() else {
            return;
        };
        let Some(winner) = decide(&record.host, guest) else {
            return;
        };

        for player in record.players_mut() {
            if Some(player.id) == winner || !player.is_active() {
                continue;
            }
            player.finished_state = if player.remaining_ms == 0 {
                FinishedState::Timeout
            } else {
                FinishedState::Lost
            };
        }

        record.status = MatchStatus::Finished;
        record.ended_at = Some(now);
        record.winner = winner;
        events.push(MatchEvent::MatchFinished {
            match_id: record.id,
            winner,
        });
    }

    /// What `requester` is allowed to see, with clocks projected to `now`.
    pub fn view_for(
        &self,
        record: &Match,
        requester: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<MatchView, MatchError> {
        let you = record
            .player(requester)
            .ok_or(MatchError::PlayerNotInMatch {
                player_id: requester,
            })?;
        let role = record
            .role_of(requester)
            .ok_or(MatchError::PlayerNotInMatch {
                player_id: requester,
            })?;

        let running = record.status == MatchStatus::InProgress;
        let remaining = |player: &Player| {
            if running {
                self.clock.projected_remaining(player, now)
            } else {
                player.remaining_ms
            }
        };

        let reveal =
            record.status == MatchStatus::Finished || you.finished_state == FinishedState::Success;

        Ok(MatchView {
            id: record.id,
            status: record.status,
            role,
            word: reveal.then(|| record.word.clone()),
            you: PlayerView {
                id: you.id,
                remaining_ms: remaining(you),
                connected: you.connected,
                finished_state: you.finished_state,
                guesses: you.guesses.clone(),
            },
            opponent: record.opponent_of(requester).map(|opponent| OpponentView {
                id: opponent.id,
                remaining_ms: remaining(opponent),
                connected: opponent.connected,
                finished_state: opponent.finished_state,
                evaluations: opponent.guesses.iter().map(|g| g.evaluation).collect(),
            }),
            winner: record.winner,
            created_at: record.created_at,
            started_at: record.started_at,
            ended_at: record.ended_at,
        })
    }
}

/// `Some(winner)` once the match is decided (`Some(None)` is a draw),
/// `None` while it should continue.
fn decide(host: &Player, guest: &Player) -> Option<Option<PlayerId>> {
    use FinishedState as F;

    let decided = match (host.finished_state, guest.finished_state) {
        (F::Success, _) => Some(host.id),
        (_, F::Success) => Some(guest.id),
        (F::Resign, F::Resign) => None,
        (F::Resign, _) => Some(guest.id),
        (_, F::Resign) => Some(host.id),
        (F::Timeout, F::None) => Some(guest.id),
        (F::None, F::Timeout) => Some(host.id),
        (F::None, _) | (_, F::None) => return None,
        _ => None,
    };
    Some(decided)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use duel_types::Letter;
    use uuid::Uuid;

    struct Fixture {
        engine: MatchEngine,
        record: Match,
        host: PlayerId,
        guest: PlayerId,
        t0: DateTime<Utc>,
    }

    fn running_match(word: &str) -> Fixture {
        let engine = MatchEngine::new(MatchRules {
            clock_budget_ms: 10_000,
            disconnect_grace_ms: 5_000,
        });
        let t0 = Utc::now();
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();

        let record = engine.new_match(Uuid::new_v4(), host, word.to_string(), t0);
        let record = engine
            .apply(&record, &MatchAction::Join { guest_id: guest }, t0)
            .unwrap()
            .record;
        let record = engine.apply(&record, &MatchAction::Start, t0).unwrap().record;

        Fixture {
            engine,
            record,
            host,
            guest,
            t0,
        }
    }

    impl Fixture {
        fn guess(&mut self, player_id: PlayerId, word: &str, at_ms: i64) -> Result<GuessReceipt, MatchError> {
            let now = self.t0 + Duration::milliseconds(at_ms);
            let mut settled = self.record.clone();
            self.engine.settle(&mut settled, now);
            let transition = self.engine.apply(
                &settled,
                &MatchAction::Guess {
                    player_id,
                    word: word.to_string(),
                },
                now,
            )?;
            self.record = transition.record;
            match transition.outcome {
                ActionOutcome::Guessed(receipt) => Ok(receipt),
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[test]
    fn test_join_fills_second_seat_once() {
        let engine = MatchEngine::new(MatchRules::default());
        let now = Utc::now();
        let record = engine.new_match(Uuid::new_v4(), Uuid::new_v4(), "CRANE".into(), now);

        let joined = engine
            .apply(&record, &MatchAction::Join { guest_id: Uuid::new_v4() }, now)
            .unwrap();
        assert!(joined.record.is_full());

        let again = engine.apply(&joined.record, &MatchAction::Join { guest_id: Uuid::new_v4() }, now);
        assert_eq!(again.unwrap_err(), MatchError::MatchFull);
    }

    #[test]
    fn test_start_requires_two_players() {
        let engine = MatchEngine::new(MatchRules::default());
        let now = Utc::now();
        let record = engine.new_match(Uuid::new_v4(), Uuid::new_v4(), "CRANE".into(), now);

        let result = engine.apply(&record, &MatchAction::Start, now);
        assert_eq!(result.unwrap_err(), MatchError::NotReady);
    }

    #[test]
    fn test_start_twice_is_rejected_and_keeps_started_at() {
        let f = running_match("CRANE");
        let later = f.t0 + Duration::seconds(3);

        let result = f.engine.apply(&f.record, &MatchAction::Start, later);
        assert!(matches!(result, Err(MatchError::InvalidTransition { .. })));
        assert_eq!(f.record.started_at, Some(f.t0));
        assert_eq!(f.record.host.remaining_ms, 10_000);
    }

    #[test]
    fn test_join_after_start_is_rejected() {
        let f = running_match("CRANE");
        let result = f.engine.apply(&f.record, &MatchAction::Join { guest_id: Uuid::new_v4() }, f.t0);
        assert_eq!(
            result.unwrap_err(),
            MatchError::MatchNotWaiting {
                status: MatchStatus::InProgress
            }
        );
    }

    #[test]
    fn test_guess_before_start_is_invalid_transition() {
        let engine = MatchEngine::new(MatchRules::default());
        let now = Utc::now();
        let host = Uuid::new_v4();
        let record = engine.new_match(Uuid::new_v4(), host, "CRANE".into(), now);

        let result = engine.apply(
            &record,
            &MatchAction::Guess {
                player_id: host,
                word: "SLATE".into(),
            },
            now,
        );
        assert!(matches!(result, Err(MatchError::InvalidTransition { .. })));
    }

    #[test]
    fn test_rejected_guess_leaves_record_untouched() {
        let f = running_match("CRANE");
        let before = f.record.clone();

        let result = f.engine.apply(
            &f.record,
            &MatchAction::Guess {
                player_id: f.host,
                word: "CR4NE".into(),
            },
            f.t0 + Duration::seconds(1),
        );
        assert!(matches!(result, Err(MatchError::InvalidGuessFormat { .. })));
        assert_eq!(f.record, before);
    }

    #[test]
    fn test_guess_from_stranger_is_rejected() {
        let mut f = running_match("CRANE");
        let stranger = Uuid::new_v4();
        let result = f.guess(stranger, "SLATE", 100);
        assert_eq!(result.unwrap_err(), MatchError::PlayerNotInMatch { player_id: stranger });
    }

    #[test]
    fn test_accepted_guess_charges_and_records() {
        let mut f = running_match("CRANE");
        let receipt = f.guess(f.host, "slate", 1_200).unwrap();

        assert_eq!(receipt.guess_number, 1);
        assert_eq!(receipt.finished_state, FinishedState::None);
        assert_eq!(
            receipt.evaluation,
            [Letter::Black, Letter::Black, Letter::Green, Letter::Black, Letter::Green]
        );
        let host = f.record.player(f.host).unwrap();
        assert_eq!(host.remaining_ms, 8_800);
        assert_eq!(host.guesses[0].word, "SLATE");
        assert_eq!(host.guesses[0].timestamp, f.t0 + Duration::milliseconds(1_200));
    }

    #[test]
    fn test_solving_finishes_match_and_marks_opponent_lost() {
        let mut f = running_match("CRANE");
        f.guess(f.host, "SLATE", 1_000).unwrap();
        f.guess(f.guest, "PRICE", 1_500).unwrap();
        let receipt = f.guess(f.host, "CRANE", 2_000).unwrap();

        assert_eq!(receipt.finished_state, FinishedState::Success);
        assert_eq!(receipt.match_status, MatchStatus::Finished);
        assert_eq!(f.record.winner, Some(f.host));
        assert_eq!(f.record.player(f.guest).unwrap().finished_state, FinishedState::Lost);
        assert_eq!(f.record.ended_at, Some(f.t0 + Duration::milliseconds(2_000)));

        assert_eq!(f.guess(f.guest, "CRANE", 2_500).unwrap_err(), MatchError::AlreadyFinished);
    }

    #[test]
    fn test_six_misses_exhausts_player_and_match_continues() {
        let mut f = running_match("CRANE");
        for i in 0..MAX_GUESSES {
            f.guess(f.host, "BUMPY", (i as i64 + 1) * 100).unwrap();
        }

        let host = f.record.player(f.host).unwrap();
        assert_eq!(host.finished_state, FinishedState::Exhausted);
        assert_eq!(f.record.status, MatchStatus::InProgress);
        assert_eq!(f.guess(f.host, "CRANE", 900).unwrap_err(), MatchError::GuessLimitExceeded);

        // Opponent can still win
        let receipt = f.guess(f.guest, "CRANE", 1_000).unwrap();
        assert_eq!(receipt.match_status, MatchStatus::Finished);
        assert_eq!(f.record.winner, Some(f.guest));
        assert_eq!(f.record.player(f.host).unwrap().finished_state, FinishedState::Exhausted);
    }

    #[test]
    fn test_both_exhausted_is_draw() {
        let mut f = running_match("CRANE");
        for i in 0..MAX_GUESSES as i64 {
            f.guess(f.host, "BUMPY", i * 10 + 1).unwrap();
            f.guess(f.guest, "BUMPY", i * 10 + 2).unwrap();
        }

        assert_eq!(f.record.status, MatchStatus::Finished);
        assert_eq!(f.record.winner, None);
    }

    #[test]
    fn test_settle_times_out_both_idle_players_as_draw() {
        let mut f = running_match("CRANE");
        let events = f.engine.settle(&mut f.record, f.t0 + Duration::seconds(11));

        assert_eq!(f.record.status, MatchStatus::Finished);
        assert_eq!(f.record.winner, None);
        for player in f.record.players() {
            assert_eq!(player.finished_state, FinishedState::Timeout);
            assert_eq!(player.remaining_ms, 0);
        }
        assert!(events.iter().any(|e| matches!(e, MatchEvent::MatchFinished { winner: None, .. })));
    }

    #[test]
    fn test_timeout_while_opponent_exhausted_is_draw() {
        let mut f = running_match("CRANE");
        for i in 0..MAX_GUESSES as i64 {
            f.guess(f.guest, "BUMPY", i + 1).unwrap();
        }

        f.engine.settle(&mut f.record, f.t0 + Duration::seconds(20));
        assert_eq!(f.record.player(f.host).unwrap().finished_state, FinishedState::Timeout);
        assert_eq!(f.record.status, MatchStatus::Finished);
        assert_eq!(f.record.winner, None);
    }

    #[test]
    fn test_guess_after_flag_fell_is_rejected_as_clock_exhausted() {
        let mut f = running_match("CRANE");
        let result = f.guess(f.host, "CRANE", 10_001);
        assert!(matches!(
            result,
            Err(MatchError::ClockExhausted) | Err(MatchError::AlreadyFinished)
        ));

        // Without a settle pass the guess itself notices the empty clock.
        let f = running_match("CRANE");
        let result = f.engine.apply(
            &f.record,
            &MatchAction::Guess {
                player_id: f.host,
                word: "CRANE".into(),
            },
            f.t0 + Duration::seconds(10),
        );
        assert_eq!(result.unwrap_err(), MatchError::ClockExhausted);
    }

    #[test]
    fn test_resign_hands_win_to_opponent() {
        let f = running_match("CRANE");
        let transition = f
            .engine
            .apply(&f.record, &MatchAction::Resign { player_id: f.guest }, f.t0 + Duration::seconds(2))
            .unwrap();

        let record = transition.record;
        assert_eq!(record.status, MatchStatus::Finished);
        assert_eq!(record.winner, Some(f.host));
        assert_eq!(record.player(f.guest).unwrap().finished_state, FinishedState::Resign);
        assert_eq!(record.player(f.host).unwrap().finished_state, FinishedState::None);

        let again = f.engine.apply(&record, &MatchAction::Resign { player_id: f.host }, f.t0);
        assert_eq!(again.unwrap_err(), MatchError::AlreadyFinished);
    }

    #[test]
    fn test_resign_in_lobby_is_invalid() {
        let engine = MatchEngine::new(MatchRules::default());
        let now = Utc::now();
        let host = Uuid::new_v4();
        let record = engine.new_match(Uuid::new_v4(), host, "CRANE".into(), now);

        let result = engine.apply(&record, &MatchAction::Resign { player_id: host }, now);
        assert!(matches!(result, Err(MatchError::InvalidTransition { .. })));
    }

    #[test]
    fn test_disconnect_past_grace_resigns() {
        let f = running_match("CRANE");
        let mut record = f
            .engine
            .apply(
                &f.record,
                &MatchAction::SetConnection {
                    player_id: f.guest,
                    connected: false,
                },
                f.t0 + Duration::seconds(1),
            )
            .unwrap()
            .record;

        // Inside the window nothing happens
        let events = f.engine.settle(&mut record, f.t0 + Duration::seconds(5));
        assert!(events.is_empty());
        assert_eq!(record.status, MatchStatus::InProgress);

        let events = f.engine.settle(&mut record, f.t0 + Duration::seconds(6));
        assert!(events.iter().any(|e| matches!(
            e,
            MatchEvent::PlayerResigned {
                reason: ResignReason::Disconnected,
                ..
            }
        )));
        assert_eq!(record.player(f.guest).unwrap().finished_state, FinishedState::Resign);
        assert_eq!(record.status, MatchStatus::Finished);
        assert_eq!(record.winner, Some(f.host));
    }

    #[test]
    fn test_reconnect_inside_grace_cancels_resign() {
        let f = running_match("CRANE");
        let disconnect = MatchAction::SetConnection {
            player_id: f.guest,
            connected: false,
        };
        let reconnect = MatchAction::SetConnection {
            player_id: f.guest,
            connected: true,
        };

        let record = f.engine.apply(&f.record, &disconnect, f.t0 + Duration::seconds(1)).unwrap().record;
        let mut record = f.engine.apply(&record, &reconnect, f.t0 + Duration::seconds(3)).unwrap().record;
        assert_eq!(record.player(f.guest).unwrap().disconnected_at, None);

        f.engine.settle(&mut record, f.t0 + Duration::seconds(8));
        assert_eq!(record.status, MatchStatus::InProgress);
        assert!(record.player(f.guest).unwrap().connected);
    }

    #[test]
    fn test_repeated_disconnect_does_not_extend_grace() {
        let f = running_match("CRANE");
        let disconnect = MatchAction::SetConnection {
            player_id: f.host,
            connected: false,
        };

        let first = f.engine.apply(&f.record, &disconnect, f.t0 + Duration::seconds(1)).unwrap();
        let second = f.engine.apply(&first.record, &disconnect, f.t0 + Duration::seconds(4)).unwrap();
        assert!(second.events.is_empty());
        assert_eq!(
            second.record.player(f.host).unwrap().disconnected_at,
            Some(f.t0 + Duration::seconds(1))
        );
    }

    #[test]
    fn test_clock_keeps_running_while_disconnected() {
        let f = running_match("CRANE");
        let mut record = f
            .engine
            .apply(
                &f.record,
                &MatchAction::SetConnection {
                    player_id: f.host,
                    connected: false,
                },
                f.t0,
            )
            .unwrap()
            .record;

        f.engine.settle(&mut record, f.t0 + Duration::seconds(4));
        assert_eq!(record.player(f.host).unwrap().remaining_ms, 6_000);
    }

    #[test]
    fn test_finished_match_rejects_everything() {
        let f = running_match("CRANE");
        let finished = f
            .engine
            .apply(&f.record, &MatchAction::Resign { player_id: f.host }, f.t0)
            .unwrap()
            .record;

        let actions = [
            MatchAction::Start,
            MatchAction::Guess {
                player_id: f.guest,
                word: "CRANE".into(),
            },
            MatchAction::SetConnection {
                player_id: f.guest,
                connected: false,
            },
            MatchAction::Resign { player_id: f.guest },
        ];
        for action in actions {
            let result = f.engine.apply(&finished, &action, f.t0 + Duration::seconds(1));
            assert_eq!(result.unwrap_err(), MatchError::AlreadyFinished, "{}", action.name());
        }

        let mut settled = finished.clone();
        assert!(f.engine.settle(&mut settled, f.t0 + Duration::seconds(60)).is_empty());
        assert_eq!(settled, finished);
    }

    #[test]
    fn test_view_hides_secret_and_opponent_words() {
        let mut f = running_match("CRANE");
        f.guess(f.guest, "SLATE", 1_000).unwrap();

        let view = f.engine.view_for(&f.record, f.host, f.t0 + Duration::seconds(2)).unwrap();
        assert_eq!(view.word, None);
        assert_eq!(view.you.remaining_ms, 8_000);
        let opponent = view.opponent.unwrap();
        assert_eq!(opponent.evaluations.len(), 1);

        let stranger = Uuid::new_v4();
        assert!(matches!(
            f.engine.view_for(&f.record, stranger, f.t0),
            Err(MatchError::PlayerNotInMatch { .. })
        ));
    }

    #[test]
    fn test_view_reveals_secret_to_solver() {
        let mut f = running_match("CRANE");
        f.guess(f.host, "CRANE", 1_000).unwrap();

        let view = f.engine.view_for(&f.record, f.host, f.t0 + Duration::seconds(2)).unwrap();
        assert_eq!(view.word.as_deref(), Some("CRANE"));
        // Match is over, so the loser sees it too
        let view = f.engine.view_for(&f.record, f.guest, f.t0 + Duration::seconds(2)).unwrap();
        assert_eq!(view.word.as_deref(), Some("CRANE"));
    }
}
