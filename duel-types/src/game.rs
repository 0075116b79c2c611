use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{MatchId, PlayerId, PlayerRole};

/// Letters in every secret and every guess.
pub const WORD_LENGTH: usize = 5;

/// Guesses a single player may submit in one match.
pub const MAX_GUESSES: usize = 6;

pub type Evaluation = [Letter; WORD_LENGTH];

/// Lifecycle of a match. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MatchStatus {
    Waiting,
    InProgress,
    Finished,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Waiting => "waiting",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an individual player's part in the match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum FinishedState {
    #[default]
    None,
    Success,   // guessed the word
    Timeout,   // ran out of clock
    Resign,    // quit, or stayed disconnected past the grace window
    Exhausted, // used all guesses without solving
    Lost,      // opponent solved first
}

impl FinishedState {
    pub fn is_concluded(&self) -> bool {
        !matches!(self, FinishedState::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Letter {
    #[serde(rename = "G")]
    Green, // right letter, right position
    #[serde(rename = "Y")]
    Yellow, // in the word, elsewhere
    #[serde(rename = "B")]
    Black, // not in the word (or no copies left)
}

/// A recorded guess. Carries the server-side evaluation so clients never
/// have to recompute it after a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Guess {
    pub word: String,
    pub evaluation: Evaluation,
    pub timestamp: DateTime<Utc>,
}

impl Guess {
    pub fn is_solved(&self) -> bool {
        self.evaluation.iter().all(|letter| *letter == Letter::Green)
    }
}

/// Per-player state. Everything is local to the player so a single
/// document write updates it atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Player {
    pub id: PlayerId,
    pub remaining_ms: u64,
    pub connected: bool,
    pub guesses: Vec<Guess>,
    pub finished_state: FinishedState,
    pub last_charged_at: Option<DateTime<Utc>>,
    pub disconnected_at: Option<DateTime<Utc>>,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            remaining_ms: 0,
            connected: true,
            guesses: Vec::new(),
            finished_state: FinishedState::None,
            last_charged_at: None,
            disconnected_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.finished_state.is_concluded()
    }
}

/// The single durable record of a match. Players and guesses live inside it
/// and have no lifecycle of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Match {
    pub id: MatchId,
    pub status: MatchStatus,
    pub word: String,
    pub host: Player,
    pub guest: Option<Player>,
    pub winner: Option<PlayerId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        std::iter::once(&self.host).chain(self.guest.as_ref())
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        std::iter::once(&mut self.host).chain(self.guest.as_mut())
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players_mut().find(|p| p.id == player_id)
    }

    pub fn opponent_of(&self, player_id: PlayerId) -> Option<&Player> {
        self.players().find(|p| p.id != player_id)
    }

    pub fn role_of(&self, player_id: PlayerId) -> Option<PlayerRole> {
        if self.host.id == player_id {
            Some(PlayerRole::Host)
        } else if self.guest.as_ref().is_some_and(|g| g.id == player_id) {
            Some(PlayerRole::Guest)
        } else {
            None
        }
    }

    pub fn is_full(&self) -> bool {
        self.guest.is_some()
    }
}

/// What a player is allowed to see of a match. The secret only appears once
/// the match is over or the requester has solved it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MatchView {
    pub id: MatchId,
    pub status: MatchStatus,
    pub role: PlayerRole,
    pub word: Option<String>,
    pub you: PlayerView,
    pub opponent: Option<OpponentView>,
    pub winner: Option<PlayerId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlayerView {
    pub id: PlayerId,
    pub remaining_ms: u64,
    pub connected: bool,
    pub finished_state: FinishedState,
    pub guesses: Vec<Guess>,
}

/// Opponent progress without the words they tried.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OpponentView {
    pub id: PlayerId,
    pub remaining_ms: u64,
    pub connected: bool,
    pub finished_state: FinishedState,
    pub evaluations: Vec<Evaluation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_match() -> Match {
        Match {
            id: Uuid::new_v4(),
            status: MatchStatus::Waiting,
            word: "CRANE".to_string(),
            host: Player::new(Uuid::new_v4()),
            guest: None,
            winner: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    #[test]
    fn test_status_ordering_is_forward() {
        assert!(MatchStatus::Waiting < MatchStatus::InProgress);
        assert!(MatchStatus::InProgress < MatchStatus::Finished);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&MatchStatus::InProgress).unwrap(), "\"in_progress\"");
        assert_eq!(serde_json::to_string(&FinishedState::Timeout).unwrap(), "\"timeout\"");
        assert_eq!(
            serde_json::to_string(&[Letter::Green, Letter::Yellow, Letter::Black]).unwrap(),
            "[\"G\",\"Y\",\"B\"]"
        );
    }

    #[test]
    fn test_document_round_trip_keeps_every_field() {
        let mut record = sample_match();
        let mut guest = Player::new(Uuid::new_v4());
        guest.connected = false;
        guest.disconnected_at = Some(Utc::now());
        guest.guesses.push(Guess {
            word: "SLATE".to_string(),
            evaluation: [Letter::Black, Letter::Black, Letter::Green, Letter::Black, Letter::Green],
            timestamp: Utc::now(),
        });
        record.guest = Some(guest);
        record.status = MatchStatus::InProgress;
        record.started_at = Some(Utc::now());

        let encoded = serde_json::to_value(&record).unwrap();
        let decoded: Match = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_player_lookup_and_roles() {
        let mut record = sample_match();
        let host_id = record.host.id;
        assert_eq!(record.role_of(host_id), Some(PlayerRole::Host));
        assert!(record.opponent_of(host_id).is_none());

        let guest_id = Uuid::new_v4();
        record.guest = Some(Player::new(guest_id));
        assert!(record.is_full());
        assert_eq!(record.role_of(guest_id), Some(PlayerRole::Guest));
        assert_eq!(record.opponent_of(host_id).map(|p| p.id), Some(guest_id));
        assert_eq!(record.role_of(Uuid::new_v4()), None);
        assert_eq!(record.players().count(), 2);
    }
}
