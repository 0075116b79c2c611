use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::{MatchId, MatchStatus, PlayerId};

/// Everything an action against a match can fail with.
///
/// Validation failures are deterministic and must not be retried; only
/// `Transient` is safe to repeat as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("match {match_id} not found")]
    NotFound { match_id: MatchId },
    #[error("cannot {action} while the match is {status}")]
    InvalidTransition { action: String, status: MatchStatus },
    #[error("match is {status} and no longer accepting players")]
    MatchNotWaiting { status: MatchStatus },
    #[error("match needs two players before it can start")]
    NotReady,
    #[error("player {player_id} is not part of this match")]
    PlayerNotInMatch { player_id: PlayerId },
    #[error("match already has two players")]
    MatchFull,
    #[error("already finished")]
    AlreadyFinished,
    #[error("no guesses left")]
    GuessLimitExceeded,
    #[error("clock has run out")]
    ClockExhausted,
    #[error("invalid guess: {reason}")]
    InvalidGuessFormat { reason: String },
    #[error("temporary conflict, try again: {message}")]
    Transient { message: String },
    #[error("storage failure: {message}")]
    StorageFailure { message: String },
}

impl MatchError {
    /// Stable symbolic name reported to clients next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            MatchError::NotFound { .. } => "NotFound",
            MatchError::InvalidTransition { .. } => "InvalidTransition",
            MatchError::MatchNotWaiting { .. } => "MatchNotWaiting",
            MatchError::NotReady => "NotReady",
            MatchError::PlayerNotInMatch { .. } => "PlayerNotInMatch",
            MatchError::MatchFull => "MatchFull",
            MatchError::AlreadyFinished => "AlreadyFinished",
            MatchError::GuessLimitExceeded => "GuessLimitExceeded",
            MatchError::ClockExhausted => "ClockExhausted",
            MatchError::InvalidGuessFormat { .. } => "InvalidGuessFormat",
            MatchError::Transient { .. } => "Transient",
            MatchError::StorageFailure { .. } => "StorageFailure",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::Transient { .. })
    }

    pub fn invalid_transition(action: &str, status: MatchStatus) -> Self {
        MatchError::InvalidTransition {
            action: action.to_string(),
            status,
        }
    }

    pub fn invalid_guess(reason: impl Into<String>) -> Self {
        MatchError::InvalidGuessFormat {
            reason: reason.into(),
        }
    }
}

/// Wire shape of a failure: symbolic kind plus a readable message.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
}

impl From<&MatchError> for ErrorResponse {
    fn from(error: &MatchError) -> Self {
        ErrorResponse {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}
