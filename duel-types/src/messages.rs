use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{Evaluation, FinishedState, MatchId, MatchStatus, PlayerId};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateMatchResponse {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct JoinMatchResponse {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GuessRequest {
    pub word: String,
}

/// Result of an accepted guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GuessReceipt {
    pub evaluation: Evaluation,
    pub guess_number: usize,
    pub finished_state: FinishedState,
    pub match_status: MatchStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConnectionRequest {
    pub connected: bool,
}
