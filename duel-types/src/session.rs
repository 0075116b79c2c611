use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{MatchId, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PlayerRole {
    Host,
    Guest,
}

/// A verified `(match, player, role)` triple handed to the engine by the
/// session layer. The engine trusts it and never re-derives identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionIdentity {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub role: PlayerRole,
    pub expires_at: DateTime<Utc>,
}
