use duel_types::{MatchError, MatchId};
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Match {match_id} changed underneath us (expected version {expected_version})")]
    VersionConflict {
        match_id: MatchId,
        expected_version: i64,
    },

    #[error("Stored match document could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl PersistenceError {
    /// Failures worth retrying the whole apply for.
    pub fn is_transient(&self) -> bool {
        match self {
            PersistenceError::VersionConflict { .. } => true,
            PersistenceError::Database(DbErr::ConnectionAcquire(_)) => true,
            PersistenceError::Database(err) => {
                let message = err.to_string().to_lowercase();
                ["database is locked", "deadlock", "could not serialize", "lock timeout"]
                    .iter()
                    .any(|needle| message.contains(needle))
            }
            PersistenceError::Decode(_) => false,
        }
    }
}

impl From<PersistenceError> for MatchError {
    fn from(err: PersistenceError) -> Self {
        if err.is_transient() {
            MatchError::Transient {
                message: err.to_string(),
            }
        } else {
            MatchError::StorageFailure {
                message: err.to_string(),
            }
        }
    }
}
