use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::debug;

use crate::entities::{matches, prelude::*};
use crate::PersistenceError;
use duel_types::{Match, MatchId, MatchStatus};

/// A match read under an exclusive row lock, with the version it must still
/// have when written back.
#[derive(Debug, Clone)]
pub struct LockedMatch {
    pub record: Match,
    pub version: i64,
}

#[derive(Clone)]
pub struct MatchRepository {
    db: Arc<DatabaseConnection>,
}

impl MatchRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    fn model_to_match(model: matches::Model) -> Result<Match, PersistenceError> {
        Ok(serde_json::from_value(model.data)?)
    }

    pub async fn create(&self, record: &Match) -> Result<(), PersistenceError> {
        let model = matches::ActiveModel {
            id: ActiveValue::Set(record.id),
            status: ActiveValue::Set(record.status.as_str().to_string()),
            data: ActiveValue::Set(serde_json::to_value(record)?),
            version: ActiveValue::Set(0),
            created_at: ActiveValue::Set(record.created_at),
            updated_at: ActiveValue::Set(record.created_at),
        };

        Matches::insert(model).exec(self.db.as_ref()).await?;
        Ok(())
    }

    /// Unlocked read, for views.
    pub async fn find(&self, id: MatchId) -> Result<Option<Match>, PersistenceError> {
        Matches::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Self::model_to_match)
            .transpose()
    }

    pub async fn begin(&self) -> Result<DatabaseTransaction, PersistenceError> {
        Ok(self.db.begin().await?)
    }

    /// Read a match for update. Holds the row lock until `txn` ends on
    /// backends that support row locks.
    pub async fn fetch_locked(
        txn: &DatabaseTransaction,
        id: MatchId,
    ) -> Result<Option<LockedMatch>, PersistenceError> {
        let Some(model) = Matches::find_by_id(id).lock_exclusive().one(txn).await? else {
            return Ok(None);
        };

        let version = model.version;
        Ok(Some(LockedMatch {
            record: Self::model_to_match(model)?,
            version,
        }))
    }

    /// Write `record` back if the row is still at `expected_version`.
    /// Returns the new version.
    pub async fn update(
        txn: &DatabaseTransaction,
        record: &Match,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<i64, PersistenceError> {
        let next_version = expected_version + 1;
        let result = Matches::update_many()
            .col_expr(matches::Column::Status, Expr::value(record.status.as_str()))
            .col_expr(matches::Column::Data, Expr::value(serde_json::to_value(record)?))
            .col_expr(matches::Column::Version, Expr::value(next_version))
            .col_expr(matches::Column::UpdatedAt, Expr::value(now))
            .filter(matches::Column::Id.eq(record.id))
            .filter(matches::Column::Version.eq(expected_version))
            .exec(txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(PersistenceError::VersionConflict {
                match_id: record.id,
                expected_version,
            });
        }

        debug!("Match {} now at version {}", record.id, next_version);
        Ok(next_version)
    }

    /// Ids of matches in `status` that have not been written since `before`,
    /// oldest first.
    pub async fn find_ids_untouched_since(
        &self,
        status: MatchStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<MatchId>, PersistenceError> {
        let ids = Matches::find()
            .select_only()
            .column(matches::Column::Id)
            .filter(matches::Column::Status.eq(status.as_str()))
            .filter(matches::Column::UpdatedAt.lt(before))
            .order_by_asc(matches::Column::UpdatedAt)
            .into_tuple::<MatchId>()
            .all(self.db.as_ref())
            .await?;

        Ok(ids)
    }

    /// Running matches due a settle pass.
    pub async fn find_idle_ids(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<MatchId>, PersistenceError> {
        self.find_ids_untouched_since(MatchStatus::InProgress, before)
            .await
    }

    pub async fn delete(&self, id: MatchId) -> Result<bool, PersistenceError> {
        let result = Matches::delete_by_id(id).exec(self.db.as_ref()).await?;
        Ok(result.rows_affected > 0)
    }

    /// Hard-delete finished matches last written before `before`.
    pub async fn purge_finished_before(&self, before: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let result = Matches::delete_many()
            .filter(matches::Column::Status.eq(MatchStatus::Finished.as_str()))
            .filter(matches::Column::UpdatedAt.lt(before))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }
}
