use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RetryPolicy;
use crate::match_locks::MatchLocks;
use duel_core::{
    ActionOutcome, MatchAction, MatchEngine, MatchEvent, MatchEventBus, MatchEventHandler,
    SystemTimeSource, TimeSource, Transition, WordValidator,
};
use duel_persistence::{MatchRepository, PersistenceError};
use duel_types::{GuessReceipt, MatchError, MatchId, MatchView, PlayerId};

/// What one trip through the critical section decided, after the
/// transaction has either committed or rolled back.
struct Attempt {
    verdict: Result<ActionOutcome, MatchError>,
    committed_events: Vec<MatchEvent>,
}

/// Single entry point for every change to a match.
///
/// Each action runs lock -> read -> settle -> apply -> conditional write,
/// serialized per match id. Transient storage failures restart the whole
/// cycle a bounded number of times. Events are published only once the
/// write that produced them has committed.
#[derive(Clone)]
pub struct MatchController {
    repository: MatchRepository,
    engine: MatchEngine,
    words: Arc<WordValidator>,
    locks: Arc<MatchLocks>,
    time: Arc<dyn TimeSource>,
    events: MatchEventBus,
    retry: RetryPolicy,
}

impl MatchController {
    pub fn new(repository: MatchRepository, engine: MatchEngine, words: Arc<WordValidator>) -> Self {
        Self {
            repository,
            engine,
            words,
            locks: Arc::new(MatchLocks::new()),
            time: Arc::new(SystemTimeSource),
            events: MatchEventBus::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn MatchEventHandler>) -> Self {
        self.events.add_handler(handler);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    pub fn repository(&self) -> &MatchRepository {
        &self.repository
    }

    pub fn locks(&self) -> &MatchLocks {
        &self.locks
    }

    /// Open a lobby with a fresh secret and the host seated.
    pub async fn create_match(&self) -> Result<(MatchId, PlayerId), MatchError> {
        let secret = self
            .words
            .random_secret()
            .map_err(|e| MatchError::StorageFailure {
                message: e.to_string(),
            })?;

        let match_id = Uuid::new_v4();
        let host_id = Uuid::new_v4();
        let record = self
            .engine
            .new_match(match_id, host_id, secret, self.now());

        let mut attempt = 1;
        loop {
            match self.repository.create(&record).await {
                Ok(()) => break,
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    self.back_off(match_id, attempt, &err).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.publish(&[MatchEvent::MatchCreated { match_id, host_id }]);
        Ok((match_id, host_id))
    }

    pub async fn join_match(&self, match_id: MatchId) -> Result<PlayerId, MatchError> {
        let guest_id = Uuid::new_v4();
        match self
            .execute(match_id, MatchAction::Join { guest_id })
            .await?
        {
            ActionOutcome::Joined { player_id } => Ok(player_id),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn start_match(&self, match_id: MatchId) -> Result<(), MatchError> {
        self.execute(match_id, MatchAction::Start).await.map(|_| ())
    }

    pub async fn submit_guess(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        word: &str,
    ) -> Result<GuessReceipt, MatchError> {
        let action = MatchAction::Guess {
            player_id,
            word: word.to_string(),
        };
        match self.execute(match_id, action).await? {
            ActionOutcome::Guessed(receipt) => Ok(receipt),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn set_connection(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        connected: bool,
    ) -> Result<(), MatchError> {
        let action = MatchAction::SetConnection {
            player_id,
            connected,
        };
        self.execute(match_id, action).await.map(|_| ())
    }

    pub async fn resign(&self, match_id: MatchId, player_id: PlayerId) -> Result<(), MatchError> {
        self.execute(match_id, MatchAction::Resign { player_id })
            .await
            .map(|_| ())
    }

    /// Charge clocks and apply expired grace windows without any player action.
    pub async fn settle(&self, match_id: MatchId) -> Result<(), MatchError> {
        self.execute(match_id, MatchAction::Settle).await.map(|_| ())
    }

    /// Redacted view for one seated player. Read-only: pending timeouts are
    /// reflected in the view but not written.
    pub async fn get_match_view(
        &self,
        match_id: MatchId,
        requester: PlayerId,
    ) -> Result<MatchView, MatchError> {
        let mut record = self
            .repository
            .find(match_id)
            .await?
            .ok_or(MatchError::NotFound { match_id })?;

        let now = self.now();
        self.engine.settle(&mut record, now);
        self.engine.view_for(&record, requester, now)
    }

    pub async fn delete_match(&self, match_id: MatchId) -> Result<(), MatchError> {
        let _guard = self.locks.acquire(match_id).await;
        if !self.repository.delete(match_id).await? {
            return Err(MatchError::NotFound { match_id });
        }

        info!("Deleted match {}", match_id);
        Ok(())
    }

    /// Hard-delete finished matches last written before `before`.
    pub async fn purge_finished(&self, before: DateTime<Utc>) -> Result<u64, MatchError> {
        let purged = self.repository.purge_finished_before(before).await?;
        if purged > 0 {
            info!("Purged {} finished matches", purged);
        }
        Ok(purged)
    }

    /// Run `action` to completion on its own task. If the caller goes away
    /// the task still finishes and commits; only the reply is lost.
    async fn execute(
        &self,
        match_id: MatchId,
        action: MatchAction,
    ) -> Result<ActionOutcome, MatchError> {
        let controller = self.clone();
        let task = tokio::spawn(async move { controller.run_exclusive(match_id, action).await });

        task.await.map_err(|e| MatchError::StorageFailure {
            message: format!("match task failed: {}", e),
        })?
    }

    async fn run_exclusive(
        &self,
        match_id: MatchId,
        action: MatchAction,
    ) -> Result<ActionOutcome, MatchError> {
        let _guard = self.locks.acquire(match_id).await;

        let mut attempt = 1;
        loop {
            match self.attempt(match_id, &action).await {
                Ok(Attempt {
                    verdict,
                    committed_events,
                }) => {
                    self.publish(&committed_events);
                    return verdict;
                }
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    self.back_off(match_id, attempt, &err).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        "Giving up on {} for match {} after {} attempt(s): {}",
                        action.name(),
                        match_id,
                        attempt,
                        err
                    );
                    return Err(err.into());
                }
            }
        }
    }

    /// One transaction. Nothing it did survives unless it returns `Ok`.
    async fn attempt(
        &self,
        match_id: MatchId,
        action: &MatchAction,
    ) -> Result<Attempt, PersistenceError> {
        let txn = self.repository.begin().await?;
        let Some(locked) = MatchRepository::fetch_locked(&txn, match_id).await? else {
            txn.rollback().await?;
            return Ok(Attempt {
                verdict: Err(MatchError::NotFound { match_id }),
                committed_events: Vec::new(),
            });
        };

        let now = self.now();
        let mut settled = locked.record.clone();
        let settle_events = self.engine.settle(&mut settled, now);

        let (next, verdict, mut events) = match self.engine.apply(&settled, action, now) {
            Ok(Transition {
                record,
                outcome,
                events,
            }) => {
                let mut all = settle_events;
                all.extend(events);
                (Some(record), Ok(outcome), all)
            }
            // Timeouts and grace resigns stick even when the action itself fails
            Err(err) if settle_events.iter().any(MatchEvent::is_decisive) => {
                (Some(settled), Err(err), settle_events)
            }
            Err(err) => (None, Err(err), Vec::new()),
        };

        match next {
            Some(record) if record != locked.record => {
                MatchRepository::update(&txn, &record, locked.version, now).await?;
                txn.commit().await?;
            }
            _ => {
                txn.rollback().await?;
                events.clear();
            }
        }

        Ok(Attempt {
            verdict,
            committed_events: events,
        })
    }

    async fn back_off(&self, match_id: MatchId, attempt: u32, err: &PersistenceError) {
        let delay = self.retry.delay_for(attempt);
        warn!(
            "Transient failure on match {} (attempt {}/{}), retrying in {:?}: {}",
            match_id, attempt, self.retry.max_attempts, delay, err
        );
        tokio::time::sleep(delay).await;
    }

    fn publish(&self, events: &[MatchEvent]) {
        for event in events {
            log_event(event);
        }
        self.events.publish(events);
    }
}

fn log_event(event: &MatchEvent) {
    match event {
        MatchEvent::MatchCreated { match_id, host_id } => {
            info!("Match {} created by {}", match_id, host_id)
        }
        MatchEvent::PlayerJoined {
            match_id,
            player_id,
        } => info!("Player {} joined match {}", player_id, match_id),
        MatchEvent::MatchStarted {
            match_id,
            clock_budget_ms,
        } => info!("Match {} started with {}ms each", match_id, clock_budget_ms),
        MatchEvent::GuessEvaluated {
            match_id,
            player_id,
            guess_number,
        } => debug!(
            "Player {} made guess {} in match {}",
            player_id, guess_number, match_id
        ),
        MatchEvent::PlayerSolved {
            match_id,
            player_id,
            guess_number,
        } => info!(
            "Player {} solved match {} in {} guesses",
            player_id, match_id, guess_number
        ),
        MatchEvent::PlayerExhausted {
            match_id,
            player_id,
        } => info!("Player {} is out of guesses in match {}", player_id, match_id),
        MatchEvent::PlayerTimedOut {
            match_id,
            player_id,
        } => info!("Player {} ran out of time in match {}", player_id, match_id),
        MatchEvent::PlayerResigned {
            match_id,
            player_id,
            reason,
        } => info!(
            "Player {} resigned match {} ({:?})",
            player_id, match_id, reason
        ),
        MatchEvent::PlayerDisconnected {
            match_id,
            player_id,
        } => debug!("Player {} disconnected from match {}", player_id, match_id),
        MatchEvent::PlayerReconnected {
            match_id,
            player_id,
        } => debug!("Player {} reconnected to match {}", player_id, match_id),
        MatchEvent::MatchFinished { match_id, winner } => match winner {
            Some(winner) => info!("Match {} finished, winner {}", match_id, winner),
            None => info!("Match {} finished in a draw", match_id),
        },
    }
}

fn unexpected(outcome: &ActionOutcome) -> MatchError {
    MatchError::StorageFailure {
        message: format!("unexpected outcome {:?}", outcome),
    }
}
