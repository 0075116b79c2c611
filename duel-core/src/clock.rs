use chrono::{DateTime, Duration, Utc};
use duel_types::Player;
use std::sync::Mutex;

/// Source of wall-clock time for everything that charges clocks.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Time that only moves when told to. Lets clock behaviour be exercised
/// without sleeping.
#[derive(Debug)]
pub struct ManualTimeSource {
    now: Mutex<DateTime<Utc>>,
}

impl ManualTimeSource {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        let by = Duration::from_std(by).unwrap_or(Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = to;
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Whole milliseconds from `from` to `to`, zero if `to` is not later.
pub fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

/// Chess-clock style countdown. Each player's clock is charged for the wall
/// time since it was last charged; the two clocks are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChessClock {
    budget_ms: u64,
}

impl ChessClock {
    pub fn new(budget_ms: u64) -> Self {
        Self { budget_ms }
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget_ms
    }

    /// Fill the player's clock and start it running at `now`.
    pub fn start(&self, player: &mut Player, now: DateTime<Utc>) {
        player.remaining_ms = self.budget_ms;
        player.last_charged_at = Some(now);
    }

    /// Deduct the time elapsed since the last charge and return what is left.
    ///
    /// Floors at zero. `last_charged_at` advances by exactly the whole
    /// milliseconds charged, so sub-millisecond remainders carry over to the
    /// next charge and it never moves backwards. Charging at t1 then t2
    /// leaves the same remainder as charging once at t2.
    pub fn charge(&self, player: &mut Player, now: DateTime<Utc>) -> u64 {
        let since = player.last_charged_at.unwrap_or(now);
        let elapsed = elapsed_ms(since, now);
        player.remaining_ms = player.remaining_ms.saturating_sub(elapsed);
        player.last_charged_at = Some(since + Duration::milliseconds(elapsed as i64));
        player.remaining_ms
    }

    /// What `charge` would leave at `now`, without touching the player.
    pub fn projected_remaining(&self, player: &Player, now: DateTime<Utc>) -> u64 {
        match player.last_charged_at {
            Some(since) if player.is_active() => {
                player.remaining_ms.saturating_sub(elapsed_ms(since, now))
            }
            _ => player.remaining_ms,
        }
    }
}
