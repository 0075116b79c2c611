use std::env;
use std::str::FromStr;
use std::time::Duration;

use duel_core::{MatchRules, SweepPolicy};
use thiserror::Error;

const DEV_SESSION_SECRET: &str = "dev_secret_change_me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub clock_budget_ms: u64,
    pub disconnect_grace_ms: u64,
    pub sweep_interval_ms: u64,
    pub sweep_stale_after_ms: u64,
    pub finished_retention_secs: u64,
    pub commit_max_attempts: u32,
    pub commit_retry_base_ms: u64,
    pub session_secret: String,
    pub session_ttl_secs: u64,
    pub words_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", "8080")?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://word_duel.db?mode=rwc".to_string()),
            clock_budget_ms: parse_var("CLOCK_BUDGET_MS", "300000")?,
            disconnect_grace_ms: parse_var("DISCONNECT_GRACE_MS", "30000")?,
            sweep_interval_ms: parse_var("SWEEP_INTERVAL_MS", "1000")?,
            sweep_stale_after_ms: parse_var("SWEEP_STALE_AFTER_MS", "1000")?,
            finished_retention_secs: parse_var("FINISHED_RETENTION_SECS", "3600")?,
            commit_max_attempts: parse_var("COMMIT_MAX_ATTEMPTS", "4")?,
            commit_retry_base_ms: parse_var("COMMIT_RETRY_BASE_MS", "20")?,
            session_secret: env::var("SESSION_SECRET")
                .unwrap_or_else(|_| DEV_SESSION_SECRET.to_string()),
            session_ttl_secs: parse_var("SESSION_TTL_SECS", "43200")?,
            words_file: env::var("WORDS_FILE").ok().filter(|path| !path.is_empty()),
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.session_secret == DEV_SESSION_SECRET
    }

    pub fn match_rules(&self) -> MatchRules {
        MatchRules {
            clock_budget_ms: self.clock_budget_ms,
            disconnect_grace_ms: self.disconnect_grace_ms,
        }
    }

    pub fn sweep_policy(&self) -> SweepPolicy {
        SweepPolicy::new(
            Duration::from_millis(self.sweep_interval_ms),
            Duration::from_millis(self.sweep_stale_after_ms),
            Duration::from_secs(self.finished_retention_secs),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.commit_max_attempts.max(1),
            base_delay: Duration::from_millis(self.commit_retry_base_ms),
        }
    }
}

/// Bounded retry for transient commit failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    const MAX_DELAY: Duration = Duration::from_secs(1);

    /// Backoff before retrying after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(Self::MAX_DELAY)
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}
