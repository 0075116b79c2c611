use duel_types::{MatchId, PlayerId};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResignReason {
    Voluntary,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    MatchCreated {
        match_id: MatchId,
        host_id: PlayerId,
    },
    PlayerJoined {
        match_id: MatchId,
        player_id: PlayerId,
    },
    MatchStarted {
        match_id: MatchId,
        clock_budget_ms: u64,
    },
    GuessEvaluated {
        match_id: MatchId,
        player_id: PlayerId,
        guess_number: usize,
    },
    PlayerSolved {
        match_id: MatchId,
        player_id: PlayerId,
        guess_number: usize,
    },
    PlayerExhausted {
        match_id: MatchId,
        player_id: PlayerId,
    },
    PlayerTimedOut {
        match_id: MatchId,
        player_id: PlayerId,
    },
    PlayerResigned {
        match_id: MatchId,
        player_id: PlayerId,
        reason: ResignReason,
    },
    PlayerDisconnected {
        match_id: MatchId,
        player_id: PlayerId,
    },
    PlayerReconnected {
        match_id: MatchId,
        player_id: PlayerId,
    },
    MatchFinished {
        match_id: MatchId,
        winner: Option<PlayerId>,
    },
}

impl MatchEvent {
    /// Transitions that change who can still win. A settle pass that
    /// produced one of these has to be persisted.
    pub fn is_decisive(&self) -> bool {
        matches!(
            self,
            MatchEvent::PlayerTimedOut { .. }
                | MatchEvent::PlayerResigned { .. }
                | MatchEvent::MatchFinished { .. }
        )
    }
}

/// Receives events once the transition that produced them is committed.
pub trait MatchEventHandler: Send + Sync {
    fn handle_event(&self, event: &MatchEvent);
}

/// Fan-out of committed events to every registered handler.
#[derive(Default, Clone)]
pub struct MatchEventBus {
    handlers: Vec<Arc<dyn MatchEventHandler>>,
}

impl MatchEventBus {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn MatchEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn publish(&self, events: &[MatchEvent]) {
        for event in events {
            for handler in &self.handlers {
                handler.handle_event(event);
            }
        }
    }
}
