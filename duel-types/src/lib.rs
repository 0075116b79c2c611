pub mod errors;
pub mod game;
pub mod messages;
pub mod session;

// Re-export all types
pub use errors::*;
pub use game::*;
pub use messages::*;
pub use session::*;

pub type MatchId = uuid::Uuid;
pub type PlayerId = uuid::Uuid;
