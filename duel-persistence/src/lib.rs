pub mod connection;
pub mod entities;
pub mod error;
pub mod repositories;

pub use connection::*;
pub use error::PersistenceError;
pub use repositories::{LockedMatch, MatchRepository};
