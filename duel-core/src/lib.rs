pub mod clock;
pub mod evaluation;
pub mod match_events;
pub mod match_state;
pub mod sweep;
pub mod word_validation;

pub use clock::*;
pub use evaluation::*;
pub use match_events::*;
pub use match_state::*;
pub use sweep::*;
pub use word_validation::*;
