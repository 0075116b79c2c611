pub mod prelude;

pub mod matches;
