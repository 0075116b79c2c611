pub mod match_repository;

pub use match_repository::*;
