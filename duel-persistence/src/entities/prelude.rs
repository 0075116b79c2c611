pub use super::matches::Entity as Matches;
