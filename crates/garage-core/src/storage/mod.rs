//! Storage layer: the persistence contract and its SQLite engine.

pub mod sqlite;
pub mod traits;
pub mod types;

pub use sqlite::SqliteStore;
pub use traits::GarageStore;
pub use types::*;
