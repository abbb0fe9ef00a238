pub mod database;

pub use database::{Database, MatchRecord, MatchTable, MemoryRecord, TriviaRecord};
