//! Local caching of pulled extracts.

pub mod sqlite;

pub use sqlite::{CacheStats, ExtractCache, SnapshotInfo};
