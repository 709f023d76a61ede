//! Storage Layer - SQLite-backed persistence
//!
//! Fixed tables:
//! - gen(num, current)
//! - env(name, value)
//!
//! Per generation (active names shown, parked ones are suffixed with N):
//! - obj(address, type, name, value, size, len, mark, repr)
//! - ref(parent, child)

pub mod generation;
pub mod schema;
pub mod sqlite;

pub use generation::Generation;
pub use sqlite::{DbStats, MemStore, SqlOutcome};
