//! # Memsee - Heap Dump Explorer
//!
//! Loads object-graph dumps of a running program into SQLite and lets you
//! interrogate them with SQL extended by a few shorthands.
//!
//! Memsee provides:
//! - Generations: every imported dump is kept side by side, one active at a time
//! - A macro compiler for parent/child navigation and back-references to results
//! - Mark-and-sweep garbage collection from a synthetic root object
//! - Ancestor type classification and shortest reference paths

pub mod app;
pub mod command;
pub mod compiler;
pub mod config;
pub mod graph;
pub mod import;
pub mod object;
pub mod output;
pub mod reachability;
pub mod session;
pub mod storage;
pub mod ui;

// Re-exports for convenient access
pub use app::{App, Reply};
pub use command::Command;
pub use compiler::{compile, SubstitutionError};
pub use graph::{Direction, GraphCache, ObjectGraph};
pub use object::ObjectRecord;
pub use session::{Cell, ResultSet, Session};
pub use storage::MemStore;

/// Result type alias for Memsee operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Memsee operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("SQL error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("{0}")]
    Substitution(#[from] SubstitutionError),

    #[error("Couldn't parse record on line {line}: {source}")]
    ImportFormat {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Need an open database")]
    NoDatabase,

    #[error("{0}")]
    Usage(String),

    #[error("No match: {0}")]
    NoMatch(String),
}
