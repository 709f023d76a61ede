//! Reachability analysis over the active generation
//!
//! Both passes are fixed-point loops driven by SQL and run to completion
//! synchronously; progress is reported through `tracing`.

pub mod ancestors;
pub mod gc;

pub use ancestors::{AncestorClassifier, DEFAULT_EXCLUDED_TYPES};
pub use gc::{Collector, GcReport, MarkReport};
