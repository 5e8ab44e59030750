//! Monitoring passes over the store: threshold evaluation, alarm
//! correlation, and ticket lifecycle, driven by [`ingest::Monitor`].

pub mod correlation;
pub mod evaluator;
pub mod ingest;
pub mod lifecycle;

pub use ingest::{IngestOutcome, Monitor};
