//! Analytics ingestion and cached aggregation
//!
//! `EventWriter` is the write path (best-effort single inserts, strict
//! batches); `StatsReader` is the read path (TTL-cached aggregates).

pub mod stats;
pub mod writer;

pub use stats::StatsReader;
pub use writer::EventWriter;
