// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod engine;
pub mod enrich;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod render;

// ---- Re-exports for stable public API ----
pub use crate::engine::{DigestRun, RunOutcome, RunReport};
pub use crate::enrich::{EnrichMode, Enricher};
pub use crate::ingest::types::{DigestPool, DigestResult, NodeConfig, PoolKey, Topic, TopicSource};
pub use crate::ingest::{aggregate, normalize, AggregateOptions};
