// src/ingest/providers/mod.rs
pub mod v2ex;

pub use v2ex::V2exProvider;
