//! Shared foundation of the DealScope evaluation pipeline.
//!
//! This crate owns the pieces every other crate agrees on:
//! - the normalized data model (`domain`): startup facts, dimension scores,
//!   red flags, narratives, benchmarks, and the aggregate evaluation result
//! - the immutable runtime configuration record (`config`)
//! - the error taxonomy that crosses crate boundaries (`errors`)
//! - the pure JSON-extraction helper agents apply to free-form model output
//!   (`json`)
//!
//! Nothing here performs I/O. Agents, stores, and the HTTP surface live in
//! their own crates and depend on this one.

pub mod config;
pub mod domain;
pub mod errors;
pub mod json;

pub use chrono;
