//! kahi-etl library interface
//!
//! Entity resolution and merge engine for bibliographic records: provider
//! records for one work are normalized, merged, linked against the store
//! and persisted. The binary drives it; integration tests use it directly.

pub mod config;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod index;
pub mod lang;
pub mod linker;
pub mod merge;
pub mod normalizer;
pub mod pipeline;
pub mod similarity;
pub mod staging;
pub mod types;

pub use crate::config::EtlConfig;
pub use crate::error::{ProcessError, SkipReason};
pub use crate::pipeline::{BatchReport, Orchestrator, Pipeline};
pub use crate::types::WorkIdentifier;
