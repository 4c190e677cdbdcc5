//! Test helper utilities
//!
//! Shared setup for the kahi-etl integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod fixtures;
pub mod stubs;

pub use db_utils::{create_test_db, stage};
pub use fixtures::{canonical_record, doaj_journal};
pub use stubs::{FailingRegistry, FixedRegistry, MapOpenAccessRegistry, TablePipelineBuilder};
