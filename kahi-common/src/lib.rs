//! # Kahi Common Library
//!
//! Shared code for the Kahi bibliographic ETL tools:
//! - Error and result types
//! - Configuration file model and root folder resolution
//! - Timestamp and UUID helpers

pub mod config;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
