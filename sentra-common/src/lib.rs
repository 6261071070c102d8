//! # Sentra Common Library
//!
//! Shared code for the Sentra detection-to-notification pipeline:
//! - Database models and queries
//! - Event envelope types and the EventBus
//! - Geographic proximity resolution
//! - Configuration loading
//! - Error types

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod geo;

pub use error::{Error, Result};
