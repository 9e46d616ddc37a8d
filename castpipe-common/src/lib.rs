//! Shared types for the castpipe services
//!
//! Provides the common error type, configuration resolution, and the
//! object-notification wire types consumed by the ingest service.

pub mod config;
pub mod error;
pub mod events;

pub use config::IngestConfig;
pub use error::{Error, Result};
