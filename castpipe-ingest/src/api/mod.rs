//! HTTP API handlers for castpipe-ingest

pub mod events;
pub mod health;

pub use events::event_routes;
pub use health::health_routes;
