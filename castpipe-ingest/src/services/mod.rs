//! Ingestion pipeline services

pub mod episode_catalog;
pub mod episode_normalizer;
pub mod feed_generator;
pub mod orchestrator;
pub mod show_name_resolver;

pub use episode_catalog::{EpisodeCatalog, EpisodeFile, ListError};
pub use episode_normalizer::{EpisodeNormalizer, NormalizeError};
pub use feed_generator::FeedGenerator;
pub use orchestrator::{IngestError, IngestionOrchestrator};
pub use show_name_resolver::{ResolveError, ShowNameResolver, ShowNameSource, StaticShowNames};
