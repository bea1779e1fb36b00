// es-indexer: buffers event records and flushes them periodically as bulk
// requests to one or more Elasticsearch-compatible destinations.

pub mod auth;
pub mod bulk;
pub mod config;
pub mod destinations;
pub mod dispatcher;
pub mod engine;
pub mod index_namer;
pub mod intake;
pub mod queue;
pub mod record;
pub mod router;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigError, DestinationConfig, Flavour, IndexMode};
pub use engine::{FlushReport, Indexer, Scheduler, StatsSnapshot};
pub use record::IncomingRecord;
