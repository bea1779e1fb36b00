// Outbound transports for bulk requests
//
// DESIGN: The dispatcher builds a transport-agnostic BulkRequest (path,
// headers, body) and hands it to a BulkTransport. The HTTP implementation
// lives in `elasticsearch`; tests substitute an in-process transport.

pub mod elasticsearch;

use crate::config::{ConfigError, DestinationConfig};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport for '{0}' is closed")]
    Closed(String),
}

/// One outgoing bulk request before it reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkRequest {
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl BulkRequest {
    pub fn new(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            headers: Vec::new(),
            body,
        }
    }

    /// Sets a header, replacing any existing value with the same
    /// (case-insensitive) name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Common interface for everything that can carry a bulk request to a
/// destination. Implementations must be safe to share across overlapping
/// flush cycles.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    async fn send(&self, request: BulkRequest) -> Result<TransportResponse, TransportError>;

    /// Releases the transport. Called once at shutdown; later sends fail
    /// with [`TransportError::Closed`].
    async fn close(&self) {}
}

/// Factory function to create the HTTP transport for a destination
pub fn create_transport(config: &DestinationConfig) -> Result<Arc<dyn BulkTransport>, ConfigError> {
    Ok(Arc::new(elasticsearch::HttpTransport::new(config)?))
}
