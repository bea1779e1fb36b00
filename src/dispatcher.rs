// Bulk dispatch and outcome classification
//
// A bulk exchange counts as indexed only when the transport succeeded, the
// status is 200 and the response body parses with "errors": false.
// Per-item failures inside a 200 are only visible through that flag.
// Nothing is retried.

use crate::config::{ConfigError, DestinationConfig};
use crate::destinations::{self, BulkRequest, BulkTransport, TransportError, TransportResponse};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("destination answered HTTP {status}")]
    Status { status: u16, body: String },

    #[error("bulk response could not be parsed")]
    UnparsableResponse { body: String },

    #[error("bulk response reported errors")]
    Rejected { body: String },

    #[error("no transport configured for instance '{0}'")]
    Unconnected(String),
}

impl DispatchError {
    /// The underlying transport error, present only for transport failures.
    pub fn transport_cause(&self) -> Option<&TransportError> {
        match self {
            DispatchError::Transport(err) => Some(err),
            _ => None,
        }
    }

    /// The raw response body for failures the destination answered.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            DispatchError::Status { body, .. }
            | DispatchError::UnparsableResponse { body }
            | DispatchError::Rejected { body } => Some(body),
            _ => None,
        }
    }
}

pub fn classify_response(response: TransportResponse) -> Result<(), DispatchError> {
    if response.status != 200 {
        return Err(DispatchError::Status {
            status: response.status,
            body: response.body,
        });
    }

    let parsed: Value = match serde_json::from_str(&response.body) {
        Ok(value) => value,
        Err(_) => return Err(DispatchError::UnparsableResponse { body: response.body }),
    };

    // A missing flag counts as failure
    match parsed.get("errors").and_then(Value::as_bool) {
        Some(false) => Ok(()),
        _ => Err(DispatchError::Rejected { body: response.body }),
    }
}

/// Builds the outgoing request for one destination group.
pub fn build_request(config: &DestinationConfig, payload: Vec<u8>) -> BulkRequest {
    let mut request = BulkRequest::new(config.bulk_path(), payload);
    request.set_header("content-type", "application/json");
    if let Some(auth) = &config.authentication {
        auth.apply(&mut request);
    }
    request
}

pub struct Dispatcher {
    transports: HashMap<String, Arc<dyn BulkTransport>>,
}

impl Dispatcher {
    pub fn new(transports: HashMap<String, Arc<dyn BulkTransport>>) -> Self {
        Self { transports }
    }

    /// Creates one HTTP transport per destination.
    pub fn connect(destinations: &[Arc<DestinationConfig>]) -> Result<Self, ConfigError> {
        let mut transports = HashMap::with_capacity(destinations.len());
        for destination in destinations {
            transports.insert(
                destination.identifier.clone(),
                destinations::create_transport(destination)?,
            );
        }
        Ok(Self::new(transports))
    }

    pub async fn dispatch(
        &self,
        config: &DestinationConfig,
        payload: Vec<u8>,
    ) -> Result<(), DispatchError> {
        let transport = self
            .transports
            .get(&config.identifier)
            .ok_or_else(|| DispatchError::Unconnected(config.identifier.clone()))?;

        let request = build_request(config, payload);
        let response = transport.send(request).await?;
        classify_response(response)
    }

    /// Closes every transport exactly once.
    pub async fn close(&self) {
        for (identifier, transport) in &self.transports {
            debug!(identifier = %identifier, "closing transport");
            transport.close().await;
        }
    }
}
