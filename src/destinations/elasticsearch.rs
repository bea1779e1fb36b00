// Elasticsearch transport - posts bulk bodies over HTTP(S)
//
// DESIGN: One reqwest client per destination, created at startup and shared
// by every flush cycle. The client carries the destination's TLS policy;
// the request carries its path, headers and body. Closing drops the client
// and its pooled connections.

use super::{BulkRequest, BulkTransport, TransportError, TransportResponse};
use crate::config::{ConfigError, DestinationConfig};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

pub struct HttpTransport {
    client: Mutex<Option<reqwest::Client>>,
    identifier: String,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &DestinationConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.trust_all_certificates)
            .build()
            .map_err(|source| ConfigError::Client {
                identifier: config.identifier.clone(),
                source,
            })?;

        info!(
            identifier = %config.identifier,
            host = %config.host,
            port = config.port,
            ssl = config.use_tls,
            trust_all = config.trust_all_certificates,
            url = %config.bulk_url(),
            "initialized HTTP client"
        );

        Ok(Self {
            client: Mutex::new(Some(client)),
            identifier: config.identifier.clone(),
            base_url: config.base_url(),
        })
    }

    fn client(&self) -> MutexGuard<'_, Option<reqwest::Client>> {
        self.client
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BulkTransport for HttpTransport {
    async fn send(&self, request: BulkRequest) -> Result<TransportResponse, TransportError> {
        let client = self
            .client()
            .clone()
            .ok_or_else(|| TransportError::Closed(self.identifier.clone()))?;
        let url = format!("{}{}", self.base_url, request.path);
        debug!(
            identifier = %self.identifier,
            url = %url,
            bytes = request.body.len(),
            "sending bulk request"
        );

        let mut builder = client.post(&url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.body(request.body).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(TransportResponse { status, body })
    }

    async fn close(&self) {
        if self.client().take().is_some() {
            debug!(identifier = %self.identifier, "closed HTTP client");
        }
    }
}
