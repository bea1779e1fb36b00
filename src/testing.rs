use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{DestinationConfig, Flavour, IndexMode};
use crate::destinations::{BulkRequest, BulkTransport, TransportError, TransportResponse};

pub fn static_destination(identifier: &str, index: &str) -> DestinationConfig {
    DestinationConfig {
        identifier: identifier.to_string(),
        flavour: Flavour::Standard,
        host: "localhost".to_string(),
        port: 9200,
        index_mode: IndexMode::StaticName,
        index_name_or_pattern: index.to_string(),
        index_timestamp_field_name: "@timestamp".to_string(),
        use_tls: false,
        trust_all_certificates: false,
        authentication: None,
    }
}

/// Scripted reply for the next request a [`MockTransport`] receives.
pub enum MockReply {
    Respond(u16, &'static str),
    Closed,
}

#[derive(Default)]
pub struct MockTransportState {
    pub requests: Mutex<Vec<BulkRequest>>,
    pub replies: Mutex<VecDeque<MockReply>>,
    pub closed: Mutex<usize>,
}

impl MockTransportState {
    pub fn requests(&self) -> Vec<BulkRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        *self.closed.lock().unwrap()
    }
}

/// Records every request. Replies are taken from the script in order and
/// default to a clean bulk acknowledgement once the script runs out.
pub struct MockTransport {
    pub state: Arc<MockTransportState>,
}

impl MockTransport {
    pub fn new(replies: Vec<MockReply>) -> (Arc<Self>, Arc<MockTransportState>) {
        let state = Arc::new(MockTransportState {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        });
        (
            Arc::new(Self {
                state: Arc::clone(&state),
            }),
            state,
        )
    }
}

#[async_trait]
impl BulkTransport for MockTransport {
    async fn send(&self, request: BulkRequest) -> Result<TransportResponse, TransportError> {
        self.state.requests.lock().unwrap().push(request);
        let reply = self.state.replies.lock().unwrap().pop_front();

        match reply.unwrap_or(MockReply::Respond(200, r#"{"errors":false}"#)) {
            MockReply::Respond(status, body) => Ok(TransportResponse {
                status,
                body: body.to_string(),
            }),
            MockReply::Closed => Err(TransportError::Closed("mock".to_string())),
        }
    }

    async fn close(&self) {
        *self.state.closed.lock().unwrap() += 1;
    }
}
