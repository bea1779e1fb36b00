// Batch routing
//
// Splits a drained batch into one group per destination identifier.
// Order inside a group follows enqueue order; order across groups is
// unspecified. Groups for unknown identifiers are dropped for good.

use crate::config::DestinationConfig;
use crate::record::IncomingRecord;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Records bound for one configured destination.
#[derive(Debug)]
pub struct DestinationGroup {
    pub destination: Arc<DestinationConfig>,
    pub records: Vec<IncomingRecord>,
}

/// Records discarded because no destination carries their identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedGroup {
    pub identifier: String,
    pub count: usize,
}

#[derive(Debug, Default)]
pub struct RoutedBatch {
    pub groups: Vec<DestinationGroup>,
    pub dropped: Vec<DroppedGroup>,
}

impl RoutedBatch {
    pub fn dropped_records(&self) -> usize {
        self.dropped.iter().map(|d| d.count).sum()
    }
}

pub struct Router {
    destinations: HashMap<String, Arc<DestinationConfig>>,
}

impl Router {
    pub fn new(destinations: impl IntoIterator<Item = Arc<DestinationConfig>>) -> Self {
        let destinations = destinations
            .into_iter()
            .map(|d| (d.identifier.clone(), d))
            .collect();
        Self { destinations }
    }

    pub fn route(&self, batch: Vec<IncomingRecord>) -> RoutedBatch {
        let mut by_identifier: HashMap<String, Vec<IncomingRecord>> = HashMap::new();
        for record in batch {
            by_identifier
                .entry(record.destination_identifier.clone())
                .or_default()
                .push(record);
        }

        let mut routed = RoutedBatch::default();
        for (identifier, records) in by_identifier {
            match self.destinations.get(&identifier) {
                Some(destination) => routed.groups.push(DestinationGroup {
                    destination: Arc::clone(destination),
                    records,
                }),
                None => {
                    warn!(
                        identifier = %identifier,
                        count = records.len(),
                        "cannot index records for unknown instance identifier, dropping"
                    );
                    routed.dropped.push(DroppedGroup {
                        identifier,
                        count: records.len(),
                    });
                }
            }
        }

        routed
    }
}
