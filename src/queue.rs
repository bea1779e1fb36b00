// Intake queue
//
// DESIGN: Unbounded on purpose. Producers never block beyond the lock and
// never get rejected; memory growth under a dead backend is accepted.
// The single consumer swaps the whole buffer out in one step, so each drain
// is a snapshot of everything enqueued before it.

use crate::record::IncomingRecord;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct RecordQueue {
    records: Mutex<VecDeque<IncomingRecord>>,
}

impl RecordQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&self, record: IncomingRecord) {
        self.lock().push_back(record);
    }

    /// Removes and returns everything currently queued, in enqueue order.
    pub fn drain(&self) -> Vec<IncomingRecord> {
        let drained = std::mem::take(&mut *self.lock());
        drained.into()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A producer panicking mid-push cannot leave the deque half-written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<IncomingRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
