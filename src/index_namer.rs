// Index selector rendering
//
// Every document in a bulk body is preceded by a selector line such as
// {"index":{"_index":"logs-2024.03.07"}}
//
// DESIGN: Selector lines are memoized. A static destination renders once for
// the life of the process; a rolling destination renders once per UTC day.
// Entries are never evicted.

use crate::config::{DestinationConfig, IndexMode};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

// Destination identifier plus the UTC day for rolling indices
type CacheKey = (String, Option<NaiveDate>);

#[derive(Debug, Default)]
pub struct IndexNamer {
    cache: RwLock<HashMap<CacheKey, Arc<str>>>,
    renders: AtomicUsize,
}

impl IndexNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector line for a record, using the current wall clock as the
    /// flush time.
    pub fn prefix_for(&self, config: &DestinationConfig, event_timestamp: DateTime<Utc>) -> Arc<str> {
        self.prefix_for_at(config, event_timestamp, Utc::now())
    }

    /// Selector line for a record whose flush happens at `flush_time`.
    /// The returned fragment includes its trailing newline.
    pub fn prefix_for_at(
        &self,
        config: &DestinationConfig,
        event_timestamp: DateTime<Utc>,
        flush_time: DateTime<Utc>,
    ) -> Arc<str> {
        let bucket = match config.index_mode {
            IndexMode::StaticName => None,
            IndexMode::DatePatternEventTime => Some(event_timestamp.date_naive()),
            IndexMode::DatePatternFlushTime => Some(flush_time.date_naive()),
        };

        let cache_key: CacheKey = (config.identifier.clone(), bucket);

        if let Some(fragment) = self.read_cache().get(&cache_key) {
            return Arc::clone(fragment);
        }

        let index_name = match bucket {
            None => config.index_name_or_pattern.clone(),
            Some(date) => render_index_name(&config.index_name_or_pattern, date),
        };
        let fragment: Arc<str> = Arc::from(selector_line(&index_name));
        self.renders.fetch_add(1, Ordering::Relaxed);

        // Overlapping cycles may both render a new key; the renders are
        // identical so whichever lands first is kept.
        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(cache.entry(cache_key).or_insert(fragment))
    }

    /// Number of selector lines rendered so far (cache misses).
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::Relaxed)
    }

    pub fn cached_entries(&self) -> usize {
        self.read_cache().len()
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<CacheKey, Arc<str>>> {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Substitutes `yyyy`, `MM` and `dd` wherever they appear in `pattern`.
///
/// This is plain token replacement, not a date-format parser: a literal
/// "dd" anywhere in the pattern is replaced too.
pub fn render_index_name(pattern: &str, date: NaiveDate) -> String {
    pattern
        .replace("yyyy", &format!("{:04}", date.year()))
        .replace("MM", &format!("{:02}", date.month()))
        .replace("dd", &format!("{:02}", date.day()))
}

fn selector_line(index_name: &str) -> String {
    let mut line = json!({ "index": { "_index": index_name } }).to_string();
    line.push('\n');
    line
}
