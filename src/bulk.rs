// Bulk API request body (NDJSON)
//
// Each document requires two lines:
// 1. Index selector ({"index":{"_index":"..."}})
// 2. Document data with the event timestamp injected
//
// {"index":{"_index":"logs-2025.12.03"}}
// {"@timestamp":"2025-12-03T14:23:45.120Z","level":"INFO","message":"..."}

use crate::config::DestinationConfig;
use crate::index_namer::IndexNamer;
use crate::record::IncomingRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Renders a timestamp as `yyyy-MM-dd'T'HH:mm:ss.SSS'Z'`.
pub fn format_event_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct BulkPayloadBuilder<'a> {
    namer: &'a IndexNamer,
}

impl<'a> BulkPayloadBuilder<'a> {
    pub fn new(namer: &'a IndexNamer) -> Self {
        Self { namer }
    }

    /// Builds the bulk body for one destination group using the current
    /// wall clock as flush time.
    pub fn build(
        &self,
        config: &DestinationConfig,
        records: &[IncomingRecord],
    ) -> Result<Vec<u8>, serde_json::Error> {
        self.build_at(config, records, Utc::now())
    }

    /// Records are emitted in the given order; none are skipped.
    pub fn build_at(
        &self,
        config: &DestinationConfig,
        records: &[IncomingRecord],
        flush_time: DateTime<Utc>,
    ) -> Result<Vec<u8>, serde_json::Error> {
        let mut body = Vec::with_capacity(records.len() * 256);

        for record in records {
            let prefix = self
                .namer
                .prefix_for_at(config, record.event_timestamp, flush_time);
            body.extend_from_slice(prefix.as_bytes());

            let mut document = record.payload.clone();
            document.insert(
                config.index_timestamp_field_name.clone(),
                Value::String(format_event_timestamp(record.event_timestamp)),
            );
            serde_json::to_writer(&mut body, &document)?;
            body.push(b'\n');
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Flavour, IndexMode};
    use serde_json::{Map, json};

    fn destination(mode: IndexMode, pattern: &str, field: &str) -> DestinationConfig {
        DestinationConfig {
            identifier: "idx-dest".to_string(),
            flavour: Flavour::Standard,
            host: "localhost".to_string(),
            port: 9200,
            index_mode: mode,
            index_name_or_pattern: pattern.to_string(),
            index_timestamp_field_name: field.to_string(),
            use_tls: false,
            trust_all_certificates: false,
            authentication: None,
        }
    }

    fn record(ts: i64, payload: serde_json::Value) -> IncomingRecord {
        let payload: Map<String, serde_json::Value> = match payload {
            serde_json::Value::Object(map) => map,
            _ => Map::new(),
        };
        IncomingRecord::new("idx-dest", ts, payload).unwrap()
    }

    #[test]
    fn test_timestamp_format_has_millis() {
        let ts = DateTime::from_timestamp_millis(1_709_769_600_042).unwrap();
        assert_eq!(format_event_timestamp(ts), "2024-03-07T00:00:00.042Z");
    }

    #[test]
    fn test_two_records_static_index() {
        let namer = IndexNamer::new();
        let builder = BulkPayloadBuilder::new(&namer);
        let config = destination(IndexMode::StaticName, "idx", "@timestamp");

        let records = vec![
            record(1_709_769_600_000, json!({"message": "first"})),
            record(1_709_769_601_500, json!({"message": "second"})),
        ];
        let body = String::from_utf8(builder.build(&config, &records).unwrap()).unwrap();

        assert!(body.ends_with('\n'));
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], r#"{"index":{"_index":"idx"}}"#);
        assert_eq!(lines[2], r#"{"index":{"_index":"idx"}}"#);

        let first: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first["@timestamp"], "2024-03-07T00:00:00.000Z");
        assert_eq!(first["message"], "first");

        let second: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(second["@timestamp"], "2024-03-07T00:00:01.500Z");
        assert_eq!(second["message"], "second");
    }

    #[test]
    fn test_timestamp_field_overwritten() {
        let namer = IndexNamer::new();
        let builder = BulkPayloadBuilder::new(&namer);
        let config = destination(IndexMode::StaticName, "idx", "ts");

        let records = vec![record(0, json!({"ts": "author supplied", "n": 1}))];
        let body = String::from_utf8(builder.build(&config, &records).unwrap()).unwrap();

        let doc: serde_json::Value = serde_json::from_str(body.lines().nth(1).unwrap()).unwrap();
        assert_eq!(doc["ts"], "1970-01-01T00:00:00.000Z");
        assert_eq!(doc["n"], 1);
    }

    #[test]
    fn test_rolling_index_per_record() {
        let namer = IndexNamer::new();
        let builder = BulkPayloadBuilder::new(&namer);
        let config = destination(IndexMode::DatePatternEventTime, "logs-yyyy.MM.dd", "@timestamp");

        // 2024-03-07T23:59:59.999Z and 2024-03-08T00:00:00.000Z
        let records = vec![
            record(1_709_855_999_999, json!({})),
            record(1_709_856_000_000, json!({})),
        ];
        let body = String::from_utf8(builder.build(&config, &records).unwrap()).unwrap();
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines[0], r#"{"index":{"_index":"logs-2024.03.07"}}"#);
        assert_eq!(lines[2], r#"{"index":{"_index":"logs-2024.03.08"}}"#);
    }

    #[test]
    fn test_empty_group_builds_empty_body() {
        let namer = IndexNamer::new();
        let builder = BulkPayloadBuilder::new(&namer);
        let config = destination(IndexMode::StaticName, "idx", "@timestamp");

        assert!(builder.build(&config, &[]).unwrap().is_empty());
        assert_eq!(namer.render_count(), 0);
    }
}
