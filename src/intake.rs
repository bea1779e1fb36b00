// Line-oriented intake
//
// Reads one inbound record per line (the bus wire shape, see `record`) and
// submits each to the indexer. Malformed lines are skipped with a warning;
// blank lines are ignored.

use crate::engine::Indexer;
use crate::record::IncomingRecord;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntakeSummary {
    pub accepted: usize,
    pub rejected: usize,
}

/// Consumes `reader` until EOF.
pub async fn read_records<R>(reader: R, indexer: &Indexer) -> std::io::Result<IntakeSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = IntakeSummary::default();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match IncomingRecord::from_json(line) {
            Ok(record) => {
                indexer.submit(record);
                summary.accepted += 1;
            }
            Err(err) => {
                warn!(line = line_number, error = %err, "skipping inbound record");
                summary.rejected += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::testing::static_destination;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn indexer() -> Indexer {
        Indexer::new(
            vec![Arc::new(static_destination("a", "idx"))],
            Dispatcher::new(HashMap::new()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_reads_valid_lines() {
        let input = concat!(
            r#"{"meta":{"instance_identifier":"a","timestamp":1},"message":{"n":1}}"#,
            "\n",
            "\n",
            r#"{"meta":{"instance_identifier":"a","timestamp":2},"message":{"n":2}}"#,
            "\n",
        );
        let indexer = indexer();

        let summary = read_records(input.as_bytes(), &indexer).await.unwrap();

        assert_eq!(summary, IntakeSummary { accepted: 2, rejected: 0 });
        assert_eq!(indexer.queued(), 2);
    }

    #[tokio::test]
    async fn test_skips_malformed_lines() {
        let input = concat!(
            "not json\n",
            r#"{"meta":{"timestamp":1},"message":{}}"#,
            "\n",
            r#"{"meta":{"instance_identifier":"a","timestamp":3},"message":{}}"#,
        );
        let indexer = indexer();

        let summary = read_records(input.as_bytes(), &indexer).await.unwrap();

        assert_eq!(summary, IntakeSummary { accepted: 1, rejected: 2 });
        assert_eq!(indexer.stats().records_submitted, 1);
    }
}
