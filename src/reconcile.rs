//! Reconciliation of live Orca alerts against a local snapshot.
//!
//! Each remote alert is classified by id against the snapshot's id-set and
//! appended to exactly one of the two output files the moment it is seen;
//! nothing is buffered for reordering and the remote collection is never
//! materialized in full.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::clients::orca::AlertPager;
use crate::error::Error;
use crate::types::AlertRecord;

/// Alert ids from a prior full dump, loaded once before a run starts.
#[derive(Debug)]
pub struct LocalSnapshot {
    ids: HashSet<String>,
}

impl LocalSnapshot {
    /// Load the id-set from a snapshot CSV.
    ///
    /// The file must exist, parse, and carry an `alert_id` column; anything
    /// else is [`Error::SnapshotUnavailable`]. Running against a
    /// guessed-empty set would classify every remote alert as missing, so
    /// there is no fallback.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| {
            Error::SnapshotUnavailable(format!(
                "cannot read {}: {e}; run a full dump first to create a local snapshot",
                path.display()
            ))
        })?;

        let headers = reader.headers().map_err(|e| {
            Error::SnapshotUnavailable(format!("{} has no header row: {e}", path.display()))
        })?;
        let id_column = headers.iter().position(|h| h == "alert_id").ok_or_else(|| {
            Error::SnapshotUnavailable(format!(
                "{} has no alert_id column; run a full dump first to create a usable snapshot",
                path.display()
            ))
        })?;

        let mut ids = HashSet::new();
        for row in reader.records() {
            let row = row.map_err(|e| {
                Error::SnapshotUnavailable(format!(
                    "malformed row in {}: {e}",
                    path.display()
                ))
            })?;
            if let Some(id) = row.get(id_column) {
                ids.insert(id.to_string());
            }
        }

        Ok(Self { ids })
    }

    /// Build a snapshot from known ids (mainly for tests and tooling).
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether an alert id was present in the snapshot.
    #[must_use]
    pub fn contains(&self, alert_id: &str) -> bool {
        self.ids.contains(alert_id)
    }

    /// Number of distinct ids loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The two disjoint output streams of a reconciliation run.
///
/// Both are CSV with the header `alert_id,status`, written eagerly as
/// records are classified.
pub struct ReconcileOutputs<W: Write> {
    found: csv::Writer<W>,
    missing: csv::Writer<W>,
}

/// File name for alerts present in both sources.
pub const FOUND_FILE: &str = "alerts_found.csv";

/// File name for alerts absent from the local snapshot.
pub const MISSING_FILE: &str = "alerts_missing.csv";

impl ReconcileOutputs<File> {
    /// Create (truncating) the standard output files in `dir`.
    pub fn create_in(dir: &Path) -> Result<Self, Error> {
        Self::from_writers(
            File::create(dir.join(FOUND_FILE))?,
            File::create(dir.join(MISSING_FILE))?,
        )
    }
}

impl<W: Write> ReconcileOutputs<W> {
    /// Wrap a pair of writers, emitting the header row on each.
    pub fn from_writers(found: W, missing: W) -> Result<Self, Error> {
        let mut found = csv::Writer::from_writer(found);
        found.write_record(["alert_id", "status"])?;
        let mut missing = csv::Writer::from_writer(missing);
        missing.write_record(["alert_id", "status"])?;
        Ok(Self { found, missing })
    }

    fn write_found(&mut self, alert_id: &str, status: &str) -> Result<(), Error> {
        self.found.write_record([alert_id, status])?;
        Ok(())
    }

    fn write_missing(&mut self, alert_id: &str, status: &str) -> Result<(), Error> {
        self.missing.write_record([alert_id, status])?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.found.flush()?;
        self.missing.flush()?;
        Ok(())
    }
}

/// Configuration for a reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Emit a progress report every this many pages.
    pub progress_every: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { progress_every: 5 }
    }
}

/// Counts from a completed (or partially completed) run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Alerts classified, across both buckets.
    pub processed: u64,
    /// Alerts present in the local snapshot.
    pub found: u64,
    /// Alerts absent from the local snapshot.
    pub missing: u64,
    /// Pages consumed from the remote query.
    pub pages: u64,
    /// False when a page fetch failed and the run stopped early.
    pub completed: bool,
}

/// Streams a remote alert query against a local snapshot.
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    /// Create a reconciler with the given configuration.
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            config: ReconcileConfig {
                progress_every: config.progress_every.max(1),
            },
        }
    }

    /// Classify every record the pager yields, writing each to its output
    /// as soon as it is seen.
    ///
    /// Every record lands in exactly one of {found, missing}; duplicates the
    /// server repeats across pages are classified each time they appear. A
    /// page fetch failure is logged and stops the run with whatever was
    /// already written (`completed = false` on the summary).
    pub async fn run<W: Write>(
        &self,
        pager: &mut AlertPager,
        snapshot: &LocalSnapshot,
        outputs: &mut ReconcileOutputs<W>,
    ) -> Result<ReconcileSummary, Error> {
        let mut summary = ReconcileSummary {
            completed: true,
            ..Default::default()
        };

        loop {
            let page = match pager.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "page fetch failed, stopping with partial results");
                    summary.completed = false;
                    break;
                }
            };

            self.process_page(&page, snapshot, outputs, &mut summary)?;
            outputs.flush()?;

            if summary.pages % u64::from(self.config.progress_every) == 0 {
                self.report_progress(pager, &summary);
            }
        }

        outputs.flush()?;
        info!(
            processed = summary.processed,
            found = summary.found,
            missing = summary.missing,
            pages = summary.pages,
            completed = summary.completed,
            "reconciliation finished"
        );
        Ok(summary)
    }

    /// Classify one page of records in stream order.
    fn process_page<W: Write>(
        &self,
        page: &[AlertRecord],
        snapshot: &LocalSnapshot,
        outputs: &mut ReconcileOutputs<W>,
        summary: &mut ReconcileSummary,
    ) -> Result<(), Error> {
        for record in page {
            let alert_id = record
                .alert_id()
                .ok_or_else(|| Error::MalformedRecord("record without alert_id".to_string()))?;
            let status = record
                .status()
                .ok_or_else(|| Error::MalformedRecord(format!("alert {alert_id} has no status")))?;

            if snapshot.contains(alert_id) {
                outputs.write_found(alert_id, status)?;
                summary.found += 1;
            } else {
                outputs.write_missing(alert_id, status)?;
                summary.missing += 1;
            }
            summary.processed += 1;
        }
        summary.pages += 1;
        Ok(())
    }

    fn report_progress(&self, pager: &AlertPager, summary: &ReconcileSummary) {
        match pager.total_items() {
            Some(total) => info!(
                pages = summary.pages,
                processed = summary.processed,
                left = total.saturating_sub(summary.processed),
                found = summary.found,
                missing = summary.missing,
                "reconciliation progress"
            ),
            None => info!(
                pages = summary.pages,
                processed = summary.processed,
                found = summary.found,
                missing = summary.missing,
                "reconciliation progress"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(alert_id: &str, status: &str) -> AlertRecord {
        serde_json::from_value(json!({
            "state": {"alert_id": alert_id, "status": status}
        }))
        .expect("record should deserialize")
    }

    fn output_text(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).expect("output should be UTF-8")
    }

    #[test]
    fn test_partitioning_preserves_stream_order_and_statuses() {
        let snapshot = LocalSnapshot::from_ids(["A", "B", "C"]);
        let page = vec![
            record("A", "open"),
            record("D", "open"),
            record("B", "in_progress"),
            record("E", "open"),
        ];

        let mut outputs =
            ReconcileOutputs::from_writers(Vec::new(), Vec::new()).expect("headers should write");
        let mut summary = ReconcileSummary::default();
        let reconciler = Reconciler::new(ReconcileConfig::default());

        reconciler
            .process_page(&page, &snapshot, &mut outputs, &mut summary)
            .expect("classification should succeed");
        outputs.flush().expect("flush should succeed");

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.found, 2);
        assert_eq!(summary.missing, 2);

        let found = output_text(outputs.found.into_inner().expect("into_inner"));
        let missing = output_text(outputs.missing.into_inner().expect("into_inner"));
        assert_eq!(found, "alert_id,status\nA,open\nB,in_progress\n");
        assert_eq!(missing, "alert_id,status\nD,open\nE,open\n");
    }

    #[test]
    fn test_duplicate_record_classified_twice() {
        let snapshot = LocalSnapshot::from_ids(["A"]);
        let page = vec![record("A", "open"), record("A", "open")];

        let mut outputs =
            ReconcileOutputs::from_writers(Vec::new(), Vec::new()).expect("headers should write");
        let mut summary = ReconcileSummary::default();
        let reconciler = Reconciler::new(ReconcileConfig::default());

        reconciler
            .process_page(&page, &snapshot, &mut outputs, &mut summary)
            .expect("classification should succeed");
        outputs.flush().expect("flush should succeed");

        assert_eq!(summary.found, 2);
        let found = output_text(outputs.found.into_inner().expect("into_inner"));
        assert_eq!(found, "alert_id,status\nA,open\nA,open\n");
    }

    #[test]
    fn test_record_without_alert_id_is_an_error() {
        let snapshot = LocalSnapshot::from_ids(["A"]);
        let page = vec![serde_json::from_value::<AlertRecord>(json!({"asset": "vm-1"}))
            .expect("record should deserialize")];

        let mut outputs =
            ReconcileOutputs::from_writers(Vec::new(), Vec::new()).expect("headers should write");
        let mut summary = ReconcileSummary::default();
        let reconciler = Reconciler::new(ReconcileConfig::default());

        let result = reconciler.process_page(&page, &snapshot, &mut outputs, &mut summary);
        assert!(matches!(result, Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn test_snapshot_load_missing_file() {
        let result = LocalSnapshot::load(Path::new("/nonexistent/hsdb.csv"));
        match result {
            Err(Error::SnapshotUnavailable(message)) => {
                assert!(message.contains("run a full dump first"));
            }
            other => panic!("expected SnapshotUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_from_ids_lookup() {
        let snapshot = LocalSnapshot::from_ids(["A", "B"]);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("A"));
        assert!(!snapshot.contains("Z"));
    }
}
