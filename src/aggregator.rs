//! Result aggregation for a batch run

use tracing::debug;

use crate::types::{
    BatchResult, FileRecord, LookupOutcome, LookupStatus, RunMetadata, SkippedFile,
};

/// Collects one record per processed file.
///
/// With `only_missing` set, found outcomes are discarded before they are
/// stored, so they can never reach an export.
#[derive(Debug)]
pub struct Aggregator {
    result: BatchResult,
}

impl Aggregator {
    /// Create an aggregator for a run
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            result: BatchResult::new(metadata),
        }
    }

    /// Record the outcome for one file. Returns the stored record, or `None`
    /// when the outcome was filtered out.
    pub fn record(
        &mut self,
        source_path: String,
        relative_path: String,
        outcome: LookupOutcome,
    ) -> Option<&FileRecord> {
        if self.result.metadata.only_missing && outcome.status() == LookupStatus::Found {
            debug!(path = %source_path, "dropping found file (only missing)");
            return None;
        }

        let record = FileRecord::new(source_path.clone(), relative_path, outcome);
        self.result.insert(record);
        self.result.get(&source_path)
    }

    /// Note a file that could not be read
    pub fn skip(&mut self, path: String, reason: String) {
        self.result.push_skipped(SkippedFile { path, reason });
    }

    /// Read-only view of everything stored so far
    pub fn snapshot(&self) -> &BatchResult {
        &self.result
    }

    /// Consume the aggregator and return the final result
    pub fn finish(self) -> BatchResult {
        self.result
    }
}
