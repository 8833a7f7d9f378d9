/*!
 * Core types and data structures for archive-audit
 */

use std::collections::HashMap;

use chrono::{DateTime, Local};

/// Marker written in place of locations for files the archive does not hold
pub const NOT_FOUND_MARKER: &str = "None";

/// Whether the archive holds a copy of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
    /// At least one identical file exists in the archive
    Found,
    /// No identical file exists in the archive
    NotFound,
}

/// Classified answer from the lookup service for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Server-relative locations, in the order the server sent them
    Found(Vec<String>),
    /// The archive does not hold the file
    NotFound,
}

impl LookupOutcome {
    /// Status of this outcome. An empty location list counts as not found.
    pub fn status(&self) -> LookupStatus {
        match self {
            Self::Found(locations) if !locations.is_empty() => LookupStatus::Found,
            _ => LookupStatus::NotFound,
        }
    }
}

/// Stored outcome for one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    source_path: String,
    relative_path: String,
    status: LookupStatus,
    locations: Vec<String>,
}

impl FileRecord {
    /// Build a record from a lookup outcome
    pub fn new(source_path: String, relative_path: String, outcome: LookupOutcome) -> Self {
        let status = outcome.status();
        let locations = match outcome {
            LookupOutcome::Found(locations) => locations,
            LookupOutcome::NotFound => Vec::new(),
        };
        Self {
            source_path,
            relative_path,
            status,
            locations,
        }
    }

    /// Absolute path of the local file
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Path relative to the scan root
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Found or not found
    pub fn status(&self) -> LookupStatus {
        self.status
    }

    /// Server-relative locations; empty when not found
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// True when the archive holds the file
    pub fn is_found(&self) -> bool {
        self.status == LookupStatus::Found
    }
}

/// A file that could not be read and was left out of the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Path of the unreadable entry
    pub path: String,
    /// Why it was skipped
    pub reason: String,
}

/// Settings a batch ran with
#[derive(Debug, Clone)]
pub struct RunMetadata {
    /// Scan root
    pub root_path: String,
    /// Whether subdirectories were visited
    pub recursive: bool,
    /// Whether found files were dropped before storage
    pub only_missing: bool,
    /// When the batch started
    pub timestamp: DateTime<Local>,
}

/// Ordered collection of records for one batch
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Run settings
    pub metadata: RunMetadata,
    records: Vec<FileRecord>,
    index: HashMap<String, usize>,
    skipped: Vec<SkippedFile>,
}

impl BatchResult {
    /// Create an empty result for a run
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            metadata,
            records: Vec::new(),
            index: HashMap::new(),
            skipped: Vec::new(),
        }
    }

    /// Insert a record, replacing any earlier record for the same source path
    /// in place so processing order is kept.
    pub(crate) fn insert(&mut self, record: FileRecord) {
        match self.index.get(record.source_path()) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.index
                    .insert(record.source_path().to_string(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub(crate) fn push_skipped(&mut self, skipped: SkippedFile) {
        self.skipped.push(skipped);
    }

    /// Records in processing order
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Look up the record for a source path
    pub fn get(&self, source_path: &str) -> Option<&FileRecord> {
        self.index.get(source_path).map(|&pos| &self.records[pos])
    }

    /// Files skipped because they could not be read
    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no record is stored
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of stored records the archive holds
    pub fn found_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_found()).count()
    }

    /// Number of stored records the archive does not hold
    pub fn missing_count(&self) -> usize {
        self.records.len() - self.found_count()
    }
}
