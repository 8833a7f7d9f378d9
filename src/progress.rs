/*!
 * Progress reporting for batch runs
 */

use std::path::Path;

use crate::error::AuditError;
use crate::types::FileRecord;

/// Something that happened during a batch
#[derive(Debug)]
pub enum AuditEvent<'a> {
    /// Traversal is about to start; `total` is the expected file count
    Started {
        /// Files expected
        total: u64,
    },
    /// A file has been fully handled
    Progress {
        /// Files handled so far
        current: u64,
        /// Files expected
        total: u64,
    },
    /// A record was stored
    Recorded(&'a FileRecord),
    /// A file could not be read and was left out
    Skipped {
        /// Unreadable path
        path: &'a Path,
        /// Why
        error: &'a AuditError,
    },
}

/// Trait for receiving batch events
pub trait ProgressReporter {
    /// Called for every event, on the thread that owns the results
    fn report(&self, event: &AuditEvent<'_>);
}

// Implement ProgressReporter for closures
impl<F> ProgressReporter for F
where
    F: Fn(&AuditEvent<'_>),
{
    fn report(&self, event: &AuditEvent<'_>) {
        self(event)
    }
}

/// Reporter that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ProgressReporter for Silent {
    fn report(&self, _event: &AuditEvent<'_>) {}
}
