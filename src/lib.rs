/*!
 * archive-audit - Check a local file tree against a remote archive
 *
 * Every file under a root directory is uploaded to an archive lookup service,
 * which answers with the archive locations holding an identical copy. The
 * answers are collected into a batch result that can be saved as JSON or as
 * a CSV table.
 */

pub mod aggregator;
pub mod auditor;
pub mod config;
pub mod error;
pub mod export;
pub mod lookup;
pub mod path;
pub mod progress;
pub mod report;
pub mod types;
pub mod walker;

#[cfg(test)]
mod tests;

// Re-export main components for easier access
pub use aggregator::Aggregator;
pub use auditor::{AuditOutcome, Auditor, CancelFlag};
pub use config::{Config, EndpointConfig, ExportFormat};
pub use error::{AuditError, ErrorCategory, Result};
pub use export::{sink_for, ExportSink, JsonSink, TabularSink};
pub use lookup::{Lookup, LookupClient};
pub use path::{server_path, split_path, PathOrigin, PathSegments};
pub use progress::{AuditEvent, ProgressReporter};
pub use report::{AuditReport, Reporter};
pub use types::{BatchResult, FileRecord, LookupOutcome, LookupStatus, RunMetadata};
pub use walker::{TransientFilter, Walker};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
