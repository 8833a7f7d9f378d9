/*!
 * Reporting functionality for archive-audit
 *
 * Builds the console summary shown at the end of a batch and the per-file
 * location listing shown while it runs.
 */

use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::error::AuditError;
use crate::path::server_path;
use crate::types::{BatchResult, FileRecord, NOT_FOUND_MARKER};

/// Everything the end-of-run summary needs
#[derive(Debug)]
pub struct AuditReport<'a> {
    /// Batch result, possibly partial
    pub result: &'a BatchResult,
    /// Time taken by the batch
    pub duration: Duration,
    /// Fatal error that ended the batch
    pub error: Option<&'a AuditError>,
    /// Whether the user stopped the batch
    pub cancelled: bool,
    /// Where the results were saved, if anywhere
    pub output_file: Option<String>,
}

/// Report generator for batch results
#[derive(Debug, Default)]
pub struct Reporter {
    server_mount: Option<String>,
}

impl Reporter {
    /// Create a reporter; locations are shown under `server_mount` when given
    pub fn new(server_mount: Option<String>) -> Self {
        Self { server_mount }
    }

    /// Lines describing one record, as shown during the run
    pub fn record_lines(&self, record: &FileRecord) -> Vec<String> {
        let mut lines = vec![format!("Locations for {}", record.relative_path())];
        if record.locations().is_empty() {
            lines.push(format!("\t{}", NOT_FOUND_MARKER));
        }
        for location in record.locations() {
            let shown = match &self.server_mount {
                Some(mount) => server_path(mount, location),
                None => location.clone(),
            };
            lines.push(format!("\t{}", shown));
        }
        lines
    }

    fn status_text(report: &AuditReport<'_>) -> String {
        match report.error {
            Some(e) => format!("Aborted: {} ({})", e.category(), e),
            None if report.cancelled => "Cancelled".to_string(),
            None if !report.result.skipped().is_empty() => {
                format!("Complete, but {}", crate::error::ErrorCategory::Local)
            }
            None => "Complete".to_string(),
        }
    }

    /// Generate the summary table
    pub fn generate_report(&self, report: &AuditReport<'_>) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: &'static str,

            #[tabled(rename = "Value")]
            value: String,
        }

        let result = report.result;
        let mode = match (result.metadata.recursive, result.metadata.only_missing) {
            (true, true) => "recursive, only missing",
            (true, false) => "recursive",
            (false, true) => "top level, only missing",
            (false, false) => "top level",
        };

        let rows = vec![
            SummaryRow {
                key: "Root",
                value: result.metadata.root_path.clone(),
            },
            SummaryRow {
                key: "Mode",
                value: mode.to_string(),
            },
            SummaryRow {
                key: "Files Recorded",
                value: result.len().to_string(),
            },
            SummaryRow {
                key: "Archived",
                value: result.found_count().to_string(),
            },
            SummaryRow {
                key: "Not Archived",
                value: result.missing_count().to_string(),
            },
            SummaryRow {
                key: "Unreadable",
                value: result.skipped().len().to_string(),
            },
            SummaryRow {
                key: "Process Time",
                value: format!("{:.2?}", report.duration),
            },
            SummaryRow {
                key: "Saved To",
                value: report
                    .output_file
                    .clone()
                    .unwrap_or_else(|| "not saved".to_string()),
            },
            SummaryRow {
                key: "Status",
                value: Self::status_text(report),
            },
        ];

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    /// Print the report to stdout
    pub fn print_report(&self, report: &AuditReport<'_>) {
        println!("\n{}", self.generate_report(report));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use crate::types::{LookupOutcome, RunMetadata};
    use chrono::Local;

    fn result() -> BatchResult {
        let mut aggregator = Aggregator::new(RunMetadata {
            root_path: "/share/dept".to_string(),
            recursive: true,
            only_missing: false,
            timestamp: Local::now(),
        });
        aggregator.record(
            "/share/dept/a.pdf".into(),
            "a.pdf".into(),
            LookupOutcome::Found(vec!["projects/1/a.pdf".into()]),
        );
        aggregator.record("/share/dept/b.pdf".into(), "b.pdf".into(), LookupOutcome::NotFound);
        aggregator.finish()
    }

    #[test]
    fn test_record_lines() {
        let result = result();
        let reporter = Reporter::new(Some(r"\\records\archive".to_string()));
        assert_eq!(
            reporter.record_lines(&result.records()[0]),
            vec![
                "Locations for a.pdf".to_string(),
                format!("\t{}", r"\\records\archive\projects\1\a.pdf"),
            ]
        );
        assert_eq!(
            Reporter::default().record_lines(&result.records()[1]),
            vec!["Locations for b.pdf".to_string(), "\tNone".to_string()]
        );
    }

    #[test]
    fn test_summary_mentions_counts_and_abort_reason() {
        let result = result();
        let error = AuditError::Request {
            status: 500,
            body: "database offline".to_string(),
        };
        let report = AuditReport {
            result: &result,
            duration: Duration::from_millis(1500),
            error: Some(&error),
            cancelled: false,
            output_file: None,
        };

        let text = Reporter::default().generate_report(&report);
        assert!(text.contains("/share/dept"));
        assert!(text.contains("Not Archived"));
        assert!(text.contains("database offline"));
        assert!(text.contains("server rejected a request"));
        assert!(text.contains("not saved"));
    }
}
