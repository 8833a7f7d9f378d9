/*!
 * Result export
 *
 * Sinks only ever borrow the batch result, so a failed export leaves it
 * untouched and ready to be saved again in another format.
 */

use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::ser::PrettyFormatter;
use tracing::{info, warn};

use crate::config::ExportFormat;
use crate::error::Result;
use crate::types::{BatchResult, NOT_FOUND_MARKER};

/// Timestamp format embedded in result file names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Pick the directory results are written to.
///
/// A requested directory is used only if it exists; otherwise the current
/// working directory is used.
pub fn resolve_output_dir(requested: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = requested {
        if dir.is_dir() {
            return Ok(dir.to_path_buf());
        }
        warn!(dir = %dir.display(), "output directory not usable, falling back to current directory");
    }
    env::current_dir().map_err(|e| crate::error!(Export, "Cannot resolve current directory: {}", e))
}

/// `<prefix>_<YYYY-MM-DD_HH-MM-SS>.<extension>`
pub fn file_name(prefix: &str, extension: &str, timestamp: &DateTime<Local>) -> String {
    format!("{}_{}.{}", prefix, timestamp.format(TIMESTAMP_FORMAT), extension)
}

/// A persisted representation of a batch result
pub trait ExportSink {
    /// File extension without the dot
    fn extension(&self) -> &'static str;

    /// Write the result to `writer`
    fn write_to(&self, result: &BatchResult, writer: &mut dyn Write) -> Result<()>;

    /// Save the result under `output_dir` and return the written path
    fn export(&self, result: &BatchResult, output_dir: Option<&Path>, prefix: &str) -> Result<PathBuf> {
        let dir = resolve_output_dir(output_dir)?;
        let path = dir.join(file_name(prefix, self.extension(), &Local::now()));

        let file = File::create(&path)
            .map_err(|e| crate::error!(Export, "Cannot create {}: {}", path.display(), e))?;
        let mut writer = BufWriter::new(file);
        self.write_to(result, &mut writer)?;
        writer
            .flush()
            .map_err(|e| crate::error!(Export, "Cannot write {}: {}", path.display(), e))?;

        info!(path = %path.display(), records = result.len(), "results saved");
        Ok(path)
    }
}

/// Sink for a configured format
pub fn sink_for(format: ExportFormat) -> Box<dyn ExportSink> {
    match format {
        ExportFormat::Json => Box::new(JsonSink),
        ExportFormat::Tabular => Box::new(TabularSink),
    }
}

/// JSON object mapping each source path to its locations or `"None"`
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSink;

struct JsonView<'a>(&'a BatchResult);

impl Serialize for JsonView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for record in self.0.records() {
            if record.is_found() {
                map.serialize_entry(record.source_path(), record.locations())?;
            } else {
                map.serialize_entry(record.source_path(), NOT_FOUND_MARKER)?;
            }
        }
        map.end()
    }
}

impl ExportSink for JsonSink {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn write_to(&self, result: &BatchResult, writer: &mut dyn Write) -> Result<()> {
        let mut serializer =
            serde_json::Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"    "));
        JsonView(result)
            .serialize(&mut serializer)
            .map_err(|e| crate::error!(Export, "JSON serialization failed: {}", e))
    }
}

/// Column headers of the tabular export
pub const TABULAR_HEADERS: [&str; 2] = ["Source Path", "Location"];

/// CSV table with one row per archive location.
///
/// Fields are quoted whenever they contain a delimiter, quote or line break,
/// so every record reads back as exactly the rows that were written.
#[derive(Debug, Default, Clone, Copy)]
pub struct TabularSink;

impl ExportSink for TabularSink {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn write_to(&self, result: &BatchResult, writer: &mut dyn Write) -> Result<()> {
        let mut table = csv::Writer::from_writer(writer);
        table
            .write_record(TABULAR_HEADERS)
            .map_err(|e| crate::error!(Export, "Cannot write table header: {}", e))?;

        for record in result.records() {
            let source = record.source_path();
            if record.is_found() {
                for location in record.locations() {
                    table
                        .write_record([source, location.as_str()])
                        .map_err(|e| crate::error!(Export, "Cannot write row for {}: {}", source, e))?;
                }
            } else {
                table
                    .write_record([source, NOT_FOUND_MARKER])
                    .map_err(|e| crate::error!(Export, "Cannot write row for {}: {}", source, e))?;
            }
        }

        table
            .flush()
            .map_err(|e| crate::error!(Export, "Cannot write table: {}", e))
    }
}
