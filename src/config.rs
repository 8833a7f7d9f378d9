/*!
 * Configuration handling for archive-audit
 */

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use url::Url;

use crate::error::{AuditError, Result};
use crate::{bail, ensure};

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default prefix for exported result files
pub const DEFAULT_FILE_PREFIX: &str = "archived_or_not_results";

/// Format used to save batch results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Pretty-printed JSON object keyed by source path
    Json,
    /// CSV table, one row per location
    Tabular,
}

/// Command-line arguments for archive-audit
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "archive-audit",
    version = env!("CARGO_PKG_VERSION"),
    about = "Check whether local files already exist in a remote archive",
    long_about = "Walks a directory, uploads every file to an archive lookup service and reports where identical copies are archived."
)]
pub struct Args {
    /// Directory of files to check
    pub directory_path: PathBuf,

    /// Check files in nested sub-directories too
    #[clap(short, long)]
    pub recursive: bool,

    /// Only keep files that are not found on the server
    #[clap(long)]
    pub only_missing: bool,

    /// Save results in this format
    #[clap(long, value_enum)]
    pub export: Option<ExportFormat>,

    /// Directory for saved results (defaults to the current directory)
    #[clap(long)]
    pub output_dir: Option<PathBuf>,

    /// Prefix for saved result file names
    #[clap(long, default_value = DEFAULT_FILE_PREFIX)]
    pub file_prefix: String,

    /// Archive lookup endpoint URL
    #[clap(long, env = "ARCHIVE_AUDIT_ENDPOINT")]
    pub endpoint: Url,

    /// Query parameter added to every request (KEY=VALUE, repeatable)
    #[clap(long = "query", value_parser = parse_query, env = "ARCHIVE_AUDIT_QUERY", value_delimiter = ',')]
    pub query: Vec<(String, String)>,

    /// Header added to every request (NAME:VALUE, repeatable)
    #[clap(long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Accept invalid TLS certificates (self-signed internal endpoints)
    #[clap(long)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Number of concurrent uploads (1 keeps requests strictly sequential)
    #[clap(long, default_value = "1")]
    pub workers: usize,

    /// Comma-separated list of extra file name patterns to skip
    #[clap(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// File-server mount used to display archive locations as full paths
    #[clap(long)]
    pub server_mount: Option<String>,

    /// Enable debug logging
    #[clap(short, long)]
    pub verbose: bool,
}

fn parse_query(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", raw)),
    }
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME:VALUE, got {:?}", raw)),
    }
}

/// How to reach the lookup service
#[derive(Clone)]
pub struct EndpointConfig {
    /// Endpoint URL without credentials
    pub url: Url,
    /// Extra query parameters, typically access credentials
    pub query: Vec<(String, String)>,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl EndpointConfig {
    /// Endpoint with verified TLS and the default timeout
    pub fn new(url: Url) -> Self {
        Self {
            url,
            query: Vec::new(),
            headers: Vec::new(),
            insecure: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

// Query values and headers may hold credentials, keep them out of logs.
impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("url", &self.url.as_str())
            .field("query_keys", &self.query.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("header_names", &self.headers.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory to audit
    pub target_dir: PathBuf,

    /// Visit subdirectories
    pub recursive: bool,

    /// Drop found files before they are stored
    pub only_missing: bool,

    /// Export format, `None` to skip saving
    pub export_format: Option<ExportFormat>,

    /// Where to save results
    pub output_dir: Option<PathBuf>,

    /// File name prefix for saved results
    pub file_prefix: String,

    /// Lookup service
    pub endpoint: EndpointConfig,

    /// Concurrent uploads
    pub workers: usize,

    /// Extra transient-artifact patterns
    pub exclude_patterns: Vec<String>,

    /// Mount prefix for displaying locations
    pub server_mount: Option<String>,

    /// Debug logging
    pub verbose: bool,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args(args: Args) -> Self {
        Self {
            target_dir: args.directory_path,
            recursive: args.recursive,
            only_missing: args.only_missing,
            export_format: args.export,
            output_dir: args.output_dir,
            file_prefix: args.file_prefix,
            endpoint: EndpointConfig {
                url: args.endpoint,
                query: args.query,
                headers: args.headers,
                insecure: args.insecure,
                timeout: Duration::from_secs(args.timeout),
            },
            workers: args.workers,
            exclude_patterns: args.exclude,
            server_mount: args.server_mount,
            verbose: args.verbose,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.target_dir.is_dir() {
            return Err(AuditError::InvalidRoot(self.target_dir.clone()));
        }

        match self.endpoint.url.scheme() {
            "http" | "https" => {}
            other => bail!(Config, "Unsupported endpoint scheme: {}", other),
        }

        ensure!(self.workers > 0, Config, "At least one worker is required");
        ensure!(
            !self.endpoint.timeout.is_zero(),
            Config,
            "Request timeout must be greater than zero"
        );
        ensure!(
            !self.file_prefix.is_empty() && !self.file_prefix.contains(['/', '\\']),
            Config,
            "Invalid file prefix: {:?}",
            self.file_prefix
        );

        Ok(())
    }
}
