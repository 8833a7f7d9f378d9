/*!
 * Command-line interface for archive-audit
 */

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use archive_audit::config::{Args, Config};
use archive_audit::export::sink_for;
use archive_audit::lookup::LookupClient;
use archive_audit::progress::AuditEvent;
use archive_audit::report::{AuditReport, Reporter};
use archive_audit::walker::{TransientFilter, Walker};
use archive_audit::{AuditError, Auditor, CancelFlag};

fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    let config = Config::from_args(args);
    setup_logging(config.verbose);

    match run(config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("({})", e.category());
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("archive_audit=debug,warn")
        } else {
            EnvFilter::new("archive_audit=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(config: Config) -> Result<ExitCode, AuditError> {
    // Validate configuration
    config.validate()?;

    let filter = TransientFilter::with_patterns(config.exclude_patterns.iter().cloned());
    let walker = Walker::new(&config.target_dir, config.recursive, filter)?;
    let client = LookupClient::new(&config.endpoint)?;

    // Stop dispatching on Ctrl-C, keep what has been resolved
    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing in-flight requests...");
        handler_flag.cancel();
    }) {
        warn!(error = %e, "failed to install interrupt handler");
    }

    println!(
        "Checking {} against {}",
        walker.root().display(),
        client.host()
    );

    let auditor = Auditor::new(walker, client, config.only_missing)
        .with_workers(config.workers)
        .with_cancel_flag(cancel);

    // Create progress bar
    let progress = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} ({percent}%) Elapsed: {elapsed_precise} Remaining: {eta_precise}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));

    let reporter = Reporter::new(config.server_mount.clone());
    let start_time = Instant::now();

    let outcome = auditor.run(&|event: &AuditEvent<'_>| match event {
        AuditEvent::Started { total } => progress.set_length(*total),
        AuditEvent::Progress { current, total } => {
            progress.set_length(*total);
            progress.set_position(*current);
        }
        AuditEvent::Recorded(record) => {
            progress.println("");
            for line in reporter.record_lines(record) {
                progress.println(line);
            }
        }
        AuditEvent::Skipped { path, error } => {
            progress.println(format!("Skipped {}: {}", path.display(), error));
        }
    });

    let duration = start_time.elapsed();
    progress.finish_and_clear();

    if let Some(e) = &outcome.error {
        eprintln!("\n{}:\n{}", e.category(), e);
    }

    // Export output based on user options
    let output_file = match config.export_format {
        Some(format) => {
            let sink = sink_for(format);
            match sink.export(
                &outcome.result,
                config.output_dir.as_deref(),
                &config.file_prefix,
            ) {
                Ok(path) => Some(path.display().to_string()),
                Err(e) => {
                    eprintln!("\n{}: {}", e.category(), e);
                    None
                }
            }
        }
        None => None,
    };

    reporter.print_report(&AuditReport {
        result: &outcome.result,
        duration,
        error: outcome.error.as_ref(),
        cancelled: outcome.cancelled,
        output_file,
    });

    Ok(if outcome.error.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
