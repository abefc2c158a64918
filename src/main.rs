//! rewind - reconstruct a versioned S3 bucket as it existed at a past instant.
//!
//! Usage:
//!   rewind --bucket NAME [--timestamp YYYY-MM-DDTHH:MM:SS]
//!   rewind --bucket NAME --prefix data/ --exclude data/tmp/
//!   rewind --help
//!
//! The output is a CSV manifest of `bucket,key,version_id` lines naming the
//! version of each key that was current at the target instant, suitable for
//! a bulk copy job.

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_config::sts::AssumeRoleProvider;
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rewind_core::{ScanConfig, ScanOutcome};
use rewind_report::{ReportGenerator, exclude_paths};
use rewind_resolve::{MemoryStore, Resolver};
use rewind_scan::{S3Lister, Scanner};

/// Accepted `--timestamp` layout, interpreted as UTC.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Parser, Debug)]
#[command(
    name = "rewind",
    version,
    about = "Reconstruct a versioned S3 bucket at a past instant",
    long_about = "rewind lists every version of every object in a versioned bucket and \
                  writes a manifest of the versions that were current at the target \
                  time.\n\nFeed the manifest to a batch copy job to restore the bucket."
)]
struct Cli {
    /// Bucket to scan and restore
    #[arg(short, long)]
    bucket: String,

    /// Restore target in the format YYYY-MM-DDTHH:MM:SS, UTC (default: now)
    #[arg(short, long, value_parser = parse_timestamp)]
    timestamp: Option<DateTime<Utc>>,

    /// Maximum number of folders listed concurrently
    #[arg(long, alias = "maxConcurrentScans", default_value_t = rewind_core::DEFAULT_MAX_CONCURRENT_SCANS)]
    max_concurrent_scans: usize,

    /// Report file name; ".csv" is appended when missing
    #[arg(short, long, alias = "reportName", default_value = "report.csv")]
    report_name: String,

    /// Include versions that are still the latest in the report
    #[arg(long)]
    include_latest: bool,

    /// Include delete markers in the report
    #[arg(long)]
    include_delete_markers: bool,

    /// Only scan below these prefixes (comma-separated or repeated; "/" means the whole bucket)
    #[arg(short, long = "prefix", value_name = "PREFIX", value_delimiter = ',')]
    prefixes: Vec<String>,

    /// Skip these paths (comma-separated or repeated)
    #[arg(short, long = "exclude", value_name = "PATH", value_delimiter = ',')]
    excludes: Vec<String>,

    /// List folders this deep below a prefix without descending further
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    flat_depth: Option<u32>,

    /// AWS profile to use for credentials
    #[arg(long)]
    profile: Option<String>,

    /// AWS region to use
    #[arg(long)]
    region: Option<String>,

    /// IAM role ARN to assume
    #[arg(long)]
    role_arn: Option<String>,

    /// Custom S3 endpoint (path-style addressing)
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let config = scan_config(&cli)?;
    let report_path = PathBuf::from(normalize_report_name(&cli.report_name));
    let client = s3_client(&cli).await;

    let store = Arc::new(MemoryStore::new());
    let resolver = Arc::new(Resolver::new(Arc::clone(&store), config.target_time));
    let scanner = Scanner::new(Arc::new(S3Lister::new(client)), config);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());
    let progress = spawn_progress_line(&scanner, &cli);

    eprintln!(
        "Scanning bucket {} as of {}",
        cli.bucket,
        scanner.config().target_time.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let result = scanner.scan(resolver, cancel).await;
    drop(scanner);
    if let Some(progress) = progress {
        let _ = progress.await;
        eprintln!();
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) if err.is_not_versioned() => {
            eprintln!("Error: {err}");
            eprintln!("Point-in-time restore requires versioning to be enabled on the bucket.");
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err).wrap_err("Scan failed"),
    };

    for warning in &outcome.warnings {
        warn!(kind = %warning.kind, location = %warning.location, "{}", warning.message);
    }

    if outcome.has_resolve_failures() {
        print_statistics(&outcome, None);
        eprintln!(
            "Error: some versions could not be recorded; refusing to write an incomplete report"
        );
        return Ok(ExitCode::FAILURE);
    }

    let summary = report_generator(&cli)
        .write_to_path(&*store, &report_path)
        .wrap_err_with(|| format!("Failed to write report {}", report_path.display()))?;
    info!(path = %report_path.display(), written = summary.written, "report written");

    print_statistics(&outcome, Some((&report_path, summary.written)));

    if outcome.cancelled {
        eprintln!("Scan was interrupted; the report only covers folders listed before the interrupt.");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Install the global subscriber. `RUST_LOG` wins over `--log-level`.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn scan_config(cli: &Cli) -> Result<ScanConfig> {
    ScanConfig::builder()
        .bucket(cli.bucket.as_str())
        .target_time(cli.timestamp.unwrap_or_else(Utc::now))
        .scan_roots(cli.prefixes.clone())
        .exclude_paths(cli.excludes.clone())
        .max_concurrent_scans(cli.max_concurrent_scans)
        .flat_depth(cli.flat_depth)
        .build()
        .wrap_err("Invalid configuration")
}

/// Report policy from the CLI flags. Excluded paths are filtered again on
/// the report side so no excluded key reaches the manifest.
fn report_generator(cli: &Cli) -> ReportGenerator {
    ReportGenerator::new(cli.bucket.as_str())
        .with_default_policy(cli.include_latest, cli.include_delete_markers)
        .with_filter(exclude_paths(&cli.excludes, '/'))
}

/// Build the S3 client from the default provider chain plus CLI overrides.
async fn s3_client(cli: &Cli) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(profile) = &cli.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(region) = &cli.region {
        loader = loader.region(aws_sdk_s3::config::Region::new(region.clone()));
    }
    let sdk_config = loader.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
    if let Some(role_arn) = &cli.role_arn {
        let provider = AssumeRoleProvider::builder(role_arn)
            .session_name("rewind")
            .configure(&sdk_config)
            .build()
            .await;
        builder = builder.credentials_provider(provider);
    }
    if let Some(endpoint) = &cli.endpoint_url {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    aws_sdk_s3::Client::from_conf(builder.build())
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            warn!("interrupt received, stopping scan");
            cancel.cancel();
        }
    });
}

/// Render progress as one updating stderr line when stderr is a terminal.
///
/// The task ends once the scanner is dropped.
fn spawn_progress_line(
    scanner: &Scanner<S3Lister>,
    cli: &Cli,
) -> Option<tokio::task::JoinHandle<()>> {
    if !std::io::stderr().is_terminal() {
        return None;
    }

    let mut rx = scanner.subscribe();
    let label = match cli.prefixes.as_slice() {
        [] => format!("Scanning bucket: {}", cli.bucket),
        prefixes => format!("Scanning bucket: {} with prefix: {}", cli.bucket, prefixes.join(", ")),
    };

    Some(tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match rx.recv().await {
                Ok(progress) => {
                    let mut stderr = std::io::stderr().lock();
                    let _ = write!(
                        stderr,
                        "\r{label} | {} pages, {} objects, {} folders ({} pending) {:.0}/s ",
                        progress.pages,
                        progress.objects,
                        progress.folders_completed,
                        progress.folders_pending,
                        progress.objects_per_second()
                    );
                    let _ = stderr.flush();
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    }))
}

fn print_statistics(outcome: &ScanOutcome, report: Option<(&PathBuf, u64)>) {
    println!("---Statistics---");
    println!("Number of Pages: {}", outcome.stats.pages);
    println!("Number of Objects: {}", outcome.stats.objects);
    println!("Number of Folders: {}", outcome.stats.folders);
    println!("Scanning Cost: {:.5}$", outcome.stats.cost());
    println!("Execution Time: {}s", outcome.duration.as_secs_f64().round());
    if outcome.has_warnings() {
        println!("Warnings: {}", outcome.warnings.len());
    }
    if let Some((path, written)) = report {
        println!("Report: {} ({written} versions)", path.display());
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|err| format!("expected YYYY-MM-DDTHH:MM:SS: {err}"))
}

fn normalize_report_name(name: &str) -> String {
    if name.to_lowercase().ends_with(".csv") {
        name.to_string()
    } else {
        format!("{name}.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["rewind", "--bucket", "b"]).unwrap();
        assert_eq!(cli.max_concurrent_scans, 100);
        assert_eq!(cli.report_name, "report.csv");
        assert!(cli.timestamp.is_none());
        assert!(!cli.include_latest);
        assert!(!cli.include_delete_markers);
        assert!(cli.prefixes.is_empty());
    }

    #[test]
    fn test_cli_requires_bucket() {
        assert!(Cli::try_parse_from(["rewind"]).is_err());
    }

    #[test]
    fn test_cli_repeatable_paths() {
        let cli = Cli::try_parse_from([
            "rewind", "--bucket", "b", "--prefix", "a/", "--prefix", "b/", "--exclude", "a/tmp",
        ])
        .unwrap();
        assert_eq!(cli.prefixes, vec!["a/", "b/"]);
        assert_eq!(cli.excludes, vec!["a/tmp"]);

        let config = scan_config(&cli).unwrap();
        assert_eq!(config.normalized_roots(), vec!["a/", "b/"]);
    }

    #[test]
    fn test_cli_comma_separated_paths() {
        let cli = Cli::try_parse_from([
            "rewind", "--bucket", "b", "--prefix", " /logs/ , /data ", "--exclude", "logs/tmp,",
        ])
        .unwrap();
        let config = scan_config(&cli).unwrap();
        assert_eq!(config.normalized_roots(), vec!["logs/", "data/"]);
        assert_eq!(config.exclusion_matcher().root_exclusions(), ["logs/tmp/"]);
    }

    #[test]
    fn test_cli_bucket_root_prefix_wins() {
        let cli = Cli::try_parse_from([
            "rewind", "--bucket", "b", "--prefix", "logs,/", "--prefix", "more",
        ])
        .unwrap();
        let config = scan_config(&cli).unwrap();
        assert_eq!(config.normalized_roots(), vec![""]);
    }

    #[test]
    fn test_report_skips_excluded_paths() {
        use rewind_core::ObjectVersionRecord;

        let cli = Cli::try_parse_from([
            "rewind", "--bucket", "b", "--prefix", "a/,a/b/", "--exclude", "a/b/",
        ])
        .unwrap();
        let at = |secs| DateTime::from_timestamp(secs, 0).unwrap();
        let store = Arc::new(MemoryStore::new());
        let resolver = Resolver::new(Arc::clone(&store), at(10));
        for key in ["a/1.txt", "a/b/2.txt", "a/b/c/3.txt"] {
            resolver
                .resolve(&ObjectVersionRecord::version(key, "v1", at(1), false))
                .unwrap();
        }

        let mut out = Vec::new();
        let summary = report_generator(&cli).generate(&*store, &mut out).unwrap();
        assert_eq!(summary.written, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "b,a%2F1.txt,v1\n");
    }

    #[test]
    fn test_cli_rejects_zero_flat_depth() {
        assert!(Cli::try_parse_from(["rewind", "--bucket", "b", "--flat-depth", "0"]).is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("2024-03-01T12:30:45").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T12:30:45+00:00");
        assert!(parse_timestamp("2024-03-01").is_err());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_normalize_report_name() {
        assert_eq!(normalize_report_name("report.csv"), "report.csv");
        assert_eq!(normalize_report_name("Restore.CSV"), "Restore.CSV");
        assert_eq!(normalize_report_name("restore"), "restore.csv");
    }
}
