//! testrelay CLI.
//!
//! Subcommands:
//! - `normalize`: merge duplicate suites/tests/environments in a report directory
//! - `check`: validate environment references and attachment checksums
//! - `upload`: normalize and synchronize a report with the service
//! - `version`

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tr_bundle::{LoadedReport, ReportReader, ReportWriter};
use tr_common::{format_error_human, Error, OutputFormat, StructuredError, REPORT_SCHEMA_VERSION};
use tr_core::config::{load_config, ConfigOptions};
use tr_core::exit_codes::ExitCode;
use tr_core::logging::{generate_run_id, init_logging, LogConfig, LogFormat, LogLevel};
use tr_core::upload::{GithubActionsOidc, ReqwestTransport, UploadTransport};
use tr_core::{check_references, normalize, ReportUploader, UploadOptions, UploadOutcome};
use tracing::{info, warn};

/// Normalize and upload test reports
#[derive(Parser)]
#[command(name = "tr-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (default: $XDG_CONFIG_HOME/testrelay/config.toml)
    #[arg(long, global = true, env = "TR_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge duplicate entities and rewrite the report directory
    Normalize(NormalizeArgs),

    /// Validate references and attachments without modifying anything
    Check(CheckArgs),

    /// Normalize and upload a report directory
    Upload(UploadArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    /// Report directory containing report.json
    dir: PathBuf,

    /// Write the normalized report here instead of in place
    #[arg(long)]
    out: Option<PathBuf>,

    /// Pretty-print report.json
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Report directory containing report.json
    dir: PathBuf,
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Report directory containing report.json
    dir: PathBuf,

    /// Access token (overrides TR_ACCESS_TOKEN and the config file)
    #[arg(long)]
    token: Option<String>,

    /// Service endpoint (overrides TR_ENDPOINT and the config file)
    #[arg(long)]
    endpoint: Option<String>,

    /// OIDC audience for GitHub Actions token exchange
    #[arg(long)]
    audience: Option<String>,

    /// Exit with an error instead of a failed outcome when the upload fails
    #[arg(long)]
    strict: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(
        LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet),
        cli.global.log_format,
    );
    init_logging(&log_config);

    let run_id = generate_run_id();
    let span = tracing::info_span!("run", run_id = %run_id);
    let _enter = span.enter();

    let result = match &cli.command {
        Commands::Normalize(args) => run_normalize(&cli.global, &run_id, args),
        Commands::Check(args) => run_check(&cli.global, &run_id, args),
        Commands::Upload(args) => run_upload(&cli.global, &run_id, args),
        Commands::Version => {
            print_version(&cli.global);
            Ok(ExitCode::Ok)
        }
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => {
            report_error(&cli.global, &run_id, &err);
            ExitCode::for_error(&err)
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_json(value: &serde_json::Value) {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    println!("{}", text);
}

fn envelope(run_id: &str, command: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "schema_version": REPORT_SCHEMA_VERSION,
        "run_id": run_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "command": command,
        "status": status,
    })
}

fn merge(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    if let (Some(base_map), serde_json::Value::Object(extra_map)) = (base.as_object_mut(), extra) {
        base_map.extend(extra_map);
    }
    base
}

fn report_error(global: &GlobalOpts, run_id: &str, err: &Error) {
    match global.format {
        OutputFormat::Json => {
            let structured = StructuredError::from(err).with_context("run_id", run_id);
            println!("{}", structured.to_json());
        }
        OutputFormat::Human => {
            eprintln!("{}", format_error_human(err, !global.no_color));
        }
        OutputFormat::Exitcode => {}
    }
}

fn open_report(dir: &Path) -> Result<LoadedReport, Error> {
    let loaded = ReportReader::open(dir)?;
    for missing in &loaded.missing {
        warn!(id = %missing.id, name = %missing.name, "Attachment referenced but not on disk");
    }
    Ok(loaded)
}

// ============================================================================
// Commands
// ============================================================================

fn run_normalize(global: &GlobalOpts, run_id: &str, args: &NormalizeArgs) -> Result<ExitCode, Error> {
    let loaded = open_report(&args.dir)?;
    let normalized = normalize(&loaded.report)?;

    let out_dir = args.out.clone().unwrap_or_else(|| args.dir.clone());
    let summary = ReportWriter::new(&out_dir)
        .pretty(args.pretty)
        .write(&normalized, &loaded.attachments)?;

    info!(
        tests_in = loaded.report.test_count(),
        tests_out = normalized.test_count(),
        out = %out_dir.display(),
        "Normalized report"
    );

    match global.format {
        OutputFormat::Json => print_json(&merge(
            envelope(run_id, "normalize", "ok"),
            serde_json::json!({
                "out_dir": out_dir.display().to_string(),
                "tests_in": loaded.report.test_count(),
                "tests_out": normalized.test_count(),
                "environments_in": loaded.report.environments.len(),
                "environments_out": normalized.environments.len(),
                "attachments_written": summary.attachments_written,
                "missing_attachments": loaded.missing.len(),
            }),
        )),
        OutputFormat::Human => {
            println!(
                "Normalized {} -> {} tests, {} -> {} environments",
                loaded.report.test_count(),
                normalized.test_count(),
                loaded.report.environments.len(),
                normalized.environments.len()
            );
            println!("Wrote {}", summary.report_path.display());
        }
        OutputFormat::Exitcode => {}
    }
    Ok(ExitCode::Ok)
}

fn run_check(global: &GlobalOpts, run_id: &str, args: &CheckArgs) -> Result<ExitCode, Error> {
    let loaded = open_report(&args.dir)?;
    let issues = check_references(&loaded.report);
    let mismatches = loaded.verify_attachments()?;
    let ok = issues.is_empty() && mismatches.is_empty() && loaded.missing.is_empty();

    match global.format {
        OutputFormat::Json => print_json(&merge(
            envelope(run_id, "check", if ok { "ok" } else { "error" }),
            serde_json::json!({
                "tests": loaded.report.test_count(),
                "environments": loaded.report.environments.len(),
                "reference_issues": issues,
                "missing_attachments": loaded.missing.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
                "checksum_mismatches": mismatches.iter().map(|m| serde_json::json!({
                    "expected": m.expected.as_str(),
                    "actual": m.actual.as_str(),
                })).collect::<Vec<_>>(),
            }),
        )),
        OutputFormat::Human => {
            let symbol = |good: bool| if good { "✓" } else { "✗" };
            println!("# tr-core check {}", args.dir.display());
            println!("{} environment references", symbol(issues.is_empty()));
            for issue in &issues {
                println!(
                    "  {} ({}) attempt {}: environment {} of {}",
                    issue.test, issue.file, issue.attempt, issue.index, issue.len
                );
            }
            println!("{} attachments present", symbol(loaded.missing.is_empty()));
            for missing in &loaded.missing {
                println!("  missing {} ({})", missing.id, missing.name);
            }
            println!("{} attachment checksums", symbol(mismatches.is_empty()));
            for mismatch in &mismatches {
                println!("  {} hashes to {}", mismatch.expected, mismatch.actual);
            }
        }
        OutputFormat::Exitcode => {}
    }

    Ok(if ok { ExitCode::Ok } else { ExitCode::InvalidReport })
}

fn run_upload(global: &GlobalOpts, run_id: &str, args: &UploadArgs) -> Result<ExitCode, Error> {
    let config = load_config(&ConfigOptions {
        config_path: global.config.clone(),
        endpoint: args.endpoint.clone(),
        access_token: args.token.clone(),
        oidc_audience: args.audience.clone(),
        throw_on_failure: args.strict.then_some(true),
    })?;

    let loaded = open_report(&args.dir)?;
    let normalized = normalize(&loaded.report)?;

    let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))
        .map_err(|e| Error::UploadFailed(e.to_string()))?;
    let oidc = GithubActionsOidc::from_env(transport.client().clone());
    let transport: Arc<dyn UploadTransport> = Arc::new(transport);

    let mut uploader = ReportUploader::new(transport, UploadOptions::from(&config));
    if let Some(provider) = oidc {
        uploader = uploader.with_oidc(Arc::new(provider));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime
        .block_on(uploader.upload(&normalized, &loaded.attachments))
        .map_err(Error::from)?;

    let (code, detail) = match &outcome {
        UploadOutcome::Success { report_url } => {
            (ExitCode::Ok, serde_json::json!({ "report_url": report_url }))
        }
        UploadOutcome::Skipped { reason } => {
            (ExitCode::Skipped, serde_json::json!({ "reason": reason }))
        }
        UploadOutcome::Failed { error } => (
            ExitCode::UploadFailed,
            serde_json::json!({
                "error": error.to_string(),
                "http_status": error.status(),
                "url": error.url(),
            }),
        ),
    };

    match global.format {
        OutputFormat::Json => print_json(&merge(
            merge(
                envelope(run_id, "upload", outcome.status()),
                serde_json::json!({
                    "endpoint": config.endpoint,
                    "attachments": loaded.attachments.len(),
                    "missing_attachments": loaded.missing.len(),
                }),
            ),
            detail,
        )),
        OutputFormat::Human => match &outcome {
            UploadOutcome::Success { report_url } => println!("Uploaded: {}", report_url),
            UploadOutcome::Skipped { reason } => println!("Skipped: {}", reason),
            UploadOutcome::Failed { error } => println!("Failed: {}", error),
        },
        OutputFormat::Exitcode => {}
    }
    Ok(code)
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "schema_version": REPORT_SCHEMA_VERSION,
            "tr_core_version": env!("CARGO_PKG_VERSION"),
            "canonicalization_version": tr_identity::CANONICALIZATION_VERSION,
        })),
        OutputFormat::Exitcode => {}
        OutputFormat::Human => {
            println!("tr-core {}", env!("CARGO_PKG_VERSION"));
            println!("report schema version: {}", REPORT_SCHEMA_VERSION);
        }
    }
}
