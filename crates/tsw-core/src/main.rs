//! Time-Series Writer CLI
//!
//! Pushes a JSON payload through the writer against a dry-run store and
//! prints the outcome with the batches the store received and the push
//! timings. Store statuses can be simulated to exercise the retry path.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tsw_common::{Error, Result, StructuredError};
use tsw_core::exit_codes::ExitCode;
use tsw_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use tsw_core::options::Deduplicate;
use tsw_core::payload::{parse_status, Payload};
use tsw_core::metrics::BATCH_PUSH;
use tsw_core::{DeduplicationMode, PushMetrics, PushMode, Writer, WriterConfig};

/// Time-series writer: stage columnar data and push it to a store
#[derive(Parser)]
#[command(name = "tsw")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Writer config file (TOML)
    #[arg(long, global = true, env = "TSW_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Push a JSON payload
    Push(PushArgs),
    /// Validate a config file
    CheckConfig {
        /// Config file to check (defaults to --config)
        file: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct PushArgs {
    /// Payload file
    payload: PathBuf,

    /// Push mode (transactional, fast, async, truncate)
    #[arg(long)]
    mode: Option<PushMode>,

    /// Retry count for transient store statuses
    #[arg(long)]
    retries: Option<u32>,

    /// Delay before the first retry, in milliseconds
    #[arg(long)]
    retry_delay: Option<u64>,

    /// Deduplicate on these columns, or `*` for all columns
    #[arg(long, value_delimiter = ',')]
    dedup: Option<Vec<String>>,

    /// What to do with duplicates (drop, upsert)
    #[arg(long)]
    dedup_mode: Option<DeduplicationMode>,

    /// Truncate range as BEGIN_NS,END_NS
    #[arg(long, value_delimiter = ',', num_args = 2, allow_negative_numbers = true)]
    range: Option<Vec<i64>>,

    /// Store statuses to return in order (success, pipe_full, try_again, failed:<code>)
    #[arg(long, value_delimiter = ',')]
    simulate: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.global.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            init_logging(&log_config(&cli.global, &WriterConfig::default()));
            std::process::exit(report(&err).as_i32());
        }
    };
    init_logging(&log_config(&cli.global, &config));

    let exit_code = match &cli.command {
        Commands::Push(args) => run_push(config, args),
        Commands::CheckConfig { file } => run_check_config(&cli.global, file.as_deref()),
    };
    std::process::exit(exit_code.as_i32());
}

fn load_config(path: Option<&std::path::Path>) -> Result<WriterConfig> {
    match path {
        Some(path) => WriterConfig::load(path)?.apply_env(),
        None => WriterConfig::default().apply_env(),
    }
}

/// File settings, then environment, then flags.
fn log_config(global: &GlobalOpts, config: &WriterConfig) -> LogConfig {
    let level = if global.quiet {
        Some(LogLevel::Error)
    } else {
        match global.verbose {
            0 => global.log_level,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    LogConfig::default()
        .with_settings(&config.log)
        .with_env(|key| std::env::var(key).ok())
        .with_overrides(level, global.log_format)
}

fn report(err: &Error) -> ExitCode {
    let code = ExitCode::from_error(err);
    tracing::error!(code = err.code(), "{}", err.headline());
    println!("{}", StructuredError::from(err).to_json());
    code
}

fn run_push(config: WriterConfig, args: &PushArgs) -> ExitCode {
    match push(config, args) {
        Ok(output) => {
            println!("{output}");
            ExitCode::Clean
        }
        Err(err) => report(&err),
    }
}

fn push(config: WriterConfig, args: &PushArgs) -> Result<serde_json::Value> {
    let mut options = config.defaults;
    if let Some(mode) = args.mode {
        options = options.with_mode(mode);
    }
    if let Some(retries) = args.retries {
        options = options.with_retries(retries);
    }
    if let Some(delay) = args.retry_delay {
        options.retry_delay = Some(delay);
    }
    if let Some(columns) = &args.dedup {
        options.deduplicate = match columns.as_slice() {
            [all] if all == "*" => Deduplicate::Flag(true),
            _ => Deduplicate::Columns(columns.clone()),
        };
    }
    if let Some(mode) = args.dedup_mode {
        options.deduplication_mode = Some(mode);
    }
    if let Some(range) = &args.range {
        if let [begin, end] = range.as_slice() {
            options = options.with_range(*begin, *end);
        }
    }
    options.validate()?;

    let script = args
        .simulate
        .iter()
        .map(|s| parse_status(s))
        .collect::<Result<Vec<_>>>()?;

    let payload = Payload::load(&args.payload)?;
    let metrics = PushMetrics::new().map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    let mut writer = Writer::new(payload.dry_run_store().with_script(script))
        .with_metrics(metrics.clone());
    let data = payload.to_writer_data(&writer)?;
    let outcome = writer.push(&data, &options)?;

    Ok(serde_json::json!({
        "outcome": outcome,
        "batches": writer.store().last_submitted().unwrap_or_default(),
        "metrics": { BATCH_PUSH: metrics.total(BATCH_PUSH) },
    }))
}

fn run_check_config(global: &GlobalOpts, file: Option<&std::path::Path>) -> ExitCode {
    let Some(path) = file.or(global.config.as_deref()) else {
        return report(&Error::InvalidArgument(
            "no config file given; pass a path or --config".to_string(),
        ));
    };
    match WriterConfig::load(path) {
        Ok(config) => {
            let summary = serde_json::json!({
                "path": path.display().to_string(),
                "valid": true,
                "defaults": config.defaults,
            });
            println!("{summary}");
            ExitCode::Clean
        }
        Err(err) => report(&err),
    }
}
