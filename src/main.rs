use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{self, EnvFilter};

use tweetsweep::config::Config;
use tweetsweep::error::{ErrorRecovery, SweepError};
use tweetsweep::output::ConsoleSink;
use tweetsweep::sweep::{Orchestrator, ProtectSet, SweepSettings, TokioPause};
use tweetsweep::twitter::TwitterClient;

#[derive(Parser, Debug)]
#[command(name = "tweetsweep")]
#[command(about = "Deletes every tweet on your timeline except the ones you protect")]
#[command(version)]
#[command(after_help = "A run stops early when a page ends on a protected tweet and the next \
page starts with it again. Tweets older than that are left in place; run tweetsweep \
again to continue the sweep.")]
struct Cli {
    /// Path to configuration file (can also be set via TWEETSWEEP_CONFIG env var)
    config: Option<PathBuf>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Enable verbose logging (equivalent to --log-level debug)
    #[arg(short, long)]
    verbose: bool,

    /// Tweets requested per timeline page (1-200)
    #[arg(long, value_name = "N")]
    page_size: Option<u32>,

    /// Print the per-tweet lines without color
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    /// Get config path from CLI arg or TWEETSWEEP_CONFIG environment variable
    fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var("TWEETSWEEP_CONFIG").ok().map(PathBuf::from))
    }
}

/// Pick the effective level: verbose, then --log-level, then config
fn resolve_log_level<'a>(cli: &'a Cli, config: Option<&'a Config>) -> &'a str {
    if cli.verbose {
        "debug"
    } else if let Some(ref level) = cli.log_level {
        level.as_str()
    } else {
        config
            .and_then(|c| c.logging.as_ref())
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }
}

/// Initialize structured logging on stderr; stdout carries the per-tweet lines
#[allow(clippy::result_large_err)]
fn init_logging(log_level: &str) -> Result<(), SweepError> {
    match log_level.to_lowercase().as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => {}
        _ => {
            return Err(SweepError::InvalidData(format!(
                "Invalid log level: {log_level}. Valid levels are: error, warn, info, debug, trace"
            )));
        }
    }

    // RUST_LOG wins over everything else
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.to_lowercase()))
        .map_err(|e| SweepError::InvalidData(format!("Failed to create log filter: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();

    debug!("Logging initialized with level: {}", log_level);
    Ok(())
}

fn handle_error(error: &SweepError) {
    match error {
        SweepError::Config(_) => error!("Configuration error: {}", error),
        SweepError::CredentialVerification(_) => {
            error!("Could not verify credentials: {}", error)
        }
        SweepError::Twitter(e) if e.is_request_build() => {
            error!("Could not build request: {}", e);
            error!("Check sweep.api_base_url and the credential values");
        }
        _ => {
            error!("Sweep failed: {}", error);
            debug!("Error details: {:?}", error);
        }
    }

    if let Some(hint) = ErrorRecovery::hint(error) {
        error!("{}", hint);
    }
    if ErrorRecovery::is_pre_run(error) {
        info!("No tweets were touched");
    } else if ErrorRecovery::should_abort(error) {
        error!("Fatal error encountered, stopping the sweep");
    }
}

#[tokio::main]
#[allow(clippy::result_large_err)]
async fn main() -> Result<(), SweepError> {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config_path()) {
        Ok(config) => config,
        Err(e) => {
            // Logging is still needed to report the configuration error
            let _ = init_logging(resolve_log_level(&cli, None));
            let error = SweepError::Config(e);
            handle_error(&error);
            return Err(error);
        }
    };

    if let Err(e) = init_logging(resolve_log_level(&cli, Some(&config))) {
        eprintln!("Failed to initialize logging: {e}");
        return Err(e);
    }

    if let Some(page_size) = cli.page_size {
        if let Err(e) = config.override_page_size(page_size) {
            let error = SweepError::Config(e);
            handle_error(&error);
            return Err(error);
        }
    }

    info!("Starting tweetsweep v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration file path: {:?}", cli.config_path());
    info!(
        "API endpoint: {}, page size: {}",
        config.sweep().api_base_url,
        config.sweep().page_size
    );

    match run(&config, !cli.no_color).await {
        Ok(()) => Ok(()),
        Err(e) => {
            handle_error(&e);
            Err(e)
        }
    }
}

async fn run(config: &Config, color: bool) -> Result<(), SweepError> {
    let client = TwitterClient::new(config)?;
    let protect = ProtectSet::new(config.protect.iter().cloned());
    if protect.is_empty() {
        warn!("Protect list is empty, every tweet will be deleted");
    }
    if protect.len() < config.protect.len() {
        debug!(
            "{} protect entries were blank or duplicated",
            config.protect.len() - protect.len()
        );
    }

    let mut orchestrator = Orchestrator::connect(
        client,
        protect,
        SweepSettings::from_config(config),
        TokioPause,
        ConsoleSink::new(color),
    )
    .await?;

    let stats = orchestrator.run().await?;
    info!(
        "Sweep of @{} complete: {} deleted, {} protected",
        orchestrator.screen_name(),
        stats.deleted,
        stats.skipped
    );
    Ok(())
}
