//! regrouperd - The regrouper background service
//!
//! This is the main entry point for the regrouperd service.
//! It wires together all the components:
//! - Configuration loading
//! - CSV audit log
//! - HTTP backend client
//! - Cycle controller
//! - Signal handling

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use regrouper_backend_http::{HttpBackend, HttpBackendConfig};
use regrouper_config::load_config;
use regrouper_core::{CycleController, CycleOutcome};
use regrouper_store::{AuditSink, CsvAuditLog};
use regrouper_util::default_config_path;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// regrouperd - Rule-based policy-group assignment service
#[derive(Parser, Debug)]
#[command(name = "regrouperd", version)]
#[command(about = "Keeps managed agents in the policy group their category calls for", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/regrouper/config.yaml)
    #[arg(short, long, env = "REGROUPER_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Audit log path override (or set REGROUPER_AUDIT_LOG env var)
    #[arg(short, long, env = "REGROUPER_AUDIT_LOG")]
    audit_log: Option<PathBuf>,

    /// Record moves without applying them
    #[arg(long)]
    simulate: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// Main service state
struct Service {
    controller: CycleController,
    once: bool,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        // Load configuration
        let mut policy = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            rules = policy.rules.len(),
            warnings = policy.warnings.len(),
            "Configuration loaded"
        );

        if args.simulate {
            policy.assignment.simulation_mode = true;
        }
        if let Some(path) = &args.audit_log {
            policy.assignment.output_file = path.clone();
        }
        if policy.assignment.simulation_mode {
            warn!("Simulation mode: moves are recorded but not applied");
        }

        // Open audit log
        let audit_path = policy.assignment.output_file.clone();
        let audit: Arc<dyn AuditSink> = Arc::new(
            CsvAuditLog::open(&audit_path)
                .with_context(|| format!("Failed to open audit log {:?}", audit_path))?,
        );

        info!(audit_log = %audit_path.display(), "Audit log ready");

        // Backend client
        let server = &policy.server;
        let backend_config = HttpBackendConfig::new(&server.server_name, server.api_key.clone())
            .with_verify_ssl(server.verify_ssl)
            .with_timeout(server.request_timeout);
        let backend = HttpBackend::new(backend_config).context("Failed to build HTTP client")?;

        info!(base_url = %backend.base_url(), "Backend client ready");

        let controller = CycleController::from_policy(policy, Arc::new(backend), audit);

        Ok(Self {
            controller,
            once: args.once,
        })
    }

    async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            }
            let _ = shutdown_tx.send(true);
        });

        if self.once {
            let report = self.controller.run_cycle(&shutdown_rx).await;
            if report.outcome == CycleOutcome::FetchFailed {
                let reason = report
                    .fetch_error
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                bail!("Inventory fetch failed: {reason}");
            }
            return Ok(());
        }

        self.controller.run(shutdown_rx).await;

        info!("Shutdown complete");
        Ok(())
    }
}

fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match args.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!(version = env!("CARGO_PKG_VERSION"), "regrouperd starting");

    let service = Service::new(&args)?;
    service.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_args() {
        let args = Args::parse_from(["regrouperd", "--config", "/tmp/regrouper.yaml"]);
        assert_eq!(args.config, PathBuf::from("/tmp/regrouper.yaml"));
        assert!(!args.simulate);
        assert!(!args.once);
        assert_eq!(args.log_format, LogFormat::Text);
    }

    #[test]
    fn parse_all_flags() {
        let args = Args::parse_from([
            "regrouperd",
            "-c",
            "cfg.toml",
            "--audit-log",
            "/var/log/moves.csv",
            "--simulate",
            "--once",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ]);
        assert_eq!(args.audit_log, Some(PathBuf::from("/var/log/moves.csv")));
        assert!(args.simulate);
        assert!(args.once);
        assert_eq!(args.log_level, "debug");
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn missing_config_is_startup_error() {
        let args = Args::parse_from(["regrouperd", "--config", "/nonexistent/regrouper.yaml"]);
        assert!(Service::new(&args).is_err());
    }
}
