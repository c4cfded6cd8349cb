use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use statsd_reporter::config::Cli;
use statsd_reporter::config::Commands;
use statsd_reporter::config::DaemonArgs;
use statsd_reporter::ReporterMetrics;
use statsd_reporter::SimpleRegistry;
use statsd_reporter::StatsdReporter;
use tokio_util::sync::CancellationToken;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon(daemon_args) => run_daemon(daemon_args).await,
    }
}

async fn run_daemon(daemon_args: DaemonArgs) -> Result<()> {
    let _guard = match &daemon_args.log_file {
        Some(log_file) => Some(utils::logging::init_with_file(log_file)?),
        None => {
            utils::logging::init()?;
            None
        }
    };

    tracing::info!("Starting statsd reporter {}", &**version::VERSION);

    let config = daemon_args
        .resolve()
        .map_err(|report| anyhow::anyhow!("{report:?}"))
        .context("failed to load configuration")?;

    let registry = Arc::new(SimpleRegistry::new());
    let metrics = ReporterMetrics::register(&registry)
        .map_err(|report| anyhow::anyhow!("{report:?}"))
        .context("failed to register reporter metrics")?;

    let mut reporter = StatsdReporter::udp(registry, config.host.clone(), config.port)
        .with_name(config.name.clone())
        .with_metrics(metrics);
    if let Some(prefix) = &config.prefix {
        reporter = reporter.with_prefix(prefix.clone());
    }

    tracing::info!(
        msg = "Reporting to aggregator",
        host = %config.host,
        port = config.port,
        prefix = ?config.prefix,
        interval_secs = config.interval_secs,
    );

    let token = CancellationToken::new();
    let reporter_task = {
        let token = token.clone();
        let interval = config.interval();
        tokio::spawn(async move {
            reporter.run(interval, token).await;
        })
    };

    wait_for_shutdown_signal().await?;
    tracing::info!("Shutdown signal received, stopping reporter");
    token.cancel();

    tokio::time::timeout(Duration::from_secs(30), reporter_task)
        .await
        .context("reporter did not stop in time")?
        .context("reporter task failed")?;

    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("install SIGINT handler")?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("install Ctrl+C handler")?;
        tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    }
    Ok(())
}
