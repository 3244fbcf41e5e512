//! WebhookTrader - Main Entry Point
//!
//! Serves the alert webhook, debounces signals and executes them against
//! the configured futures exchange.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use webhook_trader::common::traits::Notifier;
use webhook_trader::config::{load_config, load_from_env, AppConfig};
use webhook_trader::{
    router, DiscordNotifier, ExecutionLock, FuturesRestClient, LogNotifier,
    NotificationDispatcher, SignalDebouncer, TradeExecutor, WebhookState,
};

/// How long to wait for queued notifications on exit, after every run ended
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Override the listen address (e.g. 0.0.0.0:8000)
    #[arg(long)]
    bind: Option<String>,

    /// Read flat environment variables instead of the config file
    #[arg(long)]
    env_only: bool,
}

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG wins over --log-level when present
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>> {
    let timeout = Duration::from_secs(config.settings.request_timeout_seconds);
    match DiscordNotifier::from_config(&config.discord, timeout)? {
        Some(discord) => {
            info!("Notifications go to Discord");
            Ok(Arc::new(discord))
        }
        None => {
            warn!("No Discord webhook configured, notifications are log-only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

async fn drain_notifications(
    dispatcher: NotificationDispatcher,
    handle: tokio::task::JoinHandle<()>,
) {
    drop(dispatcher);
    match tokio::time::timeout(DRAIN_TIMEOUT, handle).await {
        Ok(Ok(())) => info!("Notification queue drained"),
        Ok(Err(e)) => error!("Notification task failed: {}", e),
        Err(_) => warn!("Gave up draining notifications after {:?}", DRAIN_TIMEOUT),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, cleaning up...");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    init_logging(&args)?;

    info!("Starting WebhookTrader");

    let mut config = if args.env_only {
        load_from_env()?
    } else {
        info!("Configuration file: {}", args.config);
        load_config(Some(&args.config))?
    };
    if let Some(bind) = args.bind.clone() {
        config.webhook.bind_address = bind;
    }
    config.validate()?;

    let (notifications, notification_task) = NotificationDispatcher::spawn(
        build_notifier(&config)?,
        config.settings.notification_queue_size,
    );

    let missing = config.missing_required();
    if !missing.is_empty() {
        let message = format!(
            "Startup failed: missing required settings {}",
            missing.join(", ")
        );
        error!("{}", message);
        notifications.notify(message.clone());
        drain_notifications(notifications, notification_task).await;
        return Err(anyhow!(message));
    }

    let timeout = Duration::from_secs(config.settings.request_timeout_seconds);
    let gateway = Arc::new(FuturesRestClient::from_config(&config.exchange, timeout)?);

    let lock = ExecutionLock::default();
    let executor = Arc::new(TradeExecutor::from_config(
        gateway,
        notifications.clone(),
        lock.clone(),
        &config.trading,
    ));
    let debouncer = SignalDebouncer::new(config.trading.debounce_window(), executor);

    let secret = config.webhook.secret.clone().unwrap_or_default();
    let app = router(WebhookState::new(
        debouncer.clone(),
        lock.clone(),
        secret,
        &config.webhook,
    ));

    let listener = TcpListener::bind(&config.webhook.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.webhook.bind_address))?;

    info!(
        "Listening on {} (window {:?}, leverage {}x)",
        config.webhook.bind_address,
        config.trading.debounce_window(),
        config.trading.leverage
    );
    notifications.notify(format!(
        "Service is live on {} (default symbol {})",
        config.webhook.bind_address, config.webhook.default_symbol
    ));

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Runs are never cut short: let open windows flush and queued runs
    // finish before the notification queue is drained.
    debouncer.shutdown().await;
    lock.wait_idle().await;

    notifications.notify("Service is shutting down");
    drop(debouncer);
    drain_notifications(notifications, notification_task).await;

    served.context("server error")?;
    info!("Shutdown complete");
    Ok(())
}
