use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use varsel::{
    config::AppConfig,
    models::Locale,
    notifier::{
        ApnsHttpSender, ApnsPushNotifier, DispatchRegistry, EmailNotifier, HttpWebPushSender,
        ResendMailer, WebPushNotifier,
    },
    persistence::{MemorySnapshotStore, StaticSubscriberDirectory},
    scheduler::AlertScheduler,
    scraper::{CatalogSource, HttpRenderService, OutletScraper, PageRenderer},
};

#[derive(Parser)]
#[command(author, version, about = "Outlet storefront monitoring and multi-channel alerting", long_about = None)]
struct Cli {
    /// Directory holding varsel.yaml and subscribers.yaml.
    #[arg(long)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the periodic alerting scheduler until interrupted.
    Run,
    /// Runs a single alert cycle immediately, then exits.
    RunOnce,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(cli.config_dir.as_deref())?;
    tracing::debug!(
        cycle_interval_secs = config.cycle_interval.as_secs(),
        render_service = ?config.render_service,
        "Configuration loaded."
    );

    let scheduler = build_scheduler(&config)?;

    match cli.command {
        Commands::Run => {
            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                wait_for_shutdown_signal().await;
                signal_token.cancel();
            });

            scheduler.run(shutdown).await;
        }
        Commands::RunOnce => {
            scheduler.run_cycle().await;
        }
    }

    Ok(())
}

fn build_scheduler(config: &AppConfig) -> Result<AlertScheduler, Box<dyn std::error::Error>> {
    let renderer: Option<Arc<dyn PageRenderer>> = match &config.render_service {
        Some(endpoint) => Some(Arc::new(HttpRenderService::new(endpoint.clone())?)),
        None => None,
    };

    let mut sources: Vec<Arc<dyn CatalogSource>> = Vec::new();
    for locale in Locale::ALL {
        let outlet_url = config.outlets.for_locale(locale).clone();
        sources.push(Arc::new(OutletScraper::new(locale, outlet_url, config, renderer.clone())?));
    }

    let mailer = Arc::new(ResendMailer::new(&config.email)?);
    let email = Arc::new(EmailNotifier::new(
        mailer,
        config.frontend_url.clone(),
        config.delivery_retry.clone(),
    )?);
    let web_push = Arc::new(WebPushNotifier::new(
        Arc::new(HttpWebPushSender::new(&config.web_push)?),
        config.delivery_retry.clone(),
    ));
    let apns = Arc::new(ApnsPushNotifier::new(
        Arc::new(ApnsHttpSender::new(&config.apns)?),
        config.delivery_retry.clone(),
    ));
    let registry = Arc::new(DispatchRegistry::new(email, web_push, apns));

    let snapshots = Arc::new(MemorySnapshotStore::new());
    let subscribers =
        Arc::new(StaticSubscriberDirectory::from_file(&config.subscriber_config_path)?);

    Ok(AlertScheduler::new(
        sources,
        snapshots,
        subscribers,
        registry,
        config.cycle_interval,
    ))
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c.");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install the SIGTERM handler.");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl-C received; shutting down."),
        _ = terminate => tracing::info!("SIGTERM received; shutting down."),
    }
}
