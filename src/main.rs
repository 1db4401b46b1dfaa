use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use secrecy::SecretString;

use acewatch::api::{self, auth::AuthKeys, AppState};
use acewatch::config::AppConfig;
use acewatch::db::store::Store;
use acewatch::ingest::poller::Poller;
use acewatch::monitoring::health::HealthState;
use acewatch::monitoring::logger;
use acewatch::notify::webhook::Notifier;
use acewatch::sportsdb::client::SportsDbClient;

#[derive(Debug, Parser)]
#[command(name = "acewatch", about = "Tennis match tracking service")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Override the HTTP listen port from the config file.
    #[arg(long)]
    port: Option<u16>,

    /// Run a single ingest cycle and exit instead of serving.
    #[arg(long)]
    ingest_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut config, secrets) = AppConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    logger::init_logging(&config.monitoring)?;

    tracing::info!(
        port = config.server.port,
        poller_enabled = config.poller.enabled,
        poll_interval_s = config.poller.interval_seconds,
        "AceWatch starting"
    );

    let store = Arc::new(Store::new(&config.database.path).await?);
    let client = Arc::new(SportsDbClient::new(
        config.sportsdb.clone(),
        config.rate_limit.clone(),
        secrets.sportsdb_api_key.clone(),
    )?);
    let notifier = Arc::new(Notifier::new(
        secrets.alert_webhook_url.clone(),
        config.notify.webhook_enabled,
    ));
    let health = HealthState::new();

    if cli.ingest_once {
        let mut poller = Poller::new(
            store,
            client,
            notifier,
            health,
            config.poller.clone(),
        );
        let report = poller.run_cycle().await?;
        tracing::info!(
            fetched = report.fetched,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            alerts_fired = report.alerts_fired,
            "One-shot ingest complete"
        );
        return Ok(());
    }

    if config.poller.enabled {
        let poller = Poller::new(
            store.clone(),
            client.clone(),
            notifier.clone(),
            health.clone(),
            config.poller.clone(),
        );
        tokio::spawn(poller.run());
    } else {
        tracing::warn!("Poller disabled — serving stored data only");
    }

    let jwt_secret = secrets.jwt_secret.unwrap_or_else(|| {
        tracing::warn!("ACEWATCH_JWT_SECRET not set — using an insecure development secret");
        SecretString::from("acewatch-dev-secret")
    });
    let auth = Arc::new(AuthKeys::new(&jwt_secret, config.auth.token_ttl_minutes));

    let state = AppState {
        store,
        auth,
        client,
        health,
    };
    api::serve(state, &config.server).await
}
