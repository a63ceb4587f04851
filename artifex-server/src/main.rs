//! # Artifex Server
//!
//! Library-management daemon for a personal media server: scans libraries
//! for artwork defects and stale edition labels, aggregates replacement
//! artwork from third-party providers, and applies fixes back to the
//! server - interactively through the HTTP API or automatically on a
//! cron schedule.

mod errors;
mod handlers;

use std::net::SocketAddr;

use artifex_core::{
    AutoApplyEngine, ConfigStore, ScanEngine, Scheduler, SecretCipher, database,
};
use axum::Router;
use axum::routing::{get, post};
use clap::Parser;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments for the Artifex daemon
#[derive(Parser, Debug)]
#[command(name = "artifex-server")]
#[command(about = "Library-management daemon for a personal media server")]
struct Args {
    /// Bind host
    #[arg(long, env = "ARTIFEX_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port
    #[arg(short, long, env = "ARTIFEX_PORT", default_value_t = 8468)]
    port: u16,

    /// sqlite database URL
    #[arg(long, env = "ARTIFEX_DATABASE_URL", default_value = "sqlite://artifex.db")]
    database_url: String,

    /// Passphrase the secret-encryption key is derived from
    #[arg(long, env = "ARTIFEX_SECRET_KEY", default_value = "artifex-dev-secret")]
    secret_key: String,
}

/// Long-lived services shared by every handler. Engine clones share
/// state, so the scheduler and the HTTP surface drive the same instances.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub cipher: SecretCipher,
    pub scan_engine: ScanEngine,
    pub auto_apply: AutoApplyEngine,
    pub scheduler: Scheduler,
}

impl AppState {
    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.pool.clone(), self.cipher.clone())
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health::health))
        // Media server connection
        .route("/api/server", get(handlers::server::status))
        .route("/api/server/connect", post(handlers::server::connect))
        .route("/api/server/libraries", get(handlers::server::libraries))
        .route(
            "/api/server/items/{item_key}/posters",
            get(handlers::server::available_posters),
        )
        .route(
            "/api/server/items/{item_key}/backgrounds",
            get(handlers::server::available_backgrounds),
        )
        .route("/api/server/pin", post(handlers::server::create_pin))
        .route("/api/server/pin/{pin_id}", get(handlers::server::check_pin))
        .route("/api/server/resources", get(handlers::server::resources))
        // Scans
        .route("/api/scan/start", post(handlers::scan::start))
        .route("/api/scan/status", get(handlers::scan::status))
        .route("/api/scan/pause", post(handlers::scan::pause))
        .route("/api/scan/resume", post(handlers::scan::resume))
        .route("/api/scan/cancel", post(handlers::scan::cancel))
        .route("/api/scan/subscribe", get(handlers::scan::subscribe))
        .route("/api/scan/history", get(handlers::scan::history))
        .route("/api/scan/{scan_id}/events", get(handlers::scan::events))
        .route("/api/scan/interrupted", get(handlers::scan::interrupted))
        .route(
            "/api/scan/interrupted/discard",
            post(handlers::scan::discard_interrupted),
        )
        // Issues
        .route("/api/issues", get(handlers::issues::list))
        .route("/api/issues/stats", get(handlers::issues::stats))
        .route("/api/issues/{issue_id}", get(handlers::issues::get))
        .route("/api/issues/{issue_id}/accept", post(handlers::issues::accept))
        .route("/api/issues/{issue_id}/skip", post(handlers::issues::skip))
        .route("/api/issues/{issue_id}/refresh", post(handlers::issues::refresh))
        // Provider settings
        .route(
            "/api/settings/providers",
            get(handlers::settings::get_providers).put(handlers::settings::put_providers),
        )
        .route(
            "/api/settings/providers/{source}/test",
            post(handlers::settings::test_provider),
        )
        // Editions
        .route(
            "/api/edition/config",
            get(handlers::edition::get_config).put(handlers::edition::put_config),
        )
        .route("/api/edition/preview/{item_key}", get(handlers::edition::preview))
        .route("/api/edition/apply/{item_key}", post(handlers::edition::apply))
        .route("/api/edition/restore/{item_key}", post(handlers::edition::restore))
        // Auto-apply
        .route("/api/autofix/start", post(handlers::autofix::start))
        .route("/api/autofix/cancel", post(handlers::autofix::cancel))
        .route("/api/autofix/status", get(handlers::autofix::status))
        .route("/api/autofix/subscribe", get(handlers::autofix::subscribe))
        // Schedules
        .route(
            "/api/schedules",
            get(handlers::schedules::list).post(handlers::schedules::create),
        )
        .route(
            "/api/schedules/{schedule_id}",
            get(handlers::schedules::get)
                .put(handlers::schedules::update)
                .delete(handlers::schedules::delete),
        )
        .route(
            "/api/schedules/{schedule_id}/enable",
            post(handlers::schedules::enable),
        )
        .route(
            "/api/schedules/{schedule_id}/disable",
            post(handlers::schedules::disable),
        )
        .route("/api/schedules/{schedule_id}/run", post(handlers::schedules::run_now))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "artifex_server=info,artifex_core=info,tower_http=warn".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let pool = database::connect(&args.database_url).await?;
    info!(url = %args.database_url, "database ready");

    let cipher = SecretCipher::from_passphrase(&args.secret_key);
    let scan_engine = ScanEngine::new(pool.clone(), cipher.clone());
    let auto_apply = AutoApplyEngine::new(pool.clone(), cipher.clone());
    let scheduler = Scheduler::new(pool.clone(), scan_engine.clone(), auto_apply.clone());

    // Interrupted scans are surfaced, never silently resumed; the operator
    // discards them through the API.
    if let Some(scan) = scan_engine.find_interrupted().await? {
        warn!(
            scan_id = scan.id,
            processed = scan.processed_items,
            total = scan.total_items,
            "found interrupted scan from a previous run; discard it to start new scans"
        );
    }

    scheduler.start().await?;

    let state = AppState {
        pool,
        cipher,
        scan_engine,
        auto_apply,
        scheduler,
    };

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
