mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use replybot_api::{AppState, AppStateInner};
use replybot_pipeline::collaborators::ErrorSink;
use replybot_pipeline::error_sink::{HttpErrorSink, LogOnlyErrorSink};
use replybot_pipeline::generation::GenerationClient;
use replybot_pipeline::marketplace::MarketplaceClient;
use replybot_pipeline::oauth::OAuthClient;
use replybot_pipeline::store::SqliteStore;
use replybot_pipeline::{Collaborators, NotificationQueue, Worker, WorkerSettings};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "replybot=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(replybot_db::Database::open(&config.db_path)?);
    let store = Arc::new(SqliteStore::new(db.clone()).with_token_history_limit(config.token_history_limit));

    let oauth = Arc::new(OAuthClient::new(
        &config.oauth_url,
        config.client_id.clone(),
        config.client_secret.clone(),
        config.redirect_uri.clone(),
        config.oauth_http,
    )?);
    let marketplace = Arc::new(MarketplaceClient::new(config.marketplace_url.clone(), config.marketplace_http)?);
    let generator = Arc::new(GenerationClient::new(
        &config.generation_url,
        config.generation_api_key.clone(),
        config.generation_model.clone(),
        config.generation_http,
    )?);
    let error_sink: Arc<dyn ErrorSink> = match &config.error_sink_url {
        Some(url) => Arc::new(HttpErrorSink::new(url.clone(), config.error_sink_http)?),
        None => {
            info!("REPLYBOT_ERROR_SINK_URL not set, failures are only logged");
            Arc::new(LogOnlyErrorSink)
        }
    };

    // Single consumer of the queue
    let (queue, receiver) = NotificationQueue::new();
    let worker = Worker::new(
        Collaborators {
            credentials: store.clone(),
            oauth: oauth.clone(),
            marketplace: marketplace.clone(),
            generator,
            error_sink,
            reporting: store.clone(),
        },
        WorkerSettings {
            store_profile: config.store_profile.clone(),
            ..WorkerSettings::default()
        },
    );
    let worker_handle = tokio::spawn(worker.run(receiver));

    let state: AppState = Arc::new(AppStateInner {
        queue: queue.clone(),
        db,
        oauth,
        credentials: store,
        marketplace,
    });

    let app = replybot_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("replybot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let the worker finish what was accepted before the signal.
    info!(pending = queue.len(), "draining notification queue");
    if queue.shutdown().is_err() {
        error!("notification worker exited before shutdown");
    }
    match worker_handle.await {
        Ok(stats) => info!(
            answered = stats.answered,
            dropped = stats.dropped,
            failed = stats.failed,
            "shutdown complete"
        ),
        Err(e) => error!("notification worker task failed: {}", e),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
