mod config;
mod handlers;
mod routes;
mod telemetry;
mod types;

use std::sync::Arc;

use aptwatch_types::Publication;
use aptwatch_watcher::{
    ChainWatcher, Collaborators, HttpClient, InMemoryStatsRegistry, ReadinessRegistry,
    WatcherConfig, WatcherError,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::NodeConfig;
use crate::handlers::ApiState;
use crate::routes::create_router;
use crate::telemetry::{init_metrics, PrometheusMetrics};

/// Stand-in for the signing pipeline: logs every publication it is handed.
async fn log_publications(mut publications: mpsc::Receiver<Publication>) {
    while let Some(publication) = publications.recv().await {
        info!(
            sequence = publication.sequence,
            tx_hash = %hex::encode(publication.tx_hash),
            emitter_address = %hex::encode(publication.emitter_address),
            payload_len = publication.payload.len(),
            "publication ready for signing"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let watcher_config = WatcherConfig::default();
    let node_config = NodeConfig::default();

    let prometheus = init_metrics()?;
    let readiness = Arc::new(ReadinessRegistry::default());
    let stats = Arc::new(InMemoryStatsRegistry::default());

    let (msg_tx, msg_rx) = mpsc::channel(node_config.publication_queue_size.max(1));
    let (obsv_tx, obsv_rx) = mpsc::channel(node_config.observation_queue_size.max(1));

    let api_state = Arc::new(ApiState {
        chain_id: watcher_config.chain_id,
        readiness: readiness.clone(),
        stats: stats.clone(),
        prometheus,
        observation_requests: obsv_tx,
    });
    let app = create_router(api_state);

    let shutdown = CancellationToken::new();

    let listener = TcpListener::bind(&node_config.listen_addr).await?;
    info!(addr = %node_config.listen_addr, "admin server listening");

    let server_shutdown = shutdown.clone();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    let consumer_handle = tokio::spawn(log_publications(msg_rx));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal_shutdown.cancel();
        }
    });

    let sinks = Collaborators {
        metrics: Arc::new(PrometheusMetrics),
        readiness,
        stats,
    };
    let watcher = ChainWatcher::new(watcher_config, HttpClient::new(), msg_tx, obsv_rx, sinks);

    let result = watcher.run(shutdown.clone()).await;

    shutdown.cancel();
    consumer_handle.await?;
    server_handle.await??;

    match result {
        Ok(()) | Err(WatcherError::Cancelled) => {
            info!("watcher stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "watcher terminated");
            Err(e.into())
        }
    }
}
