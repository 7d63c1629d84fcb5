use aptwatch_types::{tx_hash_from_sequence, ChainId, ObservationRequest};
use aptwatch_watcher::{InMemoryStatsRegistry, ReadinessRegistry};
use axum::{extract::State, http::StatusCode, response::Json};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

use crate::types::*;

pub struct ApiState {
    pub chain_id: ChainId,
    pub readiness: Arc<ReadinessRegistry>,
    pub stats: Arc<InMemoryStatsRegistry>,
    pub prometheus: PrometheusHandle,
    pub observation_requests: mpsc::Sender<ObservationRequest>,
}

fn error_response(
    status: StatusCode,
    error: &str,
    message: String,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message,
        }),
    )
}

pub async fn render_metrics(State(state): State<Arc<ApiState>>) -> String {
    state.prometheus.render()
}

pub async fn get_stats(State(state): State<Arc<ApiState>>) -> Json<StatsResponse> {
    let mut chains: Vec<ChainStatsEntry> = state
        .stats
        .snapshot()
        .into_iter()
        .map(|(chain_id, stats)| ChainStatsEntry {
            chain_id,
            height: stats.height,
            contract_address: stats.contract_address,
            error_count: stats.error_count,
        })
        .collect();
    chains.sort_by_key(|entry| entry.chain_id);

    Json(StatsResponse { chains })
}

/// Queues a reobservation of one event for the watcher.
pub async fn submit_observation_request(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<ObservationRequestBody>,
) -> Result<(StatusCode, Json<ObservationAccepted>), (StatusCode, Json<ErrorResponse>)> {
    if body.chain_id != state.chain_id {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "UnsupportedChain",
            format!(
                "this node watches chain {}, not {}",
                state.chain_id, body.chain_id
            ),
        ));
    }

    let request = ObservationRequest::for_sequence(body.chain_id, body.sequence);
    match state.observation_requests.try_send(request) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(sequence = body.sequence, "observation queue full");
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "QueueFull",
                "Observation request queue is full".to_string(),
            ));
        }
        Err(TrySendError::Closed(_)) => {
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "WatcherStopped",
                "Watcher is no longer accepting requests".to_string(),
            ));
        }
    }

    info!(sequence = body.sequence, "observation request queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(ObservationAccepted {
            chain_id: body.chain_id,
            sequence: body.sequence,
            tx_hash: hex::encode(tx_hash_from_sequence(body.sequence)),
        }),
    ))
}
