use aptwatch_types::{defaults, ChainId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_RPC_URL: &str = "http://localhost:8080";
const DEFAULT_ACCOUNT: &str = "0xde0036a9600559e295d5f6802ef6f3f802f510366e0c23912b0655d972166017";
const DEFAULT_HANDLE: &str =
    "0xde0036a9600559e295d5f6802ef6f3f802f510366e0c23912b0655d972166017::state::WormholeMessageHandle";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    pub chain_id: ChainId,
    pub rpc_url: String,
    /// Account that owns the event handle; also reported as the contract address.
    pub account: String,
    pub handle: String,
    pub poll_interval_ms: u64,
}

impl WatcherConfig {
    pub fn events_url(&self) -> String {
        format!(
            "{}/v1/accounts/{}/events/{}/event",
            self.base_url(),
            self.account,
            self.handle
        )
    }

    pub fn health_url(&self) -> String {
        format!("{}/v1", self.base_url())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    fn base_url(&self) -> &str {
        self.rpc_url.trim_end_matches('/')
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            chain_id: defaults::DEFAULT_CHAIN_ID,
            rpc_url: std::env::var("APTOS_RPC_URL")
                .unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
            account: std::env::var("APTOS_ACCOUNT")
                .unwrap_or_else(|_| DEFAULT_ACCOUNT.to_string()),
            handle: std::env::var("APTOS_HANDLE").unwrap_or_else(|_| DEFAULT_HANDLE.to_string()),
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}
