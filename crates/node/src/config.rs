use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub listen_addr: String,
    pub publication_queue_size: usize,
    pub observation_queue_size: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: std::env::var("ADMIN_LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:6060".to_string()),
            publication_queue_size: std::env::var("PUBLICATION_QUEUE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            observation_queue_size: std::env::var("OBSERVATION_QUEUE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
        }
    }
}
