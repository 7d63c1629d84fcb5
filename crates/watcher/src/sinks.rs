//! Collaborators the watcher reports into.
//!
//! Each is injected at construction so the watcher holds no global state.
//! The in-memory implementations here back the node binary and the tests.

use aptwatch_types::{ChainId, NetworkStats};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub trait MetricsSink: Send + Sync {
    fn inc_observations_confirmed(&self);
    fn set_current_height(&self, height: u64);
}

pub trait ReadinessSink: Send + Sync {
    fn set_ready(&self, component: &str);
}

pub trait NetworkStatsRegistry: Send + Sync {
    fn set_network_stats(&self, chain: ChainId, stats: NetworkStats);
    fn add_error_count(&self, chain: ChainId, count: u64);
}

#[derive(Clone)]
pub struct Collaborators {
    pub metrics: Arc<dyn MetricsSink>,
    pub readiness: Arc<dyn ReadinessSink>,
    pub stats: Arc<dyn NetworkStatsRegistry>,
}

#[derive(Debug, Default)]
pub struct AtomicMetrics {
    observations_confirmed: AtomicU64,
    current_height: AtomicU64,
}

impl AtomicMetrics {
    pub fn observations_confirmed(&self) -> u64 {
        self.observations_confirmed.load(Ordering::Relaxed)
    }

    pub fn current_height(&self) -> u64 {
        self.current_height.load(Ordering::Relaxed)
    }
}

impl MetricsSink for AtomicMetrics {
    fn inc_observations_confirmed(&self) {
        self.observations_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    fn set_current_height(&self, height: u64) {
        self.current_height.store(height, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct ReadinessRegistry {
    ready: RwLock<HashSet<String>>,
}

impl ReadinessRegistry {
    pub fn is_ready(&self, component: &str) -> bool {
        self.ready
            .read()
            .expect("readiness registry poisoned")
            .contains(component)
    }
}

impl ReadinessSink for ReadinessRegistry {
    fn set_ready(&self, component: &str) {
        let mut ready = self.ready.write().expect("readiness registry poisoned");
        ready.insert(component.to_string());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    pub height: i64,
    pub contract_address: String,
    pub error_count: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryStatsRegistry {
    chains: RwLock<HashMap<ChainId, ChainStats>>,
}

impl InMemoryStatsRegistry {
    pub fn get(&self, chain: ChainId) -> Option<ChainStats> {
        self.chains
            .read()
            .expect("stats registry poisoned")
            .get(&chain)
            .cloned()
    }

    pub fn snapshot(&self) -> HashMap<ChainId, ChainStats> {
        self.chains.read().expect("stats registry poisoned").clone()
    }
}

impl NetworkStatsRegistry for InMemoryStatsRegistry {
    fn set_network_stats(&self, chain: ChainId, stats: NetworkStats) {
        let mut chains = self.chains.write().expect("stats registry poisoned");
        let entry = chains.entry(chain).or_default();
        entry.height = stats.height;
        entry.contract_address = stats.contract_address;
    }

    fn add_error_count(&self, chain: ChainId, count: u64) {
        let mut chains = self.chains.write().expect("stats registry poisoned");
        let entry = chains.entry(chain).or_default();
        entry.error_count = entry.error_count.saturating_add(count);
    }
}
