//! Event watcher for a single account's event handle on an Aptos node.
//!
//! [`ChainWatcher`] polls the handle, turns new events into
//! [`Publication`](aptwatch_types::Publication)s and answers reobservation
//! requests; node health feeds the injected [`Collaborators`].

mod chain_watcher;
mod config;
mod cursor;
mod error;
mod event_processor;
mod rpc_client;
mod sinks;

pub use chain_watcher::ChainWatcher;
pub use config::WatcherConfig;
pub use cursor::{Cursor, EventQuery};
pub use error::{DecodeError, ResponseError, SequenceMismatch, TransportError, WatcherError};
pub use event_processor::{decode_event, envelope_sequence, parse_events, parse_object};
pub use rpc_client::{EndpointClient, HttpClient};
pub use sinks::{
    AtomicMetrics, ChainStats, Collaborators, InMemoryStatsRegistry, MetricsSink,
    NetworkStatsRegistry, ReadinessRegistry, ReadinessSink,
};
