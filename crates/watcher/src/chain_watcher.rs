use crate::config::WatcherConfig;
use crate::cursor::{Cursor, EventQuery};
use crate::error::{ResponseError, SequenceMismatch, WatcherError};
use crate::event_processor::{
    decode_event, envelope_sequence, json_u64, parse_events, parse_object,
};
use crate::rpc_client::EndpointClient;
use crate::sinks::Collaborators;
use aptwatch_types::{readiness, NetworkStats, ObservationRequest, Publication, Sequence};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

enum Work {
    Tick,
    Reobserve(ObservationRequest),
}

/// Watches one event handle and forwards what it finds as [`Publication`]s.
///
/// Ticks and observation requests are serviced one at a time on the task
/// that calls [`ChainWatcher::run`]; the cursor is only touched by ticks.
pub struct ChainWatcher<C> {
    config: WatcherConfig,
    client: C,
    events_url: String,
    health_url: String,
    cursor: Cursor,
    msg_tx: mpsc::Sender<Publication>,
    obsv_rx: mpsc::Receiver<ObservationRequest>,
    sinks: Collaborators,
}

impl<C: EndpointClient> ChainWatcher<C> {
    pub fn new(
        config: WatcherConfig,
        client: C,
        msg_tx: mpsc::Sender<Publication>,
        obsv_rx: mpsc::Receiver<ObservationRequest>,
        sinks: Collaborators,
    ) -> Self {
        let events_url = config.events_url();
        let health_url = config.health_url();
        Self {
            config,
            client,
            events_url,
            health_url,
            cursor: Cursor::new(),
            msg_tx,
            obsv_rx,
            sinks,
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Runs until `shutdown` fires or the node becomes unreachable.
    ///
    /// Never returns `Ok`: cancellation yields [`WatcherError::Cancelled`] and
    /// a failed request yields the transport error itself. Restarting is the
    /// caller's decision.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), WatcherError> {
        self.sinks.stats.set_network_stats(
            self.config.chain_id,
            NetworkStats {
                height: 0,
                contract_address: self.config.account.clone(),
            },
        );

        info!(
            url = %self.config.rpc_url,
            account = %self.config.account,
            handle = %self.config.handle,
            "watcher connecting to node"
        );

        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let work = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(WatcherError::Cancelled),
                _ = ticker.tick() => Work::Tick,
                Some(request) = self.obsv_rx.recv() => Work::Reobserve(request),
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(WatcherError::Cancelled),
                result = self.service(work) => result?,
            }
        }
    }

    async fn service(&mut self, work: Work) -> Result<(), WatcherError> {
        match work {
            Work::Tick => {
                self.poll_events().await?;
                self.check_health().await
            }
            Work::Reobserve(request) => self.handle_observation_request(request).await,
        }
    }

    async fn poll_events(&mut self) -> Result<(), WatcherError> {
        let url = self.cursor.query().to_url(&self.events_url);
        let body = self.fetch(&url).await?;
        let records = match parse_events(&body) {
            Ok(records) => records,
            Err(e) => {
                self.report_bad_response(&url, &e, &body);
                return Ok(());
            }
        };

        if self.cursor.is_bootstrap() {
            // The first poll only finds where the log ends; older events are skipped.
            if let Some(latest) = records.iter().find_map(envelope_sequence) {
                self.cursor.advance(latest);
                info!(
                    latest,
                    next_sequence = self.cursor.next_sequence(),
                    "cursor initialised from latest event"
                );
            }
            return Ok(());
        }

        for record in &records {
            let Some(sequence) = envelope_sequence(record) else {
                continue;
            };
            self.cursor.advance(sequence);
            self.observe(record, sequence).await?;
        }

        Ok(())
    }

    async fn handle_observation_request(
        &self,
        request: ObservationRequest,
    ) -> Result<(), WatcherError> {
        if request.chain_id != self.config.chain_id {
            error!(
                chain_id = request.chain_id,
                expected = self.config.chain_id,
                "observation request for another chain"
            );
            self.sinks.stats.add_error_count(self.config.chain_id, 1);
            return Ok(());
        }

        let Some(requested) = request.sequence() else {
            error!(
                len = request.tx_hash.len(),
                "observation request does not carry an 8-byte sequence"
            );
            self.sinks.stats.add_error_count(self.config.chain_id, 1);
            return Ok(());
        };

        info!(sequence = requested, "received observation request");

        let url = EventQuery::single(requested).to_url(&self.events_url);
        let body = self.fetch(&url).await?;
        let records = match parse_events(&body) {
            Ok(records) => records,
            Err(e) => {
                self.report_bad_response(&url, &e, &body);
                return Ok(());
            }
        };

        for record in &records {
            let Some(returned) = envelope_sequence(record) else {
                warn!(sequence = requested, "reobserved event has no sequence number");
                continue;
            };
            if returned != requested {
                let mismatch = SequenceMismatch { requested, returned };
                error!(error = %mismatch, "dropping reobserved event");
                continue;
            }
            self.observe(record, returned).await?;
        }

        Ok(())
    }

    async fn check_health(&self) -> Result<(), WatcherError> {
        let body = self.fetch(&self.health_url).await?;
        let health = match parse_object(&body) {
            Ok(health) => health,
            Err(e) => {
                self.report_bad_response(&self.health_url, &e, &body);
                return Ok(());
            }
        };

        let Some(height) = health.get("block_height").and_then(json_u64) else {
            debug!("health response has no block height");
            return Ok(());
        };

        debug!(height, "node health");

        self.sinks.metrics.set_current_height(height);
        self.sinks.stats.set_network_stats(
            self.config.chain_id,
            NetworkStats {
                height: i64::try_from(height).unwrap_or(i64::MAX),
                contract_address: self.config.account.clone(),
            },
        );
        self.sinks.readiness.set_ready(readiness::APTOS_SYNCING);

        Ok(())
    }

    /// Decodes a record's `data` and emits it; bad records are logged and skipped.
    async fn observe(&self, record: &Value, sequence: Sequence) -> Result<(), WatcherError> {
        let Some(data) = record.get("data") else {
            warn!(sequence, "event has no data");
            return Ok(());
        };

        match decode_event(self.config.chain_id, sequence, data) {
            Ok(publication) => self.publish(publication).await,
            Err(e) => {
                warn!(sequence, error = %e, "skipping undecodable event");
                Ok(())
            }
        }
    }

    async fn publish(&self, publication: Publication) -> Result<(), WatcherError> {
        self.sinks.metrics.inc_observations_confirmed();

        info!(
            tx_hash = %hex::encode(publication.tx_hash),
            timestamp = %publication.timestamp,
            nonce = publication.nonce,
            sequence = publication.sequence,
            emitter_chain = publication.emitter_chain,
            emitter_address = %hex::encode(publication.emitter_address),
            payload = %hex::encode(&publication.payload),
            consistency_level = publication.consistency_level,
            "message observed"
        );

        self.msg_tx
            .send(publication)
            .await
            .map_err(|_| WatcherError::PublicationChannelClosed)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, WatcherError> {
        self.client.fetch(url).await.map_err(|e| {
            error!(url, error = %e, "request to node failed");
            self.sinks.stats.add_error_count(self.config.chain_id, 1);
            WatcherError::from(e)
        })
    }

    fn report_bad_response(&self, url: &str, error: &ResponseError, body: &[u8]) {
        error!(
            url,
            error = %error,
            body = %String::from_utf8_lossy(body),
            "invalid response from node"
        );
        self.sinks.stats.add_error_count(self.config.chain_id, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::sinks::{AtomicMetrics, InMemoryStatsRegistry, ReadinessRegistry};
    use aptwatch_types::{chain_ids, tx_hash_from_sequence};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::timeout;

    const EVENTS: &str = "http://node/v1/accounts/0xabc/events/handle/event";
    const HEALTH: &str = "http://node/v1";

    /// Replays scripted responses per URL; the last one for a URL repeats.
    #[derive(Clone, Default)]
    struct MockClient {
        inner: Arc<Mutex<MockInner>>,
    }

    #[derive(Default)]
    struct MockInner {
        responses: HashMap<String, VecDeque<Result<Vec<u8>, TransportError>>>,
        requests: Vec<String>,
    }

    impl MockClient {
        fn push(&self, url: &str, response: Result<Vec<u8>, TransportError>) {
            let mut inner = self.inner.lock().unwrap();
            inner
                .responses
                .entry(url.to_string())
                .or_default()
                .push_back(response);
        }

        fn respond(&self, url: &str, body: Value) {
            self.push(url, Ok(body.to_string().into_bytes()));
        }

        fn respond_raw(&self, url: &str, body: &str) {
            self.push(url, Ok(body.as_bytes().to_vec()));
        }

        fn fail(&self, url: &str) {
            self.push(url, Err(TransportError::new(url, "connection refused")));
        }

        fn requests(&self) -> Vec<String> {
            self.inner.lock().unwrap().requests.clone()
        }
    }

    #[async_trait]
    impl EndpointClient for MockClient {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push(url.to_string());
            let queue = inner.responses.get_mut(url);
            match queue {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().cloned().unwrap(),
                None => Err(TransportError::new(url, "no scripted response")),
            }
        }
    }

    struct Harness {
        watcher: ChainWatcher<MockClient>,
        client: MockClient,
        publications: mpsc::Receiver<Publication>,
        requests: mpsc::Sender<ObservationRequest>,
        metrics: Arc<AtomicMetrics>,
        readiness: Arc<ReadinessRegistry>,
        stats: Arc<InMemoryStatsRegistry>,
    }

    fn harness() -> Harness {
        let config = WatcherConfig {
            chain_id: chain_ids::APTOS,
            rpc_url: "http://node".to_string(),
            account: "0xabc".to_string(),
            handle: "handle".to_string(),
            poll_interval_ms: 10,
        };
        let client = MockClient::default();
        let (msg_tx, publications) = mpsc::channel(16);
        let (requests, obsv_rx) = mpsc::channel(16);
        let metrics = Arc::new(AtomicMetrics::default());
        let readiness = Arc::new(ReadinessRegistry::default());
        let stats = Arc::new(InMemoryStatsRegistry::default());
        let sinks = Collaborators {
            metrics: metrics.clone(),
            readiness: readiness.clone(),
            stats: stats.clone(),
        };

        Harness {
            watcher: ChainWatcher::new(config, client.clone(), msg_tx, obsv_rx, sinks),
            client,
            publications,
            requests,
            metrics,
            readiness,
            stats,
        }
    }

    fn event(sequence: u64) -> Value {
        json!({
            "sequence_number": sequence.to_string(),
            "data": {
                "sender": "0x0000000000000000000000000000000000000000000000000000000000000001",
                "payload": "0x01020304",
                "ts": "1665000000",
                "nonce": "0",
                "sequence": sequence.to_string(),
                "consistency_level": 0
            }
        })
    }

    fn drain(publications: &mut mpsc::Receiver<Publication>) -> Vec<Publication> {
        let mut out = Vec::new();
        while let Ok(publication) = publications.try_recv() {
            out.push(publication);
        }
        out
    }

    async fn bootstrapped(latest: u64) -> Harness {
        let mut h = harness();
        h.client.respond(&format!("{EVENTS}?limit=1"), json!([event(latest)]));
        h.watcher.poll_events().await.unwrap();
        h
    }

    #[tokio::test]
    async fn test_bootstrap_sets_cursor_without_emitting() {
        let mut h = bootstrapped(5).await;

        assert_eq!(h.watcher.cursor().next_sequence(), 6);
        assert!(drain(&mut h.publications).is_empty());
        assert_eq!(h.metrics.observations_confirmed(), 0);
        assert_eq!(h.client.requests(), vec![format!("{EVENTS}?limit=1")]);
    }

    #[tokio::test]
    async fn test_bootstrap_only_consults_first_record() {
        let mut h = harness();
        h.client.respond(
            &format!("{EVENTS}?limit=1"),
            json!([event(5), event(6), event(7)]),
        );

        h.watcher.poll_events().await.unwrap();

        assert_eq!(h.watcher.cursor().next_sequence(), 6);
        assert!(drain(&mut h.publications).is_empty());
        assert_eq!(h.metrics.observations_confirmed(), 0);
    }

    #[tokio::test]
    async fn test_max_sequence_is_published_once() {
        let mut h = harness();
        h.client.respond(&format!("{EVENTS}?limit=1"), json!([event(5)]));
        h.client.respond(&format!("{EVENTS}?limit=1"), json!([event(u64::MAX)]));
        h.client.respond(&format!("{EVENTS}?start=6"), json!([event(u64::MAX)]));

        for _ in 0..4 {
            h.watcher.poll_events().await.unwrap();
        }

        let published = drain(&mut h.publications);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].sequence, u64::MAX);
        assert!(h.watcher.cursor().is_bootstrap());
        assert_eq!(
            h.client.requests().last(),
            Some(&format!("{EVENTS}?limit=1"))
        );
    }

    #[tokio::test]
    async fn test_bootstrap_with_empty_log_stays_uninitialised() {
        let mut h = harness();
        h.client.respond(&format!("{EVENTS}?limit=1"), json!([]));

        h.watcher.poll_events().await.unwrap();

        assert!(h.watcher.cursor().is_bootstrap());
    }

    #[tokio::test]
    async fn test_steady_state_emits_in_order_and_advances() {
        let mut h = bootstrapped(5).await;
        h.client.respond(&format!("{EVENTS}?start=6"), json!([event(6), event(7)]));

        h.watcher.poll_events().await.unwrap();

        let published = drain(&mut h.publications);
        let sequences: Vec<u64> = published.iter().map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![6, 7]);
        assert_eq!(published[0].tx_hash, tx_hash_from_sequence(6));
        assert_eq!(published[1].emitter_chain, chain_ids::APTOS);
        assert_eq!(h.watcher.cursor().next_sequence(), 8);
        assert_eq!(h.metrics.observations_confirmed(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_event_still_advances_cursor() {
        let mut h = bootstrapped(5).await;
        let mut poison = event(6);
        poison["data"]["payload"] = json!("0xnothex");
        h.client.respond(&format!("{EVENTS}?start=6"), json!([poison, event(7)]));

        h.watcher.poll_events().await.unwrap();

        let published = drain(&mut h.publications);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].sequence, 7);
        assert_eq!(h.watcher.cursor().next_sequence(), 8);
    }

    #[tokio::test]
    async fn test_records_without_sequence_or_data() {
        let mut h = bootstrapped(5).await;
        h.client.respond(
            &format!("{EVENTS}?start=6"),
            json!([
                {"sequence_number": "6"},
                {"data": event(9)["data"].clone()},
                event(7)
            ]),
        );

        h.watcher.poll_events().await.unwrap();

        let published = drain(&mut h.publications);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].sequence, 7);
        assert_eq!(h.watcher.cursor().next_sequence(), 8);
    }

    #[tokio::test]
    async fn test_malformed_body_leaves_cursor_alone() {
        let mut h = bootstrapped(5).await;
        h.client.respond_raw(&format!("{EVENTS}?start=6"), "<html>bad gateway</html>");

        tokio_test::assert_ok!(h.watcher.poll_events().await);

        assert_eq!(h.watcher.cursor().next_sequence(), 6);
        assert!(drain(&mut h.publications).is_empty());
        assert_eq!(h.stats.get(chain_ids::APTOS).unwrap().error_count, 1);
    }

    #[tokio::test]
    async fn test_error_object_is_treated_as_bad_response() {
        let mut h = bootstrapped(5).await;
        h.client.respond(
            &format!("{EVENTS}?start=6"),
            json!({"message": "resource not found", "error_code": "resource_not_found"}),
        );

        tokio_test::assert_ok!(h.watcher.poll_events().await);

        assert_eq!(h.watcher.cursor().next_sequence(), 6);
        assert_eq!(h.stats.get(chain_ids::APTOS).unwrap().error_count, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_on_poll_is_fatal() {
        let mut h = bootstrapped(5).await;
        h.client.fail(&format!("{EVENTS}?start=6"));

        let err = h.watcher.poll_events().await.unwrap_err();

        assert!(matches!(
            err,
            WatcherError::Transport(ref e) if e.url == format!("{EVENTS}?start=6")
        ));
        assert_eq!(h.watcher.cursor().next_sequence(), 6);
        assert_eq!(h.stats.get(chain_ids::APTOS).unwrap().error_count, 1);
    }

    #[tokio::test]
    async fn test_reobservation_emits_matching_event() {
        let mut h = bootstrapped(10).await;
        h.client.respond(&format!("{EVENTS}?start=6&limit=1"), json!([event(6)]));

        h.watcher
            .handle_observation_request(ObservationRequest::for_sequence(chain_ids::APTOS, 6))
            .await
            .unwrap();

        let published = drain(&mut h.publications);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].sequence, 6);
        assert_eq!(published[0].tx_hash, tx_hash_from_sequence(6));
        assert_eq!(h.watcher.cursor().next_sequence(), 11);
    }

    #[tokio::test]
    async fn test_reobservation_drops_mismatched_sequence() {
        let mut h = harness();
        h.client.respond(&format!("{EVENTS}?start=6&limit=1"), json!([event(7)]));

        h.watcher
            .handle_observation_request(ObservationRequest::for_sequence(chain_ids::APTOS, 6))
            .await
            .unwrap();

        assert!(drain(&mut h.publications).is_empty());
        assert!(h.watcher.cursor().is_bootstrap());
    }

    #[tokio::test]
    async fn test_reobservation_drops_undecodable_event() {
        let mut h = harness();
        let mut broken = event(6);
        broken["data"].as_object_mut().unwrap().remove("nonce");
        h.client.respond(&format!("{EVENTS}?start=6&limit=1"), json!([broken]));

        h.watcher
            .handle_observation_request(ObservationRequest::for_sequence(chain_ids::APTOS, 6))
            .await
            .unwrap();

        assert!(drain(&mut h.publications).is_empty());
    }

    #[tokio::test]
    async fn test_reobservation_rejects_foreign_or_malformed_requests() {
        let mut h = harness();

        h.watcher
            .handle_observation_request(ObservationRequest::for_sequence(chain_ids::ETHEREUM, 6))
            .await
            .unwrap();
        h.watcher
            .handle_observation_request(ObservationRequest {
                chain_id: chain_ids::APTOS,
                tx_hash: vec![6],
            })
            .await
            .unwrap();

        assert!(h.client.requests().is_empty());
        assert!(drain(&mut h.publications).is_empty());
        assert_eq!(h.stats.get(chain_ids::APTOS).unwrap().error_count, 2);
    }

    #[tokio::test]
    async fn test_health_updates_collaborators() {
        let h = harness();
        h.client.respond(HEALTH, json!({"chain_id": 4, "block_height": "100"}));

        h.watcher.check_health().await.unwrap();

        assert_eq!(h.metrics.current_height(), 100);
        assert!(h.readiness.is_ready(readiness::APTOS_SYNCING));
        let stats = h.stats.get(chain_ids::APTOS).unwrap();
        assert_eq!(stats.height, 100);
        assert_eq!(stats.contract_address, "0xabc");
    }

    #[tokio::test]
    async fn test_health_without_height_is_not_ready() {
        let h = harness();
        h.client.respond(HEALTH, json!({"chain_id": 4}));

        h.watcher.check_health().await.unwrap();

        assert!(!h.readiness.is_ready(readiness::APTOS_SYNCING));
        assert_eq!(h.metrics.current_height(), 0);
    }

    #[tokio::test]
    async fn test_run_returns_health_transport_error() {
        let h = harness();
        h.client.respond(&format!("{EVENTS}?limit=1"), json!([]));
        h.client.fail(HEALTH);

        let result = timeout(
            Duration::from_secs(5),
            h.watcher.run(CancellationToken::new()),
        )
        .await
        .expect("watcher should stop on its own");

        assert!(matches!(result, Err(WatcherError::Transport(ref e)) if e.url == HEALTH));
    }

    #[tokio::test]
    async fn test_run_stops_immediately_when_cancelled() {
        let h = harness();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let result = h.watcher.run(shutdown).await;

        assert!(matches!(result, Err(WatcherError::Cancelled)));
        assert!(h.client.requests().is_empty());
        assert_eq!(
            h.stats.get(chain_ids::APTOS).unwrap().contract_address,
            "0xabc"
        );
    }

    #[tokio::test]
    async fn test_run_polls_and_serves_requests() {
        let Harness {
            watcher,
            client,
            mut publications,
            requests,
            readiness: ready,
            ..
        } = harness();
        client.respond(&format!("{EVENTS}?limit=1"), json!([event(5)]));
        client.respond(&format!("{EVENTS}?start=6"), json!([event(6), event(7)]));
        client.respond(&format!("{EVENTS}?start=8"), json!([]));
        client.respond(&format!("{EVENTS}?start=3&limit=1"), json!([event(3)]));
        client.respond(HEALTH, json!({"block_height": "100"}));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(watcher.run(shutdown.clone()));

        let mut sequences = Vec::new();
        for _ in 0..2 {
            let publication = timeout(Duration::from_secs(5), publications.recv())
                .await
                .expect("publication in time")
                .expect("channel open");
            sequences.push(publication.sequence);
        }
        assert_eq!(sequences, vec![6, 7]);

        requests
            .send(ObservationRequest::for_sequence(chain_ids::APTOS, 3))
            .await
            .unwrap();
        let reobserved = timeout(Duration::from_secs(5), publications.recv())
            .await
            .expect("reobservation in time")
            .expect("channel open");
        assert_eq!(reobserved.sequence, 3);
        assert!(ready.is_ready(readiness::APTOS_SYNCING));

        shutdown.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(WatcherError::Cancelled)));
    }
}
