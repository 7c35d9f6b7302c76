//! Mesh node: beaconing, beacon replies and peer liveness
//!
//! Two loops run side by side once the radio is ready:
//!
//! - the **beacon loop** broadcasts the beacon every `beacon_interval`;
//! - the **discovery loop** waits up to `client_timeout` for the inbox
//!   signal, handles at most one message, then evicts stale peers.
//!
//! Sends are best effort: a command timeout asks the radio for a reset and
//! is not surfaced further.

use loranet_modem::{RadioMessage, BROADCAST_ADDRESS};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::auth::beacon_response;
use crate::config::MeshConfig;
use crate::error::Result;
use crate::event::MeshEvent;
use crate::peer::{Peer, PeerTable, Upsert};
use crate::radio::Radio;

struct NodeInner<R> {
    radio: Arc<R>,
    config: MeshConfig,
    token: String,
    peers: PeerTable,
    events: broadcast::Sender<MeshEvent>,
}

/// A peer discovery node on top of a radio
pub struct MeshNode<R> {
    inner: Arc<NodeInner<R>>,
}

impl<R> Clone for MeshNode<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Radio + 'static> MeshNode<R> {
    /// Create a node; the configuration is validated first
    pub fn new(radio: Arc<R>, config: MeshConfig) -> Result<Self> {
        config.validate()?;
        let token = beacon_response(&config.beacon_message, &config.key);
        let (events, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            inner: Arc::new(NodeInner {
                radio,
                config,
                token,
                peers: PeerTable::new(),
                events,
            }),
        })
    }

    /// Node configuration
    pub fn config(&self) -> &MeshConfig {
        &self.inner.config
    }

    /// Token peers must answer our beacon with
    pub fn token(&self) -> &str {
        &self.inner.token
    }

    /// The peer table
    pub fn peer_table(&self) -> &PeerTable {
        &self.inner.peers
    }

    /// Current peers, ordered by node address
    pub fn peers(&self) -> Vec<Peer> {
        self.inner.peers.list()
    }

    /// Subscribe to mesh events
    pub fn subscribe(&self) -> broadcast::Receiver<MeshEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: MeshEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    async fn send_best_effort(&self, payload: &str, target: u16) -> bool {
        match self.inner.radio.send_message(payload, target).await {
            Ok(_) => true,
            Err(e) if e.is_timeout() => {
                warn!(target, "Radio timed out sending, requesting reset");
                self.inner.radio.request_reset();
                false
            }
            Err(e) => {
                warn!(target, error = %e, code = e.error_code(), "Send failed");
                false
            }
        }
    }

    /// Broadcast the beacon once
    pub async fn announce(&self) -> Result<()> {
        let beacon = &self.inner.config.beacon_message;
        self.inner
            .radio
            .send_message(beacon, BROADCAST_ADDRESS)
            .await?;
        self.emit(MeshEvent::BeaconSent {
            message: beacon.clone(),
        });
        Ok(())
    }

    /// Apply the beacon/reply rules to one received message
    pub async fn handle_message(&self, message: RadioMessage) {
        debug!(sender = message.sender, data = %message.data, "Handling message");
        self.emit(MeshEvent::MessageReceived(message.clone()));

        if message.data == self.inner.config.beacon_message {
            if self.send_best_effort(&self.inner.token, message.sender).await {
                debug!(to = message.sender, "Answered beacon");
                self.emit(MeshEvent::ReplySent { to: message.sender });
            }
        } else if message.data == self.inner.token {
            let (outcome, peer) = self
                .inner
                .peers
                .upsert(message.sender, message.rssi, message.snr);
            match outcome {
                Upsert::Inserted => {
                    info!(peer = peer.node_id, rssi = peer.rssi, snr = peer.snr, "Peer discovered");
                    self.emit(MeshEvent::PeerDiscovered(peer));
                }
                Upsert::Refreshed => {
                    debug!(peer = peer.node_id, rssi = peer.rssi, snr = peer.snr, "Peer refreshed");
                    self.emit(MeshEvent::PeerRefreshed(peer));
                }
            }
        }
    }

    /// Evict peers silent for longer than the client timeout
    pub fn sweep(&self) -> Vec<Peer> {
        let expired = self.inner.peers.sweep(self.inner.config.client_timeout);
        for peer in &expired {
            info!(peer = peer.node_id, "Removing stale peer");
            self.emit(MeshEvent::PeerExpired(peer.clone()));
        }
        expired
    }

    /// One discovery iteration: wait, handle at most one message, sweep
    pub async fn poll_once(&self) {
        let inbox = self.inner.radio.inbox();
        if tokio::time::timeout(self.inner.config.client_timeout, inbox.wait())
            .await
            .is_err()
        {
            trace!("No message within client timeout");
        }

        if let Some(message) = inbox.pop() {
            self.handle_message(message).await;
        }
        self.sweep();
        trace!(peers = self.inner.peers.len(), "Discovery pass done");
    }

    /// Run the discovery loop forever
    pub async fn run_discovery(&self) {
        loop {
            self.poll_once().await;
        }
    }

    /// Run the beacon loop forever
    pub async fn run_beacon(&self) {
        let config = &self.inner.config;
        info!(
            radio = %self.inner.radio.name(),
            beacon = %config.beacon_message,
            interval = ?config.beacon_interval,
            "Beaconing"
        );

        let mut ticker = tokio::time::interval(config.beacon_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self
                .send_best_effort(&config.beacon_message, BROADCAST_ADDRESS)
                .await
            {
                self.emit(MeshEvent::BeaconSent {
                    message: config.beacon_message.clone(),
                });
            }
        }
    }

    /// Wait for the radio, then run both loops
    pub async fn run(&self) {
        self.inner.radio.wait_ready().await;
        info!(radio = %self.inner.radio.name(), "Starting mesh node");
        tokio::join!(self.run_discovery(), self.run_beacon());
    }

    /// Spawn [`MeshNode::run`] on the runtime
    pub fn spawn(&self) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move { node.run().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeshConfigBuilder;
    use async_trait::async_trait;
    use loranet_modem::{Inbox, ModemError};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeRadio {
        inbox: Inbox,
        sent: Mutex<Vec<(String, u16)>>,
        resets: AtomicUsize,
        time_out: AtomicBool,
    }

    impl FakeRadio {
        fn sent(&self) -> Vec<(String, u16)> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Radio for FakeRadio {
        async fn send_message(&self, payload: &str, target: u16) -> loranet_modem::Result<String> {
            self.sent.lock().push((payload.to_string(), target));
            if self.time_out.load(Ordering::SeqCst) {
                return Err(ModemError::CommandTimeout {
                    command: format!("AT+SEND={},{},{}", target, payload.len(), payload),
                    timeout_ms: 5000,
                });
            }
            Ok("OK".to_string())
        }

        fn inbox(&self) -> &Inbox {
            &self.inbox
        }

        async fn wait_ready(&self) {}

        fn request_reset(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> String {
            "fake".to_string()
        }
    }

    fn message(sender: u16, data: &str, rssi: i32, snr: i32) -> RadioMessage {
        RadioMessage {
            sender,
            length: data.len(),
            data: data.to_string(),
            rssi,
            snr,
        }
    }

    fn node() -> (Arc<FakeRadio>, MeshNode<FakeRadio>) {
        let radio = Arc::new(FakeRadio::default());
        let node = MeshNode::new(radio.clone(), MeshConfig::default()).unwrap();
        (radio, node)
    }

    #[tokio::test]
    async fn test_beacon_is_answered_with_token() {
        let (radio, node) = node();
        let mut events = node.subscribe();

        node.handle_message(message(5, "HELLO", -40, 9)).await;

        let expected = beacon_response("HELLO", "zen");
        assert_eq!(radio.sent(), vec![(expected, 5)]);
        assert!(matches!(events.recv().await.unwrap(), MeshEvent::MessageReceived(_)));
        assert!(matches!(events.recv().await.unwrap(), MeshEvent::ReplySent { to: 5 }));
        assert!(node.peers().is_empty());
    }

    #[tokio::test]
    async fn test_token_inserts_then_refreshes_peer() {
        let (radio, node) = node();
        let mut events = node.subscribe();
        let token = node.token().to_string();

        node.handle_message(message(5, &token, -40, 9)).await;
        let peer = node.peer_table().get(5).unwrap();
        assert_eq!((peer.rssi, peer.snr), (-40, 9));

        node.handle_message(message(5, &token, -55, 3)).await;
        let peer = node.peer_table().get(5).unwrap();
        assert_eq!((peer.rssi, peer.snr), (-55, 3));
        assert_eq!(node.peers().len(), 1);
        assert!(radio.sent().is_empty());

        let mut labels = Vec::new();
        while let Ok(event) = events.try_recv() {
            if !matches!(event, MeshEvent::MessageReceived(_)) {
                labels.push(event.label());
            }
        }
        assert_eq!(labels, vec!["[+] 5", "[~] 5"]);
    }

    #[tokio::test]
    async fn test_wrong_token_is_ignored() {
        let other = beacon_response("HELLO", "other");
        let (radio, node) = node();
        node.handle_message(message(8, &other, -40, 9)).await;
        node.handle_message(message(8, "chat", -40, 9)).await;
        assert!(node.peers().is_empty());
        assert!(radio.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_handles_one_message_per_pass() {
        let (radio, node) = node();
        radio.inbox.push(message(1, "HELLO", -40, 9));
        radio.inbox.push(message(2, "HELLO", -40, 9));

        node.poll_once().await;
        assert_eq!(radio.inbox.len(), 1);
        // Most recent first
        assert_eq!(radio.sent()[0].1, 2);

        node.poll_once().await;
        assert!(radio.inbox.is_empty());
        assert_eq!(radio.sent()[1].1, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_peer_evicted_refreshed_peer_survives() {
        let (radio, node) = node();
        let token = node.token().to_string();
        node.handle_message(message(5, &token, -40, 9)).await;
        node.handle_message(message(6, &token, -45, 7)).await;
        let mut events = node.subscribe();

        tokio::time::advance(Duration::from_secs(301)).await;
        radio.inbox.push(message(6, &token, -47, 6));
        node.poll_once().await;

        assert!(!node.peer_table().contains(5));
        assert!(node.peer_table().contains(6));

        let mut expired = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let MeshEvent::PeerExpired(peer) = event {
                expired.push(peer.node_id);
            }
        }
        assert_eq!(expired, vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_poll_waits_client_timeout_then_sweeps() {
        let (_radio, node) = node();
        let token = node.token().to_string();
        node.handle_message(message(5, &token, -40, 9)).await;

        let started = tokio::time::Instant::now();
        node.poll_once().await;
        assert!(started.elapsed() >= Duration::from_secs(300));

        node.poll_once().await;
        assert!(node.peers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_beacon_timeout_requests_reset() {
        let radio = Arc::new(FakeRadio::default());
        radio.time_out.store(true, Ordering::SeqCst);
        let config = MeshConfigBuilder::new()
            .beacon_interval(Duration::from_secs(60))
            .build();
        let node = MeshNode::new(radio.clone(), config).unwrap();

        let task = {
            let node = node.clone();
            tokio::spawn(async move { node.run_beacon().await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(radio.sent(), vec![("HELLO".to_string(), 0)]);
        assert_eq!(radio.resets.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(radio.sent().len(), 2);
        assert_eq!(radio.resets.load(Ordering::SeqCst), 2);
        task.abort();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let radio = Arc::new(FakeRadio::default());
        let config = MeshConfigBuilder::new().key("").build();
        assert!(MeshNode::new(radio, config).is_err());
    }
}
