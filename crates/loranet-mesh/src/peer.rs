//! Peer table
//!
//! Tracks nodes that completed the beacon exchange, keyed by node address.
//! Liveness uses the runtime clock; wall-clock timestamps are kept for
//! display only.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// A node that answered our beacon with a valid token
#[derive(Debug, Clone, Serialize)]
pub struct Peer {
    /// Node address
    pub node_id: u16,
    /// Signal strength of the last accepted reply
    pub rssi: i32,
    /// Signal-to-noise ratio of the last accepted reply
    pub snr: i32,
    /// When first accepted
    pub first_seen: DateTime<Utc>,
    /// When last accepted
    pub last_seen_at: DateTime<Utc>,
    /// Runtime clock of the last accepted reply
    #[serde(skip)]
    pub last_seen: Instant,
}

impl Peer {
    /// Create a peer seen just now
    pub fn new(node_id: u16, rssi: i32, snr: i32) -> Self {
        let now = Utc::now();
        Self {
            node_id,
            rssi,
            snr,
            first_seen: now,
            last_seen_at: now,
            last_seen: Instant::now(),
        }
    }

    /// Record a fresh reply
    pub fn touch(&mut self, rssi: i32, snr: i32) {
        self.rssi = rssi;
        self.snr = snr;
        self.last_seen_at = Utc::now();
        self.last_seen = Instant::now();
    }

    /// Time since last seen
    pub fn time_since_seen(&self) -> Duration {
        self.last_seen.elapsed()
    }

    /// Whether the peer has been silent for longer than `timeout`
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.time_since_seen() > timeout
    }
}

/// Outcome of recording a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The node was not in the table
    Inserted,
    /// The node's entry was refreshed
    Refreshed,
}

/// Known peers
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: RwLock<HashMap<u16, Peer>>,
}

impl PeerTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a peer
    pub fn upsert(&self, node_id: u16, rssi: i32, snr: i32) -> (Upsert, Peer) {
        let mut peers = self.peers.write();
        match peers.get_mut(&node_id) {
            Some(peer) => {
                peer.touch(rssi, snr);
                (Upsert::Refreshed, peer.clone())
            }
            None => {
                let peer = Peer::new(node_id, rssi, snr);
                peers.insert(node_id, peer.clone());
                (Upsert::Inserted, peer)
            }
        }
    }

    /// Remove and return peers silent for longer than `timeout`
    pub fn sweep(&self, timeout: Duration) -> Vec<Peer> {
        let mut peers = self.peers.write();
        let expired: Vec<u16> = peers
            .values()
            .filter(|p| p.is_expired(timeout))
            .map(|p| p.node_id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| peers.remove(&id))
            .collect()
    }

    /// Look up a peer
    pub fn get(&self, node_id: u16) -> Option<Peer> {
        self.peers.read().get(&node_id).cloned()
    }

    /// Whether a node is in the table
    pub fn contains(&self, node_id: u16) -> bool {
        self.peers.read().contains_key(&node_id)
    }

    /// All peers, ordered by node address
    pub fn list(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.peers.read().values().cloned().collect();
        peers.sort_by_key(|p| p.node_id);
        peers
    }

    /// Number of peers
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_upsert_and_refresh() {
        let table = PeerTable::new();
        let (outcome, peer) = table.upsert(5, -40, 9);
        assert_eq!(outcome, Upsert::Inserted);
        assert_eq!(peer.rssi, -40);

        tokio::time::advance(Duration::from_secs(10)).await;
        let (outcome, peer) = table.upsert(5, -70, 2);
        assert_eq!(outcome, Upsert::Refreshed);
        assert_eq!((peer.rssi, peer.snr), (-70, 2));
        assert_eq!(peer.time_since_seen(), Duration::ZERO);
        assert_eq!(table.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_only_stale_peers() {
        let table = PeerTable::new();
        let timeout = Duration::from_secs(300);
        table.upsert(1, -50, 5);
        table.upsert(2, -60, 4);

        tokio::time::advance(Duration::from_secs(299)).await;
        table.upsert(2, -61, 4);
        assert!(table.sweep(timeout).is_empty());

        tokio::time::advance(Duration::from_secs(2)).await;
        let expired = table.sweep(timeout);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].node_id, 1);
        assert!(!table.contains(1));
        assert!(table.contains(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_at_exact_timeout_survives() {
        let table = PeerTable::new();
        table.upsert(3, -50, 5);
        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(table.sweep(Duration::from_secs(300)).is_empty());
    }
}
