//! Mesh events
//!
//! Events emitted by a mesh node for display or CLI layers.

use loranet_modem::RadioMessage;

use crate::peer::Peer;

/// Events emitted by the mesh node
#[derive(Debug, Clone)]
pub enum MeshEvent {
    /// A beacon was broadcast
    BeaconSent {
        /// Beacon payload
        message: String,
    },

    /// A message was taken from the inbox
    MessageReceived(RadioMessage),

    /// A beacon was answered with our token
    ReplySent {
        /// Node the token was sent to
        to: u16,
    },

    /// A node answered with a valid token for the first time
    PeerDiscovered(Peer),

    /// A known peer answered again
    PeerRefreshed(Peer),

    /// A peer was silent for longer than the client timeout
    PeerExpired(Peer),
}

impl MeshEvent {
    /// Short label for logs and displays
    pub fn label(&self) -> String {
        match self {
            MeshEvent::BeaconSent { message } => format!("[b] {}", message),
            MeshEvent::MessageReceived(msg) => format!("[{}] {}", msg.sender, msg.data),
            MeshEvent::ReplySent { to } => format!("[r] -> {}", to),
            MeshEvent::PeerDiscovered(peer) => format!("[+] {}", peer.node_id),
            MeshEvent::PeerRefreshed(peer) => format!("[~] {}", peer.node_id),
            MeshEvent::PeerExpired(peer) => format!("[-] {}", peer.node_id),
        }
    }
}
