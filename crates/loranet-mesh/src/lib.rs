//! One-hop peer discovery over LoRa modems
//!
//! Every node periodically broadcasts a beacon. A node hearing the beacon
//! answers the sender with a token derived from the beacon and a shared
//! key; the beaconing node records senders of valid tokens as peers and
//! evicts peers it has not heard from within the client timeout.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use loranet_mesh::{MeshConfig, MeshNode};
//! use std::sync::Arc;
//!
//! let node = MeshNode::new(Arc::new(modem), MeshConfig::default())?;
//! let mut events = node.subscribe();
//! node.spawn();
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.label());
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod event;
pub mod node;
pub mod peer;
pub mod radio;

pub use auth::beacon_response;
pub use config::{MeshConfig, MeshConfigBuilder};
pub use error::{MeshError, Result};
pub use event::MeshEvent;
pub use node::MeshNode;
pub use peer::{Peer, PeerTable, Upsert};
pub use radio::Radio;
