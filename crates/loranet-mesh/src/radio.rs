//! Radio seam between the mesh and the modem driver

use async_trait::async_trait;
use loranet_modem::{Inbox, Modem};

/// What the mesh needs from a radio
#[async_trait]
pub trait Radio: Send + Sync {
    /// Send a payload to a node (0 broadcasts)
    async fn send_message(&self, payload: &str, target: u16) -> loranet_modem::Result<String>;

    /// Inbox of received messages
    fn inbox(&self) -> &Inbox;

    /// Wait until the radio can send
    async fn wait_ready(&self);

    /// Ask for the radio to be reset
    fn request_reset(&self);

    /// Radio name (for logging)
    fn name(&self) -> String;
}

#[async_trait]
impl Radio for Modem {
    async fn send_message(&self, payload: &str, target: u16) -> loranet_modem::Result<String> {
        Modem::send_message(self, payload, target).await
    }

    fn inbox(&self) -> &Inbox {
        Modem::inbox(self)
    }

    async fn wait_ready(&self) {
        Modem::wait_ready(self).await
    }

    fn request_reset(&self) {
        Modem::request_reset(self)
    }

    fn name(&self) -> String {
        let config = self.config();
        format!("{}@{}", config.address, config.network_id)
    }
}
