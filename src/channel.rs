//! Outbound delivery seam between the engine and the socket layer.
//!
//! The socket task owns an `Arc<Connection>` for as long as the websocket is
//! open. Participants only keep a `Weak` to it, so a closed socket simply stops
//! receiving messages.

use crate::protocol::ServerMessage;
use crate::types::ConnId;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection {0} is closed")]
    Closed(ConnId),
}

/// Something a participant can be sent messages through
pub trait Outbound: Send + Sync {
    fn id(&self) -> &str;

    fn send(&self, msg: ServerMessage) -> Result<(), DeliveryError>;

    fn is_connected(&self) -> bool;
}

/// A websocket connection's outbound queue
#[derive(Debug)]
pub struct Connection {
    id: ConnId,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    /// Open a new connection queue. The receiver is drained by the socket task.
    pub fn open() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Self {
            id: ulid::Ulid::new().to_string(),
            tx,
        };
        (Arc::new(conn), rx)
    }
}

impl Outbound for Connection {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, msg: ServerMessage) -> Result<(), DeliveryError> {
        self.tx
            .send(msg)
            .map_err(|_| DeliveryError::Closed(self.id.clone()))
    }

    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}
