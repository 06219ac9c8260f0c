//! WebSocket Actor - Bidirectional Communication
//!
//! This actor is responsible for:
//! - Accepting reload clients handed over by the ws server
//! - Tracking each client's page in the [`ConnectionRegistry`]
//! - Closing every connection on shutdown
//!
//! Outbound reloads go through the [`BroadcastRouter`], which shares the
//! registry.
//!
//! ```text
//! BuildActor --route--> BroadcastRouter --outbox--> client task --> Browser
//!                              |                        ^               |
//!                      ConnectionRegistry <--page_info--+---------------+
//! ```

mod client_io;
mod registry;
mod router;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::messages::WsMsg;

pub use registry::{Connection, ConnectionId, ConnectionRegistry};
pub use router::{BroadcastRouter, DEFAULT_SEND_TIMEOUT, RouteReport, coalesce};

/// WebSocket Actor - owns client lifecycles
pub struct WsActor {
    rx: mpsc::Receiver<WsMsg>,
    registry: Arc<ConnectionRegistry>,
    /// Bound on one socket write before the client is dropped
    send_timeout: Duration,
}

impl WsActor {
    pub fn new(
        rx: mpsc::Receiver<WsMsg>,
        registry: Arc<ConnectionRegistry>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            rx,
            registry,
            send_timeout,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                WsMsg::AddClient(stream) => {
                    tokio::spawn(client_io::serve_client(
                        stream,
                        Arc::clone(&self.registry),
                        self.send_timeout,
                    ));
                }
                WsMsg::Shutdown => {
                    let closed = self.registry.clear();
                    crate::debug!("ws"; "shutting down, closed {} connection(s)", closed);
                    break;
                }
            }
        }
    }
}
