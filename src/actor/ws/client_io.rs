//! Per-connection socket handling.
//!
//! Each accepted client gets two halves:
//! - writer task: drains the connection's outbox into the socket
//! - reader loop: applies `page_info` reports to the registry
//!
//! The connection is registered before the first frame is read, so it
//! exists (without a page) from the moment the handshake completes.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tungstenite::protocol::Message;

use super::registry::{ConnectionId, ConnectionRegistry};
use crate::reload::message::ClientMessage;
use crate::reload::page::PageMetadata;

/// Frames buffered per connection before sends start waiting.
const OUTBOX_CAPACITY: usize = 16;

/// Handshake, register, and serve one client until it disconnects.
pub async fn serve_client(
    stream: TcpStream,
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".into());

    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            crate::log!("ws"; "handshake failed ({}): {}", peer, e);
            return;
        }
    };

    let (sink, mut source) = ws.split();
    let (outbox, inbox) = mpsc::channel::<String>(OUTBOX_CAPACITY);
    let id = registry.register(outbox);
    crate::debug!("ws"; "{} connected from {}", id, peer);

    let mut writer = tokio::spawn(write_loop(
        sink,
        inbox,
        Arc::clone(&registry),
        id,
        send_timeout,
    ));

    let reader = async {
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => handle_text(&registry, id, text.as_str()),
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    crate::debug!("ws"; "{} read error: {}", id, e);
                    break;
                }
            }
        }
    };

    // Either side ending ends the connection
    tokio::select! {
        _ = reader => {}
        _ = &mut writer => {}
    }

    registry.unregister(id);
    writer.abort();
    crate::debug!("ws"; "{} disconnected", id);
}

/// Drain the connection's outbox into the socket.
///
/// A frame the peer does not take within `send_timeout` drops the connection.
pub(super) async fn write_loop<S>(
    mut sink: S,
    mut inbox: mpsc::Receiver<String>,
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
    send_timeout: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(frame) = inbox.recv().await {
        match tokio::time::timeout(send_timeout, sink.send(Message::Text(frame.into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                crate::debug!("ws"; "{} write failed: {}", id, e);
                registry.unregister(id);
                return;
            }
            Err(_) => {
                crate::log!("ws"; "{} write timed out after {:?}, removing", id, send_timeout);
                registry.unregister(id);
                return;
            }
        }
    }
    // Outbox closed: unregistered or shutting down.
    let _ = sink.close().await;
}

/// Apply one client text frame.
pub(super) fn handle_text(registry: &ConnectionRegistry, id: ConnectionId, text: &str) {
    let Some(msg) = ClientMessage::from_json(text) else {
        crate::debug!("ws"; "{} sent unrecognized frame: {}", id, text);
        return;
    };

    let page = PageMetadata::from_client(&msg);
    crate::debug!(
        "ws";
        "{} viewing {} ({}{})",
        id,
        page.page_url(),
        page.page_type().as_str(),
        page.story_id().map(|s| format!(", {s}")).unwrap_or_default()
    );
    registry.update_page(id, page);
}
