//! WebSocket Server for Live Reload
//!
//! Binds the reload port and hands accepted sockets to the WsActor, which
//! performs the handshake and owns the connection from then on.

use std::net::IpAddr;

use anyhow::{Result, anyhow};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::actor::messages::WsMsg;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Bind the reload socket and start accepting clients.
///
/// Returns the port actually bound, which may differ from `base_port` if it
/// was taken.
pub async fn start_ws_server(
    interface: IpAddr,
    base_port: u16,
    ws_tx: mpsc::Sender<WsMsg>,
) -> Result<u16> {
    let (listener, actual_port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES).await?;

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    crate::debug!("ws"; "client connected: {}", addr);
                    if ws_tx.send(WsMsg::AddClient(stream)).await.is_err() {
                        crate::debug!("ws"; "actor gone, stopping acceptor");
                        break;
                    }
                }
                Err(e) => {
                    crate::log!("ws"; "accept error: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    });

    Ok(actual_port)
}

/// Try binding to port, retry with incremented port if in use.
///
/// Port 0 asks the OS for any free port.
async fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind((interface, port)).await {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "failed to bind reload server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
