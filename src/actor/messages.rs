//! Actor Message Definitions
//!
//! ```text
//! FsActor --Rebuild--> BuildActor --route--> BroadcastRouter
//! ws server --AddClient--> WsActor
//! ```

use super::fs::ChangeSet;

/// Messages to Build Actor
#[derive(Debug)]
pub enum BuildMsg {
    /// One debounced trigger
    Rebuild(ChangeSet),
    /// Finish the current build, then stop
    Shutdown,
}

/// Messages to WebSocket Actor
#[derive(Debug)]
pub enum WsMsg {
    /// Accepted TCP connection awaiting the WebSocket handshake
    AddClient(tokio::net::TcpStream),
    /// Close every connection and stop
    Shutdown,
}
