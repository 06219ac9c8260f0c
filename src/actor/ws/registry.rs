//! Connection Registry
//!
//! Every open reload socket and the page it last reported. Shared by `Arc`
//! between the client tasks (register, update, unregister) and the router
//! (snapshot, unregister on failed send).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use crate::reload::page::PageMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A registered client. Cloned out by [`ConnectionRegistry::snapshot`].
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    /// `None` until the client reports its page
    pub page: Option<PageMetadata>,
    /// Frames queued here are written to the socket by the client task
    pub outbox: mpsc::Sender<String>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<FxHashMap<ConnectionId, Connection>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection. It has no page yet.
    pub fn register(&self, outbox: mpsc::Sender<String>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut connections = self.connections.lock();
        connections.insert(
            id,
            Connection {
                id,
                page: None,
                outbox,
            },
        );
        crate::debug!("ws"; "{} registered (total: {})", id, connections.len());
        id
    }

    /// Record the page a connection is viewing. Returns `false` if the
    /// connection is already gone.
    pub fn update_page(&self, id: ConnectionId, page: PageMetadata) -> bool {
        match self.connections.lock().get_mut(&id) {
            Some(conn) => {
                conn.page = Some(page);
                true
            }
            None => false,
        }
    }

    pub fn unregister(&self, id: ConnectionId) -> Option<Connection> {
        let mut connections = self.connections.lock();
        let removed = connections.remove(&id);
        if removed.is_some() {
            crate::debug!("ws"; "{} removed (remaining: {})", id, connections.len());
        }
        removed
    }

    /// Consistent copy of every connection, in no particular order.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections.lock().values().cloned().collect()
    }

    #[cfg(test)]
    pub fn page_of(&self, id: ConnectionId) -> Option<PageMetadata> {
        self.connections.lock().get(&id).and_then(|c| c.page.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every connection. Client writers stop once their outbox closes.
    pub fn clear(&self) -> usize {
        let mut connections = self.connections.lock();
        let n = connections.len();
        connections.clear();
        n
    }
}
