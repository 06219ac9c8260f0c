//! Reload Module
//!
//! The pieces of live reload that are not actors:
//!
//! - `classify` - which clients a changed path affects
//! - `content` - reading rebuilt story HTML for morph updates
//! - `message` - wire messages (server → client reloads, client → server page info)
//! - `page` - what page a client reports viewing
//! - `server` - WebSocket accept loop

pub mod classify;
pub mod content;
pub mod message;
pub mod page;
pub mod server;
