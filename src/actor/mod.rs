//! Actor System for Live Reload
//!
//! Message-passing concurrency for serve mode:
//!
//! ```text
//! FsActor --> BuildActor --> WorkerPool
//! (watch)     (classify)     (isolated builds)
//!                 |
//!                 +--> BroadcastRouter --> clients (owned by WsActor)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `pool` - Warm, single-use build workers
//! - `build` - Classify, rebuild, route
//! - `ws` - Connection registry and targeted broadcast
//! - `coordinator` - Wires up and runs actors

pub mod build;
pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod pool;
pub mod ws;

pub use coordinator::Coordinator;
