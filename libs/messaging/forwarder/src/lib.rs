//! # Forwarder
//!
//! Relays update messages from in-process publishers to socket subscribers.
//!
//! ```text
//! strategy task ──Publisher──┐
//! strategy task ──Publisher──┼─> inproc channel ─> ClientManager ─> subscriber sockets
//! strategy task ──Publisher──┘                     (prefix filter per connection)
//! ```
//!
//! Messages are relayed verbatim: same frames, same order. A message is
//! delivered to every connection with a subscription prefix matching its
//! first frame and dropped when there is none.

pub mod bridge;
pub mod client;
pub mod config;

pub use bridge::{ForwarderBridge, ForwarderHandle};
pub use client::{ClientManager, ConnectionId, ForwarderStats};
pub use config::ForwarderConfig;
