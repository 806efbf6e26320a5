//! Network Infrastructure
//!
//! Socket endpoints, multipart message framing and the publish/subscribe
//! plumbing used between workers, the relay and consumers:
//!
//! - [`transports`]: TCP and Unix listeners/connections carrying multipart messages
//! - [`inproc`]: the process-local channel publishers write into
//! - [`subscription`]: prefix subscription commands and per-connection filters
//! - [`subscriber`]: client connections to one or more relays
//! - [`signal`]: wake signals for idle workers

pub mod endpoint;
pub mod error;
pub mod inproc;
pub mod signal;
pub mod subscriber;
pub mod subscription;
pub mod transports;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use inproc::{InprocConnector, InprocReceiver, Publisher};
pub use signal::{LocalSignalSender, SignalSender, WakeSignal};
pub use subscriber::Subscriber;
pub use subscription::{SubscriptionCommand, TopicFilter};
pub use transports::{Connection, Listener, MultipartReader, MultipartWriter, DEFAULT_MAX_MESSAGE_SIZE};

/// Default capacity of the in-process publish channel
pub const DEFAULT_INPROC_CAPACITY: usize = 4096;
