//! # Update Consumer
//!
//! Client side of the update stream: connects to one or more forwarder
//! backends, subscribes strategy topics and decodes their envelopes.
//!
//! ```no_run
//! # async fn run() -> update_consumer::Result<()> {
//! use std::time::Duration;
//! use network::Endpoint;
//! use update_consumer::UpdateConsumer;
//!
//! let endpoints = [Endpoint::tcp("127.0.0.1:9898")];
//! let mut consumer = UpdateConsumer::connect(&endpoints, &["3|5|4|SmallToBig"]).await?;
//! let result = consumer
//!     .follow("3|5|4|SmallToBig", |step| println!("{}", step.description), |_| {})
//!     .await?;
//! println!("solved in {} steps", result.step_count);
//! # Ok(())
//! # }
//! ```

pub mod consumer;
pub mod error;

pub use consumer::{TopicUpdate, UpdateConsumer, DEFAULT_RECEIVE_TIMEOUT};
pub use error::{ConsumerError, Result};
