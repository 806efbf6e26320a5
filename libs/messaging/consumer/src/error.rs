//! Consumer error types

use network::TransportError;
use thiserror::Error;
use types::ErrorInfo;

#[derive(Error, Debug)]
pub enum ConsumerError {
    /// Connect was called without any publisher endpoint
    #[error("No publisher endpoints configured")]
    NoPublishers,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The strategy reported an error instead of completing
    #[error("Remote error: {0}")]
    Remote(ErrorInfo),

    #[error("Topic '{topic}' is not subscribed")]
    UnknownTopic { topic: String },

    #[error("Topic '{topic}' has already terminated")]
    TopicTerminated { topic: String },

    #[error("No update received within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

pub type Result<T> = std::result::Result<T, ConsumerError>;
