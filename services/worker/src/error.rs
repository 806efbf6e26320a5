//! Dispatcher error types

use network::TransportError;
use thiserror::Error;

/// Failures that stop the dispatcher loop.
///
/// Per-job problems (undecodable bodies, strategy errors, panicked tasks,
/// queue failures) are reported as a [`CycleOutcome`](crate::CycleOutcome)
/// instead.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Publishing failed, which means the forwarder is gone
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
