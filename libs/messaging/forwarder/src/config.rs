//! Forwarder configuration

use network::{Endpoint, TransportError, DEFAULT_INPROC_CAPACITY, DEFAULT_MAX_MESSAGE_SIZE};

/// Default depth of the fan-out channel; slower subscribers lag past this
pub const DEFAULT_BROADCAST_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Externally advertised endpoint subscribers connect to
    pub backend: Endpoint,
    pub frontend_capacity: usize,
    pub broadcast_capacity: usize,
    pub max_message_size: usize,
    pub worker_threads: usize,
}

impl ForwarderConfig {
    pub fn new(backend: Endpoint) -> Self {
        Self {
            backend,
            frontend_capacity: DEFAULT_INPROC_CAPACITY,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            worker_threads: 2,
        }
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn validate(&self) -> Result<(), TransportError> {
        let checks = [
            (self.frontend_capacity, "frontend_capacity"),
            (self.broadcast_capacity, "broadcast_capacity"),
            (self.max_message_size, "max_message_size"),
            (self.worker_threads, "worker_threads"),
        ];
        for (value, field) in checks {
            if value == 0 {
                return Err(TransportError::configuration(
                    format!("{field} must be greater than zero"),
                    Some(field),
                ));
            }
        }
        Ok(())
    }
}
