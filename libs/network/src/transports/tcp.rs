//! TCP listener and client helpers.

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Bind `address` (`host:port`, port 0 picks a free port)
pub(crate) async fn bind(address: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(address).await.map_err(|e| {
        TransportError::network_with_source(format!("Failed to bind TCP listener on {address}"), e)
    })?;
    info!(address, local = ?listener.local_addr().ok(), "TCP listener bound");
    Ok(listener)
}

pub(crate) async fn connect(address: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect(address).await.map_err(|e| {
        TransportError::connection_with_source("Failed to connect over TCP", address, e)
    })?;
    // Updates are small and latency-sensitive
    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::network_with_source("Failed to set TCP_NODELAY", e))?;
    debug!(address, "connected over TCP");
    Ok(stream)
}
