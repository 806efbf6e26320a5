//! Unix domain socket listener and client helpers.

use std::path::Path;

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Bind a socket file, replacing a stale one and creating parent directories
pub(crate) fn bind(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| {
            TransportError::network_with_source("Failed to remove existing socket", e)
        })?;
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            TransportError::network_with_source("Failed to create socket directory", e)
        })?;
    }

    let listener = UnixListener::bind(path)
        .map_err(|e| TransportError::network_with_source("Failed to bind Unix socket", e))?;
    info!("Unix socket listening on: {:?}", path);
    Ok(listener)
}

pub(crate) async fn connect(path: &Path) -> Result<UnixStream> {
    let stream = UnixStream::connect(path).await.map_err(|e| {
        TransportError::connection_with_source(
            "Failed to connect to Unix socket",
            path.display(),
            e,
        )
    })?;
    debug!("Connected to Unix socket: {:?}", path);
    Ok(stream)
}

/// Remove the socket file when the listener goes away
pub(crate) fn cleanup(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!("Socket file {:?} not removed: {}", path, e);
    }
}
