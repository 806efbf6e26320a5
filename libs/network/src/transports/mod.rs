//! Socket transports for multipart messages.
//!
//! [`Listener`] and [`Connection`] hide whether an [`Endpoint`] is TCP or a
//! Unix socket; both sides end up with a [`MultipartReader`] /
//! [`MultipartWriter`] pair over boxed stream halves.

pub mod framed;
mod tcp;
mod unix;

use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
pub use framed::{MultipartReader, MultipartWriter, DEFAULT_MAX_MESSAGE_SIZE};

/// Read half of any connection
pub type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
/// Write half of any connection
pub type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Bound server socket
pub enum Listener {
    Tcp(TcpListener),
    Unix { listener: UnixListener, path: PathBuf },
}

impl Listener {
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(_) => {
                let address = endpoint.bind_address().unwrap_or_default();
                Ok(Listener::Tcp(tcp::bind(&address).await?))
            }
            Endpoint::Unix(path) => Ok(Listener::Unix {
                listener: unix::bind(path)?,
                path: path.clone(),
            }),
        }
    }

    /// Endpoint clients should connect to (resolves TCP port 0)
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        match self {
            Listener::Tcp(listener) => {
                let addr = listener.local_addr().map_err(|e| {
                    TransportError::network_with_source("Failed to read local address", e)
                })?;
                Ok(Endpoint::Tcp(addr.to_string()))
            }
            Listener::Unix { path, .. } => Ok(Endpoint::Unix(path.clone())),
        }
    }

    /// Wait for the next client; returns the connection and a peer label for logs
    pub async fn accept(&self) -> Result<(Connection, String)> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await.map_err(|e| {
                    TransportError::network_with_source("Failed to accept TCP connection", e)
                })?;
                stream.set_nodelay(true).map_err(|e| {
                    TransportError::network_with_source("Failed to set TCP_NODELAY", e)
                })?;
                Ok((Connection::Tcp(stream), peer.to_string()))
            }
            Listener::Unix { listener, path } => {
                let (stream, _) = listener.accept().await.map_err(|e| {
                    TransportError::network_with_source("Failed to accept Unix connection", e)
                })?;
                Ok((Connection::Unix(stream), path.display().to_string()))
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Listener::Unix { path, .. } = self {
            unix::cleanup(path);
        }
    }
}

/// Established stream to a peer
pub enum Connection {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Connection {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(address) => {
                // A wildcard bind address is reachable on loopback
                let address = match address.strip_prefix("*:") {
                    Some(port) => format!("127.0.0.1:{port}"),
                    None => address.clone(),
                };
                Ok(Connection::Tcp(tcp::connect(&address).await?))
            }
            Endpoint::Unix(path) => Ok(Connection::Unix(unix::connect(path).await?)),
        }
    }

    /// Split into independently owned multipart reader and writer halves
    pub fn into_multipart(
        self,
        max_message_size: usize,
    ) -> (MultipartReader<BoxedRead>, MultipartWriter<BoxedWrite>) {
        let (read, write): (BoxedRead, BoxedWrite) = match self {
            Connection::Tcp(stream) => {
                let (r, w) = stream.into_split();
                (Box::new(r), Box::new(w))
            }
            Connection::Unix(stream) => {
                let (r, w) = stream.into_split();
                (Box::new(r), Box::new(w))
            }
        };
        (
            MultipartReader::with_max_size(read, max_message_size),
            MultipartWriter::new(write),
        )
    }
}
