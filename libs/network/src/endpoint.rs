//! Socket endpoint addresses: `tcp://host:port` or `unix:///path/to.sock`.
//!
//! `tcp://*:port` binds on every interface.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Endpoint {
    /// `host:port`, resolved when binding or connecting
    Tcp(String),
    Unix(PathBuf),
}

impl Endpoint {
    pub fn tcp(address: impl Into<String>) -> Self {
        Endpoint::Tcp(address.into())
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Endpoint::Unix(path.into())
    }

    /// Address handed to the OS when binding (`*` becomes `0.0.0.0`)
    pub(crate) fn bind_address(&self) -> Option<String> {
        match self {
            Endpoint::Tcp(address) => Some(match address.strip_prefix("*:") {
                Some(port) => format!("0.0.0.0:{port}"),
                None => address.clone(),
            }),
            Endpoint::Unix(_) => None,
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(address) = s.strip_prefix("tcp://") {
            let Some((host, port)) = address.rsplit_once(':') else {
                return Err(TransportError::configuration(
                    format!("tcp endpoint '{s}' has no port"),
                    Some("endpoint"),
                ));
            };
            if host.is_empty() || port.parse::<u16>().is_err() {
                return Err(TransportError::configuration(
                    format!("invalid tcp endpoint '{s}'"),
                    Some("endpoint"),
                ));
            }
            Ok(Endpoint::Tcp(address.to_string()))
        } else if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(TransportError::configuration(
                    "unix endpoint has an empty path",
                    Some("endpoint"),
                ));
            }
            Ok(Endpoint::Unix(PathBuf::from(path)))
        } else {
            Err(TransportError::configuration(
                format!("unsupported endpoint '{s}': expected tcp:// or unix://"),
                Some("endpoint"),
            ))
        }
    }
}

impl TryFrom<String> for Endpoint {
    type Error = TransportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(address) => write!(f, "tcp://{address}"),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let tcp: Endpoint = "tcp://127.0.0.1:9898".parse().unwrap();
        assert_eq!(tcp, Endpoint::tcp("127.0.0.1:9898"));
        assert_eq!(tcp.to_string(), "tcp://127.0.0.1:9898");

        let unix: Endpoint = "unix:///tmp/buckets/updates.sock".parse().unwrap();
        assert_eq!(unix, Endpoint::unix("/tmp/buckets/updates.sock"));
        assert_eq!(unix.to_string(), "unix:///tmp/buckets/updates.sock");
    }

    #[test]
    fn test_wildcard_bind_address() {
        let endpoint: Endpoint = "tcp://*:9898".parse().unwrap();
        assert_eq!(endpoint.bind_address().as_deref(), Some("0.0.0.0:9898"));
    }

    #[test]
    fn test_rejects_bad_endpoints() {
        for bad in ["udp://x:1", "tcp://localhost", "tcp://:80", "tcp://h:99999", "unix://", "x"] {
            assert!(bad.parse::<Endpoint>().is_err(), "{bad}");
        }
    }
}
