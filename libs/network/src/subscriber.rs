//! Subscriber side of a relay connection.
//!
//! A [`Subscriber`] holds one socket per relay endpoint. Each socket gets a
//! reader task that pushes received messages into a shared queue, so
//! [`Subscriber::recv`] sees messages from every relay in arrival order.
//! Subscription commands go out on every socket.

use std::cell::Cell;
use std::marker::PhantomData;
use std::time::Duration;

use codec::Frame;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::subscription::SubscriptionCommand;
use crate::transports::{BoxedWrite, Connection, MultipartWriter, DEFAULT_MAX_MESSAGE_SIZE};

const INBOX_CAPACITY: usize = 1024;

pub struct Subscriber {
    writers: Vec<(Endpoint, MultipartWriter<BoxedWrite>)>,
    inbox: mpsc::Receiver<Vec<Frame>>,
    readers: Vec<JoinHandle<()>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl Subscriber {
    pub async fn connect(endpoints: &[Endpoint]) -> Result<Self> {
        Self::connect_with_max_size(endpoints, DEFAULT_MAX_MESSAGE_SIZE).await
    }

    /// Connect to every endpoint; fails if the list is empty or any
    /// connection cannot be opened.
    pub async fn connect_with_max_size(
        endpoints: &[Endpoint],
        max_message_size: usize,
    ) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(TransportError::configuration(
                "subscriber needs at least one endpoint",
                Some("endpoints"),
            ));
        }

        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let mut writers = Vec::with_capacity(endpoints.len());
        let mut readers = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let connection = match Connection::connect(endpoint).await {
                Ok(connection) => connection,
                Err(e) => {
                    readers.iter().for_each(JoinHandle::abort);
                    return Err(e);
                }
            };
            let (mut reader, writer) = connection.into_multipart(max_message_size);
            let tx = tx.clone();
            let label = endpoint.to_string();

            readers.push(tokio::spawn(async move {
                loop {
                    match reader.recv().await {
                        Ok(Some(frames)) => {
                            if tx.send(frames).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {
                            debug!(endpoint = %label, "relay closed subscriber connection");
                            break;
                        }
                        Err(e) => {
                            warn!(endpoint = %label, error = %e, "subscriber connection failed");
                            break;
                        }
                    }
                }
            }));
            writers.push((endpoint.clone(), writer));
            info!(endpoint = %endpoint, "subscriber connected");
        }

        Ok(Self {
            writers,
            inbox,
            readers,
            _not_sync: PhantomData,
        })
    }

    pub async fn subscribe(&mut self, prefix: impl AsRef<[u8]>) -> Result<()> {
        self.send_command(SubscriptionCommand::Subscribe(prefix.as_ref().to_vec()))
            .await
    }

    pub async fn unsubscribe(&mut self, prefix: impl AsRef<[u8]>) -> Result<()> {
        self.send_command(SubscriptionCommand::Unsubscribe(prefix.as_ref().to_vec()))
            .await
    }

    async fn send_command(&mut self, command: SubscriptionCommand) -> Result<()> {
        let frames = command.to_frames();
        for (endpoint, writer) in &mut self.writers {
            writer.send(&frames).await?;
            debug!(endpoint = %endpoint, ?command, "sent subscription command");
        }
        Ok(())
    }

    /// Next message from any relay; `None` once every connection has closed
    pub async fn recv(&mut self) -> Option<Vec<Frame>> {
        self.inbox.recv().await
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`. `Ok(None)`
    /// means nothing arrived in time; a closed subscriber is an error.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<Frame>>> {
        match tokio::time::timeout(timeout, self.inbox.recv()).await {
            Ok(Some(frames)) => Ok(Some(frames)),
            Ok(None) => Err(TransportError::channel_closed("subscriber connections")),
            Err(_) => Ok(None),
        }
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.writers.iter().map(|(endpoint, _)| endpoint)
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transports::Listener;

    #[tokio::test]
    async fn test_empty_endpoint_list_is_rejected() {
        assert!(matches!(
            Subscriber::connect(&[]).await,
            Err(TransportError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_subscribe_reaches_relay_and_messages_come_back() {
        let listener = Listener::bind(&Endpoint::tcp("127.0.0.1:0")).await.unwrap();
        let endpoint = listener.local_endpoint().unwrap();

        let relay = tokio::spawn(async move {
            let (conn, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = conn.into_multipart(DEFAULT_MAX_MESSAGE_SIZE);
            let command = reader.recv().await.unwrap().unwrap();
            writer.send(&[Frame::from_text("reply")]).await.unwrap();
            SubscriptionCommand::parse(&command)
        });

        let mut subscriber = Subscriber::connect(&[endpoint]).await.unwrap();
        subscriber.subscribe("3|5|4|").await.unwrap();

        let received = subscriber
            .recv_timeout(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(received, Some(vec![Frame::from_text("reply")]));
        assert_eq!(
            relay.await.unwrap(),
            Some(SubscriptionCommand::Subscribe(b"3|5|4|".to_vec()))
        );
    }

    #[tokio::test]
    async fn test_recv_timeout_returns_none_when_idle() {
        let listener = Listener::bind(&Endpoint::tcp("127.0.0.1:0")).await.unwrap();
        let endpoint = listener.local_endpoint().unwrap();
        let _accept = tokio::spawn(async move {
            let accepted = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(accepted);
        });

        let mut subscriber = Subscriber::connect(&[endpoint]).await.unwrap();
        assert_eq!(
            subscriber
                .recv_timeout(Duration::from_millis(50))
                .await
                .unwrap(),
            None
        );
    }
}
