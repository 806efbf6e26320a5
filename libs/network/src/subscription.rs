//! Topic prefix subscriptions.
//!
//! Subscribers tell the relay what they want with single-frame control
//! messages: `[0x01, prefix…]` subscribes, `[0x00, prefix…]` unsubscribes.
//! The relay keeps one [`TopicFilter`] per connection and forwards a message
//! only when its first frame starts with one of the subscribed prefixes. An
//! empty prefix matches everything.

use std::collections::HashMap;

use bytes::{BufMut, BytesMut};
use codec::Frame;

const SUBSCRIBE: u8 = 0x01;
const UNSUBSCRIBE: u8 = 0x00;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionCommand {
    Subscribe(Vec<u8>),
    Unsubscribe(Vec<u8>),
}

impl SubscriptionCommand {
    pub fn to_frames(&self) -> Vec<Frame> {
        let (flag, prefix) = match self {
            SubscriptionCommand::Subscribe(prefix) => (SUBSCRIBE, prefix),
            SubscriptionCommand::Unsubscribe(prefix) => (UNSUBSCRIBE, prefix),
        };
        let mut buf = BytesMut::with_capacity(1 + prefix.len());
        buf.put_u8(flag);
        buf.extend_from_slice(prefix);
        vec![Frame::from(buf.freeze())]
    }

    /// Parse a control message; anything else returns `None`
    pub fn parse(frames: &[Frame]) -> Option<Self> {
        let [frame] = frames else {
            return None;
        };
        match frame.as_bytes().split_first() {
            Some((&SUBSCRIBE, prefix)) => Some(SubscriptionCommand::Subscribe(prefix.to_vec())),
            Some((&UNSUBSCRIBE, prefix)) => Some(SubscriptionCommand::Unsubscribe(prefix.to_vec())),
            _ => None,
        }
    }
}

/// Reference-counted prefix set for one subscriber connection
#[derive(Debug, Default, Clone)]
pub struct TopicFilter {
    prefixes: HashMap<Vec<u8>, usize>,
}

impl TopicFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a command; returns the change in distinct prefixes (+1, -1 or 0)
    pub fn apply(&mut self, command: &SubscriptionCommand) -> isize {
        match command {
            SubscriptionCommand::Subscribe(prefix) => {
                let count = self.prefixes.entry(prefix.clone()).or_insert(0);
                *count += 1;
                if *count == 1 {
                    1
                } else {
                    0
                }
            }
            SubscriptionCommand::Unsubscribe(prefix) => match self.prefixes.get_mut(prefix) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    0
                }
                Some(_) => {
                    self.prefixes.remove(prefix);
                    -1
                }
                None => 0,
            },
        }
    }

    pub fn matches(&self, topic: &[u8]) -> bool {
        self.prefixes.keys().any(|prefix| topic.starts_with(prefix))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
