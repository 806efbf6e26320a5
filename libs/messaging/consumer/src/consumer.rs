//! Topic-scoped update stream reader.
//!
//! One [`UpdateConsumer`] subscribes a fixed set of topic prefixes on every
//! publisher endpoint and yields decoded updates. A full topic name is its
//! own prefix; a job key such as `"3|5|4|"` matches every strategy topic of
//! that job. Each concrete topic ends with exactly one Completion or Error;
//! anything arriving on a topic after that is ignored, as are messages no
//! subscription matches.
//!
//! Only subscriptions naming a full topic can finish. A strict prefix may
//! match topics that have not been published yet, so it stays open until
//! the caller stops reading.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use codec::{Update, UpdateEnvelope};
use network::{Endpoint, Subscriber};
use tracing::{debug, info, warn};
use types::{ResultRecord, StepRecord};

use crate::error::{ConsumerError, Result};

/// Update received on one topic
pub type TopicUpdate = UpdateEnvelope;

pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopicState {
    Open,
    Terminated,
}

pub struct UpdateConsumer {
    subscriber: Subscriber,
    subscriptions: Vec<String>,
    /// Concrete topics seen so far, plus every subscription up front
    topics: HashMap<String, TopicState>,
    receive_timeout: Duration,
    ignored: u64,
}

impl UpdateConsumer {
    /// Connect to every publisher endpoint and subscribe each topic
    pub async fn connect<T: AsRef<str>>(endpoints: &[Endpoint], topics: &[T]) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(ConsumerError::NoPublishers);
        }

        let mut subscriber = Subscriber::connect(endpoints).await?;
        let mut subscriptions = Vec::with_capacity(topics.len());
        for topic in topics {
            let topic = topic.as_ref();
            subscriber.subscribe(topic).await?;
            subscriptions.push(topic.to_string());
        }
        let states = subscriptions
            .iter()
            .map(|topic| (topic.clone(), TopicState::Open))
            .collect();
        info!(
            endpoints = endpoints.len(),
            topics = subscriptions.len(),
            "update consumer subscribed"
        );

        Ok(Self {
            subscriber,
            subscriptions,
            topics: states,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            ignored: 0,
        })
    }

    /// Timeout [`follow`](Self::follow) applies to each receive
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// True once every subscription names a topic that has seen its
    /// terminal update
    pub fn is_finished(&self) -> bool {
        self.subscriptions
            .iter()
            .all(|topic| self.topics.get(topic) == Some(&TopicState::Terminated))
    }

    fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|prefix| topic.starts_with(prefix.as_str()))
    }

    /// State of a concrete topic, registering it on first sight when a
    /// subscription prefix covers it
    fn topic_state(&mut self, topic: &str) -> Option<&mut TopicState> {
        if !self.topics.contains_key(topic) {
            if !self.is_subscribed(topic) {
                return None;
            }
            debug!(topic, "new topic under subscribed prefix");
            self.topics.insert(topic.to_string(), TopicState::Open);
        }
        self.topics.get_mut(topic)
    }

    pub fn open_topics(&self) -> impl Iterator<Item = &str> {
        self.topics
            .iter()
            .filter(|(_, state)| **state == TopicState::Open)
            .map(|(topic, _)| topic.as_str())
    }

    /// Messages dropped because they were undecodable, off-topic or late
    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    /// Next update on any open topic.
    ///
    /// Returns `Ok(None)` once every subscription has finished and
    /// [`ConsumerError::Timeout`] if nothing relevant arrives in `timeout`.
    pub async fn next_update(&mut self, timeout: Duration) -> Result<Option<TopicUpdate>> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_finished() {
                return Ok(None);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let frames = match self.subscriber.recv_timeout(remaining).await? {
                Some(frames) => frames,
                None => {
                    return Err(ConsumerError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }
            };

            let envelope = match UpdateEnvelope::decode(&frames) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(error = %e, frames = frames.len(), "dropping undecodable update");
                    self.ignored += 1;
                    continue;
                }
            };

            match self.topic_state(&envelope.topic) {
                Some(state @ TopicState::Open) => {
                    if envelope.update.is_terminal() {
                        *state = TopicState::Terminated;
                        debug!(topic = %envelope.topic, kind = ?envelope.update.kind(), "topic terminated");
                    }
                    return Ok(Some(envelope));
                }
                Some(TopicState::Terminated) => {
                    debug!(topic = %envelope.topic, "ignoring update after terminator");
                }
                None => {
                    debug!(topic = %envelope.topic, "ignoring update for unsubscribed topic");
                }
            }
            self.ignored += 1;
        }
    }

    /// Stream one topic to completion.
    ///
    /// Initial and Action steps go to `on_step`; the final result goes to
    /// `on_completion` and is returned. A remote Error update ends the stream
    /// with [`ConsumerError::Remote`]. Updates for other topics are consumed
    /// and discarded.
    pub async fn follow<S, C>(
        &mut self,
        topic: &str,
        mut on_step: S,
        on_completion: C,
    ) -> Result<ResultRecord>
    where
        S: FnMut(&StepRecord),
        C: FnOnce(&ResultRecord),
    {
        match self.topics.get(topic) {
            Some(TopicState::Terminated) => {
                return Err(ConsumerError::TopicTerminated {
                    topic: topic.to_string(),
                })
            }
            None if !self.is_subscribed(topic) => {
                return Err(ConsumerError::UnknownTopic {
                    topic: topic.to_string(),
                })
            }
            _ => {}
        }

        loop {
            let Some(envelope) = self.next_update(self.receive_timeout).await? else {
                return Err(ConsumerError::TopicTerminated {
                    topic: topic.to_string(),
                });
            };
            if envelope.topic != topic {
                continue;
            }
            match envelope.update {
                Update::Initial(step) | Update::Action(step) => on_step(&step),
                Update::Completion(result) => {
                    on_completion(&result);
                    return Ok(result);
                }
                Update::Error(info) => return Err(ConsumerError::Remote(info)),
            }
        }
    }
}
