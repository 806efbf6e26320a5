//! Worker and consumer settings.
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables (`BUCKETS_` prefix, `__` between section and key):
//!
//! ```toml
//! [worker]
//! publish_endpoint = "tcp://*:9898"
//! signal_endpoint = "tcp://127.0.0.1:9899"
//! queue_dir = "${HOME}/.buckets/queue"
//! queue_name = "jobs"
//! dead_letter_queue = "jobs-poison"
//! visibility_timeout_secs = 180
//! poison_threshold = 5
//!
//! [consumer]
//! publisher_endpoints = ["tcp://127.0.0.1:9898"]
//! receive_timeout_ms = 30000
//! ```
//!
//! `BUCKETS_WORKER__POISON_THRESHOLD=3` overrides one key;
//! `BUCKETS_CONSUMER__PUBLISHER_ENDPOINTS=tcp://a:1,tcp://b:2` sets a list.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use network::Endpoint;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const ENV_PREFIX: &str = "BUCKETS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Backend endpoint the forwarder binds for subscribers
    pub publish_endpoint: String,
    /// Where idle workers listen for wake signals; polling only when unset
    pub signal_endpoint: Option<String>,
    pub queue_dir: PathBuf,
    pub queue_name: String,
    /// Queue poison messages are moved to before deletion
    pub dead_letter_queue: Option<String>,
    pub visibility_timeout_secs: u64,
    /// Messages dequeued more often than this are discarded unprocessed
    pub poison_threshold: u32,
    pub idle_poll_interval_ms: u64,
    pub startup_delay_ms: u64,
    pub max_message_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            publish_endpoint: "tcp://*:9898".to_string(),
            signal_endpoint: None,
            queue_dir: PathBuf::from("/tmp/buckets/queue"),
            queue_name: "jobs".to_string(),
            dead_letter_queue: None,
            visibility_timeout_secs: 180,
            poison_threshold: 5,
            idle_poll_interval_ms: 500,
            startup_delay_ms: 0,
            max_message_size: network::DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl WorkerSettings {
    pub fn publish_endpoint(&self) -> Result<Endpoint> {
        parse_endpoint(&self.publish_endpoint, "worker.publish_endpoint")
    }

    pub fn signal_endpoint(&self) -> Result<Option<Endpoint>> {
        self.signal_endpoint
            .as_deref()
            .map(|s| parse_endpoint(s, "worker.signal_endpoint"))
            .transpose()
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        self.publish_endpoint()?;
        self.signal_endpoint()?;
        if self.queue_name.is_empty() {
            bail!("worker.queue_name must not be empty");
        }
        if self.dead_letter_queue.as_deref() == Some(self.queue_name.as_str()) {
            bail!("worker.dead_letter_queue must differ from worker.queue_name");
        }
        if self.visibility_timeout_secs == 0 {
            bail!("worker.visibility_timeout_secs must be greater than zero");
        }
        if self.poison_threshold == 0 {
            bail!("worker.poison_threshold must be at least 1");
        }
        if self.idle_poll_interval_ms == 0 {
            bail!("worker.idle_poll_interval_ms must be greater than zero");
        }
        if self.max_message_size == 0 {
            bail!("worker.max_message_size must be greater than zero");
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<()> {
        let queue_dir = self.queue_dir.to_string_lossy().into_owned();
        let expanded = shellexpand::full(&queue_dir).context("Failed to expand queue_dir")?;
        self.queue_dir = PathBuf::from(expanded.as_ref());

        self.publish_endpoint = shellexpand::env(&self.publish_endpoint)
            .context("Failed to expand publish_endpoint")?
            .into_owned();
        if let Some(signal) = &self.signal_endpoint {
            let expanded = shellexpand::env(signal).context("Failed to expand signal_endpoint")?;
            self.signal_endpoint = Some(expanded.into_owned());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerSettings {
    pub publisher_endpoints: Vec<String>,
    pub receive_timeout_ms: u64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            publisher_endpoints: vec!["tcp://127.0.0.1:9898".to_string()],
            receive_timeout_ms: 30_000,
        }
    }
}

impl ConsumerSettings {
    pub fn publisher_endpoints(&self) -> Result<Vec<Endpoint>> {
        self.publisher_endpoints
            .iter()
            .map(|s| parse_endpoint(s, "consumer.publisher_endpoints"))
            .collect()
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        self.publisher_endpoints()?;
        if self.receive_timeout_ms == 0 {
            bail!("consumer.receive_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<()> {
        for endpoint in &mut self.publisher_endpoints {
            *endpoint = shellexpand::env(endpoint)
                .context("Failed to expand publisher endpoint")?
                .into_owned();
        }
        Ok(())
    }
}

/// Everything a deployment configures
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppSettings {
    pub worker: WorkerSettings,
    pub consumer: ConsumerSettings,
}

impl AppSettings {
    /// Load from `path` (if given) plus `BUCKETS_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Like [`load`](Self::load) with a custom environment prefix
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                bail!("Configuration file not found: {}", path.display());
            }
            info!("Loading configuration: {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("consumer.publisher_endpoints")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;
        let mut settings: AppSettings = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        settings.worker.expand_env_vars()?;
        settings.consumer.expand_env_vars()?;
        debug!(?settings, "configuration loaded");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.worker.validate()?;
        self.consumer.validate()
    }
}

fn parse_endpoint(value: &str, field: &str) -> Result<Endpoint> {
    value
        .parse::<Endpoint>()
        .with_context(|| format!("Invalid endpoint for {field}"))
}

/// Load and validate settings with defaults
pub fn load_settings(path: Option<&Path>) -> Result<AppSettings> {
    let settings = AppSettings::load(path)?;
    settings.validate()?;
    Ok(settings)
}
