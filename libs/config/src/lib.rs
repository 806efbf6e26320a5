//! # Worker Configuration
//!
//! Layered settings for the `worker`, `submit` and `watch` binaries:
//! built-in defaults, then an optional TOML file, then `BUCKETS_`
//! environment variables.
//!
//! ## Usage
//!
//! ```no_run
//! use worker_config::load_settings;
//!
//! let settings = load_settings(None)?;
//! let endpoint = settings.worker.publish_endpoint()?;
//! println!("publishing on {endpoint}");
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod settings;

pub use settings::{load_settings, AppSettings, ConsumerSettings, WorkerSettings, ENV_PREFIX};
