//! Zenoh bridge for Prometheus exposition endpoints.
//!
//! Wraps the [`prometheus_pull`] scraper with a JSON5 configuration file,
//! tracing setup and a sink that publishes every record to Zenoh under
//! `<key_prefix>/<tag>`.

pub mod args;
pub mod config;
pub mod error;
pub mod logging;
pub mod publisher;

pub use args::BridgeArgs;
pub use config::{PrometheusBridgeConfig, PrometheusConfig, ZenohConfig};
pub use error::{BridgeError, Result};
pub use logging::{LogFormat, LoggingConfig, init_tracing};
pub use publisher::{Event, Format, ZenohSink, build_key, connect, encode};
