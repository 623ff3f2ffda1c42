//! Prometheus pull scraper.
//!
//! Polls HTTP endpoints serving the Prometheus text exposition format,
//! decodes their bodies into samples and hands one record per sample to an
//! [`EventSink`].
//!
//! - [`labeled_url`] - `[@label@]url` target strings
//! - [`parser`] - exposition format decoder
//! - [`fetch`] - bounded-redirect HTTP client
//! - [`poller`] - scheduled poll cycles
//! - [`sink`] - emission interface
//!
//! # Example
//!
//! ```ignore
//! use prometheus_pull::*;
//!
//! let targets = LabeledUrl::parse_all(["@east@http://10.0.0.1:9100/metrics"])?;
//! let poller = Poller::new(
//!     targets,
//!     Fetcher::new(&FetchConfig::default())?,
//!     PrometheusTextParser::new(ParserConfig::default())?,
//!     MemorySink::new(),
//!     PollerConfig { tag: "node".into(), ..Default::default() },
//! );
//! let stats = poller.poll_once().await;
//! ```

pub mod error;
pub mod fetch;
pub mod labeled_url;
pub mod parser;
pub mod poller;
pub mod record;
pub mod sink;

pub use error::{ConfigError, DecodeError, EmitError, FetchError};
pub use fetch::{FetchConfig, Fetcher, HttpMethod};
pub use labeled_url::{LabeledUrl, TargetResolver};
pub use parser::{ParseStats, ParserConfig, PrometheusTextParser};
pub use poller::{CycleStats, Poller, PollerConfig};
pub use record::{FieldValue, Labels, MetricSample, Record, current_timestamp_millis};
pub use sink::{CapturedEvent, EventSink, MemorySink};
