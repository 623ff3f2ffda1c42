//! Prometheus bridge configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use prometheus_pull::fetch::{DEFAULT_AGENT, DEFAULT_REDIRECT_LIMIT};
use prometheus_pull::parser::{DEFAULT_DELIMITER, DEFAULT_LABEL_PREFIX};
use prometheus_pull::{
    EventSink, FetchConfig, Fetcher, HttpMethod, LabeledUrl, ParserConfig, Poller, PollerConfig,
    PrometheusTextParser,
};

use crate::error::{BridgeError, Result};
use crate::logging::LoggingConfig;
use crate::publisher::{Format, build_key};

/// Root configuration for the Prometheus bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusBridgeConfig {
    /// Zenoh connection settings.
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Serialization format for published events.
    #[serde(default)]
    pub serialization: Format,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scraping settings.
    pub prometheus: PrometheusConfig,
}

/// Zenoh connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZenohConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to.
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on.
    #[serde(default)]
    pub listen: Vec<String>,
}

fn default_mode() -> String {
    "peer".to_string()
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
        }
    }
}

/// Scrape targets, HTTP options and decoder options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Key expression prefix (default: "zensight/prometheus").
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Routing tag attached to every event.
    pub tag: String,

    /// Targets, each `[@label@]url`.
    #[serde(default)]
    pub urls: Vec<String>,

    /// User-Agent header.
    #[serde(default = "default_agent")]
    pub agent: String,

    /// HTTP verb (only "get").
    #[serde(default)]
    pub http_method: HttpMethod,

    /// Polling interval in seconds.
    pub interval_secs: u64,

    /// Connect/handshake/read timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Basic auth user.
    #[serde(default)]
    pub user: Option<String>,

    /// Basic auth password.
    #[serde(default)]
    pub password: Option<String>,

    /// Verify TLS certificates.
    #[serde(default = "default_true")]
    pub verify_ssl: bool,

    /// Directory of trusted CA certificates (PEM).
    #[serde(default)]
    pub ca_path: Option<String>,

    /// Trusted CA bundle (PEM).
    #[serde(default)]
    pub ca_file: Option<String>,

    /// Record field receiving the source URL.
    #[serde(default)]
    pub event_url_key: Option<String>,

    /// Record field receiving the source label.
    #[serde(default)]
    pub event_url_label_key: Option<String>,

    /// Maximum redirects followed per fetch.
    #[serde(default = "default_redirect_limit")]
    pub redirect_limit: usize,

    /// Decoder entry delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Prefix applied to every label key.
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,

    /// Attach the declared metric type.
    #[serde(default = "default_true")]
    pub add_type: bool,
}

fn default_key_prefix() -> String {
    "zensight/prometheus".to_string()
}

fn default_agent() -> String {
    DEFAULT_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

fn default_redirect_limit() -> usize {
    DEFAULT_REDIRECT_LIMIT
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_label_prefix() -> String {
    DEFAULT_LABEL_PREFIX.to_string()
}

impl PrometheusBridgeConfig {
    /// Load and validate configuration from a JSON5 file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let prometheus = &self.prometheus;

        if prometheus.tag.is_empty() {
            return Err(BridgeError::validation("tag cannot be empty"));
        }
        if prometheus.interval_secs == 0 {
            return Err(BridgeError::validation("interval_secs must be positive"));
        }
        if prometheus.timeout_secs == 0 {
            return Err(BridgeError::validation("timeout_secs must be positive"));
        }
        if prometheus.delimiter.is_empty() {
            return Err(BridgeError::validation("delimiter must not be empty"));
        }
        if !matches!(self.zenoh.mode.as_str(), "client" | "peer" | "router") {
            return Err(BridgeError::validation(format!(
                "Invalid Zenoh mode: '{}'. Expected 'client', 'peer', or 'router'",
                self.zenoh.mode
            )));
        }

        let key = build_key(&prometheus.key_prefix, &prometheus.tag);
        if let Err(e) = zenoh::key_expr::KeyExpr::try_from(key.as_str()) {
            return Err(BridgeError::validation(format!(
                "tag '{}' under key_prefix '{}' is not a valid key expression ({}): {}",
                prometheus.tag, prometheus.key_prefix, key, e
            )));
        }

        prometheus.targets()?;

        Ok(())
    }
}

impl PrometheusConfig {
    /// Polling period.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the configured target strings.
    pub fn targets(&self) -> Result<Vec<LabeledUrl>> {
        Ok(LabeledUrl::parse_all(&self.urls)?)
    }

    /// HTTP client options.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            agent: self.agent.clone(),
            method: self.http_method,
            timeout: self.timeout(),
            user: self.user.clone(),
            password: self.password.clone(),
            verify_ssl: self.verify_ssl,
            ca_path: self.ca_path.clone(),
            ca_file: self.ca_file.clone(),
            redirect_limit: self.redirect_limit,
        }
    }

    /// Decoder options.
    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            delimiter: self.delimiter.clone(),
            label_prefix: self.label_prefix.clone(),
            add_type: self.add_type,
        }
    }

    /// Poll cycle options.
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            tag: self.tag.clone(),
            event_url_key: self.event_url_key.clone(),
            event_url_label_key: self.event_url_label_key.clone(),
        }
    }

    /// Build a poller emitting into `sink`.
    pub fn build_poller<S: EventSink>(&self, sink: S) -> Result<Poller<S>> {
        let targets = self.targets()?;
        if targets.is_empty() {
            tracing::warn!("No urls configured, poll cycles will be empty");
        }

        let fetcher = Fetcher::new(&self.fetch_config())?;
        let parser = PrometheusTextParser::new(self.parser_config())?;

        Ok(Poller::new(
            targets,
            fetcher,
            parser,
            sink,
            self.poller_config(),
        ))
    }
}
