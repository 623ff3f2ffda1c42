//! Zenoh publishing of scraped records.

use std::sync::Arc;

use serde::Serialize;
use zenoh::Session;
use zenoh::bytes::Encoding;

use prometheus_pull::{EmitError, EventSink, Record};

use crate::config::ZenohConfig;
use crate::error::{BridgeError, Result};

/// Serialization format for published events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON format (human-readable, good for debugging).
    #[default]
    Json,

    /// CBOR format (compact binary).
    Cbor,
}

impl Format {
    /// Zenoh encoding announced with every payload.
    pub fn encoding(&self) -> Encoding {
        match self {
            Format::Json => Encoding::APPLICATION_JSON,
            Format::Cbor => Encoding::APPLICATION_CBOR,
        }
    }
}

/// Encode a value to bytes using the specified format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => Ok(serde_json::to_vec(value)?),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)?;
            Ok(buf)
        }
    }
}

/// Payload published for every record.
#[derive(Debug, Serialize)]
pub struct Event<'a> {
    /// Routing tag.
    pub tag: &'a str,
    /// Event time in milliseconds since Unix epoch.
    pub time: i64,
    /// Sample fields.
    pub record: &'a Record,
}

/// Connect to Zenoh using the provided configuration.
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    let mut zenoh_config = zenoh::Config::default();

    let mode = match config.mode.as_str() {
        "client" | "peer" | "router" => format!("\"{}\"", config.mode),
        other => {
            return Err(BridgeError::config(format!(
                "Invalid Zenoh mode: '{}'. Expected 'client', 'peer', or 'router'",
                other
            )));
        }
    };

    zenoh_config
        .insert_json5("mode", &mode)
        .map_err(|e| BridgeError::config(format!("Failed to set mode: {}", e)))?;

    if !config.connect.is_empty() {
        zenoh_config
            .insert_json5("connect/endpoints", &serde_json::to_string(&config.connect)?)
            .map_err(|e| BridgeError::config(format!("Failed to set connect endpoints: {}", e)))?;
    }

    if !config.listen.is_empty() {
        zenoh_config
            .insert_json5("listen/endpoints", &serde_json::to_string(&config.listen)?)
            .map_err(|e| BridgeError::config(format!("Failed to set listen endpoints: {}", e)))?;
    }

    tracing::info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        "Connecting to Zenoh"
    );

    let session = zenoh::open(zenoh_config).await?;

    tracing::info!(zid = %session.zid(), "Connected to Zenoh");

    Ok(session)
}

/// Build the key expression for a tag.
///
/// Dots in the tag become key segments: `node.metrics` under
/// `zensight/prometheus` is published to `zensight/prometheus/node/metrics`.
pub fn build_key(key_prefix: &str, tag: &str) -> String {
    let suffix = tag.replace('.', "/");
    if suffix.is_empty() {
        key_prefix.to_string()
    } else {
        format!("{}/{}", key_prefix, suffix)
    }
}

/// Publishes every record to Zenoh.
#[derive(Clone, Debug)]
pub struct ZenohSink {
    session: Arc<Session>,
    key_prefix: String,
    format: Format,
}

impl ZenohSink {
    /// Create a sink publishing under `key_prefix`.
    pub fn new(session: Arc<Session>, key_prefix: impl Into<String>, format: Format) -> Self {
        Self {
            session,
            key_prefix: key_prefix.into(),
            format,
        }
    }
}

impl EventSink for ZenohSink {
    async fn emit(&self, tag: &str, time: i64, record: Record) -> std::result::Result<(), EmitError> {
        let key = build_key(&self.key_prefix, tag);
        let event = Event {
            tag,
            time,
            record: &record,
        };
        let payload =
            encode(&event, self.format).map_err(|e| EmitError::Serialization(e.to_string()))?;

        self.session
            .put(&key, payload)
            .encoding(self.format.encoding())
            .await
            .map_err(|e| EmitError::Publish {
                key: key.clone(),
                message: e.to_string(),
            })?;

        tracing::trace!(key = %key, time, "Published record");
        Ok(())
    }
}
