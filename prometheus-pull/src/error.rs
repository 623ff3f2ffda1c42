//! Error types for scraping Prometheus endpoints.
//!
//! Only [`ConfigError`] is fatal, and only at startup. Every other error is
//! scoped to a single target, line or record and is logged by the poll cycle
//! rather than propagated.

use thiserror::Error;

/// Result type alias for startup-time configuration.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Invalid configuration detected while building the scraper.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The decoder line delimiter is empty.
    #[error("delimiter must not be empty")]
    EmptyDelimiter,

    /// A configured target string could not be resolved.
    #[error("unable to use url '{0}'")]
    InvalidTarget(String),

    /// A built-in matcher failed to compile.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// CA trust material could not be loaded.
    #[error("Failed to load CA material from {path}: {message}")]
    CaBundle { path: String, message: String },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl ConfigError {
    /// Create a CA bundle error.
    pub fn ca_bundle(path: impl Into<String>, message: impl ToString) -> Self {
        Self::CaBundle {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Failure to retrieve a body from one target during one cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The URL (or a redirect location) is not a valid absolute URL.
    #[error("Invalid url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// DNS, connection, TLS, timeout or body read failure.
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a status that is neither 2xx nor 3xx.
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    /// A redirect response carried no usable `Location` header.
    #[error("{url} sent a redirect without a Location header")]
    MissingLocation { url: String },

    /// The redirect budget ran out before a 2xx response.
    #[error("Max number of redirects reached ({limit}) while fetching {url}")]
    TooManyRedirects { url: String, limit: usize },
}

impl FetchError {
    /// Create a transport error for the given URL.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }
}

/// A single exposition line that could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The line matches none of the known line shapes.
    #[error("skip unsupported prometheus entry: {0}")]
    UnsupportedLine(String),

    /// The value token is not a valid float literal.
    #[error("invalid metric value '{0}'")]
    InvalidValue(String),

    /// The timestamp does not fit a signed 64-bit integer.
    #[error("invalid metric timestamp '{0}'")]
    InvalidTimestamp(String),

    /// The label block does not follow `key="value"` pairs.
    #[error("malformed label block at offset {offset}: {block}")]
    MalformedLabels { block: String, offset: usize },
}

/// The downstream sink rejected a record.
#[derive(Error, Debug)]
pub enum EmitError {
    /// The record could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The sink failed to publish the record.
    #[error("Failed to publish to {key}: {message}")]
    Publish { key: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::EmptyDelimiter.to_string(),
            "delimiter must not be empty"
        );
        assert_eq!(
            ConfigError::InvalidTarget("x".into()).to_string(),
            "unable to use url 'x'"
        );
    }

    #[test]
    fn test_fetch_error_messages() {
        let err = FetchError::TooManyRedirects {
            url: "http://h/metrics".into(),
            limit: 5,
        };
        assert!(err.to_string().contains("Max number of redirects reached"));

        let err = FetchError::Status {
            url: "http://h/metrics".into(),
            status: 503,
        };
        assert_eq!(err.to_string(), "http://h/metrics answered with HTTP 503");
    }
}
