//! HTTP client for scraping exposition endpoints.

use std::path::Path;
use std::time::Duration;

use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Certificate, Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FetchError, Result};

/// Default `User-Agent` header.
pub const DEFAULT_AGENT: &str = "fluent-plugin-prometheus-pull";
/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Default number of redirects followed per fetch.
pub const DEFAULT_REDIRECT_LIMIT: usize = 5;

/// HTTP verb used for scraping. Only GET is supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
}

/// Client options.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// `User-Agent` header value.
    pub agent: String,
    /// HTTP verb.
    pub method: HttpMethod,
    /// Applied to connection establishment and to the whole request.
    pub timeout: Duration,
    /// Basic auth user. Used only together with `password`.
    pub user: Option<String>,
    /// Basic auth password. Used only together with `user`.
    pub password: Option<String>,
    /// Verify the server certificate and hostname.
    pub verify_ssl: bool,
    /// Directory of PEM certificates to trust. Any file name is read, so
    /// hashed `c_rehash` layouts work.
    pub ca_path: Option<String>,
    /// PEM bundle to trust.
    pub ca_file: Option<String>,
    /// Maximum number of redirects followed by [`Fetcher::fetch`].
    pub redirect_limit: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            agent: DEFAULT_AGENT.to_string(),
            method: HttpMethod::Get,
            timeout: DEFAULT_TIMEOUT,
            user: None,
            password: None,
            verify_ssl: true,
            ca_path: None,
            ca_file: None,
            redirect_limit: DEFAULT_REDIRECT_LIMIT,
        }
    }
}

/// Scrapes raw exposition bodies over HTTP or HTTPS.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    method: HttpMethod,
    credentials: Option<(String, String)>,
    redirect_limit: usize,
}

impl Fetcher {
    /// Build the underlying HTTP client.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(&config.agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(!config.verify_ssl);

        if !config.verify_ssl {
            tracing::warn!("TLS certificate verification is disabled");
        }

        if let Some(ca_file) = &config.ca_file {
            for cert in load_pem_file(Path::new(ca_file))? {
                builder = builder.add_root_certificate(cert);
            }
        }

        if let Some(ca_path) = &config.ca_path {
            for cert in load_pem_dir(Path::new(ca_path))? {
                builder = builder.add_root_certificate(cert);
            }
        }

        let client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let credentials = match (&config.user, &config.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            (None, None) => None,
            _ => {
                tracing::warn!("Basic auth needs both user and password, credentials ignored");
                None
            }
        };

        Ok(Self {
            client,
            method: config.method,
            credentials,
            redirect_limit: config.redirect_limit,
        })
    }

    /// Maximum number of redirects followed by [`fetch`](Self::fetch).
    pub fn redirect_limit(&self) -> usize {
        self.redirect_limit
    }

    /// Fetch a body using the configured redirect budget.
    pub async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        self.fetch_with_budget(url, self.redirect_limit).await
    }

    /// Fetch a body, following at most `budget` redirects.
    pub async fn fetch_with_budget(
        &self,
        url: &str,
        budget: usize,
    ) -> std::result::Result<String, FetchError> {
        let mut current = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let mut remaining = budget;

        loop {
            let response = self
                .request(current.clone())
                .send()
                .await
                .map_err(|e| FetchError::transport(current.as_str(), e))?;
            let status = response.status();

            if status.is_success() {
                return response
                    .text()
                    .await
                    .map_err(|e| FetchError::transport(current.as_str(), e));
            }

            if !status.is_redirection() {
                return Err(FetchError::Status {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }

            if remaining == 0 {
                return Err(FetchError::TooManyRedirects {
                    url: url.to_string(),
                    limit: budget,
                });
            }
            remaining -= 1;

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| FetchError::MissingLocation {
                    url: current.to_string(),
                })?;
            let next = current.join(location).map_err(|e| FetchError::InvalidUrl {
                url: location.to_string(),
                message: e.to_string(),
            })?;

            tracing::debug!(from = %current, to = %next, status = status.as_u16(), "Following redirect");
            current = next;
        }
    }

    fn request(&self, url: Url) -> reqwest::RequestBuilder {
        let request = match self.method {
            HttpMethod::Get => self.client.get(url),
        };

        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }
}

/// Read every certificate from a PEM bundle.
fn load_pem_file(path: &Path) -> Result<Vec<Certificate>> {
    let pem = std::fs::read(path).map_err(|e| ConfigError::ca_bundle(path.display().to_string(), e))?;
    let certs = Certificate::from_pem_bundle(&pem)
        .map_err(|e| ConfigError::ca_bundle(path.display().to_string(), e))?;

    if certs.is_empty() {
        return Err(ConfigError::ca_bundle(
            path.display().to_string(),
            "no certificate found",
        ));
    }

    Ok(certs)
}

/// Read every certificate found in a directory.
///
/// File names are not inspected, so both `ca.pem` and hashed names such as
/// `9d66eef0.0` are picked up. Files holding no PEM certificate are skipped.
fn load_pem_dir(dir: &Path) -> Result<Vec<Certificate>> {
    let dir_error = |e: std::io::Error| ConfigError::ca_bundle(dir.display().to_string(), e);
    let entries = std::fs::read_dir(dir).map_err(dir_error)?;

    let mut certs = Vec::new();
    for entry in entries {
        let path = entry.map_err(dir_error)?.path();
        if !path.is_file() {
            continue;
        }

        let pem = std::fs::read(&path).map_err(dir_error)?;
        if !contains_pem_certificate(&pem) {
            tracing::debug!(path = %path.display(), "Skipping non-certificate file");
            continue;
        }

        match Certificate::from_pem_bundle(&pem) {
            Ok(found) => certs.extend(found),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable certificate file");
            }
        }
    }

    if certs.is_empty() {
        return Err(ConfigError::ca_bundle(
            dir.display().to_string(),
            "no certificate found",
        ));
    }

    tracing::debug!(path = %dir.display(), certificates = certs.len(), "Loaded CA directory");
    Ok(certs)
}

fn contains_pem_certificate(data: &[u8]) -> bool {
    const MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";
    data.windows(MARKER.len()).any(|window| window == MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.agent, "fluent-plugin-prometheus-pull");
        assert_eq!(config.method, HttpMethod::Get);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert!(config.verify_ssl);
        assert_eq!(config.redirect_limit, 5);
    }

    #[test]
    fn test_credentials_need_both_parts() {
        let only_user = FetchConfig {
            user: Some("admin".into()),
            ..Default::default()
        };
        assert!(Fetcher::new(&only_user).unwrap().credentials.is_none());

        let both = FetchConfig {
            user: Some("admin".into()),
            password: Some("secret".into()),
            ..Default::default()
        };
        assert_eq!(
            Fetcher::new(&both).unwrap().credentials,
            Some(("admin".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_missing_ca_file_is_config_error() {
        let config = FetchConfig {
            ca_file: Some("/nonexistent/ca.pem".into()),
            ..Default::default()
        };
        assert!(matches!(
            Fetcher::new(&config),
            Err(ConfigError::CaBundle { .. })
        ));
    }

    #[test]
    fn test_missing_ca_path_is_config_error() {
        let config = FetchConfig {
            ca_path: Some("/nonexistent/certs".into()),
            ..Default::default()
        };
        assert!(matches!(
            Fetcher::new(&config),
            Err(ConfigError::CaBundle { .. })
        ));
    }

    const CA_PEM: &str = include_str!("../tests/fixtures/ca.pem");

    fn write_file(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_load_ca_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/ca.pem");
        assert_eq!(load_pem_file(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_ca_file_is_config_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            load_pem_file(file.path()),
            Err(ConfigError::CaBundle { .. })
        ));
    }

    #[test]
    fn test_ca_dir_reads_hashed_names() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ebe695cc.0", CA_PEM);

        assert_eq!(load_pem_dir(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_ca_dir_reads_any_extension() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "root.pem", CA_PEM);
        write_file(dir.path(), "intermediate.crt", CA_PEM);
        write_file(dir.path(), "extra", CA_PEM);

        assert_eq!(load_pem_dir(dir.path()).unwrap().len(), 3);
    }

    #[test]
    fn test_ca_dir_skips_non_certificates() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ebe695cc.0", CA_PEM);
        write_file(dir.path(), "README", "certificates for the staging scrapers\n");
        write_file(dir.path(), "ebe695cc.r0", "");
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(load_pem_dir(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_ca_dir_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_pem_dir(dir.path()),
            Err(ConfigError::CaBundle { .. })
        ));

        write_file(dir.path(), "notes.txt", "nothing to trust here");
        assert!(matches!(
            load_pem_dir(dir.path()),
            Err(ConfigError::CaBundle { .. })
        ));
    }

    #[test]
    fn test_fetcher_accepts_ca_material() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ebe695cc.0", CA_PEM);

        let config = FetchConfig {
            ca_file: Some(format!("{}/tests/fixtures/ca.pem", env!("CARGO_MANIFEST_DIR"))),
            ca_path: Some(dir.path().display().to_string()),
            ..Default::default()
        };
        assert!(Fetcher::new(&config).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }
}
