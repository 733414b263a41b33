use super::{Transport, TransportError};
use crate::cache::RequestKey;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Low-level re-sends after the first attempt.
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: crate::config::DEFAULT_REST_URL.to_string(),
            timeout: Duration::from_millis(crate::config::DEFAULT_CACHE_TIMEOUT_MS),
            retries: crate::config::DEFAULT_CACHE_RETRY_COUNT,
            retry_delay: Duration::ZERO,
        }
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| {
                Error::runtime_with_context(
                    "failed to build HTTP client",
                    ErrorContext::new()
                        .with_details(e.to_string())
                        .with_source("http_transport"),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
            retries: config.retries,
            retry_delay: config.retry_delay,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for `key`: base joined with the path, params as query string.
    pub fn url_for(&self, key: &RequestKey) -> std::result::Result<Url, TransportError> {
        let mut url = self
            .base_url
            .join(key.path())
            .map_err(|e| TransportError::Other(format!("invalid path '{}': {}", key.path(), e)))?;
        if !key.params().is_empty() {
            url.query_pairs_mut().extend_pairs(key.params().iter());
        }
        Ok(url)
    }

    async fn send_once(&self, url: &Url) -> std::result::Result<Value, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            }
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }

    fn is_retryable(err: &TransportError) -> bool {
        match err {
            TransportError::Network(_) => true,
            TransportError::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, key: &RequestKey) -> std::result::Result<Value, TransportError> {
        let url = self.url_for(key)?;
        let mut attempt = 0u32;
        loop {
            match self.send_once(&url).await {
                Ok(value) => {
                    debug!(url = %url, attempt, "GET succeeded");
                    return Ok(value);
                }
                Err(e) if attempt < self.retries && Self::is_retryable(&e) => {
                    attempt += 1;
                    warn!(url = %url, attempt, error = %e, "GET failed, re-sending");
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid base URL '{}'", raw),
            ErrorContext::new()
                .with_field_path("base_url")
                .with_details(e.to_string())
                .with_source("http_transport"),
        )
    })?;
    // Url::join replaces the last segment unless the base path ends with '/'.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(HttpTransportConfig {
            base_url: base.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_for_joins_path_and_query() {
        let t = transport("https://jsinfo.example.com/api");
        let key = RequestKey::new("provider/lava@1abc").with_param("pagination", "totalStake,d,2,20");
        assert_eq!(
            t.url_for(&key).unwrap().as_str(),
            "https://jsinfo.example.com/api/provider/lava@1abc?pagination=totalStake%2Cd%2C2%2C20"
        );
    }

    #[test]
    fn test_url_for_without_params_has_no_query() {
        let t = transport("http://localhost:8081/");
        let url = t.url_for(&RequestKey::new("/index")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8081/index");
    }

    #[test]
    fn test_invalid_base_url_is_configuration_error() {
        let err = HttpTransport::new(HttpTransportConfig {
            base_url: "not a url".into(),
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(HttpTransport::is_retryable(&TransportError::Network("reset".into())));
        assert!(HttpTransport::is_retryable(&TransportError::Http {
            status: 503,
            body: String::new()
        }));
        assert!(!HttpTransport::is_retryable(&TransportError::Http {
            status: 404,
            body: String::new()
        }));
        assert!(!HttpTransport::is_retryable(&TransportError::Timeout { after_ms: 1 }));
    }
}
