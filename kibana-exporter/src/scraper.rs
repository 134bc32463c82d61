//! HTTP client for the Kibana status API.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, KibanaConfig};
use crate::error::{Result, ScrapeError};
use crate::model::KibanaStatus;

/// Pause between attempts in [`Scraper::wait_for_connection`].
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10);

const STATUS_PATH: &str = "/api/status";

/// Scrapes one Kibana instance.
///
/// The HTTP client and the authorization header are built once and shared
/// read-only by every scrape.
#[derive(Debug, Clone)]
pub struct Scraper {
    /// Base URL with trailing slashes removed.
    url: String,
    /// Full status endpoint URL.
    status_url: String,
    /// Precomputed `Authorization` header value, if credentials were given.
    auth_header: Option<HeaderValue>,
    client: Client,
    retry_interval: Duration,
}

impl Scraper {
    /// Build a scraper from the target configuration.
    pub fn new(config: &KibanaConfig) -> std::result::Result<Self, ConfigError> {
        let url = config.uri.trim().trim_end_matches('/').to_string();

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        if url.to_ascii_lowercase().starts_with("https://") {
            debug!(url = %url, "Kibana URL is a TLS one");
            if config.skip_tls {
                info!(url = %url, "Skipping TLS verification for Kibana URL");
            }
            builder = builder.danger_accept_invalid_certs(config.skip_tls);
        } else {
            debug!(url = %url, "Kibana URL is a plain text one");
            if config.skip_tls {
                info!(url = %url, "kibana.skip-tls is enabled for an http URL, ignoring");
            }
        }

        let auth_header =
            basic_auth_header(config.username.as_deref(), config.password.as_deref())?;
        if auth_header.is_some() {
            debug!("Using authenticated requests with Kibana");
        } else {
            info!("Kibana username or password is not provided, assuming unauthenticated communication");
        }

        let status_url = if config.extended {
            format!("{}{}?extended", url, STATUS_PATH)
        } else {
            format!("{}{}", url, STATUS_PATH)
        };

        Ok(Self {
            url,
            status_url,
            auth_header,
            client: builder.build()?,
            retry_interval: RETRY_INTERVAL,
        })
    }

    /// Override the pause used by [`wait_for_connection`](Self::wait_for_connection).
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Base URL of the target.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// URL requested on every scrape.
    pub fn status_url(&self) -> &str {
        &self.status_url
    }

    /// The precomputed `Authorization` header value, if any.
    pub fn auth_header(&self) -> Option<&str> {
        self.auth_header
            .as_ref()
            .and_then(|value| value.to_str().ok())
    }

    /// Perform one request against the status endpoint.
    ///
    /// The response is owned by this call and released on every return path.
    pub async fn scrape(&self) -> Result<KibanaStatus> {
        debug!(url = %self.status_url, "Building request for api/status");

        let url = Url::parse(&self.status_url).map_err(ScrapeError::request_construction)?;
        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        if let Some(auth) = &self.auth_header {
            request = request.header(AUTHORIZATION, auth.clone());
        }
        let request = request
            .build()
            .map_err(ScrapeError::request_construction)?;

        debug!("Requesting api/status from Kibana");
        let response = self
            .client
            .execute(request)
            .await
            .map_err(ScrapeError::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ScrapeError::UnexpectedStatus { status });
        }

        let body = response.bytes().await.map_err(ScrapeError::BodyRead)?;

        serde_json::from_slice(&body).map_err(|source| ScrapeError::Decode {
            source,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    /// Check whether Kibana answers with a valid status document.
    pub async fn test_connection(&self) -> bool {
        debug!(url = %self.url, "Checking for Kibana status");

        match self.scrape().await {
            Ok(_) => true,
            Err(e) => {
                info!(error = %e, kind = e.kind(), "Test connection to Kibana failed");
                false
            }
        }
    }

    /// Block until Kibana becomes reachable, retrying forever.
    ///
    /// Returns the number of attempts it took.
    pub async fn wait_for_connection(&self) -> u32 {
        let mut attempts = 0;
        loop {
            attempts += 1;
            if self.test_connection().await {
                info!(url = %self.url, attempts, "Kibana is up");
                return attempts;
            }

            warn!(
                url = %self.url,
                retry_in_secs = self.retry_interval.as_secs_f64(),
                "Waiting for Kibana to be responsive"
            );
            tokio::time::sleep(self.retry_interval).await;
        }
    }
}

/// Build the `Authorization: Basic` header value.
///
/// Both parts must be non-empty; partial credentials produce no header.
pub fn basic_auth_header(
    username: Option<&str>,
    password: Option<&str>,
) -> std::result::Result<Option<HeaderValue>, ConfigError> {
    let (Some(username), Some(password)) = (
        username.filter(|u| !u.is_empty()),
        password.filter(|p| !p.is_empty()),
    ) else {
        return Ok(None);
    };

    let credentials =
        base64_simd::STANDARD.encode_to_string(format!("{username}:{password}").as_bytes());
    let mut value = HeaderValue::from_str(&format!("Basic {credentials}"))
        .map_err(|e| ConfigError::Validation(format!("Invalid credentials: {}", e)))?;
    value.set_sensitive(true);

    Ok(Some(value))
}
