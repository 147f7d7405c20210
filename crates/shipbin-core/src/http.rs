//! Shared HTTP client.
//!
//! One client is built per install run and every request goes through it,
//! so the manifest and archive downloads share pooled connections to the
//! release host.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use thiserror::Error;

/// Default bound on a single request, and on the whole install run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("invalid proxy URL '{url}': {source}")]
    Proxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GITHUB_TOKEN contains characters not allowed in an HTTP header")]
    InvalidToken,

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Network settings captured once at startup.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Proxy every request through this URL.
    pub proxy: Option<String>,
    /// Bearer token attached to requests.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Build the run's client.
///
/// Proxy discovery is *not* delegated to reqwest: the caller passes the
/// proxy it resolved, and without one the client connects directly.
pub fn build_client(config: &HttpConfig) -> Result<Client, HttpError> {
    let mut builder = Client::builder()
        .user_agent(crate::USER_AGENT)
        .timeout(config.timeout)
        .no_proxy();

    if let Some(url) = &config.proxy {
        let proxy = reqwest::Proxy::all(url).map_err(|source| HttpError::Proxy {
            url: url.clone(),
            source,
        })?;
        builder = builder.proxy(proxy);
    }

    if let Some(token) = &config.token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| HttpError::InvalidToken)?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        builder = builder.default_headers(headers);
    }

    Ok(builder.build()?)
}
