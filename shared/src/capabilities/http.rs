use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub use crux_http::Http;

pub const MAX_URL_LENGTH: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ValidatedUrl {
    url: String,
}

impl ValidatedUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, HttpError> {
        let url = url.into();
        let parsed = Self::validate(&url)?;
        Ok(Self {
            url: parsed.to_string(),
        })
    }

    /// Wraps a compile-time constant. Callers keep a test proving it validates.
    pub(crate) fn from_static(url: &'static str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn parse(&self) -> Result<Url, HttpError> {
        Url::parse(&self.url).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(&self.url),
            reason: e.to_string(),
        })
    }

    fn validate(url: &str) -> Result<Url, HttpError> {
        if url.trim().is_empty() {
            return Err(HttpError::InvalidUrl {
                url: url.to_string(),
                reason: "URL cannot be empty".to_string(),
            });
        }

        if url.len() > MAX_URL_LENGTH {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
            });
        }

        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(url),
            reason: e.to_string(),
        })?;

        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("invalid scheme '{scheme}', only 'http' and 'https' are allowed"),
            });
        }

        if parsed.host_str().is_none() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "URL must have a host".to_string(),
            });
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "credentials in URL are not allowed".to_string(),
            });
        }

        Ok(parsed)
    }

    fn truncate_url(url: &str) -> String {
        if url.len() <= 100 {
            url.to_string()
        } else {
            let cut = (0..=100).rev().find(|i| url.is_char_boundary(*i)).unwrap_or(0);
            format!("{}...", &url[..cut])
        }
    }
}

impl TryFrom<String> for ValidatedUrl {
    type Error = HttpError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ValidatedUrl> for String {
    fn from(value: ValidatedUrl) -> Self {
        value.url
    }
}

impl std::fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// What the shell handed back for one read.
pub type HttpResult = crux_http::Result<crux_http::Response<Vec<u8>>>;

/// Transport-level failures. A response with any status code is not an error.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl HttpError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

/// A read that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// 2xx, with whatever body came along (possibly empty).
    Body(Vec<u8>),
    /// Any other status. The resource has no data this cycle.
    Status(u16),
}

/// Sorts a crux_http result into data, a bare status, or a transport failure.
///
/// Error statuses count as answers whether crux_http hands them back as a
/// response or as `HttpError::Http`.
pub fn classify(result: HttpResult) -> Result<Fetched, HttpError> {
    match result {
        Ok(mut response) if response.status().is_success() => {
            Ok(Fetched::Body(response.take_body().unwrap_or_default()))
        }
        Ok(response) => Ok(Fetched::Status(response.status().into())),
        Err(crux_http::Error::Http(error)) => Ok(Fetched::Status(error.code.into())),
        Err(error) => Err(HttpError::Network {
            message: error.to_string(),
        }),
    }
}
