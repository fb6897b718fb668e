//! Remote downloads with content-hash verification.
use std::io::Read as _;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::FetchError;

/// Supported content hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256, written as `sha256:<hex>`.
    Sha256,
}

impl HashAlgorithm {
    /// Prefix used in hash strings (`sha256:<hex>`).
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Digest `bytes`, formatted as `<prefix>:<hex>`.
    #[must_use]
    pub fn digest(self, bytes: &[u8]) -> String {
        match self {
            Self::Sha256 => format!("{}:{}", self.prefix(), hex::encode(Sha256::digest(bytes))),
        }
    }

    /// Split a hash string into its algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::UnsupportedHash`] for unknown prefixes or a
    /// missing hex part.
    pub fn parse(hash: &str) -> Result<Self, FetchError> {
        match hash.split_once(':') {
            Some(("sha256", hex)) if !hex.is_empty() => Ok(Self::Sha256),
            _ => Err(FetchError::UnsupportedHash(hash.to_string())),
        }
    }
}

/// Bytes downloaded from one of the candidate URLs.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// URL that served the bytes.
    pub url: String,
    /// Response body.
    pub bytes: Vec<u8>,
    /// Content hash of `bytes` (`sha256:<hex>`).
    pub hash: String,
}

/// Downloads content from the first URL that succeeds.
pub trait Fetcher: Send + Sync {
    /// Try `urls` in order and return the first successful download.
    ///
    /// When `expected` is given the bytes must hash to it; a mismatch counts
    /// as a failure for that URL.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NoUrls`] for an empty list, or
    /// [`FetchError::Exhausted`] carrying the last failure when every URL
    /// fails.
    fn fetch(&self, urls: &[String], expected: Option<&str>) -> Result<Fetched, FetchError>;
}

/// Verify `bytes` against an optional expected hash and build the result.
///
/// # Errors
///
/// Returns [`FetchError::UnsupportedHash`] or [`FetchError::HashMismatch`].
pub fn verify(url: &str, bytes: Vec<u8>, expected: Option<&str>) -> Result<Fetched, FetchError> {
    let algorithm = expected.map_or(Ok(HashAlgorithm::Sha256), HashAlgorithm::parse)?;
    let hash = algorithm.digest(&bytes);
    if let Some(expected) = expected
        && expected != hash
    {
        return Err(FetchError::HashMismatch {
            expected: expected.to_string(),
            actual: hash,
        });
    }
    Ok(Fetched {
        url: url.to_string(),
        bytes,
        hash,
    })
}

/// Try each URL with `fetch_one`, keeping the last error.
///
/// # Errors
///
/// See [`Fetcher::fetch`].
pub fn try_urls<F>(urls: &[String], mut fetch_one: F) -> Result<Fetched, FetchError>
where
    F: FnMut(&str) -> Result<Fetched, FetchError>,
{
    let mut last = None;
    for url in urls {
        match fetch_one(url) {
            Ok(fetched) => return Ok(fetched),
            Err(e) => {
                warn!(url = %url, error = %e, "download failed");
                last = Some(e);
            }
        }
    }
    match last {
        Some(e) => Err(FetchError::Exhausted {
            tried: urls.len(),
            last: Box::new(e),
        }),
        None => Err(FetchError::NoUrls),
    }
}

/// HTTP(S) fetcher backed by `ureq`.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher").finish_non_exhaustive()
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request_err = |message: String| FetchError::Request {
            url: url.to_string(),
            message,
        };
        debug!(url = %url, "requesting");
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| request_err(e.to_string()))?;
        let mut bytes = Vec::new();
        response
            .into_body()
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| request_err(e.to_string()))?;
        Ok(bytes)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, urls: &[String], expected: Option<&str>) -> Result<Fetched, FetchError> {
        let fetched = try_urls(urls, |url| verify(url, self.get(url)?, expected))?;
        info!(url = %fetched.url, size = fetched.bytes.len(), hash = %fetched.hash, "download complete");
        Ok(fetched)
    }
}
