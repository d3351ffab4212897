use crate::util::validate_feed_url;
use async_trait::async_trait;
use flate2::read::{GzDecoder, ZlibDecoder};
use futures::StreamExt;
use reqwest::header::{HeaderMap, ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, LOCATION};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::io::Read;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Redirect hops followed before giving up; the next one is rejected.
pub const MAX_REDIRECTS: u32 = 3;
/// Budget for one request, covering both the response head and the body.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Identifying `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("newsticker/", env!("CARGO_PKG_VERSION"));

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const ACCEPT_FEED: &str = "application/rss+xml, application/xml;q=0.9, */*;q=0.8";
const ACCEPT_COMPRESSED: &str = "gzip, deflate, br";
const ACCEPT_IDENTITY: &str = "identity";
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Errors that can end a fetch attempt chain.
///
/// Every variant is terminal for one call to [`FeedFetcher::fetch`]; the
/// ticker turns any of them into a single error notification.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The feed URL is not an absolute http(s) URL
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),
    /// The server redirected more than [`MAX_REDIRECTS`] times
    #[error("Too many redirects (max {})", MAX_REDIRECTS)]
    TooManyRedirects,
    /// Final response was not `200 OK`
    #[error("Request failed with status {0}")]
    HttpStatus(u16),
    /// The body could not be decompressed, even after retrying uncompressed
    #[error("Failed to decode response: {0}")]
    Decode(String),
    /// The request did not complete within the fetcher's timeout
    #[error("Request timeout after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Response body exceeded the 10MB size limit, before or after decoding
    #[error("Response too large")]
    ResponseTooLarge,
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// What to request next in a fetch chain.
///
/// Attempts are values: following a redirect or falling back to an
/// uncompressed transfer derives a new attempt instead of mutating counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub url: Url,
    /// Redirect hops taken to reach `url`, `0..=MAX_REDIRECTS`
    pub redirects: u32,
    /// Request `Accept-Encoding: identity` instead of compressed transfer
    pub force_plain_text: bool,
}

impl FetchAttempt {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            redirects: 0,
            force_plain_text: false,
        }
    }

    /// Attempt for the target of a `Location` header, resolved against `self.url`.
    ///
    /// # Errors
    ///
    /// [`FetchError::TooManyRedirects`] once [`MAX_REDIRECTS`] hops have been
    /// taken, [`FetchError::InvalidUrl`] if the location does not resolve to
    /// an http(s) URL.
    pub fn redirect_to(&self, location: &str) -> Result<Self, FetchError> {
        if self.redirects >= MAX_REDIRECTS {
            return Err(FetchError::TooManyRedirects);
        }

        let target = self
            .url
            .join(location.trim())
            .map_err(|e| FetchError::InvalidUrl(format!("{location}: {e}")))?;
        let target =
            validate_feed_url(target.as_str()).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            url: target,
            redirects: self.redirects + 1,
            force_plain_text: self.force_plain_text,
        })
    }

    /// Same URL and redirect count, uncompressed transfer.
    pub fn as_plain_text(&self) -> Self {
        Self {
            force_plain_text: true,
            ..self.clone()
        }
    }

    fn accept_encoding(&self) -> &'static str {
        if self.force_plain_text {
            ACCEPT_IDENTITY
        } else {
            ACCEPT_COMPRESSED
        }
    }
}

/// Outcome of a single request that did not fail.
enum Response {
    Body(String),
    Redirect(String),
}

/// Decoder chosen from a `Content-Encoding` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentEncoding {
    Brotli,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    /// Case-insensitive substring match, tried as `br`, then `gzip`, then
    /// `deflate`. `None` means the body is used as-is.
    fn from_header(value: &str) -> Option<Self> {
        let value = value.to_ascii_lowercase();
        if value.contains("br") {
            Some(Self::Brotli)
        } else if value.contains("gzip") {
            Some(Self::Gzip)
        } else if value.contains("deflate") {
            Some(Self::Deflate)
        } else {
            None
        }
    }

    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(CONTENT_ENCODING)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
            .and_then(|v| Self::from_header(&v))
    }

    fn name(self) -> &'static str {
        match self {
            Self::Brotli => "br",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }

    /// Decompresses `body`, failing with [`FetchError::Decode`] on a corrupt
    /// stream and [`FetchError::ResponseTooLarge`] past `limit` decoded bytes.
    fn decode(self, body: &[u8], limit: usize) -> Result<Vec<u8>, FetchError> {
        let reader: Box<dyn Read + '_> = match self {
            Self::Brotli => Box::new(brotli::Decompressor::new(body, BROTLI_BUFFER_SIZE)),
            Self::Gzip => Box::new(GzDecoder::new(body)),
            // HTTP "deflate" is zlib-wrapped
            Self::Deflate => Box::new(ZlibDecoder::new(body)),
        };

        let mut decoded = Vec::new();
        reader
            .take(limit as u64 + 1)
            .read_to_end(&mut decoded)
            .map_err(|e| FetchError::Decode(format!("{} stream: {e}", self.name())))?;

        if decoded.len() > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        Ok(decoded)
    }
}

/// Source of raw feed text.
///
/// Implemented by [`FeedFetcher`]; the ticker depends on this trait so its
/// scheduling can be driven by other sources.
#[async_trait]
pub trait FetchFeed: Send + Sync {
    async fn fetch_feed(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP(S) feed fetcher.
///
/// Stateless across calls apart from the pooled `reqwest::Client`, so one
/// instance can be shared freely.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedFetcher {
    /// Creates a fetcher with the default 15 second request timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = build_client(USER_AGENT)?;
        Ok(Self { client, timeout })
    }

    /// Retrieves a feed document as decoded text.
    ///
    /// Follows up to [`MAX_REDIRECTS`] redirects and decodes `br`, `gzip`
    /// and `deflate` bodies. When a compressed body fails to decode, the same
    /// URL is requested once more with `Accept-Encoding: identity`; should
    /// that retry fail too, the original decode error is returned.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] - `url` is not an absolute http(s) URL
    /// - [`FetchError::TooManyRedirects`] - a 4th redirect was requested
    /// - [`FetchError::HttpStatus`] - final status other than 200
    /// - [`FetchError::Decode`] - body could not be decompressed
    /// - [`FetchError::Timeout`] - an attempt exceeded the timeout
    /// - [`FetchError::Network`] - connection or TLS errors, never retried
    /// - [`FetchError::ResponseTooLarge`] - body exceeded 10MB
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let url = validate_feed_url(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let mut attempt = FetchAttempt::new(url);
        let mut decode_failure: Option<FetchError> = None;

        loop {
            match self.attempt(&attempt).await {
                Ok(Response::Body(text)) => {
                    tracing::debug!(
                        url = %attempt.url,
                        bytes = text.len(),
                        redirects = attempt.redirects,
                        plain_text = attempt.force_plain_text,
                        "Feed fetched"
                    );
                    return Ok(text);
                }
                Ok(Response::Redirect(location)) => {
                    let next = match attempt.redirect_to(&location) {
                        Ok(next) => next,
                        Err(e) => return Err(decode_failure.unwrap_or(e)),
                    };
                    tracing::debug!(
                        from = %attempt.url,
                        to = %next.url,
                        hop = next.redirects,
                        "Following redirect"
                    );
                    attempt = next;
                }
                Err(FetchError::Decode(message)) if !attempt.force_plain_text => {
                    tracing::warn!(
                        url = %attempt.url,
                        error = %message,
                        "Compressed response failed to decode, retrying uncompressed"
                    );
                    attempt = attempt.as_plain_text();
                    decode_failure = Some(FetchError::Decode(message));
                }
                Err(e) => {
                    if let Some(original) = decode_failure {
                        tracing::debug!(
                            url = %attempt.url,
                            error = %e,
                            "Uncompressed retry failed, reporting original decode error"
                        );
                        return Err(original);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(&self, attempt: &FetchAttempt) -> Result<Response, FetchError> {
        tokio::time::timeout(self.timeout, self.send(attempt))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }

    async fn send(&self, attempt: &FetchAttempt) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(attempt.url.clone())
            .header(ACCEPT, ACCEPT_FEED)
            .header(ACCEPT_ENCODING, attempt.accept_encoding())
            .send()
            .await?;

        let status = response.status();
        if status.is_redirection() {
            if let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            {
                return Ok(Response::Redirect(location.to_owned()));
            }
        }

        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let encoding = ContentEncoding::from_headers(response.headers());
        let raw = read_limited_bytes(response, MAX_FEED_SIZE).await?;
        let bytes = match encoding {
            Some(encoding) => encoding.decode(&raw, MAX_FEED_SIZE)?,
            None => raw,
        };
        Ok(Response::Body(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// Redirects are followed by `fetch` and bodies are decoded by
/// [`ContentEncoding`], so the client does neither.
fn build_client(user_agent: &str) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .user_agent(user_agent)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(FetchError::Client)
}

#[async_trait]
impl FetchFeed for FeedFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<String, FetchError> {
        self.fetch(url).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Content-Length describes the encoded body, so only use it as a fast reject
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
