//! HTTP layer with built-in retry, timeout and streaming-body support.
//!
//! [`HttpClient`] wraps a [`reqwest::Client`] and retries request issuance
//! with exponential backoff under a total per-call timeout. Response bodies
//! of streaming endpoints are exposed as [`BodyStream`], whose per-chunk
//! read timeout surfaces as the distinct [`Error::ReadTimeout`] so callers
//! can treat a stalled body as transient.

use std::{pin::Pin, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use bytes::Bytes;
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::Serialize;
use tokio::time::timeout;
use tokio_stream::{Stream, StreamExt};
use tracing::info;
use url::Url;

/// Default number of retries per request.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Default minimum delay between retries.
pub const DEFAULT_MIN_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Default total timeout for issuing a request, retries included.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a single body-chunk read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors produced by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body:?}")]
    Status { status: StatusCode, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("body read timed out")]
    ReadTimeout,

    #[error("response line is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Whether reissuing the same request may succeed.
    ///
    /// Status errors are authoritative answers from the portal and are not
    /// retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Request(err) => !err.is_builder(),
            Error::Timeout | Error::ReadTimeout => true,
            Error::Status { .. } | Error::Utf8(_) => false,
        }
    }
}

/// HTTP client with retry, timeout and default-header support.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    headers: HeaderMap,
    max_retries: usize,
    min_retry_delay: Duration,
    call_timeout: Duration,
    read_timeout: Duration,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HttpClient {
    /// Returns a builder with the default retry schedule and timeouts.
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// GETs `url` and returns the response body as text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Status`] for non-2xx responses, [`Error::Timeout`]
    /// when the call (retries included) exceeds the call timeout, or the
    /// final [`Error::Request`] after retries are exhausted.
    pub async fn get_text(&self, url: Url) -> Result<String, Error> {
        self.retry_with_total_timeout(|| async {
            let response =
                self.client.get(url.clone()).headers(self.headers.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Status { status, body });
            }
            Ok(response.text().await?)
        })
        .await
    }

    /// POSTs `body` as JSON to `url` and returns the streaming response.
    ///
    /// A `204 No Content` response is reported as
    /// [`StreamingBody::NoContent`]; any other non-200 status is
    /// [`Error::Status`]. Retries only cover request issuance, never the
    /// body read.
    ///
    /// # Errors
    ///
    /// Same as [`HttpClient::get_text`].
    pub async fn post_stream<B: Serialize>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<StreamingBody, Error> {
        let response = self
            .retry_with_total_timeout(|| async {
                let response = self
                    .client
                    .post(url.clone())
                    .headers(self.headers.clone())
                    .json(body)
                    .send()
                    .await?;
                let status = response.status();
                match status {
                    StatusCode::OK | StatusCode::NO_CONTENT => Ok(response),
                    _ => {
                        let body = response.text().await.unwrap_or_default();
                        Err(Error::Status { status, body })
                    }
                }
            })
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(StreamingBody::NoContent);
        }
        Ok(StreamingBody::Stream(BodyStream {
            inner: Box::pin(response.bytes_stream()),
            read_timeout: self.read_timeout,
        }))
    }

    /// Executes `operation` with exponential backoff and a total timeout
    /// covering all attempts.
    async fn retry_with_total_timeout<T, F, Fut>(&self, operation: F) -> Result<T, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let retry_strategy = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(self.min_retry_delay);

        timeout(
            self.call_timeout,
            (|| operation())
                .retry(retry_strategy)
                .when(Error::is_retryable)
                .notify(|err: &Error, dur: Duration| {
                    info!(error = %err, "request failed, retrying after {:?}", dur);
                })
                .sleep(tokio::time::sleep),
        )
        .await
        .map_err(|_| Error::Timeout)?
    }
}

/// Configuration for [`HttpClient`].
#[derive(Clone, Debug)]
pub struct HttpClientBuilder {
    client: Option<reqwest::Client>,
    headers: HeaderMap,
    max_retries: usize,
    min_retry_delay: Duration,
    call_timeout: Duration,
    read_timeout: Duration,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: None,
            headers: HeaderMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            min_retry_delay: DEFAULT_MIN_RETRY_DELAY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Uses a preconfigured [`reqwest::Client`] instead of the default one.
    #[must_use]
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the number of retries per request.
    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the minimum delay between retries.
    #[must_use]
    pub fn min_retry_delay(mut self, min_retry_delay: Duration) -> Self {
        self.min_retry_delay = min_retry_delay;
        self
    }

    /// Sets the total timeout for issuing a request, retries included.
    #[must_use]
    pub fn call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Sets the timeout for a single body-chunk read.
    #[must_use]
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    #[must_use]
    pub fn build(self) -> HttpClient {
        HttpClient {
            client: self.client.unwrap_or_default(),
            headers: self.headers,
            max_retries: self.max_retries,
            min_retry_delay: self.min_retry_delay,
            call_timeout: self.call_timeout,
            read_timeout: self.read_timeout,
        }
    }
}

/// The body of a streaming POST response.
pub enum StreamingBody {
    /// The portal has no data at or after the requested block yet.
    NoContent,
    /// A `200 OK` body to be read chunk by chunk.
    Stream(BodyStream),
}

/// A streaming response body with a per-chunk read timeout.
pub struct BodyStream {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    read_timeout: Duration,
}

impl BodyStream {
    /// Reads the next body chunk.
    ///
    /// Returns `Ok(None)` when the body ends.
    ///
    /// # Errors
    ///
    /// [`Error::ReadTimeout`] when no chunk arrives within the read
    /// timeout, [`Error::Request`] for any other transport failure.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match timeout(self.read_timeout, self.inner.next()).await {
            Err(_) => Err(Error::ReadTimeout),
            Ok(None) => Ok(None),
            Ok(Some(Ok(chunk))) => Ok(Some(chunk)),
            Ok(Some(Err(err))) if err.is_timeout() => Err(Error::ReadTimeout),
            Ok(Some(Err(err))) => Err(Error::Request(err)),
        }
    }
}

impl std::fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyStream").field("read_timeout", &self.read_timeout).finish_non_exhaustive()
    }
}
