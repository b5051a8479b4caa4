//! The finalized streaming client.
//!
//! [`PortalClient`] turns the portal's finalized-stream endpoint into a
//! single logically-continuous block stream: it reissues truncated
//! responses, polls at the head, decodes newline-delimited block lines,
//! and feeds a bounded buffer that hands batches to the consumer with
//! backpressure.
//!
//! Two tasks cooperate per stream: the spawned *ingest* task producing into
//! the buffer, and the *consumer* pulling [`BlockBatch`]es out of
//! [`FinalizedBlockStream`]. They share only the buffer and a cancellation
//! token.

use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll, ready},
};

use alloy::primitives::BlockNumber;
use tokio::time::{Duration, Instant};
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, ReusableBoxFuture};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::{
    PortalError,
    block::Block,
    query::{FieldSelection, StreamQuery},
    stream::{
        buffer::{BlockBuffer, BufferReader, BufferWriter},
        line_splitter::LineSplitter,
    },
    transport::{self, BodyStream, HttpClient, StreamingBody},
    types::{BatchResult, BlockBatch, FinalizedHead},
};

/// Default low-water mark of buffered wire bytes that triggers a handoff.
pub const DEFAULT_MIN_BYTES: usize = 40 * 1024 * 1024;

/// Default time without a new chunk after which a non-empty buffer is
/// handed off.
pub const DEFAULT_MAX_IDLE_TIME: Duration = Duration::from_millis(300);

/// Default time since the consumer's pull after which a non-empty buffer is
/// handed off.
pub const DEFAULT_MAX_WAIT_TIME: Duration = Duration::from_secs(5);

/// Default delay between retries when the stream has caught up with the
/// finalized head.
pub const DEFAULT_HEAD_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Minimum interval between finalized-height probes inside a running
/// stream.
const HEIGHT_POLL_MIN_INTERVAL: Duration = Duration::from_secs(10);

const STREAM_PATH: &str = "finalized-stream";
const HEIGHT_PATH: &str = "finalized-stream/height";

/// Client for a portal's finalized-stream API.
#[derive(Clone, Debug)]
pub struct PortalClient {
    base_url: Url,
    http: HttpClient,
    min_bytes: usize,
    max_bytes: usize,
    max_idle_time: Duration,
    max_wait_time: Duration,
    head_poll_interval: Duration,
}

impl PortalClient {
    /// Returns a builder for a client of the portal at `url`.
    #[must_use]
    pub fn builder(url: impl Into<String>) -> PortalClientBuilder {
        PortalClientBuilder::new(url)
    }

    /// Fetches the current finalized height.
    ///
    /// # Errors
    ///
    /// * [`PortalError::Transport`] - if the request fails.
    /// * [`PortalError::InvalidHeight`] - if the response is not a decimal
    ///   integer.
    pub async fn get_finalized_height(&self) -> Result<BlockNumber, PortalError> {
        let url = self.base_url.join(HEIGHT_PATH)?;
        let text = self.http.get_text(url).await?;
        text.trim().parse().map_err(|_| PortalError::InvalidHeight(text))
    }

    /// Fetches the blocks of a single request, without resumption.
    ///
    /// Returns whatever the portal chose to serve in one response, which
    /// may end before the query's end block. `204 No Content` yields an
    /// empty vector.
    ///
    /// # Errors
    ///
    /// * [`PortalError::Transport`] - if the request or a body read fails.
    /// * [`PortalError::Decode`] - if a block line is malformed.
    /// * [`PortalError::OutOfOrderBlock`] - if block numbers do not
    ///   strictly increase.
    pub async fn get_finalized_batch(
        &self,
        query: &StreamQuery,
    ) -> Result<Vec<Block>, PortalError> {
        let query = hydrate_fields(query.clone());
        let url = self.base_url.join(STREAM_PATH)?;

        let mut body = match self.http.post_stream(url, &query.wire_at(query.range.from)).await? {
            StreamingBody::NoContent => return Ok(Vec::new()),
            StreamingBody::Stream(body) => body,
        };

        let mut blocks = Vec::new();
        let mut splitter = LineSplitter::new();
        let mut last: Option<BlockNumber> = None;
        while let Some(chunk) = body.next_chunk().await? {
            for line in splitter.push(&chunk).map_err(transport::Error::from)? {
                if let Some(block) = decode_line(&line, &mut last)? {
                    blocks.push(block);
                }
            }
        }
        if let Some(line) = splitter.finish().map_err(transport::Error::from)?
            && let Some(block) = decode_line(&line, &mut last)?
        {
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// Opens a finalized block stream for `query`.
    ///
    /// Spawns the ingest task immediately; must be called within a tokio
    /// runtime. The stream ends when the query is exhausted, when the head
    /// is reached with [`StreamOptions::stop_on_head`], or on
    /// [`FinalizedBlockStream::cancel`].
    #[must_use]
    pub fn get_finalized_stream(
        &self,
        query: StreamQuery,
        options: StreamOptions,
    ) -> FinalizedBlockStream {
        let (writer, reader) = BlockBuffer::new(
            options.min_bytes.unwrap_or(self.min_bytes),
            options.max_bytes.unwrap_or(self.max_bytes),
            options.max_idle_time.unwrap_or(self.max_idle_time),
            options.max_wait_time.unwrap_or(self.max_wait_time),
        );
        let token = CancellationToken::new();
        let head = Arc::new(AtomicU64::new(0));

        let ingest = Ingest {
            base_url: self.base_url.clone(),
            http: options.http.unwrap_or_else(|| self.http.clone()),
            query: hydrate_fields(query),
            head_poll_interval: options.head_poll_interval.unwrap_or(self.head_poll_interval),
            stop_on_head: options.stop_on_head,
            head: Arc::clone(&head),
            writer,
            token: token.clone(),
        };
        tokio::spawn(ingest.run());

        FinalizedBlockStream { reader, token, head }
    }
}

/// Unions the query's field selection with the always-required set.
fn hydrate_fields(mut query: StreamQuery) -> StreamQuery {
    query.fields = query.fields.union(&FieldSelection::required());
    query
}

fn decode_line(
    line: &str,
    last: &mut Option<BlockNumber>,
) -> Result<Option<Block>, PortalError> {
    if line.is_empty() {
        return Ok(None);
    }
    let block: Block = serde_json::from_str(line)?;
    let number = block.number();
    if last.is_some_and(|last| number <= last) {
        return Err(PortalError::OutOfOrderBlock { last: last.unwrap_or_default(), next: number });
    }
    *last = Some(number);
    Ok(Some(block))
}

/// Builder/configuration for [`PortalClient`].
#[derive(Clone, Debug)]
pub struct PortalClientBuilder {
    url: String,
    http: Option<HttpClient>,
    min_bytes: usize,
    max_bytes: Option<usize>,
    max_idle_time: Duration,
    max_wait_time: Duration,
    head_poll_interval: Duration,
}

impl PortalClientBuilder {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: None,
            min_bytes: DEFAULT_MIN_BYTES,
            max_bytes: None,
            max_idle_time: DEFAULT_MAX_IDLE_TIME,
            max_wait_time: DEFAULT_MAX_WAIT_TIME,
            head_poll_interval: DEFAULT_HEAD_POLL_INTERVAL,
        }
    }

    /// Uses a preconfigured HTTP transport.
    #[must_use]
    pub fn http(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the buffered-bytes low-water mark that triggers a handoff.
    ///
    /// Must be greater than 0.
    #[must_use]
    pub fn min_bytes(mut self, min_bytes: usize) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    /// Sets the buffered-bytes high-water mark that suspends the producer.
    ///
    /// Must be at least `min_bytes`; defaults to `min_bytes`.
    #[must_use]
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Sets the chunk-idle time after which a non-empty buffer is handed
    /// off.
    #[must_use]
    pub fn max_idle_time(mut self, max_idle_time: Duration) -> Self {
        self.max_idle_time = max_idle_time;
        self
    }

    /// Sets the time since the consumer's pull after which a non-empty
    /// buffer is handed off.
    #[must_use]
    pub fn max_wait_time(mut self, max_wait_time: Duration) -> Self {
        self.max_wait_time = max_wait_time;
        self
    }

    /// Sets the delay between retries once the stream has caught up with
    /// the finalized head.
    #[must_use]
    pub fn head_poll_interval(mut self, head_poll_interval: Duration) -> Self {
        self.head_poll_interval = head_poll_interval;
        self
    }

    /// Validates the configuration and builds the client.
    ///
    /// # Errors
    ///
    /// * [`PortalError::InvalidUrl`] - if the portal url does not parse.
    /// * [`PortalError::InvalidMinBytes`] - if `min_bytes` is 0.
    /// * [`PortalError::InvalidMaxBytes`] - if `max_bytes < min_bytes`.
    pub fn build(self) -> Result<PortalClient, PortalError> {
        if self.min_bytes == 0 {
            return Err(PortalError::InvalidMinBytes);
        }
        let max_bytes = self.max_bytes.unwrap_or(self.min_bytes);
        if max_bytes < self.min_bytes {
            return Err(PortalError::InvalidMaxBytes);
        }

        let mut base_url = Url::parse(&self.url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        Ok(PortalClient {
            base_url,
            http: self.http.unwrap_or_default(),
            min_bytes: self.min_bytes,
            max_bytes,
            max_idle_time: self.max_idle_time,
            max_wait_time: self.max_wait_time,
            head_poll_interval: self.head_poll_interval,
        })
    }
}

/// Per-stream overrides of the client's thresholds.
#[derive(Clone, Debug, Default)]
pub struct StreamOptions {
    pub min_bytes: Option<usize>,
    pub max_bytes: Option<usize>,
    pub max_idle_time: Option<Duration>,
    pub max_wait_time: Option<Duration>,
    pub head_poll_interval: Option<Duration>,
    pub http: Option<HttpClient>,
    /// End the stream once the portal reports no data at the requested
    /// block, instead of polling for new finalized blocks.
    pub stop_on_head: bool,
}

/// The ingest half of a finalized stream.
struct Ingest {
    base_url: Url,
    http: HttpClient,
    query: StreamQuery,
    head_poll_interval: Duration,
    stop_on_head: bool,
    head: Arc<AtomicU64>,
    writer: BufferWriter,
    token: CancellationToken,
}

impl Ingest {
    async fn run(mut self) {
        let token = self.token.clone();
        let result = tokio::select! {
            () = token.cancelled() => {
                debug!("finalized stream cancelled");
                Ok(())
            }
            result = self.drive() => result,
        };
        match result {
            Ok(()) => self.writer.close(),
            Err(error) => self.writer.fail(error),
        }
    }

    /// The request loop: issues finalized-stream requests until the query
    /// is exhausted, resuming after each truncated response.
    async fn drive(&mut self) -> Result<(), PortalError> {
        let stream_url = self.base_url.join(STREAM_PATH)?;
        let mut from_block = self.query.range.from;
        let to_block = self.query.range.to;
        let mut last_block: Option<BlockNumber> = None;
        let mut last_height_poll: Option<Instant> = None;

        debug!(
            from_block = from_block,
            to_block = ?to_block,
            stop_on_head = self.stop_on_head,
            "Starting finalized block stream"
        );

        while to_block.is_none_or(|to| from_block <= to) {
            self.refresh_finalized_height(&mut last_height_poll).await?;

            let response =
                self.http.post_stream(stream_url.clone(), &self.query.wire_at(from_block)).await?;
            match response {
                StreamingBody::NoContent => {
                    if self.stop_on_head {
                        debug!(from_block = from_block, "Reached finalized head, stopping");
                        return Ok(());
                    }
                    trace!(from_block = from_block, "No data at head yet, polling");
                    tokio::time::sleep(self.head_poll_interval).await;
                }
                StreamingBody::Stream(mut body) => {
                    match self.drain_response(&mut body, &mut from_block, &mut last_block).await {
                        // natural response end between requests: hand off the tail
                        Ok(()) => self.writer.mark_ready(),
                        Err(PortalError::Transport(transport::Error::ReadTimeout)) => {
                            info!(
                                from_block = from_block,
                                "Body read timed out, reissuing request"
                            );
                        }
                        Err(error) => return Err(error),
                    }
                }
            }
        }

        debug!(to_block = ?to_block, "Query exhausted");
        Ok(())
    }

    /// Reads one response body to its end, feeding decoded blocks into the
    /// buffer and advancing `from_block` past each of them.
    async fn drain_response(
        &mut self,
        body: &mut BodyStream,
        from_block: &mut BlockNumber,
        last_block: &mut Option<BlockNumber>,
    ) -> Result<(), PortalError> {
        let mut splitter = LineSplitter::new();
        while let Some(chunk) = body.next_chunk().await? {
            let lines = splitter.push(&chunk).map_err(transport::Error::from)?;
            self.process_lines(lines, from_block, last_block).await?;
        }
        if let Some(tail) = splitter.finish().map_err(transport::Error::from)? {
            self.process_lines(vec![tail], from_block, last_block).await?;
        }
        Ok(())
    }

    async fn process_lines(
        &mut self,
        lines: Vec<String>,
        from_block: &mut BlockNumber,
        last_block: &mut Option<BlockNumber>,
    ) -> Result<(), PortalError> {
        for line in lines {
            let Some(block) = decode_line(&line, last_block)? else { continue };
            *from_block = block.number() + 1;
            self.writer.push(block, line.len()).await;
        }
        Ok(())
    }

    /// Probes the finalized height at most once per
    /// [`HEIGHT_POLL_MIN_INTERVAL`], keeping the published head number
    /// monotonically non-decreasing.
    async fn refresh_finalized_height(
        &self,
        last_poll: &mut Option<Instant>,
    ) -> Result<(), PortalError> {
        if last_poll.is_some_and(|at| at.elapsed() < HEIGHT_POLL_MIN_INTERVAL) {
            return Ok(());
        }
        *last_poll = Some(Instant::now());

        let url = self.base_url.join(HEIGHT_PATH)?;
        match self.http.get_text(url).await {
            Ok(text) => {
                let height: BlockNumber =
                    text.trim().parse().map_err(|_| PortalError::InvalidHeight(text))?;
                self.head.fetch_max(height, Ordering::Relaxed);
                trace!(height = height, "Finalized height refreshed");
                Ok(())
            }
            Err(error) => {
                // the head stamp is auxiliary; keep streaming on a failed probe
                warn!(error = %error, "Finalized height probe failed");
                Ok(())
            }
        }
    }
}

/// A pull stream of finalized block batches.
///
/// Obtained from [`PortalClient::get_finalized_stream`]. Dropping the
/// stream cancels the ingest task.
pub struct FinalizedBlockStream {
    reader: BufferReader,
    token: CancellationToken,
    head: Arc<AtomicU64>,
}

impl FinalizedBlockStream {
    /// Pulls the next batch.
    ///
    /// Returns `None` at end of stream. A fatal ingest error is returned
    /// exactly once; afterwards the stream reads as ended. The returned
    /// batch is stamped with the latest finalized head known to the
    /// client.
    pub async fn next(&mut self) -> Option<BatchResult> {
        match self.reader.take().await? {
            Ok(blocks) => {
                Some(Ok(BlockBatch { finalized_head: self.finalized_head(), blocks }))
            }
            Err(error) => Some(Err(error)),
        }
    }

    /// The latest finalized head reported by the portal.
    ///
    /// `hash` is not served by the current protocol and is always `None`.
    #[must_use]
    pub fn finalized_head(&self) -> FinalizedHead {
        FinalizedHead { number: self.head.load(Ordering::Relaxed), hash: None }
    }

    /// Stops the ingest task. Idempotent; safe to call from any task.
    ///
    /// At most one already-prepared batch is delivered after cancelling;
    /// subsequent pulls return end-of-stream. Cancellation is never
    /// reported as an error.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Adapts this puller into a [`tokio_stream::Stream`].
    #[must_use]
    pub fn into_stream(self) -> BlockBatchStream {
        BlockBatchStream::new(self)
    }
}

impl Drop for FinalizedBlockStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for FinalizedBlockStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizedBlockStream")
            .field("finalized_head", &self.finalized_head())
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

type NextBatch = (Option<BatchResult>, FinalizedBlockStream);

async fn make_future(mut stream: FinalizedBlockStream) -> NextBatch {
    let item = stream.next().await;
    (item, stream)
}

/// [`Stream`] adapter over [`FinalizedBlockStream`].
pub struct BlockBatchStream {
    inner: ReusableBoxFuture<'static, NextBatch>,
    finished: bool,
}

impl BlockBatchStream {
    #[must_use]
    pub fn new(stream: FinalizedBlockStream) -> Self {
        Self { inner: ReusableBoxFuture::new(make_future(stream)), finished: false }
    }

    /// Returns true if the stream has reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Stream for BlockBatchStream {
    type Item = BatchResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        let (item, stream) = ready!(self.inner.poll(cx));
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        self.inner.set(make_future(stream));
        Poll::Ready(item)
    }
}

impl From<FinalizedBlockStream> for BlockBatchStream {
    fn from(stream: FinalizedBlockStream) -> Self {
        Self::new(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let client = PortalClient::builder("http://localhost:8000").build().unwrap();

        assert_eq!(client.min_bytes, DEFAULT_MIN_BYTES);
        assert_eq!(client.max_bytes, DEFAULT_MIN_BYTES);
        assert_eq!(client.max_idle_time, DEFAULT_MAX_IDLE_TIME);
        assert_eq!(client.max_wait_time, DEFAULT_MAX_WAIT_TIME);
        assert_eq!(client.head_poll_interval, DEFAULT_HEAD_POLL_INTERVAL);
    }

    #[test]
    fn builder_normalizes_base_url() {
        let client = PortalClient::builder("http://localhost:8000/datasets/eth").build().unwrap();

        let url = client.base_url.join(HEIGHT_PATH).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/datasets/eth/finalized-stream/height");
    }

    #[test]
    fn builder_rejects_zero_min_bytes() {
        let result = PortalClient::builder("http://localhost:8000").min_bytes(0).build();
        assert!(matches!(result, Err(PortalError::InvalidMinBytes)));
    }

    #[test]
    fn builder_rejects_max_below_min() {
        let result =
            PortalClient::builder("http://localhost:8000").min_bytes(100).max_bytes(50).build();
        assert!(matches!(result, Err(PortalError::InvalidMaxBytes)));
    }

    #[test]
    fn builder_rejects_bad_url() {
        let result = PortalClient::builder("not a url").build();
        assert!(matches!(result, Err(PortalError::InvalidUrl(_))));
    }

    #[test]
    fn decode_line_enforces_strict_order() {
        let mut last = None;
        let line = r#"{"header":{"number":10,"hash":"0x0a","parentHash":"0x09"}}"#;
        assert!(decode_line(line, &mut last).unwrap().is_some());

        let duplicate = decode_line(line, &mut last);
        assert!(matches!(
            duplicate,
            Err(PortalError::OutOfOrderBlock { last: 10, next: 10 })
        ));
    }

    #[test]
    fn decode_line_skips_empty_lines() {
        let mut last = None;
        assert!(decode_line("", &mut last).unwrap().is_none());
        assert!(last.is_none());
    }
}
