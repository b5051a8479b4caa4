//! Streaming client for portal-served finalized EVM block history.
//!
//! A portal exposes indexed chain history as newline-delimited JSON blocks
//! behind a declarative query: a block range, field projections, and
//! filters over logs, transactions, traces and state diffs. This crate
//! turns that endpoint into an ordered, gap-free, backpressure-aware
//! stream of block batches up to the finalized head.
//!
//! # Example
//!
//! ```rust,no_run
//! use portal_client::{
//!     BlockRange, FieldSelection, LogFilter, PortalClient, QueryBuilder, StreamOptions,
//!     StreamQuery,
//! };
//! use tracing::info;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     tracing_subscriber::fmt::init();
//!
//!     let client = PortalClient::builder("https://portal.example.com/datasets/ethereum-mainnet")
//!         .min_bytes(8 * 1024 * 1024)
//!         .build()?;
//!
//!     let query = QueryBuilder::new()
//!         .add_log(
//!             LogFilter { address: Some(vec!["0xC02A...".into()]), ..Default::default() },
//!             BlockRange::new(18_000_000, 18_100_000),
//!         )
//!         .build();
//!
//!     let (range, request) = query.requests()[0].clone();
//!     let stream_query =
//!         StreamQuery { range, request, fields: FieldSelection::default() };
//!
//!     let mut stream = client.get_finalized_stream(stream_query, StreamOptions::default());
//!     while let Some(batch) = stream.next().await {
//!         let batch = batch?;
//!         info!(
//!             blocks = batch.blocks.len(),
//!             finalized_head = batch.finalized_head.number,
//!             "received batch"
//!         );
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod block;
pub mod data_source;
mod error;
pub mod query;
pub mod stream;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transport;
mod types;

pub use block::{Block, BlockHeader};
pub use data_source::PortalDataSource;
pub use error::PortalError;
pub use query::{
    BlockFieldSelection, BlockRange, FieldSelection, LogFieldSelection, LogFilter, Query,
    QueryBuilder, RangeRequest, StateDiffFieldSelection, StateDiffFilter, StreamQuery,
    TraceFieldSelection, TraceFilter, TransactionFieldSelection, TransactionFilter,
};
pub use stream::{
    BlockBatchStream, FinalizedBlockStream, PortalClient, PortalClientBuilder, StreamOptions,
};
pub use types::{BatchResult, BlockBatch, FinalizedHead};
