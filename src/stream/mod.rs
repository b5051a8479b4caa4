//! The finalized streaming pipeline: line splitting, the bounded block
//! buffer and the client driving the portal's finalized-stream endpoint.

mod buffer;
mod client;
mod line_splitter;

pub use client::{
    BlockBatchStream, DEFAULT_HEAD_POLL_INTERVAL, DEFAULT_MAX_IDLE_TIME, DEFAULT_MAX_WAIT_TIME,
    DEFAULT_MIN_BYTES, FinalizedBlockStream, PortalClient, PortalClientBuilder, StreamOptions,
};
