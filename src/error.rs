use alloy::primitives::BlockNumber;
use thiserror::Error;

use crate::transport;

/// Errors surfaced to consumers of the portal client.
#[derive(Error, Debug)]
pub enum PortalError {
    #[error("transport error: {0}")]
    Transport(#[from] transport::Error),

    #[error("failed to decode block line: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid portal url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("malformed finalized height: {0:?}")]
    InvalidHeight(String),

    #[error("server emitted block {next} after block {last}")]
    OutOfOrderBlock { last: BlockNumber, next: BlockNumber },

    #[error("min_bytes must be greater than 0")]
    InvalidMinBytes,

    #[error("max_bytes must be greater than or equal to min_bytes")]
    InvalidMaxBytes,
}
