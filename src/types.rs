use alloy::primitives::BlockNumber;
use serde::{Deserialize, Serialize};

use crate::{PortalError, block::Block};

/// The finalized chain head known to the portal at the time a batch was
/// handed off.
///
/// `hash` is reserved for a future protocol revision; the portal does not
/// return it yet, so it is always `None` today.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedHead {
    pub number: BlockNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// A batch of contiguous finalized blocks delivered to the consumer.
///
/// Within one stream, block numbers are strictly increasing across and
/// within batches, and [`FinalizedHead::number`] never decreases.
#[derive(Clone, Debug)]
pub struct BlockBatch {
    pub finalized_head: FinalizedHead,
    pub blocks: Vec<Block>,
}

impl BlockBatch {
    /// Block numbers contained in this batch, in delivery order.
    #[must_use]
    pub fn block_numbers(&self) -> Vec<BlockNumber> {
        self.blocks.iter().map(Block::number).collect()
    }
}

/// A convenience `Result` type for batch streams.
pub type BatchResult = Result<BlockBatch, PortalError>;
