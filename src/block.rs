//! The raw block record decoded from one portal stream line.
//!
//! The portal serves one JSON object per line. Only the header fields the
//! client itself depends on (`number`, `hash`, `parentHash`) are typed;
//! everything else is retained as raw JSON so that field projections of any
//! shape round-trip untouched. Numeric values may arrive as decimal strings
//! to preserve 256-bit precision; [`BlockHeader::number`] tolerates both.

use alloy::primitives::BlockNumber;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A single decoded block line.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Block {
    pub header: BlockHeader,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traces: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub state_diffs: Vec<Value>,
}

impl Block {
    /// The block number of this record.
    #[must_use]
    pub fn number(&self) -> BlockNumber {
        self.header.number
    }
}

/// The always-present part of a block's header.
///
/// Any further header fields the query selected are kept in `extra`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockHeader {
    #[serde(deserialize_with = "number_or_string")]
    pub number: BlockNumber,
    pub hash: String,
    pub parent_hash: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accepts both `123` and `"123"`, as the portal may stringify numbers that
/// can exceed 64 bits elsewhere in the record.
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BlockNumber, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        String(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(n) => Ok(n),
        Repr::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
