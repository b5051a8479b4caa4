//! Declarative query construction.
//!
//! [`QueryBuilder`] accumulates per-range filters, then [`build`] merges
//! them into an ordered list of disjoint range segments, each carrying the
//! concatenation of every filter that covers it, clipped to the outer range
//! when one was set.
//!
//! [`build`]: QueryBuilder::build

use alloy::primitives::BlockNumber;
use serde::Serialize;

use crate::query::{
    fields::FieldSelection,
    filter::{LogFilter, RangeRequest, StateDiffFilter, TraceFilter, TransactionFilter},
    range::{BlockRange, clip_ranges, merge_range_requests},
};

/// Accumulates per-range filters into a [`Query`].
///
/// Hex-string filter fields are lowercased as they are added, so later
/// merges compare equal values as equal.
#[derive(Clone, Debug, Default)]
pub struct QueryBuilder {
    range: Option<BlockRange>,
    entries: Vec<(BlockRange, RangeRequest)>,
}

impl QueryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests logs matching `filter` within `range`.
    #[must_use]
    pub fn add_log(mut self, filter: LogFilter, range: BlockRange) -> Self {
        let request = RangeRequest { logs: Some(vec![filter.normalized()]), ..Default::default() };
        self.entries.push((range, request));
        self
    }

    /// Requests transactions matching `filter` within `range`.
    #[must_use]
    pub fn add_transaction(mut self, filter: TransactionFilter, range: BlockRange) -> Self {
        let request =
            RangeRequest { transactions: Some(vec![filter.normalized()]), ..Default::default() };
        self.entries.push((range, request));
        self
    }

    /// Requests traces matching `filter` within `range`.
    #[must_use]
    pub fn add_trace(mut self, filter: TraceFilter, range: BlockRange) -> Self {
        let request =
            RangeRequest { traces: Some(vec![filter.normalized()]), ..Default::default() };
        self.entries.push((range, request));
        self
    }

    /// Requests state diffs matching `filter` within `range`.
    #[must_use]
    pub fn add_state_diff(mut self, filter: StateDiffFilter, range: BlockRange) -> Self {
        let request =
            RangeRequest { state_diffs: Some(vec![filter.normalized()]), ..Default::default() };
        self.entries.push((range, request));
        self
    }

    /// Requests every block header within `range`, matched by filters or not.
    #[must_use]
    pub fn include_all_blocks(mut self, range: BlockRange) -> Self {
        self.entries.push((range, RangeRequest { include_all_blocks: true, ..Default::default() }));
        self
    }

    /// Bounds the whole query to `range`.
    #[must_use]
    pub fn range(mut self, range: BlockRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Merges the accumulated filters into disjoint, ascending range
    /// segments and clips them to the outer range.
    #[must_use]
    pub fn build(self) -> Query {
        let merged = merge_range_requests(&self.entries, RangeRequest::merge);
        let requests = match self.range {
            Some(outer) => clip_ranges(&merged, outer),
            None => merged,
        };
        Query { requests }
    }
}

/// A built query: disjoint range segments, sorted ascending, each with the
/// fold of every filter that covers it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    requests: Vec<(BlockRange, RangeRequest)>,
}

impl Query {
    /// The per-range request segments, ascending by range start.
    #[must_use]
    pub fn requests(&self) -> &[(BlockRange, RangeRequest)] {
        &self.requests
    }

    /// A copy of this query restricted to `outer`.
    #[must_use]
    pub fn clipped(&self, outer: BlockRange) -> Self {
        Self { requests: clip_ranges(&self.requests, outer) }
    }

    /// The single-range stream queries this query decomposes into, in
    /// ascending range order.
    #[must_use]
    pub fn stream_queries(&self, fields: &FieldSelection) -> Vec<StreamQuery> {
        self.requests
            .iter()
            .map(|(range, request)| StreamQuery {
                range: *range,
                fields: fields.clone(),
                request: request.clone(),
            })
            .collect()
    }
}

/// The request a single finalized stream serves: one contiguous block range,
/// a field selection and the filters to apply.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamQuery {
    pub range: BlockRange,
    pub fields: FieldSelection,
    pub request: RangeRequest,
}

impl StreamQuery {
    /// A query over `range` with no filters; combine with
    /// `request.include_all_blocks` or filter setters as needed.
    #[must_use]
    pub fn new(range: BlockRange) -> Self {
        Self { range, ..Default::default() }
    }

    /// The wire-format body for a request starting at `from_block`.
    pub(crate) fn wire_at(&self, from_block: BlockNumber) -> WireRequest<'_> {
        WireRequest {
            type_: "evm",
            from_block,
            to_block: self.range.to,
            fields: &self.fields,
            request: &self.request,
        }
    }
}

/// The JSON body POSTed to the finalized-stream endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireRequest<'a> {
    #[serde(rename = "type")]
    type_: &'static str,
    from_block: BlockNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_block: Option<BlockNumber>,
    fields: &'a FieldSelection,
    #[serde(flatten)]
    request: &'a RangeRequest,
}
