//! Query construction: block ranges, filters, field projections and the
//! builder that merges them into the portal's wire format.

mod builder;
mod fields;
mod filter;
mod range;

pub use builder::{Query, QueryBuilder, StreamQuery};
pub use fields::{
    BlockFieldSelection, FieldSelection, LogFieldSelection, StateDiffFieldSelection,
    TraceFieldSelection, TransactionFieldSelection,
};
pub use filter::{LogFilter, RangeRequest, StateDiffFilter, TraceFilter, TransactionFilter};
pub use range::BlockRange;
