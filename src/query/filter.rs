//! Per-data-kind filter records and the per-range request payload.
//!
//! Each filter is a record of optional hex-string arrays (matching is
//! case-insensitive downstream, so arrays are canonicalised to lowercase
//! when a filter enters the query builder) plus booleans selecting which
//! related records the portal must co-return. `None` and an empty array are
//! equivalent on the wire: both are omitted.

use serde::{Deserialize, Serialize};

fn is_false(v: &bool) -> bool {
    !*v
}

fn lowercase_all(field: &mut Option<Vec<String>>) {
    if let Some(values) = field {
        for value in values.iter_mut() {
            if value.chars().any(|c| c.is_ascii_uppercase()) {
                *value = value.to_ascii_lowercase();
            }
        }
    }
}

/// Selects logs by address and topics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic0: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic1: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic2: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic3: Option<Vec<String>>,
    #[serde(skip_serializing_if = "is_false")]
    pub transaction: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub transaction_traces: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub transaction_logs: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub transaction_state_diffs: bool,
}

impl LogFilter {
    pub(crate) fn normalized(mut self) -> Self {
        lowercase_all(&mut self.address);
        lowercase_all(&mut self.topic0);
        lowercase_all(&mut self.topic1);
        lowercase_all(&mut self.topic2);
        lowercase_all(&mut self.topic3);
        self
    }
}

/// Selects transactions by participants, sighash and type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sighash: Option<Vec<String>>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "is_false")]
    pub logs: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub traces: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub state_diffs: bool,
}

impl TransactionFilter {
    pub(crate) fn normalized(mut self) -> Self {
        lowercase_all(&mut self.to);
        lowercase_all(&mut self.from);
        lowercase_all(&mut self.sighash);
        self
    }
}

/// Selects call/create/suicide/reward traces by their kind-specific keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceFilter {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_from: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_to: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_from: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sighash: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suicide_refund_address: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_author: Option<Vec<String>>,
    #[serde(skip_serializing_if = "is_false")]
    pub transaction: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub transaction_logs: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub subtraces: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub parents: bool,
}

impl TraceFilter {
    pub(crate) fn normalized(mut self) -> Self {
        lowercase_all(&mut self.create_from);
        lowercase_all(&mut self.call_to);
        lowercase_all(&mut self.call_from);
        lowercase_all(&mut self.call_sighash);
        lowercase_all(&mut self.suicide_refund_address);
        lowercase_all(&mut self.reward_author);
        self
    }
}

/// Selects storage/balance/code/nonce diffs by address and key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateDiffFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<Vec<String>>,
    #[serde(skip_serializing_if = "is_false")]
    pub transaction: bool,
}

impl StateDiffFilter {
    pub(crate) fn normalized(mut self) -> Self {
        lowercase_all(&mut self.address);
        lowercase_all(&mut self.key);
        self
    }
}

/// Everything requested for one block range: the filters of all data kinds
/// plus the include-all-blocks flag.
///
/// Serializes flattened into the wire request, with empty lists omitted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RangeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<LogFilter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<TransactionFilter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traces: Option<Vec<TraceFilter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_diffs: Option<Vec<StateDiffFilter>>,
    #[serde(skip_serializing_if = "is_false")]
    pub include_all_blocks: bool,
}

impl RangeRequest {
    /// Concatenates the per-kind filter lists of two requests (in argument
    /// order) and ORs `include_all_blocks`.
    #[must_use]
    pub(crate) fn merge(self, other: &Self) -> Self {
        Self {
            logs: concat_filters(self.logs, &other.logs),
            transactions: concat_filters(self.transactions, &other.transactions),
            traces: concat_filters(self.traces, &other.traces),
            state_diffs: concat_filters(self.state_diffs, &other.state_diffs),
            include_all_blocks: self.include_all_blocks || other.include_all_blocks,
        }
    }
}

fn concat_filters<T: Clone>(a: Option<Vec<T>>, b: &Option<Vec<T>>) -> Option<Vec<T>> {
    let mut out = a.unwrap_or_default();
    if let Some(b) = b {
        out.extend(b.iter().cloned());
    }
    if out.is_empty() { None } else { Some(out) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_lowercases_hex_arrays() {
        let filter = LogFilter {
            address: Some(vec!["0xAbCd".to_owned()]),
            topic0: Some(vec!["0xDEAD".to_owned(), "0xbeef".to_owned()]),
            ..Default::default()
        }
        .normalized();

        assert_eq!(filter.address, Some(vec!["0xabcd".to_owned()]));
        assert_eq!(filter.topic0, Some(vec!["0xdead".to_owned(), "0xbeef".to_owned()]));
    }

    #[test]
    fn merge_concatenates_in_order() {
        let a = RangeRequest {
            logs: Some(vec![LogFilter { address: Some(vec!["0xaa".to_owned()]), ..Default::default() }]),
            ..Default::default()
        };
        let b = RangeRequest {
            logs: Some(vec![LogFilter { address: Some(vec!["0xbb".to_owned()]), ..Default::default() }]),
            include_all_blocks: true,
            ..Default::default()
        };

        let merged = a.merge(&b);

        let logs = merged.logs.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].address, Some(vec!["0xaa".to_owned()]));
        assert_eq!(logs[1].address, Some(vec!["0xbb".to_owned()]));
        assert!(merged.include_all_blocks);
        assert!(merged.transactions.is_none());
    }

    #[test]
    fn merge_treats_empty_as_undefined() {
        let a = RangeRequest { logs: Some(vec![]), ..Default::default() };
        let b = RangeRequest::default();

        assert!(a.merge(&b).logs.is_none());
    }

    #[test]
    fn serializes_omitting_empty_fields() {
        let request = RangeRequest {
            logs: Some(vec![LogFilter {
                address: Some(vec!["0xaa".to_owned()]),
                transaction: true,
                ..Default::default()
            }]),
            ..Default::default()
        };

        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"logs": [{"address": ["0xaa"], "transaction": true}]})
        );
    }

    #[test]
    fn transaction_type_serializes_as_type() {
        let filter = TransactionFilter { type_: Some(vec![2]), ..Default::default() };

        let json = serde_json::to_value(&filter).unwrap();

        assert_eq!(json, serde_json::json!({"type": [2]}));
    }
}
