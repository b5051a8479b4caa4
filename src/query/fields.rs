//! Runtime field projections.
//!
//! The portal only includes the fields a request asks for, per record kind.
//! The selection is plain runtime data (a tree of booleans); unselected
//! fields are omitted on the wire. A small set of fields the client itself
//! depends on is always selected, regardless of user input — see
//! [`FieldSelection::required`].

use serde::{Deserialize, Serialize};

fn is_false(v: &bool) -> bool {
    !*v
}

/// Which fields the portal must include, per record kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldSelection {
    #[serde(skip_serializing_if = "BlockFieldSelection::is_empty")]
    pub block: BlockFieldSelection,
    #[serde(skip_serializing_if = "TransactionFieldSelection::is_empty")]
    pub transaction: TransactionFieldSelection,
    #[serde(skip_serializing_if = "LogFieldSelection::is_empty")]
    pub log: LogFieldSelection,
    #[serde(skip_serializing_if = "TraceFieldSelection::is_empty")]
    pub trace: TraceFieldSelection,
    #[serde(skip_serializing_if = "StateDiffFieldSelection::is_empty")]
    pub state_diff: StateDiffFieldSelection,
}

impl FieldSelection {
    /// The fields the client itself needs to drive a stream: block identity
    /// and the indices that tie dependent records to their transaction.
    #[must_use]
    pub fn required() -> Self {
        Self {
            block: BlockFieldSelection {
                number: true,
                hash: true,
                parent_hash: true,
                ..Default::default()
            },
            transaction: TransactionFieldSelection {
                transaction_index: true,
                ..Default::default()
            },
            log: LogFieldSelection {
                log_index: true,
                transaction_index: true,
                ..Default::default()
            },
            trace: TraceFieldSelection {
                transaction_index: true,
                trace_address: true,
                type_: true,
                ..Default::default()
            },
            state_diff: StateDiffFieldSelection {
                transaction_index: true,
                address: true,
                key: true,
                kind: true,
                ..Default::default()
            },
        }
    }

    /// Field-wise OR of two selections.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            block: self.block.union(&other.block),
            transaction: self.transaction.union(&other.transaction),
            log: self.log.union(&other.log),
            trace: self.trace.union(&other.trace),
            state_diff: self.state_diff.union(&other.state_diff),
        }
    }
}

macro_rules! union_fields {
    ($a:expr, $b:expr, { $($field:ident),+ $(,)? }) => {
        Self { $($field: $a.$field || $b.$field),+ }
    };
}

macro_rules! none_set {
    ($sel:expr, { $($field:ident),+ $(,)? }) => {
        !($($sel.$field)||+)
    };
}

/// Block-header fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockFieldSelection {
    #[serde(skip_serializing_if = "is_false")]
    pub number: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub hash: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub parent_hash: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub timestamp: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub miner: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub gas_used: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub gas_limit: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub base_fee_per_gas: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub difficulty: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub size: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub state_root: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub extra_data: bool,
}

impl BlockFieldSelection {
    fn union(&self, other: &Self) -> Self {
        union_fields!(self, other, {
            number, hash, parent_hash, timestamp, miner, gas_used, gas_limit,
            base_fee_per_gas, difficulty, size, state_root, extra_data,
        })
    }

    fn is_empty(&self) -> bool {
        none_set!(self, {
            number, hash, parent_hash, timestamp, miner, gas_used, gas_limit,
            base_fee_per_gas, difficulty, size, state_root, extra_data,
        })
    }
}

/// Transaction fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionFieldSelection {
    #[serde(skip_serializing_if = "is_false")]
    pub transaction_index: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub hash: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub from: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub to: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub value: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub gas: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub gas_price: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub max_fee_per_gas: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub max_priority_fee_per_gas: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub input: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub nonce: bool,
    #[serde(rename = "type", skip_serializing_if = "is_false")]
    pub type_: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub status: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub sighash: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub gas_used: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub contract_address: bool,
}

impl TransactionFieldSelection {
    fn union(&self, other: &Self) -> Self {
        union_fields!(self, other, {
            transaction_index, hash, from, to, value, gas, gas_price, max_fee_per_gas,
            max_priority_fee_per_gas, input, nonce, type_, status, sighash, gas_used,
            contract_address,
        })
    }

    fn is_empty(&self) -> bool {
        none_set!(self, {
            transaction_index, hash, from, to, value, gas, gas_price, max_fee_per_gas,
            max_priority_fee_per_gas, input, nonce, type_, status, sighash, gas_used,
            contract_address,
        })
    }
}

/// Log fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogFieldSelection {
    #[serde(skip_serializing_if = "is_false")]
    pub log_index: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub transaction_index: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub transaction_hash: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub address: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub data: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub topics: bool,
}

impl LogFieldSelection {
    fn union(&self, other: &Self) -> Self {
        union_fields!(self, other, {
            log_index, transaction_index, transaction_hash, address, data, topics,
        })
    }

    fn is_empty(&self) -> bool {
        none_set!(self, { log_index, transaction_index, transaction_hash, address, data, topics })
    }
}

/// Trace fields, flattened across the call/create/suicide/reward variants.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceFieldSelection {
    #[serde(skip_serializing_if = "is_false")]
    pub transaction_index: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub trace_address: bool,
    #[serde(rename = "type", skip_serializing_if = "is_false")]
    pub type_: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub subtraces: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub error: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub create_from: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub create_result_address: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub call_from: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub call_to: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub call_value: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub call_sighash: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub call_input: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub suicide_address: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub suicide_refund_address: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub reward_author: bool,
}

impl TraceFieldSelection {
    fn union(&self, other: &Self) -> Self {
        union_fields!(self, other, {
            transaction_index, trace_address, type_, subtraces, error, create_from,
            create_result_address, call_from, call_to, call_value, call_sighash, call_input,
            suicide_address, suicide_refund_address, reward_author,
        })
    }

    fn is_empty(&self) -> bool {
        none_set!(self, {
            transaction_index, trace_address, type_, subtraces, error, create_from,
            create_result_address, call_from, call_to, call_value, call_sighash, call_input,
            suicide_address, suicide_refund_address, reward_author,
        })
    }
}

/// State-diff fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateDiffFieldSelection {
    #[serde(skip_serializing_if = "is_false")]
    pub transaction_index: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub address: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub key: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub kind: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub prev: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub next: bool,
}

impl StateDiffFieldSelection {
    fn union(&self, other: &Self) -> Self {
        union_fields!(self, other, { transaction_index, address, key, kind, prev, next })
    }

    fn is_empty(&self) -> bool {
        none_set!(self, { transaction_index, address, key, kind, prev, next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_with_required_keeps_user_fields() {
        let user = FieldSelection {
            block: BlockFieldSelection { timestamp: true, ..Default::default() },
            log: LogFieldSelection { address: true, topics: true, ..Default::default() },
            ..Default::default()
        };

        let effective = user.union(&FieldSelection::required());

        assert!(effective.block.number);
        assert!(effective.block.hash);
        assert!(effective.block.parent_hash);
        assert!(effective.block.timestamp);
        assert!(effective.log.log_index);
        assert!(effective.log.transaction_index);
        assert!(effective.log.address);
        assert!(effective.log.topics);
        assert!(effective.transaction.transaction_index);
        assert!(effective.state_diff.kind);
    }

    #[test]
    fn serializes_only_selected_fields() {
        let fields = FieldSelection {
            block: BlockFieldSelection { number: true, hash: true, ..Default::default() },
            ..Default::default()
        };

        let json = serde_json::to_value(&fields).unwrap();

        assert_eq!(json, serde_json::json!({"block": {"number": true, "hash": true}}));
    }

    #[test]
    fn empty_selection_serializes_to_empty_object() {
        let json = serde_json::to_value(FieldSelection::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
