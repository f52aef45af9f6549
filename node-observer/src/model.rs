//! Canonical chain model shared by every backend.
//!
//! Backends translate their own wire shapes into these types at the adapter
//! boundary. Nothing downstream of a [`crate::backend::Backend`] ever looks at
//! a backend-specific document again, except through the opaque `raw` fields.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

/// Which chain counter a block-number question is asked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    /// Most recent block known to the node, may still be reverted.
    Head,
    /// Last irreversible block.
    Lib,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => write!(f, "head"),
            Self::Lib => write!(f, "lib"),
        }
    }
}

/// Shape in which an administrative response is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    Json,
    Raw,
}

/// Snapshot of the node's counters as returned by a single info query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub head_block_num: u64,
    pub last_irreversible_block_num: u64,
    pub head_block_id: Option<String>,
    pub head_block_producer: Option<String>,
    pub chain_id: Option<String>,
}

impl ChainInfo {
    pub fn new(head_block_num: u64, last_irreversible_block_num: u64) -> Self {
        Self {
            head_block_num,
            last_irreversible_block_num,
            head_block_id: None,
            head_block_producer: None,
            chain_id: None,
        }
    }

    pub fn block_num(&self, block_type: BlockType) -> u64 {
        match block_type {
            BlockType::Head => self.head_block_num,
            BlockType::Lib => self.last_irreversible_block_num,
        }
    }

    /// A block is present once the selected counter has reached it.
    pub fn is_block_present(&self, block_num: u64, block_type: BlockType) -> bool {
        block_num <= self.block_num(block_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Executed,
    Other(String),
}

impl TxStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "executed" => Self::Executed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executed => write!(f, "executed"),
            Self::Other(status) => write!(f, "{}", status),
        }
    }
}

/// A transaction as last observed, from a command result or a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub status: TxStatus,
    pub block_num: Option<u64>,
    pub ref_block_num: Option<u64>,
    pub raw: Value,
}

const COMMAND_TX_ID: &str = "transaction_id";

impl Transaction {
    /// Command results that carry a transaction expose it under `transaction_id`.
    pub fn is_transaction_document(doc: &Value) -> bool {
        doc.get(COMMAND_TX_ID).is_some()
    }

    /// Parses the document a push/create command prints on success.
    pub fn from_command_result(doc: &Value) -> ClientResult<Self> {
        let id = doc
            .get(COMMAND_TX_ID)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ClientError::MalformedInput(format!(
                    "document does not contain a '{}' string: {}",
                    COMMAND_TX_ID, doc
                ))
            })?;

        let status = field(doc, &["processed", "receipt", "status"])
            .and_then(Value::as_str)
            .map(TxStatus::parse)
            .unwrap_or_else(|| TxStatus::Other("unknown".to_string()));

        let block_num = field(doc, &["processed", "action_traces"])
            .and_then(|traces| traces.get(0))
            .and_then(|trace| trace.get("block_num"))
            .and_then(lenient_u64);

        Ok(Self {
            id: id.to_string(),
            status,
            block_num,
            ref_block_num: None,
            raw: doc.clone(),
        })
    }

    pub fn is_executed(&self) -> bool {
        self.status == TxStatus::Executed
    }
}

/// Reference to a transaction listed inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    pub id: String,
    pub status: Option<TxStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub num: u64,
    pub id: String,
    pub producer: String,
    pub transactions: Vec<TransactionRef>,
    pub schedule_version: u64,
}

impl Block {
    pub fn contains_transaction(&self, tx_id: &str) -> bool {
        self.transactions.iter().any(|tx| tx.id == tx_id)
    }
}

/// An ordered list of block producers with its version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerSchedule {
    pub version: u64,
    pub producers: Vec<String>,
}

impl ProducerSchedule {
    pub fn new(version: u64, producers: Vec<String>) -> Self {
        Self { version, producers }
    }

    /// Accepts `null` (no schedule), `{version, producers: [{producer_name}]}`
    /// and the same with plain producer-name strings.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        if value.is_null() {
            return Ok(Self::default());
        }

        let version = match value.get("version") {
            Some(v) => lenient_u64(v).ok_or_else(|| format!("invalid schedule version {}", v))?,
            None => return Err("schedule without 'version'".to_string()),
        };

        let producers = value
            .get("producers")
            .and_then(Value::as_array)
            .ok_or_else(|| "schedule without 'producers' array".to_string())?
            .iter()
            .map(|entry| {
                entry
                    .get("producer_name")
                    .and_then(Value::as_str)
                    .or_else(|| entry.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| format!("invalid producer entry {}", entry))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { version, producers })
    }

    pub fn producer_set(&self) -> BTreeSet<&str> {
        self.producers.iter().map(String::as_str).collect()
    }

    pub fn contains_all(&self, targets: &BTreeSet<String>) -> bool {
        let set = self.producer_set();
        targets.iter().all(|t| set.contains(t.as_str()))
    }
}

/// The three schedules in effect at a given block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub block_num: u64,
    pub active: ProducerSchedule,
    pub pending: ProducerSchedule,
    pub proposed: ProducerSchedule,
    /// Only reported by backends that expose block header state.
    pub shuffle_slot: Option<u64>,
    /// False when the node has not yet caught up with the block's recorded
    /// schedule version; such a block must not be evaluated.
    pub settled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub raw: Value,
}

/// Walks nested object keys.
pub(crate) fn field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

/// Reads an unsigned integer from a JSON number, a numeric string, or a
/// normalized `NumberLong-<n>` tag.
pub(crate) fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let digits = s.strip_prefix("NumberLong-").unwrap_or(s);
            digits.parse().ok()
        }
        _ => None,
    }
}
