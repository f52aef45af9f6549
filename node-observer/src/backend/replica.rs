//! Read-replica backend: queries the database the node exports its chain
//! into, through the database's interactive shell.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::{extract_json_document, normalize_extended_json};
use super::runner::CommandRunner;
use super::{ensure_block_num, ensure_non_empty, Backend};
use crate::error::{ClientError, ClientResult};
use crate::model::{
    field, lenient_u64, Account, Block, ChainInfo, ProducerSchedule, ScheduleSnapshot,
    Transaction, TransactionRef, TxStatus,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    pub shell: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl ReplicaConfig {
    fn shell_args(&self) -> Vec<String> {
        vec![
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
            "--quiet".to_string(),
            self.database.clone(),
        ]
    }
}

pub struct ReplicaBackend {
    config: ReplicaConfig,
    runner: Arc<dyn CommandRunner>,
}

impl ReplicaBackend {
    pub fn new(config: ReplicaConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Pipes one shell statement and returns the normalized JSON it printed,
    /// `None` when the shell printed nothing or `null`.
    async fn query(&self, operation: &str, statement: &str) -> ClientResult<Option<Value>> {
        let output = self
            .runner
            .run(&self.config.shell, &self.config.shell_args(), Some(statement))
            .await
            .map_err(|e| ClientError::backend(operation, e.to_string()))?;

        if !output.success() {
            return Err(ClientError::backend(
                operation,
                format!(
                    "database call failed with {:?}. statement=\"{}\" - {}",
                    output.status,
                    statement,
                    output.stderr.trim()
                ),
            ));
        }

        let Some(document) = extract_json_document(&output.stdout) else {
            let trimmed = output.stdout.trim();
            if trimmed.is_empty() || trimmed == "null" {
                debug!("'{}' found nothing", operation);
                return Ok(None);
            }
            return Err(ClientError::backend(
                operation,
                format!("no JSON document in database output: {}", trimmed),
            ));
        };

        let normalized = normalize_extended_json(document);
        serde_json::from_str(&normalized).map(Some).map_err(|e| {
            error!("Raw database response: {}", output.stdout);
            error!("Normalized database response: {}", normalized);
            ClientError::backend(operation, format!("malformed JSON: {}", e))
        })
    }

    /// Newest stored block number matching `filter`, if any block matches.
    async fn newest_block_num(&self, operation: &str, filter: &str) -> ClientResult<Option<u64>> {
        let statement = format!(
            r#"db.blocks.find({}, {{"block_num": 1}}).sort({{"block_num": -1}}).limit(1).toArray()"#,
            filter
        );
        let Some(value) = self.query(operation, &statement).await? else {
            return Ok(None);
        };
        match value.as_array().map(Vec::as_slice) {
            Some([]) => Ok(None),
            Some([newest, ..]) => newest
                .get("block_num")
                .and_then(lenient_u64)
                .map(Some)
                .ok_or_else(|| {
                    ClientError::protocol(operation, "block without 'block_num'", value.to_string())
                }),
            _ => Err(ClientError::protocol(
                operation,
                "expected an array of blocks",
                value.to_string(),
            )),
        }
    }
}

/// Shell string literal for `text`, with quotes and backslashes escaped.
fn quoted(text: &str) -> String {
    Value::from(text).to_string()
}

fn required_u64(value: &Value, path: &[&str]) -> Result<u64, String> {
    field(value, path)
        .and_then(lenient_u64)
        .ok_or_else(|| format!("missing or invalid '{}'", path.join(".")))
}

fn required_str(value: &Value, path: &[&str]) -> Result<String, String> {
    field(value, path)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("missing or invalid '{}'", path.join(".")))
}

pub(crate) fn parse_block(value: &Value) -> Result<Block, String> {
    let transactions = match field(value, &["block", "transactions"]) {
        Some(Value::Array(receipts)) => receipts
            .iter()
            .map(|receipt| {
                let id = match receipt.get("trx") {
                    Some(Value::String(id)) => id.clone(),
                    Some(trx) => required_str(trx, &["id"])?,
                    None => return Err(format!("transaction receipt without 'trx': {}", receipt)),
                };
                Ok(TransactionRef {
                    id,
                    status: receipt
                        .get("status")
                        .and_then(Value::as_str)
                        .map(TxStatus::parse),
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => return Err(format!("'block.transactions' is not an array: {}", other)),
    };

    Ok(Block {
        num: required_u64(value, &["block_num"])?,
        id: required_str(value, &["block_id"])?,
        producer: required_str(value, &["block", "producer"])?,
        transactions,
        schedule_version: required_u64(value, &["block", "schedule_version"])?,
    })
}

/// The replica only stores applied transactions, so a record without an
/// explicit status is an executed one.
pub(crate) fn parse_transaction(value: &Value) -> Result<Transaction, String> {
    Ok(Transaction {
        id: required_str(value, &["trx_id"])?,
        status: value
            .get("status")
            .and_then(Value::as_str)
            .map(TxStatus::parse)
            .unwrap_or(TxStatus::Executed),
        block_num: value.get("block_num").and_then(lenient_u64),
        ref_block_num: value.get("ref_block_num").and_then(lenient_u64),
        raw: value.clone(),
    })
}

fn parse_header_schedule(state: &Value, key: &str) -> Result<ProducerSchedule, String> {
    match state.get(key) {
        None => Ok(ProducerSchedule::default()),
        // Newer header states wrap the pending schedule with its lib number and hash.
        Some(wrapped) if wrapped.get("schedule").is_some() => {
            ProducerSchedule::from_json(&wrapped["schedule"])
        }
        Some(schedule) => ProducerSchedule::from_json(schedule),
    }
}

pub(crate) fn parse_block_state(block_num: u64, value: &Value) -> Result<ScheduleSnapshot, String> {
    let state = value
        .get("block_header_state")
        .ok_or_else(|| "block state without 'block_header_state'".to_string())?;
    let active = match state.get("active_schedule") {
        Some(schedule) => ProducerSchedule::from_json(schedule)?,
        None => return Err("block header state without 'active_schedule'".to_string()),
    };

    Ok(ScheduleSnapshot {
        block_num,
        active,
        pending: parse_header_schedule(state, "pending_schedule")?,
        proposed: parse_header_schedule(state, "proposed_schedule")?,
        shuffle_slot: state.get("scheduled_shuffle_slot").and_then(lenient_u64),
        settled: true,
    })
}

#[async_trait]
impl Backend for ReplicaBackend {
    fn describe(&self) -> String {
        format!(
            "{} {}:{}/{}",
            self.config.shell, self.config.host, self.config.port, self.config.database
        )
    }

    /// Head is the newest stored block; the last irreversible block is the
    /// newest one the exporter flagged irreversible.
    async fn get_info(&self) -> ClientResult<Option<ChainInfo>> {
        const OP: &str = "get info from replica";
        let Some(head) = self.newest_block_num(OP, "{}").await? else {
            return Ok(None);
        };
        let lib = self
            .newest_block_num(OP, r#"{"irreversible": true}"#)
            .await?
            .unwrap_or(0);
        Ok(Some(ChainInfo::new(head, lib)))
    }

    async fn get_block(&self, block_num: u64) -> ClientResult<Option<Block>> {
        const OP: &str = "get block from replica";
        ensure_block_num(block_num)?;
        let statement = format!(r#"db.blocks.findOne({{"block_num": {}}})"#, block_num);
        let Some(value) = self.query(OP, &statement).await? else {
            return Ok(None);
        };
        parse_block(&value)
            .map(Some)
            .map_err(|e| ClientError::protocol(OP, e, value.to_string()))
    }

    async fn get_transaction(&self, id: &str) -> ClientResult<Option<Transaction>> {
        const OP: &str = "get transaction from replica";
        ensure_non_empty("transaction id", id)?;
        let statement = format!(
            r#"db.transactions.findOne({{"trx_id": {}}})"#,
            quoted(id)
        );
        let Some(value) = self.query(OP, &statement).await? else {
            return Ok(None);
        };
        parse_transaction(&value)
            .map(Some)
            .map_err(|e| ClientError::protocol(OP, e, value.to_string()))
    }

    async fn get_account(&self, name: &str) -> ClientResult<Option<Account>> {
        const OP: &str = "get account from replica";
        ensure_non_empty("account name", name)?;
        let statement = format!(r#"db.accounts.findOne({{"name": {}}})"#, quoted(name));
        let Some(value) = self.query(OP, &statement).await? else {
            return Ok(None);
        };
        let name = required_str(&value, &["name"])
            .map_err(|e| ClientError::protocol(OP, e, value.to_string()))?;
        Ok(Some(Account { name, raw: value }))
    }

    async fn get_schedule(&self, block_num: u64) -> ClientResult<Option<ScheduleSnapshot>> {
        const OP: &str = "get block state from replica";
        ensure_block_num(block_num)?;
        let statement = format!(r#"db.block_states.findOne({{"block_num": {}}})"#, block_num);
        let Some(value) = self.query(OP, &statement).await? else {
            return Ok(None);
        };
        parse_block_state(block_num, &value)
            .map(Some)
            .map_err(|e| ClientError::protocol(OP, e, value.to_string()))
    }
}
