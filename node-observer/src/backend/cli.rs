//! Live-node backend driven through the node's command-line client.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::extract_json_document;
use super::runner::CommandRunner;
use super::{ensure_block_num, ensure_non_empty, Backend};
use crate::error::{ClientError, ClientResult};
use crate::model::{
    field, lenient_u64, Account, Block, ChainInfo, ProducerSchedule, ScheduleSnapshot,
    Transaction, TransactionRef, TxStatus,
};

/// How to invoke the command-line client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    pub program: String,
    pub node_url: String,
    pub wallet_url: Option<String>,
    pub extra_args: Vec<String>,
}

impl CliConfig {
    pub fn new(program: impl Into<String>, node_url: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            node_url: node_url.into(),
            wallet_url: None,
            extra_args: Vec::new(),
        }
    }

    fn endpoint_args(&self) -> Vec<String> {
        let mut args = vec!["--url".to_string(), self.node_url.clone()];
        if let Some(wallet) = &self.wallet_url {
            args.push("--wallet-url".to_string());
            args.push(wallet.clone());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

pub struct CliBackend {
    config: CliConfig,
    runner: Arc<dyn CommandRunner>,
}

impl CliBackend {
    pub fn new(config: CliConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Runs one client command and returns its JSON document, `None` when the
    /// client reported the entity as unknown.
    async fn query(&self, operation: &str, command: &[&str]) -> ClientResult<Option<Value>> {
        let mut args = self.config.endpoint_args();
        args.extend(command.iter().map(|part| part.to_string()));

        let output = self
            .runner
            .run(&self.config.program, &args, None)
            .await
            .map_err(|e| ClientError::backend(operation, e.to_string()))?;

        if !output.success() {
            if reports_missing_entity(&output.stderr) {
                debug!("'{}' found nothing: {}", operation, output.stderr.trim());
                return Ok(None);
            }
            return Err(ClientError::backend(
                operation,
                format!(
                    "client exited with {:?}: {}",
                    output.status,
                    output.stderr.trim()
                ),
            ));
        }

        let document = extract_json_document(&output.stdout).ok_or_else(|| {
            ClientError::protocol(operation, "no JSON document in output", output.stdout.clone())
        })?;
        let value = serde_json::from_str(document).map_err(|e| {
            ClientError::protocol(operation, e.to_string(), output.stdout.clone())
        })?;
        Ok(Some(value))
    }
}

/// Phrases the client prints when a block, transaction or account does not
/// exist. Anything else is a failure.
const MISSING_ENTITY_PHRASES: &[&str] = &[
    "unknown block",
    "unknown transaction",
    "unknown key",
    "not found",
    "can not be found",
    "cannot be found",
    "could not find",
];

fn reports_missing_entity(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    MISSING_ENTITY_PHRASES
        .iter()
        .any(|phrase| stderr.contains(phrase))
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

fn optional_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn parse_info(value: &Value) -> Result<ChainInfo, String> {
    Ok(ChainInfo {
        head_block_num: required_u64(value, &["head_block_num"])?,
        last_irreversible_block_num: required_u64(value, &["last_irreversible_block_num"])?,
        head_block_id: optional_str(value, "head_block_id"),
        head_block_producer: optional_str(value, "head_block_producer"),
        chain_id: optional_str(value, "chain_id"),
    })
}

/// Block receipts list either a full packed transaction (`trx.id`) or just
/// the id of a deferred one (`trx` is a string).
fn parse_receipt(receipt: &Value) -> Result<TransactionRef, String> {
    let trx = receipt
        .get("trx")
        .ok_or_else(|| format!("transaction receipt without 'trx': {}", receipt))?;
    let id = match trx {
        Value::String(id) => id.clone(),
        other => required_str(other, &["id"])?,
    };
    Ok(TransactionRef {
        id,
        status: receipt
            .get("status")
            .and_then(Value::as_str)
            .map(TxStatus::parse),
    })
}

pub(crate) fn parse_block(value: &Value) -> Result<Block, String> {
    let transactions = match value.get("transactions") {
        Some(Value::Array(receipts)) => receipts
            .iter()
            .map(parse_receipt)
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => return Err(format!("'transactions' is not an array: {}", other)),
    };

    Ok(Block {
        num: required_u64(value, &["block_num"])?,
        id: required_str(value, &["id"])?,
        producer: required_str(value, &["producer"])?,
        transactions,
        schedule_version: required_u64(value, &["schedule_version"])?,
    })
}

pub(crate) fn parse_transaction(value: &Value) -> Result<Transaction, String> {
    Ok(Transaction {
        id: required_str(value, &["id"])?,
        status: field(value, &["trx", "receipt", "status"])
            .and_then(Value::as_str)
            .map(TxStatus::parse)
            .unwrap_or_else(|| TxStatus::Other("unknown".to_string())),
        block_num: value.get("block_num").and_then(lenient_u64),
        ref_block_num: field(value, &["trx", "trx", "ref_block_num"]).and_then(lenient_u64),
        raw: value.clone(),
    })
}

fn parse_schedules(value: &Value) -> Result<[ProducerSchedule; 3], String> {
    let mut parsed = [
        ProducerSchedule::default(),
        ProducerSchedule::default(),
        ProducerSchedule::default(),
    ];
    for (slot, key) in parsed.iter_mut().zip(["active", "pending", "proposed"]) {
        let schedule = value
            .get(key)
            .ok_or_else(|| format!("schedule response without '{}'", key))?;
        *slot = ProducerSchedule::from_json(schedule)?;
    }
    Ok(parsed)
}

#[async_trait]
impl Backend for CliBackend {
    fn describe(&self) -> String {
        format!("{} --url {}", self.config.program, self.config.node_url)
    }

    async fn get_info(&self) -> ClientResult<Option<ChainInfo>> {
        const OP: &str = "get info";
        let Some(value) = self.query(OP, &["get", "info"]).await? else {
            return Ok(None);
        };
        parse_info(&value)
            .map(Some)
            .map_err(|e| ClientError::protocol(OP, e, value.to_string()))
    }

    async fn get_block(&self, block_num: u64) -> ClientResult<Option<Block>> {
        const OP: &str = "get block";
        ensure_block_num(block_num)?;
        let num = block_num.to_string();
        let Some(value) = self.query(OP, &["get", "block", &num]).await? else {
            return Ok(None);
        };
        parse_block(&value)
            .map(Some)
            .map_err(|e| ClientError::protocol(OP, e, value.to_string()))
    }

    async fn get_transaction(&self, id: &str) -> ClientResult<Option<Transaction>> {
        const OP: &str = "get transaction";
        ensure_non_empty("transaction id", id)?;
        let Some(value) = self.query(OP, &["get", "transaction", id]).await? else {
            return Ok(None);
        };
        parse_transaction(&value)
            .map(Some)
            .map_err(|e| ClientError::protocol(OP, e, value.to_string()))
    }

    async fn get_account(&self, name: &str) -> ClientResult<Option<Account>> {
        const OP: &str = "get account";
        ensure_non_empty("account name", name)?;
        let Some(value) = self.query(OP, &["get", "account", "-j", name]).await? else {
            return Ok(None);
        };
        let name = required_str(&value, &["account_name"])
            .map_err(|e| ClientError::protocol(OP, e, value.to_string()))?;
        Ok(Some(Account { name, raw: value }))
    }

    async fn get_schedule(&self, block_num: u64) -> ClientResult<Option<ScheduleSnapshot>> {
        const OP: &str = "get schedule";
        let Some(block) = self.get_block(block_num).await? else {
            return Ok(None);
        };
        let Some(value) = self.query(OP, &["get", "schedule", "-j"]).await? else {
            return Ok(None);
        };
        let [active, pending, proposed] =
            parse_schedules(&value).map_err(|e| ClientError::protocol(OP, e, value.to_string()))?;

        // The client reports the node's current schedules, which only describe
        // this block once the node has caught up with the block's version.
        let settled = active.version == block.schedule_version;
        Ok(Some(ScheduleSnapshot {
            block_num,
            active,
            pending,
            proposed,
            shuffle_slot: None,
            settled,
        }))
    }
}
