//! In-memory backend for exercising waiters without a node.
//!
//! Pair it with [`crate::clock::PausedClock`] so poll loops run in virtual
//! time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::backend::Backend;
use crate::error::{ClientError, ClientResult};
use crate::model::{
    Account, Block, ChainInfo, ProducerSchedule, ScheduleSnapshot, Transaction, TransactionRef,
    TxStatus,
};

/// Builds a settled snapshot whose active schedule is `producers` at `version`.
pub fn snapshot(block_num: u64, version: u64, producers: &[&str]) -> ScheduleSnapshot {
    ScheduleSnapshot {
        block_num,
        active: ProducerSchedule::new(version, producers.iter().map(|p| p.to_string()).collect()),
        pending: ProducerSchedule::default(),
        proposed: ProducerSchedule::default(),
        shuffle_slot: None,
        settled: true,
    }
}

#[derive(Default)]
struct ChainState {
    info: Option<ChainInfo>,
    blocks: HashMap<u64, Block>,
    transactions: HashMap<String, Transaction>,
    accounts: HashMap<String, Account>,
    schedules: HashMap<u64, ScheduleSnapshot>,
}

/// Backend serving a chain assembled by the test.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<ChainState>,
    advance_head: AtomicBool,
    failing_info_lookups: AtomicUsize,
    failing_transaction_lookups: AtomicUsize,
    info_lookups: AtomicU64,
    block_lookups: AtomicU64,
    transaction_lookups: AtomicU64,
    schedule_lookups: AtomicU64,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_head(self, head: u64, lib: u64) -> Self {
        self.set_head(head, lib);
        self
    }

    pub fn set_head(&self, head: u64, lib: u64) {
        self.state.lock().info = Some(ChainInfo::new(head, lib));
    }

    /// Every info query moves head (and LIB) forward by one after answering.
    pub fn advance_head_every_lookup(&self, enabled: bool) {
        self.advance_head.store(enabled, Ordering::SeqCst);
    }

    /// The next `count` info queries fail with a backend error.
    pub fn fail_info_lookups(&self, count: usize) {
        self.failing_info_lookups.store(count, Ordering::SeqCst);
    }

    /// The next `count` transaction queries fail with a backend error.
    pub fn fail_transaction_lookups(&self, count: usize) {
        self.failing_transaction_lookups.store(count, Ordering::SeqCst);
    }

    pub fn add_block(&self, num: u64, producer: &str, tx_ids: &[&str]) {
        let block = Block {
            num,
            id: format!("{:08x}", num),
            producer: producer.to_string(),
            transactions: tx_ids
                .iter()
                .map(|id| TransactionRef {
                    id: id.to_string(),
                    status: Some(TxStatus::Executed),
                })
                .collect(),
            schedule_version: 0,
        };
        self.state.lock().blocks.insert(num, block);
    }

    pub fn add_transaction(&self, id: &str, ref_block_num: u64) {
        self.insert_transaction(id, ref_block_num, None);
    }

    /// Same as [`Self::add_transaction`], with the including block reported.
    pub fn add_transaction_in_block(&self, id: &str, ref_block_num: u64, block_num: u64) {
        self.insert_transaction(id, ref_block_num, Some(block_num));
    }

    fn insert_transaction(&self, id: &str, ref_block_num: u64, block_num: Option<u64>) {
        let tx = Transaction {
            id: id.to_string(),
            status: TxStatus::Executed,
            block_num,
            ref_block_num: Some(ref_block_num),
            raw: json!({"id": id, "ref_block_num": ref_block_num}),
        };
        self.state.lock().transactions.insert(id.to_string(), tx);
    }

    pub fn add_account(&self, name: &str) {
        let account = Account {
            name: name.to_string(),
            raw: json!({"account_name": name}),
        };
        self.state.lock().accounts.insert(name.to_string(), account);
    }

    pub fn add_schedule(&self, snapshot: ScheduleSnapshot) {
        self.state.lock().schedules.insert(snapshot.block_num, snapshot);
    }

    pub fn info_lookups(&self) -> u64 {
        self.info_lookups.load(Ordering::SeqCst)
    }

    pub fn block_lookups(&self) -> u64 {
        self.block_lookups.load(Ordering::SeqCst)
    }

    pub fn transaction_lookups(&self) -> u64 {
        self.transaction_lookups.load(Ordering::SeqCst)
    }

    pub fn schedule_lookups(&self) -> u64 {
        self.schedule_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn describe(&self) -> String {
        "mock backend".to_string()
    }

    async fn get_info(&self) -> ClientResult<Option<ChainInfo>> {
        self.info_lookups.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_info_lookups.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_info_lookups.store(failing - 1, Ordering::SeqCst);
            return Err(ClientError::backend("get info", "connection refused"));
        }

        let mut state = self.state.lock();
        let info = state.info.clone();
        if self.advance_head.load(Ordering::SeqCst) {
            if let Some(next) = state.info.as_mut() {
                next.head_block_num += 1;
                next.last_irreversible_block_num += 1;
            }
        }
        Ok(info)
    }

    async fn get_block(&self, block_num: u64) -> ClientResult<Option<Block>> {
        crate::backend::ensure_block_num(block_num)?;
        self.block_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().blocks.get(&block_num).cloned())
    }

    async fn get_transaction(&self, id: &str) -> ClientResult<Option<Transaction>> {
        crate::backend::ensure_non_empty("transaction id", id)?;
        self.transaction_lookups.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_transaction_lookups.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_transaction_lookups.store(failing - 1, Ordering::SeqCst);
            return Err(ClientError::backend("get transaction", "connection refused"));
        }
        Ok(self.state.lock().transactions.get(id).cloned())
    }

    async fn get_account(&self, name: &str) -> ClientResult<Option<Account>> {
        crate::backend::ensure_non_empty("account name", name)?;
        Ok(self.state.lock().accounts.get(name).cloned())
    }

    async fn get_schedule(&self, block_num: u64) -> ClientResult<Option<ScheduleSnapshot>> {
        crate::backend::ensure_block_num(block_num)?;
        self.schedule_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().schedules.get(&block_num).cloned())
    }
}
