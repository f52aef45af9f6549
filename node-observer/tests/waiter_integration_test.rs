// Integration test for the client's wait primitives
// Runs NodeClient against a mock node under paused time

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

use tos_node_observer::backend::Backend;
use tos_node_observer::clock::{Clock, PausedClock};
use tos_node_observer::model::{
    Account, Block, BlockType, ChainInfo, ScheduleSnapshot, Transaction, TransactionRef, TxStatus,
};
use tos_node_observer::{ClientResult, NodeClient, QueryOptions};

// Mock node implementation
struct TestNode {
    head: Arc<Mutex<u64>>,
    lib: Arc<Mutex<u64>>,
    blocks: Arc<Mutex<HashMap<u64, Vec<String>>>>,
    transactions: Arc<Mutex<HashMap<String, u64>>>,
    transaction_calls: AtomicU64,
}

impl TestNode {
    fn new(head: u64, lib: u64) -> Self {
        Self {
            head: Arc::new(Mutex::new(head)),
            lib: Arc::new(Mutex::new(lib)),
            blocks: Arc::new(Mutex::new(HashMap::new())),
            transactions: Arc::new(Mutex::new(HashMap::new())),
            transaction_calls: AtomicU64::new(0),
        }
    }

    async fn set_head(&self, head: u64) {
        *self.head.lock().await = head;
    }

    async fn set_lib(&self, lib: u64) {
        *self.lib.lock().await = lib;
    }

    /// Puts `tx_id` into `block_num`, referencing the block before it.
    async fn include(&self, tx_id: &str, block_num: u64) {
        self.blocks
            .lock()
            .await
            .entry(block_num)
            .or_default()
            .push(tx_id.to_string());
        self.transactions
            .lock()
            .await
            .insert(tx_id.to_string(), block_num - 1);
    }

    fn transaction_calls(&self) -> u64 {
        self.transaction_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for TestNode {
    fn describe(&self) -> String {
        "test node".to_string()
    }

    async fn get_info(&self) -> ClientResult<Option<ChainInfo>> {
        Ok(Some(ChainInfo::new(
            *self.head.lock().await,
            *self.lib.lock().await,
        )))
    }

    async fn get_block(&self, block_num: u64) -> ClientResult<Option<Block>> {
        if block_num > *self.head.lock().await {
            return Ok(None);
        }
        let ids = self
            .blocks
            .lock()
            .await
            .get(&block_num)
            .cloned()
            .unwrap_or_default();
        Ok(Some(Block {
            num: block_num,
            id: format!("{:08x}", block_num),
            producer: "defproducera".to_string(),
            transactions: ids
                .into_iter()
                .map(|id| TransactionRef {
                    id,
                    status: Some(TxStatus::Executed),
                })
                .collect(),
            schedule_version: 1,
        }))
    }

    async fn get_transaction(&self, id: &str) -> ClientResult<Option<Transaction>> {
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .transactions
            .lock()
            .await
            .get(id)
            .map(|ref_block_num| Transaction {
                id: id.to_string(),
                status: TxStatus::Executed,
                block_num: None,
                ref_block_num: Some(*ref_block_num),
                raw: json!({"id": id}),
            }))
    }

    async fn get_account(&self, _name: &str) -> ClientResult<Option<Account>> {
        Ok(None)
    }

    async fn get_schedule(&self, _block_num: u64) -> ClientResult<Option<ScheduleSnapshot>> {
        Ok(None)
    }
}

fn client_for(node: Arc<TestNode>, clock: Arc<PausedClock>) -> NodeClient {
    NodeClient::builder()
        .with_backend(node)
        .with_clock(clock)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_wait_for_block_already_reached() {
    let clock = Arc::new(PausedClock::new());
    let node = Arc::new(TestNode::new(100, 80));
    let client = client_for(node, clock.clone());

    let start = clock.now();
    assert!(client
        .wait_for_block(100, BlockType::Head, None)
        .await
        .unwrap());
    assert_eq!(clock.now(), start);
}

#[tokio::test]
async fn test_wait_for_block_with_progression() {
    let clock = Arc::new(PausedClock::new());
    let node = Arc::new(TestNode::new(50, 40));
    let node_clone = node.clone();
    let client = client_for(node, clock.clone());

    // Advance height in background
    tokio::spawn(async move {
        sleep(Duration::from_secs(7)).await;
        node_clone.set_head(110).await;
    });

    let start = clock.now();
    assert!(client
        .wait_for_block(100, BlockType::Head, None)
        .await
        .unwrap());
    let elapsed = clock.now() - start;
    assert!(elapsed >= Duration::from_secs(7));
    assert!(elapsed <= Duration::from_secs(9));
}

#[tokio::test]
async fn test_wait_for_irreversible_block_times_out() {
    let clock = Arc::new(PausedClock::new());
    let node = Arc::new(TestNode::new(200, 40));
    let client = client_for(node, clock.clone());

    let start = clock.now();
    let reached = client
        .wait_for_irreversible_block(100, Some(Duration::from_secs(15)))
        .await
        .unwrap();
    assert!(!reached);
    assert_eq!(clock.now() - start, Duration::from_secs(15));
}

#[tokio::test]
async fn test_never_produced_transaction_is_bounded() {
    let clock = Arc::new(PausedClock::new());
    let node = Arc::new(TestNode::new(100, 80));
    let client = client_for(node.clone(), clock.clone());

    let start = clock.now();
    let found = client
        .wait_for_transaction_in_block("never-produced", None)
        .await
        .unwrap();

    assert!(!found);
    assert_eq!(node.transaction_calls(), 21);
    let elapsed = clock.now() - start;
    assert!(elapsed >= Duration::from_secs(60));
    assert!(elapsed < Duration::from_secs(63));
}

#[tokio::test]
async fn test_transaction_finalization_follows_lib() {
    let clock = Arc::new(PausedClock::new());
    let node = Arc::new(TestNode::new(20, 10));
    node.include("transfer", 18).await;
    let node_clone = node.clone();
    let client = client_for(node.clone(), clock.clone());

    assert!(client
        .wait_for_transaction_in_block("transfer", None)
        .await
        .unwrap());
    assert!(!client.is_transaction_finalized("transfer").await.unwrap());

    tokio::spawn(async move {
        for lib in 11..=18 {
            sleep(Duration::from_secs(2)).await;
            node_clone.set_lib(lib).await;
        }
    });

    assert!(client
        .wait_for_transaction_finalization("transfer", None)
        .await
        .unwrap());
    assert!(client.is_transaction_finalized("transfer").await.unwrap());
    assert_eq!(client.locate_block("transfer").await.unwrap(), Some(18));
}

#[tokio::test]
async fn test_transaction_appearing_late_is_found() {
    let clock = Arc::new(PausedClock::new());
    let node = Arc::new(TestNode::new(30, 20));
    let node_clone = node.clone();
    let client = client_for(node.clone(), clock.clone());

    tokio::spawn(async move {
        sleep(Duration::from_secs(10)).await;
        node_clone.include("late", 30).await;
    });

    let tx = client
        .get_transaction("late", QueryOptions::silent(), true)
        .await
        .unwrap();
    assert!(tx.is_some());
    assert!(client.cached_transaction("late").is_some());
    assert!(!client.status_report().missing_transaction);
}

#[tokio::test]
async fn test_get_transaction_without_retry_ignores_budget() {
    let clock = Arc::new(PausedClock::new());
    let node = Arc::new(TestNode::new(30, 20));
    let client = NodeClient::builder()
        .with_backend(node.clone())
        .with_clock(clock.clone())
        .with_poll_config(tos_node_observer::poller::PollConfig::new(
            Duration::from_secs(1),
            Duration::from_secs(600),
        ))
        .build()
        .unwrap();

    let start = clock.now();
    let tx = client
        .get_transaction("absent", QueryOptions::silent(), false)
        .await
        .unwrap();
    assert!(tx.is_none());
    assert_eq!(node.transaction_calls(), 1);
    assert_eq!(clock.now(), start);
}

#[tokio::test]
async fn test_clients_do_not_share_caches() {
    let clock = Arc::new(PausedClock::new());
    let node = Arc::new(TestNode::new(30, 20));
    let first = client_for(node.clone(), clock.clone());
    let second = client_for(node, clock);

    let result = json!({
        "transaction_id": "shared",
        "processed": {"receipt": {"status": "executed"}, "action_traces": [{"block_num": 25}]}
    });
    first.track_cmd_transaction(Some(&result), false).unwrap();

    assert!(first.cached_transaction("shared").is_some());
    assert!(second.cached_transaction("shared").is_none());
}
