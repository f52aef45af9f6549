// File: node-observer/src/client/mod.rs
//
// NodeClient
//
// The surface test scenarios use: queries with per-call error policy, the
// transaction cache, and the blocking wait primitives. Everything here is
// composed from the backend, the poller, the locator and the schedule
// tracker.

mod builder;

pub use builder::NodeClientBuilder;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Duration;

use crate::admin::{AdminClient, AdminResponse};
use crate::backend::{ensure_block_num, Backend};
use crate::clock::Clock;
use crate::error::{ClientError, ClientResult};
use crate::locator::BlockLocator;
use crate::model::{Account, Block, BlockType, ChainInfo, ReturnType, Transaction, TxStatus};
use crate::poller::{poll_until, FinalityPoller, PollConfig, Probe, WaitOutcome};
use crate::schedule::{self, ScheduleOutcome, ScheduleRequest};
use crate::tracker::TransactionTracker;

/// Per-call error policy.
///
/// `exit_on_error` turns both failures and not-found results into
/// [`ClientError::Fatal`] naming the operation and its parameters; the caller
/// decides whether that ends the process. `silent_errors` only controls
/// logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub silent_errors: bool,
    pub exit_on_error: bool,
}

impl QueryOptions {
    pub fn silent() -> Self {
        Self {
            silent_errors: true,
            exit_on_error: false,
        }
    }

    pub fn exit_on_error() -> Self {
        Self {
            silent_errors: false,
            exit_on_error: true,
        }
    }
}

/// What the client last learned about its node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub backend: String,
    pub last_head_block_num: Option<u64>,
    pub last_irreversible_block_num: Option<u64>,
    /// Whether the most recent info query returned chain info.
    pub info_valid: bool,
    /// Whether a delayed transaction lookup ever ran out of retries.
    pub missing_transaction: bool,
    pub tracked_transactions: usize,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node State:")?;
        writeln!(f, " backend : {}", self.backend)?;
        match (self.last_head_block_num, self.last_irreversible_block_num) {
            (Some(head), Some(lib)) => writeln!(f, " head    : {}\n lib     : {}", head, lib)?,
            _ => writeln!(f, " head    : unknown\n lib     : unknown")?,
        }
        writeln!(f, " info    : {}", if self.info_valid { "valid" } else { "invalid" })?;
        writeln!(f, " tracked : {} transactions", self.tracked_transactions)?;
        write!(
            f,
            " missing : {}",
            if self.missing_transaction {
                "a transaction lookup timed out"
            } else {
                "none"
            }
        )
    }
}

/// Observer client for one node.
///
/// Each client owns its transaction cache; clients for different nodes never
/// share state.
pub struct NodeClient {
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    poll: PollConfig,
    block_wait: PollConfig,
    delayed_retry: bool,
    admin: Option<AdminClient>,
    tracker: TransactionTracker,
    last_info: Mutex<Option<ChainInfo>>,
    info_valid: AtomicBool,
    missing_transaction: AtomicBool,
}

impl NodeClient {
    pub(crate) fn new(
        backend: Arc<dyn Backend>,
        clock: Arc<dyn Clock>,
        poll: PollConfig,
        block_wait: PollConfig,
        delayed_retry: bool,
        admin: Option<AdminClient>,
    ) -> Self {
        Self {
            backend,
            clock,
            poll,
            block_wait,
            delayed_retry,
            admin,
            tracker: TransactionTracker::new(),
            last_info: Mutex::new(None),
            info_valid: AtomicBool::new(false),
            missing_transaction: AtomicBool::new(false),
        }
    }

    pub fn builder() -> NodeClientBuilder {
        NodeClientBuilder::new()
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    pub fn has_admin(&self) -> bool {
        self.admin.is_some()
    }

    pub fn tracker(&self) -> &TransactionTracker {
        &self.tracker
    }

    fn poller(&self) -> FinalityPoller<'_> {
        let poller = FinalityPoller::new(&*self.backend, &*self.clock, self.poll);
        if self.delayed_retry {
            poller
        } else {
            poller.without_delayed_retry()
        }
    }

    /// Applies the caller's error policy to a query result.
    fn settle<T>(
        &self,
        operation: &str,
        context: &str,
        options: QueryOptions,
        result: ClientResult<Option<T>>,
    ) -> ClientResult<Option<T>> {
        match result {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) if options.exit_on_error => Err(ClientError::fatal(
                operation,
                format!("{}: not found", context),
            )),
            Ok(None) => Ok(None),
            Err(e @ ClientError::Fatal { .. }) => Err(e),
            Err(e) if options.exit_on_error => {
                Err(ClientError::fatal(operation, format!("{}: {}", context, e)))
            }
            Err(e) => {
                if !options.silent_errors {
                    error!("Failed to {} ({}): {}", operation, context, e);
                }
                Err(e)
            }
        }
    }

    pub async fn get_info(&self, options: QueryOptions) -> ClientResult<Option<ChainInfo>> {
        let result = self.backend.get_info().await;
        match &result {
            Ok(Some(info)) => {
                self.info_valid.store(true, Ordering::SeqCst);
                *self.last_info.lock() = Some(info.clone());
            }
            _ => self.info_valid.store(false, Ordering::SeqCst),
        }
        self.settle("get info", "chain info", options, result)
    }

    pub async fn get_block(
        &self,
        block_num: u64,
        options: QueryOptions,
    ) -> ClientResult<Option<Block>> {
        let result = self.backend.get_block(block_num).await;
        self.settle(
            "get block",
            &format!("block number={}", block_num),
            options,
            result,
        )
    }

    /// Looks a transaction up and records it in the cache.
    ///
    /// With `delayed_retry` the lookup is polled until found or the poll
    /// budget runs out; without it exactly one lookup is made.
    pub async fn get_transaction(
        &self,
        tx_id: &str,
        options: QueryOptions,
        delayed_retry: bool,
    ) -> ClientResult<Option<Transaction>> {
        let context = format!("transaction id={}", tx_id);
        let result = if delayed_retry {
            self.lookup_with_retry(tx_id).await
        } else {
            self.backend.get_transaction(tx_id).await
        };

        if let Ok(Some(tx)) = &result {
            self.tracker.record(tx.clone());
        }
        self.settle("get transaction", &context, options, result)
    }

    async fn lookup_with_retry(&self, tx_id: &str) -> ClientResult<Option<Transaction>> {
        let backend = &*self.backend;
        let what = format!("get transaction {}", tx_id);
        let outcome = poll_until(&*self.clock, self.poll, true, &what, move || async move {
            Ok(match backend.get_transaction(tx_id).await? {
                Some(tx) => Probe::Ready(tx),
                None => Probe::Absent,
            })
        })
        .await?;

        match outcome {
            WaitOutcome::Satisfied { value, .. } => Ok(Some(value)),
            WaitOutcome::TimedOut { attempts, .. } => {
                warn!(
                    "transaction {} not found after {} attempts",
                    tx_id, attempts
                );
                self.missing_transaction.store(true, Ordering::SeqCst);
                Ok(None)
            }
        }
    }

    pub async fn get_account(
        &self,
        name: &str,
        options: QueryOptions,
    ) -> ClientResult<Option<Account>> {
        let result = self.backend.get_account(name).await;
        self.settle("get account", &format!("account name={}", name), options, result)
    }

    pub async fn block_num(&self, block_type: BlockType) -> ClientResult<Option<u64>> {
        let info = self.get_info(QueryOptions::default()).await?;
        Ok(info.map(|info| info.block_num(block_type)))
    }

    pub async fn head_block_num(&self) -> ClientResult<Option<u64>> {
        self.block_num(BlockType::Head).await
    }

    pub async fn irreversible_block_num(&self) -> ClientResult<Option<u64>> {
        self.block_num(BlockType::Lib).await
    }

    /// True once the selected counter has reached `block_num`.
    pub async fn is_block_present(
        &self,
        block_num: u64,
        block_type: BlockType,
    ) -> ClientResult<bool> {
        ensure_block_num(block_num)?;
        let present = match self.get_info(QueryOptions::silent()).await? {
            Some(info) => info.is_block_present(block_num, block_type),
            None => false,
        };
        if log::log_enabled!(log::Level::Debug) {
            debug!("{} block {} present: {}", block_type, block_num, present);
        }
        Ok(present)
    }

    pub async fn is_block_finalized(&self, block_num: u64) -> ClientResult<bool> {
        self.is_block_present(block_num, BlockType::Lib).await
    }

    pub async fn is_transaction_in_block(&self, tx_id: &str, block_num: u64) -> ClientResult<bool> {
        Ok(self
            .backend
            .get_block(block_num)
            .await?
            .map(|block| block.contains_transaction(tx_id))
            .unwrap_or(false))
    }

    /// Number of the block that includes the transaction, if any yet.
    pub async fn locate_block(&self, tx_id: &str) -> ClientResult<Option<u64>> {
        BlockLocator::new(&*self.backend).locate_block(tx_id).await
    }

    pub async fn is_transaction_in_any_block(&self, tx_id: &str) -> ClientResult<bool> {
        Ok(self.locate_block(tx_id).await?.is_some())
    }

    pub async fn is_transaction_finalized(&self, tx_id: &str) -> ClientResult<bool> {
        let Some(block_num) = self.locate_block(tx_id).await? else {
            return Ok(false);
        };
        self.is_block_finalized(block_num).await
    }

    pub async fn wait_for_next_block(
        &self,
        block_type: BlockType,
        timeout: Option<Duration>,
    ) -> ClientResult<bool> {
        let outcome = self.poller().wait_for_next_block(block_type, timeout).await?;
        Ok(outcome.is_satisfied())
    }

    pub async fn wait_for_block(
        &self,
        block_num: u64,
        block_type: BlockType,
        timeout: Option<Duration>,
    ) -> ClientResult<bool> {
        ensure_block_num(block_num)?;
        let outcome = self
            .poller()
            .wait_for_block_number(block_num, block_type, timeout)
            .await?;
        Ok(outcome.is_satisfied())
    }

    pub async fn wait_for_irreversible_block(
        &self,
        block_num: u64,
        timeout: Option<Duration>,
    ) -> ClientResult<bool> {
        self.wait_for_block(block_num, BlockType::Lib, timeout).await
    }

    pub async fn wait_for_transaction_in_block(
        &self,
        tx_id: &str,
        timeout: Option<Duration>,
    ) -> ClientResult<bool> {
        let outcome = self.poller().wait_for_inclusion(tx_id, timeout).await?;
        match &outcome {
            WaitOutcome::Satisfied { value, .. } => {
                debug!("transaction {} included in block {}", tx_id, value)
            }
            WaitOutcome::TimedOut { observed: true, .. } => {
                info!("transaction {} known to the node but not yet in a block", tx_id)
            }
            WaitOutcome::TimedOut { observed: false, .. } => {
                info!("transaction {} never seen by the node", tx_id)
            }
        }
        Ok(outcome.is_satisfied())
    }

    pub async fn wait_for_transaction_finalization(
        &self,
        tx_id: &str,
        timeout: Option<Duration>,
    ) -> ClientResult<bool> {
        let outcome = self.poller().wait_for_irreversibility(tx_id, timeout).await?;
        match &outcome {
            WaitOutcome::Satisfied { value, .. } => {
                debug!("transaction {} final in block {}", tx_id, value)
            }
            WaitOutcome::TimedOut { observed: true, .. } => {
                info!("transaction {} found but not yet irreversible", tx_id)
            }
            WaitOutcome::TimedOut { observed: false, .. } => {
                info!("transaction {} never seen by the node", tx_id)
            }
        }
        Ok(outcome.is_satisfied())
    }

    /// Waits for the transaction in a command result to land in a block when
    /// `wait` is set. Returns false if it never did.
    pub async fn wait_for_trans_block_if_needed(
        &self,
        command_result: &Value,
        wait: bool,
        options: QueryOptions,
    ) -> ClientResult<bool> {
        if !wait {
            return Ok(true);
        }
        let tx = Transaction::from_command_result(command_result)?;
        if self.wait_for_transaction_in_block(&tx.id, None).await? {
            return Ok(true);
        }
        if options.exit_on_error {
            return Err(ClientError::fatal(
                "wait for transaction block",
                format!("transaction id={} never made it to a block", tx.id),
            ));
        }
        Ok(false)
    }

    /// Walks blocks from the current head until `producers` are active.
    pub async fn wait_active_schedule<I, S>(
        &self,
        producers: I,
        max_blocks: u64,
        require_version_change: bool,
    ) -> ClientResult<ScheduleOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = ScheduleRequest::new(producers, max_blocks)?
            .require_version_change(require_version_change);
        let start_block = self
            .head_block_num()
            .await?
            .ok_or_else(|| ClientError::backend("get info", "node did not report chain info"))?;
        let (outcome, events) = schedule::wait_active_schedule(
            &*self.backend,
            &*self.clock,
            self.block_wait,
            start_block.max(1),
            request,
        )
        .await?;
        debug!("schedule walk produced {} events", events.len());
        Ok(outcome)
    }

    /// Producer of `block_num`, waiting for the head to reach it first when
    /// `wait_for_block` is set.
    pub async fn block_producer_by_num(
        &self,
        block_num: u64,
        wait_for_block: bool,
        options: QueryOptions,
    ) -> ClientResult<Option<String>> {
        if wait_for_block {
            self.wait_for_block(block_num, BlockType::Head, None).await?;
        }
        let block = self.get_block(block_num, options).await?;
        Ok(block.map(|block| block.producer))
    }

    /// Producer of the current head or LIB block.
    pub async fn block_producer(
        &self,
        block_type: BlockType,
        options: QueryOptions,
    ) -> ClientResult<Option<String>> {
        let info = self.get_info(options).await?;
        match info {
            Some(info) => {
                self.block_producer_by_num(info.block_num(block_type), false, options)
                    .await
            }
            None => Ok(None),
        }
    }

    /// Records the transaction in a command result. Returns its id.
    pub fn track_cmd_transaction(
        &self,
        command_result: Option<&Value>,
        ignore_non_transaction: bool,
    ) -> ClientResult<Option<String>> {
        match command_result {
            Some(doc) => self.tracker.record_document(doc, ignore_non_transaction),
            None => {
                debug!("cmd returned no transaction");
                Ok(None)
            }
        }
    }

    pub fn cached_transaction(&self, tx_id: &str) -> Option<Transaction> {
        self.tracker.lookup(tx_id)
    }

    pub fn cached_transaction_status(&self, tx_id: &str) -> Option<TxStatus> {
        self.tracker.status(tx_id)
    }

    /// Whether the node answers an info query.
    pub async fn check_pulse(&self, exit_on_error: bool) -> ClientResult<bool> {
        let options = QueryOptions {
            silent_errors: true,
            exit_on_error,
        };
        match self.get_info(options).await {
            Ok(info) => Ok(info.is_some()),
            Err(e @ ClientError::Fatal { .. }) => Err(e),
            Err(_) => Ok(false),
        }
    }

    pub fn status_report(&self) -> StatusReport {
        let last_info = self.last_info.lock().clone();
        StatusReport {
            backend: self.describe(),
            last_head_block_num: last_info.as_ref().map(|info| info.head_block_num),
            last_irreversible_block_num: last_info
                .as_ref()
                .map(|info| info.last_irreversible_block_num),
            info_valid: self.info_valid.load(Ordering::SeqCst),
            missing_transaction: self.missing_transaction.load(Ordering::SeqCst),
            tracked_transactions: self.tracker.len(),
        }
    }

    fn admin(&self) -> ClientResult<&AdminClient> {
        self.admin.as_ref().ok_or_else(|| {
            ClientError::InvalidArgument("no admin endpoint configured".to_string())
        })
    }

    pub async fn kill_node_on_producer(
        &self,
        producer: &str,
        where_in_sequence: u32,
        block_type: BlockType,
        return_type: ReturnType,
        options: QueryOptions,
    ) -> ClientResult<Option<AdminResponse>> {
        let result = self
            .admin()?
            .kill_node_on_producer(producer, where_in_sequence, block_type, return_type)
            .await
            .map(Some);
        self.settle(
            "kill node on producer",
            &format!(
                "producer={}, where_in_sequence={}, based on {}",
                producer, where_in_sequence, block_type
            ),
            options,
            result,
        )
    }

    pub async fn get_producer_runtime_options(
        &self,
        return_type: ReturnType,
        options: QueryOptions,
    ) -> ClientResult<Option<AdminResponse>> {
        let result = self
            .admin()?
            .get_producer_runtime_options(return_type)
            .await
            .map(Some);
        self.settle("get producer runtime options", "producer", options, result)
    }

    pub async fn update_runtime_options(
        &self,
        subjective_ram_size: u64,
        subjective_reserved_ram_size: u64,
        ram_load_multiplier: u64,
        return_type: ReturnType,
        options: QueryOptions,
    ) -> ClientResult<Option<AdminResponse>> {
        let result = self
            .admin()?
            .update_runtime_options(
                subjective_ram_size,
                subjective_reserved_ram_size,
                ram_load_multiplier,
                return_type,
            )
            .await
            .map(Some);
        self.settle(
            "update runtime options",
            &format!(
                "subjective_ram_size={}, subjective_reserved_ram_size={}, ram_load_multiplier={}",
                subjective_ram_size, subjective_reserved_ram_size, ram_load_multiplier
            ),
            options,
            result,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::PausedClock;
    use crate::testing::MockBackend;
    use serde_json::json;

    fn client(backend: Arc<MockBackend>) -> NodeClient {
        NodeClient::builder()
            .with_backend(backend)
            .with_clock(Arc::new(PausedClock::new()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_transaction_without_retry_makes_one_lookup() {
        let backend = Arc::new(MockBackend::new().with_head(10, 5));
        let client = client(backend.clone());

        let tx = client
            .get_transaction("ghost", QueryOptions::silent(), false)
            .await
            .unwrap();
        assert!(tx.is_none());
        assert_eq!(backend.transaction_lookups(), 1);
        assert!(!client.status_report().missing_transaction);
    }

    #[tokio::test]
    async fn test_get_transaction_with_retry_exhausts_budget() {
        let backend = Arc::new(MockBackend::new().with_head(10, 5));
        let client = client(backend.clone());

        let tx = client
            .get_transaction("ghost", QueryOptions::silent(), true)
            .await
            .unwrap();
        assert!(tx.is_none());
        assert_eq!(backend.transaction_lookups(), 21);
        assert!(client.status_report().missing_transaction);
    }

    #[tokio::test]
    async fn test_found_transactions_are_cached() {
        let backend = Arc::new(MockBackend::new().with_head(10, 5));
        backend.add_transaction("tx", 3);
        let client = client(backend);

        let tx = client
            .get_transaction("tx", QueryOptions::default(), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.ref_block_num, Some(3));
        assert_eq!(client.cached_transaction("tx"), Some(tx));
        assert_eq!(
            client.cached_transaction_status("tx"),
            Some(TxStatus::Executed)
        );
    }

    #[tokio::test]
    async fn test_exit_on_error_names_operation_and_parameters() {
        let backend = Arc::new(MockBackend::new().with_head(10, 5));
        let client = client(backend);

        let err = client
            .get_block(7, QueryOptions::exit_on_error())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to get block: block number=7: not found");

        let err = client
            .get_block(0, QueryOptions::exit_on_error())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Fatal { .. }));
        assert!(err.to_string().contains("block number=0"));
    }

    #[tokio::test]
    async fn test_errors_propagate_without_exit_on_error() {
        let backend = Arc::new(MockBackend::new().with_head(10, 5));
        backend.fail_info_lookups(1);
        let client = client(backend);

        let err = client.get_info(QueryOptions::silent()).await.unwrap_err();
        assert!(matches!(err, ClientError::Backend { .. }));
        assert!(!client.status_report().info_valid);

        assert!(client.get_info(QueryOptions::silent()).await.unwrap().is_some());
        let report = client.status_report();
        assert!(report.info_valid);
        assert_eq!(report.last_head_block_num, Some(10));
        assert_eq!(report.last_irreversible_block_num, Some(5));
    }

    #[tokio::test]
    async fn test_block_presence_and_finality() {
        let backend = Arc::new(MockBackend::new().with_head(10, 5));
        backend.add_block(8, "alice", &["tx"]);
        backend.add_transaction("tx", 7);
        let client = client(backend.clone());

        assert!(client.is_block_present(10, BlockType::Head).await.unwrap());
        assert!(!client.is_block_present(11, BlockType::Head).await.unwrap());
        assert!(client.is_block_finalized(5).await.unwrap());
        assert!(!client.is_block_finalized(6).await.unwrap());

        assert!(client.is_transaction_in_block("tx", 8).await.unwrap());
        assert!(!client.is_transaction_in_block("tx", 9).await.unwrap());
        assert!(client.is_transaction_in_any_block("tx").await.unwrap());
        assert!(!client.is_transaction_finalized("tx").await.unwrap());

        backend.set_head(12, 8);
        assert!(client.is_transaction_finalized("tx").await.unwrap());
        assert_eq!(
            client.block_producer_by_num(8, true, QueryOptions::default()).await.unwrap(),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn test_check_pulse() {
        let backend = Arc::new(MockBackend::new());
        let client = client(backend.clone());
        assert!(!client.check_pulse(false).await.unwrap());
        assert!(client.check_pulse(true).await.is_err());

        backend.set_head(1, 1);
        assert!(client.check_pulse(true).await.unwrap());
    }

    #[tokio::test]
    async fn test_track_cmd_transaction_and_wait_if_needed() {
        let backend = Arc::new(MockBackend::new().with_head(10, 5));
        backend.add_block(6, "bob", &["abc"]);
        backend.add_transaction("abc", 5);
        let client = client(backend);

        let result = json!({
            "transaction_id": "abc",
            "processed": {"receipt": {"status": "executed"}, "action_traces": [{"block_num": 6}]}
        });
        assert_eq!(
            client.track_cmd_transaction(Some(&result), false).unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(client.track_cmd_transaction(None, false).unwrap(), None);
        assert_eq!(client.status_report().tracked_transactions, 1);

        assert!(client
            .wait_for_trans_block_if_needed(&result, true, QueryOptions::exit_on_error())
            .await
            .unwrap());

        let never = json!({"transaction_id": "never"});
        let err = client
            .wait_for_trans_block_if_needed(&never, true, QueryOptions::exit_on_error())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("transaction id=never"));
    }

    #[tokio::test]
    async fn test_admin_calls_require_endpoint() {
        let client = client(Arc::new(MockBackend::new()));
        let err = client
            .get_producer_runtime_options(ReturnType::Json, QueryOptions::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
    }

    #[test]
    fn test_status_report_display() {
        let report = StatusReport {
            backend: "mock backend".to_string(),
            last_head_block_num: Some(10),
            last_irreversible_block_num: Some(4),
            info_valid: true,
            missing_transaction: false,
            tracked_transactions: 2,
        };
        let text = report.to_string();
        assert!(text.contains("head    : 10"));
        assert!(text.contains("lib     : 4"));
        assert!(text.contains("missing : none"));
    }

    #[tokio::test]
    async fn test_waits_without_delayed_retry_fail_fast() {
        let backend = Arc::new(MockBackend::new().with_head(10, 5));
        backend.fail_transaction_lookups(100);
        backend.fail_info_lookups(100);
        let client = NodeClient::builder()
            .with_backend(backend.clone())
            .with_clock(Arc::new(PausedClock::new()))
            .with_delayed_retry(false)
            .build()
            .unwrap();

        let err = client
            .wait_for_transaction_in_block("tx", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Backend { .. }));
        assert_eq!(backend.transaction_lookups(), 1);

        let err = client
            .wait_for_block(20, BlockType::Head, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Backend { .. }));
        assert_eq!(backend.info_lookups(), 1);
    }
}
