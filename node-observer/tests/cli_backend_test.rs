// End-to-end test of the command-line backend through real child processes.
// A shell script stands in for the node's client program.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::Duration;

use tos_node_observer::backend::{Backend, CliBackend, CliConfig, ProcessRunner};
use tos_node_observer::model::BlockType;
use tos_node_observer::poller::PollConfig;
use tos_node_observer::{ClientError, NodeClient, QueryOptions};

const FAKE_CLIENT: &str = r#"#!/bin/sh
while [ "$1" = "--url" ] || [ "$1" = "--wallet-url" ]; do shift 2; done
case "$1 $2" in
  "get info")
    echo '{"server_version": "v1", "head_block_num": 12, "last_irreversible_block_num": 9, "head_block_producer": "alice"}'
    ;;
  "get block")
    if [ "$3" -gt 12 ]; then echo "Could not find block: $3" >&2; exit 1; fi
    echo "warning: connecting to a node without a wallet"
    echo "{\"block_num\": $3, \"id\": \"blk$3\", \"producer\": \"alice\", \"schedule_version\": 1, \"transactions\": [{\"status\": \"executed\", \"trx\": {\"id\": \"tx$3\"}}]}"
    ;;
  "get transaction")
    if [ "$3" = "tx10" ]; then
      echo '{"id": "tx10", "block_num": 10, "trx": {"receipt": {"status": "executed"}, "trx": {"ref_block_num": 8}}}'
    else
      echo "Transaction $3 not found" >&2; exit 1
    fi
    ;;
  *)
    echo "unsupported command: $*" >&2; exit 2
    ;;
esac
"#;

struct Script(PathBuf);

impl Script {
    fn install() -> Self {
        let path = std::env::temp_dir().join(format!("node-observer-client-{}.sh", std::process::id()));
        fs::write(&path, FAKE_CLIENT).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        Self(path)
    }
}

impl Drop for Script {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

// Single test so no other test forks while the script is being written.
#[tokio::test]
async fn test_cli_backend_against_fake_client() {
    let script = Script::install();
    let config = CliConfig::new(script.0.to_string_lossy(), "http://127.0.0.1:8888");
    let runner = Arc::new(ProcessRunner::with_timeout(Duration::from_secs(10)));
    let backend = Arc::new(CliBackend::new(config, runner));

    // Adapter level: found, not found, failure
    let info = backend.get_info().await.unwrap().unwrap();
    assert_eq!(info.head_block_num, 12);
    assert_eq!(info.last_irreversible_block_num, 9);

    let block = backend.get_block(11).await.unwrap().unwrap();
    assert_eq!(block.id, "blk11");
    assert!(block.contains_transaction("tx11"));
    assert!(backend.get_block(13).await.unwrap().is_none());
    assert!(backend.get_transaction("tx99").await.unwrap().is_none());

    let err = backend.get_account("alice").await.unwrap_err();
    assert!(matches!(err, ClientError::Backend { .. }));

    // Client level
    let client = NodeClient::builder()
        .with_backend(backend)
        .with_poll_config(PollConfig::new(
            Duration::from_millis(100),
            Duration::from_millis(300),
        ))
        .build()
        .unwrap();

    assert_eq!(client.locate_block("tx10").await.unwrap(), Some(10));
    assert!(client.is_block_present(12, BlockType::Head).await.unwrap());
    assert!(!client.is_transaction_finalized("tx10").await.unwrap());
    assert!(!client
        .wait_for_transaction_finalization("tx10", None)
        .await
        .unwrap());
    assert_eq!(
        client
            .block_producer(BlockType::Lib, QueryOptions::default())
            .await
            .unwrap(),
        Some("alice".to_string())
    );

    let tx = client
        .get_transaction("tx10", QueryOptions::exit_on_error(), false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.ref_block_num, Some(8));
    assert_eq!(client.cached_transaction("tx10").unwrap().block_num, Some(10));
}
