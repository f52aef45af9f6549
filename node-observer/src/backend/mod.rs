// File: node-observer/src/backend/mod.rs
//
// Backend Query Adapter
//
// One contract over the two places chain state can be read from: the live
// node through its command-line client, or the read replica database the
// node exports into. Both produce the canonical model from `crate::model`.

pub mod cli;
pub mod normalize;
pub mod replica;
pub mod runner;

pub use cli::{CliBackend, CliConfig};
pub use replica::{ReplicaBackend, ReplicaConfig};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};

use async_trait::async_trait;

use crate::error::{ClientError, ClientResult};
use crate::model::{Account, Block, ChainInfo, ScheduleSnapshot, Transaction};

/// Read-only queries against a node or its replica.
///
/// Every query has three outcomes: `Ok(Some(_))` when the entity exists,
/// `Ok(None)` when it does not (yet), and `Err(_)` when the backend could not
/// answer. Poll loops retry on the second and decide per error on the third.
///
/// Implementations never touch the client's transaction cache.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short human-readable description used in status reports.
    fn describe(&self) -> String;

    async fn get_info(&self) -> ClientResult<Option<ChainInfo>>;

    /// `block_num` must be positive.
    async fn get_block(&self, block_num: u64) -> ClientResult<Option<Block>>;

    /// `id` must not be empty.
    async fn get_transaction(&self, id: &str) -> ClientResult<Option<Transaction>>;

    async fn get_account(&self, name: &str) -> ClientResult<Option<Account>>;

    /// Active, pending and proposed schedules as seen at `block_num`.
    async fn get_schedule(&self, block_num: u64) -> ClientResult<Option<ScheduleSnapshot>>;
}

pub(crate) fn ensure_block_num(block_num: u64) -> ClientResult<()> {
    if block_num == 0 {
        return Err(ClientError::InvalidArgument(
            "block numbers start at 1".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_non_empty(what: &str, value: &str) -> ClientResult<()> {
    if value.trim().is_empty() {
        return Err(ClientError::InvalidArgument(format!("{} must not be empty", what)));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted command runner shared by the backend tests.

    use super::runner::{CommandOutput, CommandRunner};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::io;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedCall {
        pub program: String,
        pub args: Vec<String>,
        pub stdin: Option<String>,
    }

    /// Replays queued outputs in order and records every invocation.
    #[derive(Default)]
    pub struct ScriptedRunner {
        outputs: Mutex<VecDeque<CommandOutput>>,
        pub calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ok(self, stdout: &str) -> Self {
            self.push(Some(0), stdout, "")
        }

        pub fn fail(self, status: i32, stderr: &str) -> Self {
            self.push(Some(status), "", stderr)
        }

        fn push(self, status: Option<i32>, stdout: &str, stderr: &str) -> Self {
            self.outputs.lock().push_back(CommandOutput {
                status,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            });
            self
        }

        pub fn call(&self, index: usize) -> RecordedCall {
            self.calls.lock()[index].clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            program: &str,
            args: &[String],
            stdin: Option<&str>,
        ) -> io::Result<CommandOutput> {
            self.calls.lock().push(RecordedCall {
                program: program.to_string(),
                args: args.to_vec(),
                stdin: stdin.map(str::to_string),
            });
            self.outputs
                .lock()
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no scripted output left"))
        }
    }
}
