// File: node-observer/src/client/builder.rs
//
// Fluent builder for NodeClient.

use std::sync::Arc;

use crate::admin::{AdminClient, AdminClientConfig};
use crate::backend::{Backend, CliBackend, CommandRunner, ProcessRunner, ReplicaBackend};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::poller::PollConfig;

use super::NodeClient;

/// Builder for a [`NodeClient`].
///
/// A backend is required. Everything else has a default: `SystemClock`, the
/// 3 s / 60 s poll pacing for both transaction and block waits, and no admin
/// endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use tos_node_observer::clock::PausedClock;
///
/// let client = NodeClientBuilder::new()
///     .with_backend(backend)
///     .with_clock(Arc::new(PausedClock::new()))
///     .build()?;
/// ```
pub struct NodeClientBuilder {
    backend: Option<Arc<dyn Backend>>,
    clock: Option<Arc<dyn Clock>>,
    poll: PollConfig,
    block_wait: PollConfig,
    delayed_retry: bool,
    admin: Option<(String, AdminClientConfig)>,
}

impl NodeClientBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            clock: None,
            poll: PollConfig::default(),
            block_wait: PollConfig::default(),
            delayed_retry: true,
            admin: None,
        }
    }

    /// Starts from a loaded config: picks the replica backend when a replica
    /// section is present, the command-line client otherwise, and points the
    /// admin client at the node's HTTP endpoint.
    pub fn from_config(config: &ClientConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(match config.command_timeout() {
            Some(timeout) => ProcessRunner::with_timeout(timeout),
            None => ProcessRunner::new(),
        });
        let backend: Arc<dyn Backend> = match config.replica_config() {
            Some(replica) => Arc::new(ReplicaBackend::new(replica, runner)),
            None => Arc::new(CliBackend::new(config.cli_config(), runner)),
        };

        Self::new()
            .with_backend(backend)
            .with_poll_config(config.poll_config())
            .with_block_wait_config(config.block_wait_config())
            .with_admin_config(config.node_url(), config.admin_config())
    }

    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set clock implementation
    ///
    /// If not set, uses `SystemClock` by default.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Pacing for transaction and block-number waits.
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Pacing for waiting on each block during a schedule walk.
    pub fn with_block_wait_config(mut self, block_wait: PollConfig) -> Self {
        self.block_wait = block_wait;
        self
    }

    /// When off, waits fail on the first backend error instead of polling
    /// through it. On by default.
    pub fn with_delayed_retry(mut self, enabled: bool) -> Self {
        self.delayed_retry = enabled;
        self
    }

    pub fn with_admin(self, endpoint: impl Into<String>) -> Self {
        self.with_admin_config(endpoint, AdminClientConfig::default())
    }

    pub fn with_admin_config(mut self, endpoint: impl Into<String>, config: AdminClientConfig) -> Self {
        self.admin = Some((endpoint.into(), config));
        self
    }

    pub fn build(self) -> ClientResult<NodeClient> {
        let backend = self.backend.ok_or_else(|| {
            ClientError::InvalidArgument("a backend is required to build a client".to_string())
        })?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let admin = match self.admin {
            Some((endpoint, config)) => Some(AdminClient::with_config(&endpoint, config)?),
            None => None,
        };

        Ok(NodeClient::new(
            backend,
            clock,
            self.poll,
            self.block_wait,
            self.delayed_retry,
            admin,
        ))
    }
}

impl Default for NodeClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
