//! # TOS Node Observer
//!
//! Test-control client for a running chain node. It reads chain state through
//! the node's command-line client or through a read replica database, keeps
//! a cache of the transactions it has seen, and offers blocking "wait until"
//! primitives that test scenarios use to line up with chain progress.
//!
//! ## Layers
//!
//! - **backend**: one query contract over both data sources, normalizing
//!   their documents into the canonical [`model`]
//! - **tracker**: per-client transaction cache, latest observation wins
//! - **poller**: bounded poll loops for inclusion, irreversibility and block
//!   numbers
//! - **locator**: linear search for the block that includes a transaction
//! - **schedule**: producer schedule convergence and version tracking
//! - **client**: the façade scenarios talk to
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tos_node_observer::prelude::*;
//!
//! let client = NodeClientBuilder::from_config(&ClientConfig::default()).build()?;
//! if client.wait_for_transaction_finalization(&tx_id, None).await? {
//!     println!("{} is final", tx_id);
//! }
//! ```

#![warn(clippy::all)]

pub mod admin;
pub mod backend;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod locator;
pub mod model;
pub mod poller;
pub mod schedule;
pub mod tracker;

/// In-memory backend for driving the waiters in tests
pub mod testing;

pub mod prelude {
    pub use crate::admin::{AdminClient, AdminResponse};
    pub use crate::backend::{Backend, CliBackend, CliConfig, ReplicaBackend, ReplicaConfig};
    pub use crate::client::{NodeClient, NodeClientBuilder, QueryOptions, StatusReport};
    pub use crate::clock::{Clock, PausedClock, SystemClock};
    pub use crate::config::ClientConfig;
    pub use crate::error::{ClientError, ClientResult};
    pub use crate::model::{BlockType, ChainInfo, ReturnType, Transaction, TxStatus};
    pub use crate::poller::{PollConfig, WaitOutcome};
    pub use crate::schedule::{ScheduleOutcome, ScheduleRequest};
}

pub use client::{NodeClient, NodeClientBuilder, QueryOptions};
pub use error::{ClientError, ClientResult};
