// TOS Node Observer
//
// Purpose: Query a running node and block until it reaches a given state
//
// Usage:
//   node-observer --host 127.0.0.1 --port 8888 info
//   node-observer wait-transaction <ID> --final
//   node-observer --replica wait-schedule alice,bob --max-blocks 120 --require-version-change

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tokio::time::Duration;

use tos_node_observer::config::{ClientConfig, ReplicaSection};
use tos_node_observer::model::{BlockType, ReturnType};
use tos_node_observer::schedule::ScheduleOutcome;
use tos_node_observer::{NodeClient, NodeClientBuilder, QueryOptions};

#[derive(Parser, Debug)]
#[command(name = "node-observer")]
#[command(about = "Observe a chain node and wait for it to converge")]
struct Args {
    /// JSON config file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node host
    #[arg(long)]
    host: Option<String>,

    /// Node HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Command-line client program
    #[arg(long)]
    client: Option<String>,

    /// Wallet URL passed to the command-line client
    #[arg(long)]
    wallet_url: Option<String>,

    /// Query the read replica instead of the live node
    #[arg(long)]
    replica: bool,

    #[arg(long)]
    replica_shell: Option<String>,

    #[arg(long)]
    replica_host: Option<String>,

    #[arg(long)]
    replica_port: Option<u16>,

    #[arg(long)]
    replica_database: Option<String>,

    /// Override the poll timeout, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print head and last irreversible block
    Info,
    /// Print a block
    Block { block_num: u64 },
    /// Print a transaction
    Transaction {
        id: String,
        /// Look the transaction up once instead of polling for it
        #[arg(long)]
        no_retry: bool,
    },
    /// Wait until the head (or LIB) reaches a block number
    WaitBlock {
        block_num: u64,
        #[arg(long)]
        lib: bool,
    },
    /// Wait until a transaction is in a block (or irreversible)
    WaitTransaction {
        id: String,
        #[arg(long = "final")]
        finalized: bool,
    },
    /// Wait until producers are part of the active schedule
    WaitSchedule {
        /// Comma-separated producer names
        #[arg(value_delimiter = ',', required = true)]
        producers: Vec<String>,
        #[arg(long)]
        max_blocks: u64,
        #[arg(long)]
        require_version_change: bool,
    },
    /// Ask the node to kill itself when a producer reaches a round position
    KillOnProducer {
        producer: String,
        position: u32,
        #[arg(long)]
        lib: bool,
    },
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(client) = &args.client {
        config.client_program = client.clone();
    }
    if args.wallet_url.is_some() {
        config.wallet_url = args.wallet_url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.poll_timeout_secs = timeout;
    }

    let replica_flags = args.replica_shell.is_some()
        || args.replica_host.is_some()
        || args.replica_port.is_some()
        || args.replica_database.is_some();
    if args.replica || replica_flags {
        let replica = config.replica.get_or_insert_with(ReplicaSection::default);
        if let Some(shell) = &args.replica_shell {
            replica.shell = shell.clone();
        }
        if let Some(host) = &args.replica_host {
            replica.host = host.clone();
        }
        if let Some(port) = args.replica_port {
            replica.port = port;
        }
        if let Some(database) = &args.replica_database {
            replica.database = database.clone();
        }
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn block_type(lib: bool) -> BlockType {
    if lib {
        BlockType::Lib
    } else {
        BlockType::Head
    }
}

/// Runs one command. Returns whether the awaited condition was met.
async fn run(client: &NodeClient, command: Command) -> Result<bool> {
    let strict = QueryOptions::exit_on_error();
    match command {
        Command::Info => {
            let info = client.get_info(strict).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(true)
        }
        Command::Block { block_num } => {
            let block = client.get_block(block_num, strict).await?;
            println!("{}", serde_json::to_string_pretty(&block)?);
            Ok(true)
        }
        Command::Transaction { id, no_retry } => {
            let tx = client.get_transaction(&id, strict, !no_retry).await?;
            println!("{}", serde_json::to_string_pretty(&tx)?);
            Ok(true)
        }
        Command::WaitBlock { block_num, lib } => {
            let block_type = block_type(lib);
            let reached = client.wait_for_block(block_num, block_type, None).await?;
            if reached {
                info!("{} block {} reached", block_type, block_num);
            } else {
                warn!("{} block {} not reached in time", block_type, block_num);
            }
            Ok(reached)
        }
        Command::WaitTransaction { id, finalized } => {
            let done = if finalized {
                client.wait_for_transaction_finalization(&id, None).await?
            } else {
                client.wait_for_transaction_in_block(&id, None).await?
            };
            match client.locate_block(&id).await? {
                Some(block_num) if done => info!("transaction {} in block {}", id, block_num),
                _ => warn!("transaction {} did not reach the requested stage", id),
            }
            Ok(done)
        }
        Command::WaitSchedule {
            producers,
            max_blocks,
            require_version_change,
        } => {
            let outcome = client
                .wait_active_schedule(producers, max_blocks, require_version_change)
                .await?;
            match outcome {
                ScheduleOutcome::Converged { block_num, synced } => {
                    println!("active at block {} (synced: {})", block_num, synced);
                }
                ScheduleOutcome::Exhausted { last_block, state } => {
                    println!("not active by block {} ({})", last_block, state);
                }
            }
            Ok(outcome.is_converged())
        }
        Command::KillOnProducer {
            producer,
            position,
            lib,
        } => {
            let response = client
                .kill_node_on_producer(&producer, position, block_type(lib), ReturnType::Raw, strict)
                .await?;
            if let Some(response) = response {
                println!("{}", response);
            }
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let client = NodeClientBuilder::from_config(&config)
        .build()
        .context("Failed to build node client")?;
    info!("Observing {}", client.describe());

    let started = tokio::time::Instant::now();
    let result = run(&client, args.command).await;
    let elapsed: Duration = started.elapsed();

    match result {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => {
            warn!("Condition not met after {:.1}s", elapsed.as_secs_f64());
            println!("{}", client.status_report());
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!("{:#}", e);
            println!("{}", client.status_report());
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "node-observer",
            "--host",
            "10.1.1.1",
            "--replica-database",
            "chain",
            "wait-schedule",
            "alice,bob",
            "--max-blocks",
            "30",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.host, "10.1.1.1");
        assert_eq!(config.replica.unwrap().database, "chain");

        match args.command {
            Command::WaitSchedule {
                producers,
                max_blocks,
                require_version_change,
            } => {
                assert_eq!(producers, vec!["alice", "bob"]);
                assert_eq!(max_blocks, 30);
                assert!(!require_version_change);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = Args::parse_from(["node-observer", "--port", "0", "info"]);
        assert!(load_config(&args).is_err());
    }
}
