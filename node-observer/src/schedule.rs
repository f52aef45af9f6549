// File: node-observer/src/schedule.rs
//
// Producer Schedule Tracker
//
// Walks blocks one at a time and decides when a target set of producers has
// become part of the active schedule. The decision logic lives in
// `ScheduleTracker::observe`, which is pure; `wait_active_schedule` feeds it
// snapshots from a backend.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info, warn};

use crate::backend::{ensure_block_num, Backend};
use crate::clock::Clock;
use crate::error::{ClientError, ClientResult};
use crate::model::ScheduleSnapshot;
use crate::poller::{poll_until, PollConfig, Probe, WaitOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Searching,
    FoundPending,
    FoundActive,
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Searching => write!(f, "searching"),
            Self::FoundPending => write!(f, "found in pending"),
            Self::FoundActive => write!(f, "found in active"),
        }
    }
}

/// Everything the tracker noticed while walking, in block order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleEvent {
    /// The block was skipped because the node had not caught up with its
    /// recorded schedule version.
    Unsettled { block_num: u64 },
    SlotChanged {
        block_num: u64,
        slot: u64,
        /// Blocks seen in the previous slot, when there was one.
        previous_slot_blocks: Option<u64>,
    },
    FoundInPending { block_num: u64 },
    FoundInActive { block_num: u64 },
    VersionChanged {
        block_num: u64,
        version: u64,
        slot: Option<u64>,
        producers: Vec<String>,
    },
    /// The active producer set changed but the version did not.
    SetChangedWithoutVersion {
        block_num: u64,
        version: u64,
        producers: Vec<String>,
    },
    /// Same producers in a new order.
    Reordered {
        block_num: u64,
        producers: Vec<String>,
    },
    /// The target set dropped out of the active schedule again.
    LeftActive { block_num: u64, version: u64 },
}

impl fmt::Display for ScheduleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsettled { block_num } => {
                write!(f, "block {} schedule not settled yet, skipping", block_num)
            }
            Self::SlotChanged {
                block_num,
                slot,
                previous_slot_blocks: Some(count),
            } => write!(
                f,
                "shuffle slot changed to {} at block {} after {} blocks",
                slot, block_num, count
            ),
            Self::SlotChanged { block_num, slot, .. } => {
                write!(f, "shuffle slot {} at block {}", slot, block_num)
            }
            Self::FoundInPending { block_num } => {
                write!(f, "producers found in pending schedule at block {}", block_num)
            }
            Self::FoundInActive { block_num } => {
                write!(f, "producers found in active schedule at block {}", block_num)
            }
            Self::VersionChanged {
                block_num,
                version,
                slot,
                producers,
            } => write!(
                f,
                "active schedule version {} at block {} (slot {:?}): {}",
                version,
                block_num,
                slot,
                producers.join(",")
            ),
            Self::SetChangedWithoutVersion {
                block_num,
                version,
                producers,
            } => write!(
                f,
                "active producers changed at block {} without leaving version {}: {}",
                block_num,
                version,
                producers.join(",")
            ),
            Self::Reordered {
                block_num,
                producers,
            } => write!(
                f,
                "active producers reordered at block {}: {}",
                block_num,
                producers.join(",")
            ),
            Self::LeftActive { block_num, version } => write!(
                f,
                "producers no longer active at block {} (version {})",
                block_num, version
            ),
        }
    }
}

/// What to look for and for how long.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    targets: BTreeSet<String>,
    max_blocks: u64,
    require_version_change: bool,
}

impl ScheduleRequest {
    /// Rejects an empty producer list and duplicated names.
    pub fn new<I, S>(producers: I, max_blocks: u64) -> ClientResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut targets = BTreeSet::new();
        for producer in producers {
            let producer = producer.into();
            if producer.trim().is_empty() {
                return Err(ClientError::InvalidArgument(
                    "producer names must not be empty".to_string(),
                ));
            }
            if !targets.insert(producer.clone()) {
                return Err(ClientError::InvalidArgument(format!(
                    "producer {} listed more than once",
                    producer
                )));
            }
        }
        if targets.is_empty() {
            return Err(ClientError::InvalidArgument(
                "at least one producer is required".to_string(),
            ));
        }
        Ok(Self {
            targets,
            max_blocks,
            require_version_change: false,
        })
    }

    /// Only succeed on a block where the active version changes and the new
    /// schedule contains the targets.
    pub fn require_version_change(mut self, required: bool) -> Self {
        self.require_version_change = required;
        self
    }

    pub fn targets(&self) -> &BTreeSet<String> {
        &self.targets
    }

    pub fn max_blocks(&self) -> u64 {
        self.max_blocks
    }
}

/// Result of feeding a single block to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Skipped,
    Converged { block_num: u64, synced: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// `synced` is true once a full shuffle slot has been observed, or when
    /// the backend reports no slots at all.
    Converged { block_num: u64, synced: bool },
    /// The block budget ran out, or a block never showed up.
    Exhausted { last_block: u64, state: TrackerState },
}

impl ScheduleOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

pub struct ScheduleTracker {
    request: ScheduleRequest,
    state: TrackerState,
    active_version: Option<u64>,
    active_producers: Vec<String>,
    slot: Option<u64>,
    slot_blocks: u64,
    synced: bool,
    events: Vec<ScheduleEvent>,
}

impl ScheduleTracker {
    pub fn new(request: ScheduleRequest) -> Self {
        Self {
            request,
            state: TrackerState::Searching,
            active_version: None,
            active_producers: Vec::new(),
            slot: None,
            slot_blocks: 0,
            synced: false,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ScheduleEvent> {
        self.events
    }

    fn emit(&mut self, event: ScheduleEvent) {
        match &event {
            ScheduleEvent::SetChangedWithoutVersion { .. } | ScheduleEvent::LeftActive { .. } => {
                warn!("{}", event)
            }
            ScheduleEvent::Unsettled { .. } => debug!("{}", event),
            _ => info!("{}", event),
        }
        self.events.push(event);
    }

    /// Feeds the next block.
    pub fn observe(&mut self, snapshot: &ScheduleSnapshot) -> Step {
        let block_num = snapshot.block_num;
        if !snapshot.settled {
            self.emit(ScheduleEvent::Unsettled { block_num });
            return Step::Skipped;
        }

        if let Some(slot) = snapshot.shuffle_slot {
            if self.slot != Some(slot) {
                let previous_slot_blocks = self.slot.map(|_| self.slot_blocks);
                if previous_slot_blocks.is_some() {
                    self.synced = true;
                }
                self.emit(ScheduleEvent::SlotChanged {
                    block_num,
                    slot,
                    previous_slot_blocks,
                });
                self.slot = Some(slot);
                self.slot_blocks = 0;
            }
            self.slot_blocks += 1;
        }

        let active = &snapshot.active;
        let in_active = active.contains_all(&self.request.targets);

        if self.state == TrackerState::Searching
            && !in_active
            && snapshot.pending.contains_all(&self.request.targets)
        {
            self.state = TrackerState::FoundPending;
            self.emit(ScheduleEvent::FoundInPending { block_num });
        }

        if self.state != TrackerState::FoundActive && in_active {
            self.state = TrackerState::FoundActive;
            if snapshot.shuffle_slot.is_none() {
                self.synced = true;
            }
            self.emit(ScheduleEvent::FoundInActive { block_num });
            if !self.request.require_version_change {
                return self.converged(block_num);
            }
        }

        match self.active_version {
            None => {
                debug!(
                    "active schedule version {} at start (block {}): {}",
                    active.version,
                    block_num,
                    active.producers.join(",")
                );
                self.active_version = Some(active.version);
                self.active_producers = active.producers.clone();
            }
            Some(version) if version != active.version => {
                self.active_version = Some(active.version);
                self.active_producers = active.producers.clone();
                self.emit(ScheduleEvent::VersionChanged {
                    block_num,
                    version: active.version,
                    slot: snapshot.shuffle_slot,
                    producers: active.producers.clone(),
                });
                if self.state == TrackerState::FoundActive {
                    if in_active {
                        return self.converged(block_num);
                    }
                    self.left_active(block_num, active.version);
                }
            }
            Some(version) => {
                if active.producers != self.active_producers {
                    let before: BTreeSet<&str> =
                        self.active_producers.iter().map(String::as_str).collect();
                    let event = if before == active.producer_set() {
                        ScheduleEvent::Reordered {
                            block_num,
                            producers: active.producers.clone(),
                        }
                    } else {
                        ScheduleEvent::SetChangedWithoutVersion {
                            block_num,
                            version,
                            producers: active.producers.clone(),
                        }
                    };
                    self.active_producers = active.producers.clone();
                    self.emit(event);
                }
                if self.state == TrackerState::FoundActive && !in_active {
                    self.left_active(block_num, version);
                }
            }
        }

        Step::Continue
    }

    fn left_active(&mut self, block_num: u64, version: u64) {
        self.state = TrackerState::Searching;
        self.emit(ScheduleEvent::LeftActive { block_num, version });
    }

    fn converged(&self, block_num: u64) -> Step {
        Step::Converged {
            block_num,
            synced: self.synced,
        }
    }
}

/// Walks blocks from `start_block` until the targets are active or
/// `max_blocks` blocks have been examined.
///
/// Each block is awaited with `block_wait`; a block that never appears ends
/// the walk. Skipped unsettled blocks count against the budget.
pub async fn wait_active_schedule(
    backend: &dyn Backend,
    clock: &dyn Clock,
    block_wait: PollConfig,
    start_block: u64,
    request: ScheduleRequest,
) -> ClientResult<(ScheduleOutcome, Vec<ScheduleEvent>)> {
    ensure_block_num(start_block)?;
    info!(
        "waiting for producers {:?} to become active, starting at block {} (max {} blocks{})",
        request.targets,
        start_block,
        request.max_blocks,
        if request.require_version_change {
            ", version change required"
        } else {
            ""
        }
    );

    let max_blocks = request.max_blocks;
    let mut tracker = ScheduleTracker::new(request);
    let mut last_block = start_block.saturating_sub(1);

    for block_num in start_block..start_block.saturating_add(max_blocks) {
        let what = format!("wait for schedule at block {}", block_num);
        let snapshot = match poll_until(clock, block_wait, true, &what, move || async move {
            Ok(match backend.get_schedule(block_num).await? {
                Some(snapshot) => Probe::Ready(snapshot),
                None => Probe::Absent,
            })
        })
        .await?
        {
            WaitOutcome::Satisfied { value, .. } => value,
            WaitOutcome::TimedOut { attempts, .. } => {
                warn!(
                    "block {} did not appear after {} attempts, giving up",
                    block_num, attempts
                );
                break;
            }
        };

        last_block = block_num;
        if let Step::Converged { block_num, synced } = tracker.observe(&snapshot) {
            info!(
                "producers {:?} active at block {} (synced: {})",
                tracker.request.targets, block_num, synced
            );
            return Ok((
                ScheduleOutcome::Converged { block_num, synced },
                tracker.into_events(),
            ));
        }
    }

    let state = tracker.state();
    warn!(
        "producers {:?} not active by block {} ({})",
        tracker.request.targets, last_block, state
    );
    Ok((
        ScheduleOutcome::Exhausted { last_block, state },
        tracker.into_events(),
    ))
}
