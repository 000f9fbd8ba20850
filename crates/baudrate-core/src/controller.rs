//! Cycle controller
//!
//! Owns the candidate cursor and the detection state machine:
//!
//! ```text
//! Idle --start--> Probing   (auto)   --Confirmed--> Detected --> ShuttingDown
//!            \--> Listening (manual)
//! any state --Interrupt--> ShuttingDown
//! ```
//!
//! Every index change goes through the configured [`IndexPolicy`], is applied
//! to the link, and advances the baud epoch so the reader drops stale evidence.

use tracing::{debug, info};

use crate::candidates::{CandidateRate, CandidateTable, IndexPolicy};
use crate::config::{DetectionConfig, DetectionMode};
use crate::console::KeyGesture;
use crate::link::{LinkHandle, PortConfigurator};
use crate::reader::BaudEpoch;

/// Controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Built, link not yet programmed
    Idle,
    /// Auto mode, cycling on the timer
    Probing,
    /// Manual mode, waiting for keys
    Listening,
    /// Text confirmed; the index is the answer
    Detected,
    /// Cleanup in progress
    ShuttingDown,
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// The wait period elapsed without confirmed text
    Tick,
    /// The operator asked for another candidate
    Key(KeyGesture),
    /// The reader confirmed text during `epoch`
    Confirmed {
        /// Epoch the confirming bytes were read in
        epoch: u64,
    },
    /// The operator asked to quit
    Interrupt,
}

/// What the session loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing changed
    Continue,
    /// The candidate changed to this row and was applied
    Changed(usize),
    /// Stop cycling and shut down
    Finished,
}

/// Controller-owned detection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionState {
    /// Row of the rate currently applied
    pub current_index: usize,
    /// Auto or manual
    pub mode: DetectionMode,
    /// Number of wait periods that expired without confirmation
    pub timeout_count: u32,
}

/// The candidate-cycling state machine
pub struct CycleController<P: PortConfigurator> {
    table: CandidateTable,
    policy: IndexPolicy,
    state: DetectionState,
    phase: CyclePhase,
    link: LinkHandle<P>,
    epoch: BaudEpoch,
}

impl<P: PortConfigurator> CycleController<P> {
    /// Idle controller positioned on the table's default row
    pub fn new(config: &DetectionConfig, table: CandidateTable, link: LinkHandle<P>) -> Self {
        let state = DetectionState {
            current_index: table.default_index(),
            mode: config.mode,
            timeout_count: 0,
        };
        Self {
            table,
            policy: config.index_policy,
            state,
            phase: CyclePhase::Idle,
            link,
            epoch: BaudEpoch::new(),
        }
    }

    /// Apply the default candidate and enter the mode's looping phase
    pub fn start(&mut self) -> usize {
        if self.phase != CyclePhase::Idle {
            return self.state.current_index;
        }
        self.state.current_index = self.table.default_index();
        self.apply_current();
        self.phase = match self.state.mode {
            DetectionMode::Auto => CyclePhase::Probing,
            DetectionMode::Manual => CyclePhase::Listening,
        };
        self.state.current_index
    }

    /// Process one event
    pub fn handle(&mut self, event: ControlEvent) -> Step {
        match (self.phase, event) {
            (CyclePhase::ShuttingDown, _) => Step::Finished,
            (_, ControlEvent::Interrupt) => {
                debug!("Interrupt in phase {:?}", self.phase);
                self.phase = CyclePhase::ShuttingDown;
                Step::Finished
            }
            (CyclePhase::Listening, ControlEvent::Key(gesture)) => self.step(gesture.delta(), false),
            (CyclePhase::Probing, ControlEvent::Tick) => {
                self.state.timeout_count += 1;
                // A tick always re-applies, even when clamped at row 0 or the
                // table has a single row, so the reader starts a fresh epoch
                self.step(-1, true)
            }
            (CyclePhase::Probing, ControlEvent::Confirmed { epoch }) => {
                if epoch != self.epoch.get() {
                    debug!(
                        "Ignoring confirmation from stale epoch {} (now {})",
                        epoch,
                        self.epoch.get()
                    );
                    return Step::Continue;
                }
                info!("Detected {} baud", self.current().label);
                self.phase = CyclePhase::Detected;
                Step::Finished
            }
            _ => Step::Continue,
        }
    }

    /// Mark the start of cleanup
    pub fn begin_shutdown(&mut self) {
        self.phase = CyclePhase::ShuttingDown;
    }

    fn step(&mut self, delta: isize, always_apply: bool) -> Step {
        let before = self.state.current_index;
        let after = self.policy.step(before, delta, self.table.len());
        if after == before && !always_apply {
            return Step::Continue;
        }
        self.state.current_index = after;
        self.apply_current();
        Step::Changed(after)
    }

    fn apply_current(&mut self) {
        let rate = self.current().rate;
        self.link.apply(rate);
        let epoch = self.epoch.advance();
        info!("Serial baud rate set to {} (epoch {})", rate, epoch);
    }

    /// Current phase
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Detection state snapshot
    pub fn state(&self) -> DetectionState {
        self.state
    }

    /// Current candidate
    pub fn current(&self) -> &CandidateRate {
        self.table.at(self.state.current_index)
    }

    /// Whether the detector is in a cycling phase that uses the timer
    pub fn timer_armed(&self) -> bool {
        self.phase == CyclePhase::Probing
    }

    /// Shared epoch, handed to the reader
    pub fn epoch(&self) -> BaudEpoch {
        self.epoch.clone()
    }

    /// The link
    pub fn link(&self) -> &LinkHandle<P> {
        &self.link
    }

    /// The link, mutably (cleanup)
    pub fn link_mut(&mut self) -> &mut LinkHandle<P> {
        &mut self.link
    }

    /// Candidate table
    pub fn table(&self) -> &CandidateTable {
        &self.table
    }
}
