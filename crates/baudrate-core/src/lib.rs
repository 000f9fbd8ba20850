//! # Baudrate Core Library
//!
//! Core functionality for the `baudrate` serial baud-rate detector.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - The candidate baud-rate table and its wrap/clamp cursor policy
//! - A streaming text-likelihood scorer
//! - The reader thread and the cycle controller state machine
//! - A session loop that ties them together and restores the link and
//!   console exactly once on exit
//! - Minicom-compatible configuration reports
//!
//! ## Example
//!
//! ```rust,ignore
//! use baudrate_core::prelude::*;
//!
//! let config = DetectionConfig::default();
//! let link = SerialLink::open("/dev/ttyUSB0", 115200, config.read_timeout)?;
//! let session = Session::new(
//!     config,
//!     CandidateTable::standard(),
//!     LinkHandle::new(link),
//!     SavedTerminalModes::capture_stdin()?,
//!     Box::new(std::io::stderr()),
//! );
//! let summary = session.run(keys, ctrl_c, &ThreadSpawner).await?;
//! println!("{} baud", summary.label);
//! ```

pub mod candidates;
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod link;
pub mod reader;
pub mod report;
pub mod scorer;
pub mod session;
#[cfg(unix)]
pub mod termios;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::candidates::{CandidateRate, CandidateTable, IndexPolicy};
    pub use crate::config::{DetectionConfig, DetectionMode};
    pub use crate::console::{
        map_key, spawn_key_pump, ConsoleEvent, KeyGesture, KeyPump, SavedTerminalModes,
    };
    pub use crate::controller::{ControlEvent, CycleController, CyclePhase, DetectionState, Step};
    pub use crate::error::{ConfigError, LinkError, ReportError, SessionError};
    pub use crate::link::{LinkHandle, PortConfigurator, SerialLink};
    pub use crate::reader::{BaudEpoch, ReaderEvent, ReaderSpawner, ThreadSpawner};
    pub use crate::report::{write_report, LinkReport, ReportDestination};
    pub use crate::scorer::{ScorerState, TextScorer, Verdict};
    pub use crate::session::{Session, Summary};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
