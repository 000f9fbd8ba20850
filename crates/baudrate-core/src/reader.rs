//! Serial reader task
//!
//! Runs on its own thread, pulling bytes off the link with a short timeout.
//! In auto mode every byte goes through a private [`TextScorer`]; the only
//! things that cross back to the control loop are the raw bytes (for echo) and
//! a one-shot "confirmed" notice tagged with the baud epoch it was earned in.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config::DetectionMode;
use crate::scorer::{TextScorer, Verdict};

/// Back-off after a link error or an empty read, so a dead link does not spin
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

const READ_CHUNK: usize = 256;

/// How often `ReaderHandle::stop` checks whether the thread has finished
const STOP_POLL: Duration = Duration::from_millis(5);

/// Messages from the reader to the control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// Bytes received, in order
    Data(Vec<u8>),
    /// The scorer accepted the input received during `epoch`
    Confirmed {
        /// Epoch the confirming bytes were read in
        epoch: u64,
    },
}

/// Shared counter bumped each time the link's rate changes.
///
/// The reader resets its scorer whenever it sees a new value, so evidence
/// gathered at one rate never counts towards the next.
#[derive(Debug, Clone, Default)]
pub struct BaudEpoch(Arc<AtomicU64>);

impl BaudEpoch {
    /// Counter starting at epoch 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Start a new epoch and return it
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Everything the reader thread needs, built by the session
pub struct ReaderTask {
    source: Box<dyn Read + Send>,
    mode: DetectionMode,
    scorer: TextScorer,
    epoch: BaudEpoch,
    cancel: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ReaderEvent>,
}

impl ReaderTask {
    /// Reader over `source` that scores with `threshold` in auto mode and
    /// reports on `events` until `cancel` is set
    pub fn new(
        source: Box<dyn Read + Send>,
        mode: DetectionMode,
        threshold: usize,
        epoch: BaudEpoch,
        cancel: Arc<AtomicBool>,
        events: mpsc::UnboundedSender<ReaderEvent>,
    ) -> Self {
        Self {
            source,
            mode,
            scorer: TextScorer::new(threshold),
            epoch,
            cancel,
            events,
        }
    }

    /// Read until cancelled or until the control loop goes away
    pub fn run(mut self) {
        let mut buf = [0u8; READ_CHUNK];
        let mut seen_epoch = self.epoch.get();
        let mut confirmed_epoch: Option<u64> = None;

        while !self.cancel.load(Ordering::Acquire) {
            let before = self.epoch.get();
            let n = match self.source.read(&mut buf) {
                Ok(0) => {
                    std::thread::sleep(IDLE_BACKOFF);
                    continue;
                }
                Ok(n) => n,
                Err(e) if is_no_data(&e) => continue,
                Err(e) => {
                    warn!("Serial read error: {} (retrying)", e);
                    std::thread::sleep(IDLE_BACKOFF);
                    continue;
                }
            };
            trace!("read {} bytes", n);

            let chunk = &buf[..n];
            if self.mode == DetectionMode::Manual {
                if self.events.send(ReaderEvent::Data(chunk.to_vec())).is_err() {
                    break;
                }
                continue;
            }

            // A rate change during the read leaves no way to tell which bytes
            // arrived at which rate: echo the chunk but do not score it
            let after = self.epoch.get();
            if after != before || after != seen_epoch {
                self.scorer.reset();
                seen_epoch = after;
                if after != before {
                    trace!("discarding {} bytes read across epochs {}..{}", n, before, after);
                    if self.events.send(ReaderEvent::Data(chunk.to_vec())).is_err() {
                        break;
                    }
                    continue;
                }
            }

            // Split the chunk at the confirming byte so echo and verdict stay ordered
            let mut start = 0;
            let mut verdict_epoch = None;
            // The whole chunk belongs to `seen_epoch`; a confirmation earned here
            // after a later rate change is stale and the controller drops it
            for (i, &b) in chunk.iter().enumerate() {
                if self.scorer.push(b) == Verdict::Confirmed && confirmed_epoch != Some(seen_epoch)
                {
                    if self.events.send(ReaderEvent::Data(chunk[start..=i].to_vec())).is_err() {
                        return;
                    }
                    start = i + 1;
                    verdict_epoch = Some(seen_epoch);
                    confirmed_epoch = Some(seen_epoch);
                    self.scorer.reset();
                    break;
                }
            }

            if let Some(epoch) = verdict_epoch {
                debug!("Text confirmed in epoch {}", epoch);
                if self.events.send(ReaderEvent::Confirmed { epoch }).is_err() {
                    break;
                }
            }
            if start < n && self.events.send(ReaderEvent::Data(chunk[start..].to_vec())).is_err() {
                break;
            }
        }
        debug!("Reader stopped");
    }
}

fn is_no_data(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Handle to a running reader
pub struct ReaderHandle {
    cancel: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ReaderHandle {
    /// Wrap a spawned reader thread and its cancel flag
    pub fn new(cancel: Arc<AtomicBool>, join: JoinHandle<()>) -> Self {
        Self {
            cancel,
            join: Some(join),
        }
    }

    /// Ask the reader to stop and wait up to `grace` for it to do so.
    ///
    /// Returns `true` if the reader acknowledged in time. A reader that
    /// overruns is detached, so it can never hold up process exit.
    pub async fn stop(mut self, grace: Duration) -> bool {
        self.cancel.store(true, Ordering::Release);
        let Some(join) = self.join.take() else {
            return true;
        };

        let deadline = tokio::time::Instant::now() + grace;
        while !join.is_finished() {
            if tokio::time::Instant::now() >= deadline {
                warn!("Reader did not stop within {:?}; detaching it", grace);
                return false;
            }
            tokio::time::sleep(STOP_POLL).await;
        }

        if join.join().is_err() {
            warn!("Reader thread panicked");
        }
        true
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
    }
}

/// Starts the reader on some independently scheduled unit
pub trait ReaderSpawner {
    /// Start `task`, returning a handle that can stop it
    fn spawn(&self, task: ReaderTask) -> io::Result<ReaderHandle>;
}

/// Runs the reader on a dedicated, named OS thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl ReaderSpawner for ThreadSpawner {
    fn spawn(&self, task: ReaderTask) -> io::Result<ReaderHandle> {
        let cancel = task.cancel.clone();
        let join = std::thread::Builder::new()
            .name("serial-reader".into())
            .spawn(move || task.run())?;
        Ok(ReaderHandle::new(cancel, join))
    }
}
