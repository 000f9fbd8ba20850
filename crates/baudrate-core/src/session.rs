//! Detection session
//!
//! Wires the controller, the reader thread, the console and the timer
//! together in one `tokio::select!` loop, and owns the single cleanup path.
//!
//! However the session ends (text confirmed, operator interrupt, or the reader
//! failing to start) cleanup runs exactly once: stop the reader, restore the
//! link, restore the console, report the final rate. The link is closed when
//! the session is dropped right after.

use serde::Serialize;
use std::future::Future;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::candidates::CandidateTable;
use crate::config::DetectionConfig;
use crate::console::{ConsoleEvent, SavedTerminalModes};
use crate::controller::{ControlEvent, CycleController, CyclePhase, Step};
use crate::error::SessionError;
use crate::link::{LinkHandle, PortConfigurator};
use crate::reader::{ReaderEvent, ReaderHandle, ReaderSpawner, ReaderTask};

const RULE: &str = "@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@";
const PAD: &str = "                  ";

/// Outcome of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Device path
    pub port: String,
    /// Final candidate row
    pub index: usize,
    /// Final rate in bits per second
    pub rate: u32,
    /// Label of the final rate
    pub label: String,
    /// True when auto mode confirmed text, false when the session was interrupted
    pub detected: bool,
    /// Wait periods that expired without confirmation
    pub timeouts: u32,
    /// Whether the reader stopped within the grace period
    pub reader_stopped: bool,
}

/// A single detection run over one link
pub struct Session<P: PortConfigurator> {
    config: DetectionConfig,
    controller: CycleController<P>,
    console: SavedTerminalModes,
    output: Box<dyn Write + Send>,
    cleaned_up: bool,
}

impl<P: PortConfigurator> Session<P> {
    /// Session over an opened link. Echo and banners go to `output`.
    pub fn new(
        config: DetectionConfig,
        table: CandidateTable,
        link: LinkHandle<P>,
        console: SavedTerminalModes,
        output: Box<dyn Write + Send>,
    ) -> Self {
        let controller = CycleController::new(&config, table, link);
        Self {
            config,
            controller,
            console,
            output,
            cleaned_up: false,
        }
    }

    /// Run until detection or interrupt.
    ///
    /// `keys` carries console key events (manual mode), `interrupt` resolves when
    /// the operator asks to quit, `spawner` starts the reader.
    pub async fn run<F>(
        mut self,
        mut keys: mpsc::Receiver<ConsoleEvent>,
        interrupt: F,
        spawner: &dyn ReaderSpawner,
    ) -> Result<Summary, SessionError>
    where
        F: Future<Output = ()>,
    {
        self.controller.start();
        self.announce_rate();

        let source = match self.controller.link().reader() {
            Ok(source) => source,
            Err(e) => {
                self.cleanup(None).await;
                return Err(e.into());
            }
        };

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let task = ReaderTask::new(
            source,
            self.config.mode,
            self.config.threshold,
            self.controller.epoch(),
            cancel,
            events_tx,
        );
        let reader = match spawner.spawn(task) {
            Ok(handle) => handle,
            Err(e) => {
                self.cleanup(None).await;
                return Err(SessionError::ReaderSpawn(e));
            }
        };

        let wait = self.config.wait_period;
        let timer = tokio::time::sleep(wait);
        tokio::pin!(timer);
        tokio::pin!(interrupt);

        let mut keys_open = true;
        let mut events_open = true;

        loop {
            let event = tokio::select! {
                biased;

                _ = &mut interrupt => ControlEvent::Interrupt,

                _ = &mut timer, if self.controller.timer_armed() => ControlEvent::Tick,

                ev = events.recv(), if events_open => match ev {
                    Some(ReaderEvent::Data(bytes)) => {
                        self.echo(&bytes);
                        continue;
                    }
                    Some(ReaderEvent::Confirmed { epoch }) => ControlEvent::Confirmed { epoch },
                    None => {
                        warn!("Reader exited unexpectedly");
                        events_open = false;
                        continue;
                    }
                },

                key = keys.recv(), if keys_open => match key {
                    Some(ConsoleEvent::Gesture(gesture)) => ControlEvent::Key(gesture),
                    Some(ConsoleEvent::Quit) => ControlEvent::Interrupt,
                    None => {
                        debug!("Console input closed");
                        keys_open = false;
                        continue;
                    }
                },
            };

            let step = self.controller.handle(event);
            if event == ControlEvent::Tick {
                timer.as_mut().reset(Instant::now() + wait);
            }
            match step {
                Step::Changed(_) => self.announce_rate(),
                Step::Continue => {}
                Step::Finished => break,
            }
        }

        Ok(self.cleanup(Some(reader)).await)
    }

    /// The unique cleanup path
    async fn cleanup(&mut self, reader: Option<ReaderHandle>) -> Summary {
        let detected = self.controller.phase() == CyclePhase::Detected;
        self.controller.begin_shutdown();

        let reader_stopped = match reader {
            Some(handle) => handle.stop(self.config.reader_grace).await,
            None => true,
        };

        let summary = self.summary(detected, reader_stopped);
        if self.cleaned_up {
            return summary;
        }
        self.cleaned_up = true;

        self.controller.link_mut().restore_once();
        self.console.restore_once();

        info!(
            "Session finished at {} baud (detected: {}, timeouts: {})",
            summary.label, summary.detected, summary.timeouts
        );
        if self.config.verbose {
            let title = if detected {
                "Detected baud rate"
            } else {
                "Final baud rate"
            };
            let text = format!(
                "\n\n{RULE}\n{PAD}{title}: {} baud\n{RULE}\n\n",
                summary.label
            );
            self.emit_lines(&text);
        }
        summary
    }

    fn summary(&self, detected: bool, reader_stopped: bool) -> Summary {
        let state = self.controller.state();
        let current = self.controller.current();
        Summary {
            port: self.controller.link().port_name().to_string(),
            index: state.current_index,
            rate: current.rate,
            label: current.label.clone(),
            detected,
            timeouts: state.timeout_count,
            reader_stopped,
        }
    }

    fn announce_rate(&mut self) {
        if self.config.verbose {
            let text = format!(
                "\n\n{RULE}\n{PAD}Serial baud rate set to: {}\n{RULE}\n\n",
                self.controller.current().label
            );
            self.emit_lines(&text);
        }
    }

    fn echo(&mut self, bytes: &[u8]) {
        self.emit(bytes);
    }

    /// Raw mode does not translate `\n`, so add the carriage returns ourselves
    fn emit_lines(&mut self, text: &str) {
        if self.console.is_raw() {
            self.emit(text.replace('\n', "\r\n").as_bytes());
        } else {
            self.emit(text.as_bytes());
        }
    }

    fn emit(&mut self, bytes: &[u8]) {
        if let Err(e) = self.output.write_all(bytes).and_then(|_| self.output.flush()) {
            debug!("Failed to write to console: {}", e);
        }
    }
}
