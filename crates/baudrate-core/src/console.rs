//! Operator console
//!
//! Puts the console in raw mode for a manual session and turns key presses
//! into increase/decrease gestures.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::tty::IsTty;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How often the key pump checks whether it should stop
const KEY_POLL: Duration = Duration::from_millis(50);

/// Console raw mode, switched off again exactly once
#[derive(Debug)]
pub struct SavedTerminalModes {
    raw: bool,
    restored: bool,
}

impl SavedTerminalModes {
    /// Switch stdin to raw mode.
    ///
    /// When stdin is not a terminal nothing is changed and restoring is a no-op.
    pub fn capture_stdin() -> io::Result<Self> {
        if !io::stdin().is_tty() {
            debug!("stdin is not a terminal; leaving console modes alone");
            return Ok(Self::detached());
        }
        enable_raw_mode()?;
        Ok(Self {
            raw: true,
            restored: false,
        })
    }

    /// A guard that owns nothing
    pub fn detached() -> Self {
        Self {
            raw: false,
            restored: false,
        }
    }

    /// Whether the console is currently in raw mode. Raw mode also turns off
    /// output post-processing, so lines need an explicit carriage return.
    pub fn is_raw(&self) -> bool {
        self.raw && !self.restored
    }

    /// Put the console back the way it was. Later calls do nothing.
    pub fn restore_once(&mut self) -> bool {
        if self.restored {
            return false;
        }
        self.restored = true;
        if self.raw {
            if let Err(e) = disable_raw_mode() {
                warn!("Failed to restore console modes: {}", e);
            }
        }
        true
    }

    /// Whether the restore has run
    pub fn is_restored(&self) -> bool {
        self.restored
    }
}

impl Drop for SavedTerminalModes {
    fn drop(&mut self) {
        self.restore_once();
    }
}

/// Manual-mode rate change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGesture {
    /// Next higher rate
    Increase,
    /// Next lower rate
    Decrease,
}

impl KeyGesture {
    /// Cursor movement for this gesture
    pub fn delta(self) -> isize {
        match self {
            KeyGesture::Increase => 1,
            KeyGesture::Decrease => -1,
        }
    }
}

/// What the operator asked for from the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// Step the rate
    Gesture(KeyGesture),
    /// Ctrl+C. Raw mode delivers it as a key instead of SIGINT.
    Quit,
}

/// Map a key press to a console event.
///
/// Up arrow and `u`/`U` increase, down arrow and `d`/`D` decrease, Ctrl+C
/// quits. Key releases and every other key are ignored.
pub fn map_key(key: &KeyEvent) -> Option<ConsoleEvent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(ConsoleEvent::Quit);
    }
    match key.code {
        KeyCode::Up | KeyCode::Char('u') | KeyCode::Char('U') => {
            Some(ConsoleEvent::Gesture(KeyGesture::Increase))
        }
        KeyCode::Down | KeyCode::Char('d') | KeyCode::Char('D') => {
            Some(ConsoleEvent::Gesture(KeyGesture::Decrease))
        }
        _ => None,
    }
}

/// Background thread forwarding console events into a channel
pub struct KeyPump {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl KeyPump {
    /// Stop forwarding and wait for the thread.
    ///
    /// Input typed afterwards stays on stdin for the next reader.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("console key thread panicked");
            }
        }
    }
}

impl Drop for KeyPump {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Forward console key presses into `tx` from a background thread.
///
/// The thread ends when the receiver goes away, when the console cannot be
/// read, or when the returned [`KeyPump`] is stopped.
pub fn spawn_key_pump(tx: mpsc::Sender<ConsoleEvent>) -> io::Result<KeyPump> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    let join = std::thread::Builder::new()
        .name("console-keys".into())
        .spawn(move || {
            if let Err(e) = pump_keys(&tx, &flag) {
                debug!("console read failed: {}", e);
            }
        })?;
    Ok(KeyPump {
        stop,
        join: Some(join),
    })
}

fn pump_keys(tx: &mpsc::Sender<ConsoleEvent>, stop: &AtomicBool) -> io::Result<()> {
    while !stop.load(Ordering::SeqCst) {
        if !event::poll(KEY_POLL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if let Some(ev) = map_key(&key) {
                if tx.blocking_send(ev).is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}
