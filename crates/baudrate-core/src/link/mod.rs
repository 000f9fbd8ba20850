//! Serial link access
//!
//! The controller only needs three things from the link: program a new rate,
//! put the original line settings back, and hand out a read-only clone for the
//! reader thread. [`PortConfigurator`] is that seam; [`SerialLink`] is the real
//! implementation on top of the `serialport` crate.

pub mod serial;

use std::io::Read;
use tracing::{debug, warn};

use crate::error::LinkError;

pub use serial::{configure_line, SerialLink};

/// Operations the cycle controller performs on the link
pub trait PortConfigurator: Send {
    /// Program both input and output clocks to `rate` and drop any input
    /// still queued from the previous rate. Nothing else about the line
    /// discipline is touched.
    fn apply(&mut self, rate: u32) -> Result<(), LinkError>;

    /// Reinstate the configuration captured when the link was opened
    fn restore(&mut self) -> Result<(), LinkError>;

    /// Independent read handle for the reader thread
    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>, LinkError>;

    /// Device path, for reports
    fn port_name(&self) -> &str;
}

/// Owns the link for the lifetime of a session and guarantees the original
/// configuration is restored exactly once, whichever way the session ends.
pub struct LinkHandle<P: PortConfigurator> {
    port: P,
    restored: bool,
}

impl<P: PortConfigurator> LinkHandle<P> {
    /// Wrap an opened link
    pub fn new(port: P) -> Self {
        Self {
            port,
            restored: false,
        }
    }

    /// Apply a new rate. Failures are logged and swallowed: the previous
    /// rate's data keeps flowing.
    pub fn apply(&mut self, rate: u32) -> bool {
        if self.restored {
            warn!("Ignoring baud change to {} after restore", rate);
            return false;
        }
        match self.port.apply(rate) {
            Ok(()) => {
                debug!("Link set to {} baud", rate);
                true
            }
            Err(e) => {
                warn!("Failed to set {} baud: {} (continuing)", rate, e);
                false
            }
        }
    }

    /// Restore the original settings if that has not happened yet.
    ///
    /// Returns `true` only for the call that actually performed the restore.
    pub fn restore_once(&mut self) -> bool {
        if self.restored {
            return false;
        }
        self.restored = true;
        if let Err(e) = self.port.restore() {
            warn!("Failed to restore serial settings: {}", e);
        }
        true
    }

    /// Whether the restore has run
    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Read handle for the reader thread
    pub fn reader(&self) -> Result<Box<dyn Read + Send>, LinkError> {
        self.port.try_clone_reader()
    }

    /// Device path
    pub fn port_name(&self) -> &str {
        self.port.port_name()
    }

    /// Access the wrapped link
    pub fn get_ref(&self) -> &P {
        &self.port
    }
}

impl<P: PortConfigurator> Drop for LinkHandle<P> {
    fn drop(&mut self) {
        self.restore_once();
    }
}
