//! Serial port handling
//!
//! Opens the device with the fixed 8-N-1, no-handshaking discipline and keeps
//! a copy of whatever configuration the line had before we touched it.

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read};
use std::time::Duration;
use tracing::debug;

#[cfg(unix)]
use std::fs::File;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

#[cfg(unix)]
use crate::termios::TermiosSnapshot;

use super::PortConfigurator;
use crate::error::LinkError;

/// Default device when none is given on the command line
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";

/// The line's configuration before the tool opened it
enum OriginalLine {
    /// Exact termios copy, taken through a side descriptor before the
    /// serialport crate reprogrammed the line
    #[cfg(unix)]
    Termios { fd: File, snapshot: TermiosSnapshot },
    /// Best effort: the port-level settings read right after opening
    #[cfg_attr(unix, allow(dead_code))]
    Settings {
        baud_rate: u32,
        data_bits: DataBits,
        parity: Parity,
        stop_bits: StopBits,
        flow_control: FlowControl,
    },
}

/// An opened serial device plus its original configuration
pub struct SerialLink {
    name: String,
    port: Box<dyn SerialPort>,
    original: OriginalLine,
}

impl SerialLink {
    /// Open `path` at `initial_rate` with reads bounded by `read_timeout`
    pub fn open(path: &str, initial_rate: u32, read_timeout: Duration) -> Result<Self, LinkError> {
        let open_err = |reason: String| LinkError::Open {
            port: path.to_string(),
            reason,
        };

        #[cfg(unix)]
        let original = {
            let fd = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
                .open(path)
                .map_err(|e| open_err(e.to_string()))?;
            let snapshot = TermiosSnapshot::capture(fd.as_raw_fd())
                .map_err(|e| LinkError::Snapshot(e.to_string()))?;
            OriginalLine::Termios { fd, snapshot }
        };

        let mut port = serialport::new(path, initial_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()
            .map_err(|e| open_err(e.to_string()))?;

        #[cfg(not(unix))]
        let original = OriginalLine::Settings {
            baud_rate: port.baud_rate()?,
            data_bits: port.data_bits()?,
            parity: port.parity()?,
            stop_bits: port.stop_bits()?,
            flow_control: port.flow_control()?,
        };

        configure_line(port.as_mut())?;
        debug!("Opened {} at {} baud", path, initial_rate);

        Ok(Self {
            name: path.to_string(),
            port,
            original,
        })
    }
}

/// Force 8 data bits, no parity, one stop bit, no flow control
pub fn configure_line(port: &mut dyn SerialPort) -> Result<(), LinkError> {
    port.set_data_bits(DataBits::Eight)?;
    port.set_parity(Parity::None)?;
    port.set_stop_bits(StopBits::One)?;
    port.set_flow_control(FlowControl::None)?;
    Ok(())
}

impl PortConfigurator for SerialLink {
    fn apply(&mut self, rate: u32) -> Result<(), LinkError> {
        self.port.set_baud_rate(rate)?;
        // Bytes already queued were framed at the previous rate
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn restore(&mut self) -> Result<(), LinkError> {
        match &self.original {
            #[cfg(unix)]
            OriginalLine::Termios { fd, snapshot } => snapshot
                .apply(fd.as_raw_fd())
                .map_err(|e| LinkError::Restore(e.to_string())),
            OriginalLine::Settings {
                baud_rate,
                data_bits,
                parity,
                stop_bits,
                flow_control,
            } => {
                self.port.set_baud_rate(*baud_rate)?;
                self.port.set_data_bits(*data_bits)?;
                self.port.set_parity(*parity)?;
                self.port.set_stop_bits(*stop_bits)?;
                self.port.set_flow_control(*flow_control)?;
                Ok(())
            }
        }
    }

    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>, LinkError> {
        let clone = self.port.try_clone()?;
        Ok(Box::new(PortReader(clone)))
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

/// Read-only view of a cloned port handle
struct PortReader(Box<dyn SerialPort>);

impl Read for PortReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}
