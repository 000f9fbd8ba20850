//! Raw termios snapshots
//!
//! The serial line is restored from a copy of its `termios` taken before the
//! serialport crate reprogrammed it.

use std::io;
use std::os::unix::io::RawFd;

/// A saved `termios` structure
#[derive(Clone, Copy)]
pub struct TermiosSnapshot {
    raw: libc::termios,
}

impl std::fmt::Debug for TermiosSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermiosSnapshot")
            .field("c_iflag", &self.raw.c_iflag)
            .field("c_oflag", &self.raw.c_oflag)
            .field("c_cflag", &self.raw.c_cflag)
            .field("c_lflag", &self.raw.c_lflag)
            .finish()
    }
}

impl TermiosSnapshot {
    /// Read the current settings of `fd`
    pub fn capture(fd: RawFd) -> io::Result<Self> {
        // SAFETY: termios is plain data and tcgetattr fully initialises it on success.
        let mut raw: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut raw) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { raw })
    }

    /// Write these settings back to `fd`, effective immediately
    pub fn apply(&self, fd: RawFd) -> io::Result<()> {
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &self.raw) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
