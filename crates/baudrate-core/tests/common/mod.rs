#![allow(dead_code)]

use baudrate_core::error::LinkError;
use baudrate_core::link::PortConfigurator;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

/// What a mock port has been asked to do
#[derive(Clone, Default)]
pub struct PortLog {
    applied: Arc<Mutex<Vec<u32>>>,
    restores: Arc<AtomicUsize>,
}

impl PortLog {
    pub fn applied(&self) -> Vec<u32> {
        self.applied.lock().unwrap().clone()
    }

    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

/// Mock serial port for testing
pub struct MockPort {
    log: PortLog,
    source: Mutex<Option<Box<dyn Read + Send>>>,
    fail_apply: bool,
}

impl MockPort {
    pub fn new(source: impl Read + Send + 'static) -> (Self, PortLog) {
        let log = PortLog::default();
        let port = Self {
            log: log.clone(),
            source: Mutex::new(Some(Box::new(source))),
            fail_apply: false,
        };
        (port, log)
    }

    pub fn silent() -> (Self, PortLog) {
        Self::new(ChannelSource::idle())
    }

    pub fn failing_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }
}

impl PortConfigurator for MockPort {
    fn apply(&mut self, rate: u32) -> Result<(), LinkError> {
        self.log.applied.lock().unwrap().push(rate);
        if self.fail_apply {
            return Err(LinkError::SerialError("mock apply failure".into()));
        }
        Ok(())
    }

    fn restore(&mut self) -> Result<(), LinkError> {
        self.log.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>, LinkError> {
        self.source
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| LinkError::SerialError("reader already taken".into()))
    }

    fn port_name(&self) -> &str {
        "/dev/ttyMOCK0"
    }
}

/// Byte source fed from the test; reports "timed out" when nothing is queued,
/// like a serial port with a read timeout
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    _keep_open: Option<mpsc::Sender<Vec<u8>>>,
}

impl ChannelSource {
    pub fn new() -> (Self, mpsc::Sender<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                rx,
                pending: Vec::new(),
                _keep_open: None,
            },
            tx,
        )
    }

    /// A source that never produces data
    pub fn idle() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            rx,
            pending: Vec::new(),
            _keep_open: Some(tx),
        }
    }

    /// A source that yields `bytes` once, then nothing
    pub fn with_bytes(bytes: &[u8]) -> Self {
        let source = Self::idle();
        if let Some(tx) = &source._keep_open {
            tx.send(bytes.to_vec()).unwrap();
        }
        source
    }
}

impl Read for ChannelSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(Duration::from_millis(10)) {
                Ok(bytes) => self.pending = bytes,
                Err(_) => return Err(io::ErrorKind::TimedOut.into()),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

/// Output sink whose contents the test can inspect
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
