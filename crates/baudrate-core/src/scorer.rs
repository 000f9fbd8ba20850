//! Text likelihood scorer
//!
//! Decides whether a byte stream looks like readable text. At the right baud
//! rate console output arrives as long unbroken runs of printable ASCII; at
//! the wrong rate the framing errors produce frequent non-printable bytes.
//!
//! A run is accepted once it is at least `threshold` bytes long and has
//! contained whitespace, punctuation and a vowel. One non-printable byte
//! throws the whole run away.

use serde::{Deserialize, Serialize};

/// Default minimum run length before text is confirmed
pub const DEFAULT_THRESHOLD: usize = 25;

/// Result of feeding one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not enough evidence yet
    Pending,
    /// The current run qualifies as text
    Confirmed,
}

/// Evidence gathered for the current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorerState {
    /// Printable bytes since the last non-printable one
    pub consecutive_ascii: usize,
    /// Space, CR or LF seen in this run
    pub whitespace_seen: bool,
    /// One of `. , ; : ! ?` seen in this run
    pub punctuation_seen: bool,
    /// A vowel of either case seen in this run
    pub vowel_seen: bool,
}

/// Streaming text detector
#[derive(Debug, Clone)]
pub struct TextScorer {
    threshold: usize,
    state: ScorerState,
}

impl TextScorer {
    /// Create a scorer. A threshold of 0 behaves like 1.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            state: ScorerState::default(),
        }
    }

    /// Configured run length threshold
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Snapshot of the current run's evidence
    pub fn state(&self) -> ScorerState {
        self.state
    }

    /// Forget the current run
    pub fn reset(&mut self) {
        self.state = ScorerState::default();
    }

    /// Feed the next byte of the stream
    pub fn push(&mut self, byte: u8) -> Verdict {
        if !is_printable(byte) {
            self.reset();
            return Verdict::Pending;
        }

        let s = &mut self.state;
        s.consecutive_ascii = s.consecutive_ascii.saturating_add(1);
        match byte {
            b' ' | b'\r' | b'\n' => s.whitespace_seen = true,
            b'.' | b',' | b';' | b':' | b'!' | b'?' => s.punctuation_seen = true,
            b if is_vowel(b) => s.vowel_seen = true,
            _ => {}
        }

        if self.is_confirmed() {
            Verdict::Confirmed
        } else {
            Verdict::Pending
        }
    }

    /// Feed a whole slice, stopping at the first confirmation.
    ///
    /// Returns the number of bytes consumed and the verdict after the last one.
    pub fn push_slice(&mut self, bytes: &[u8]) -> (usize, Verdict) {
        for (i, &b) in bytes.iter().enumerate() {
            if self.push(b) == Verdict::Confirmed {
                return (i + 1, Verdict::Confirmed);
            }
        }
        (bytes.len(), Verdict::Pending)
    }

    fn is_confirmed(&self) -> bool {
        let s = &self.state;
        s.consecutive_ascii >= self.threshold
            && s.whitespace_seen
            && s.punctuation_seen
            && s.vowel_seen
    }
}

impl Default for TextScorer {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// Printable ASCII, plus CR and LF
pub fn is_printable(byte: u8) -> bool {
    matches!(byte, b' '..=b'~' | b'\r' | b'\n')
}

fn is_vowel(byte: u8) -> bool {
    matches!(byte.to_ascii_lowercase(), b'a' | b'e' | b'i' | b'o' | b'u')
}
