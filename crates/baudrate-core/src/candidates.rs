//! Candidate baud rates
//!
//! The ordered table of rates the detector steps through, and the policy that
//! keeps the cursor inside it.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Curated list of the most common rates. Kept short so a full auto-detect
/// cycle stays quick.
const STANDARD_RATES: &[u32] = &[2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// Every classic and high-speed rate the tool knows how to program.
const EXTENDED_RATES: &[u32] = &[
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
    115200, 230400, 460800, 500000, 576000, 921600, 1000000, 1152000, 1500000, 2000000, 2500000,
    3000000, 3500000, 4000000,
];

/// A single candidate rate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRate {
    /// Machine readable rate in bits per second
    pub rate: u32,
    /// Human readable label
    pub label: String,
}

impl CandidateRate {
    /// Create a candidate labelled with its decimal rate
    pub fn new(rate: u32) -> Self {
        Self {
            rate,
            label: rate.to_string(),
        }
    }
}

/// Immutable, non-empty, ordered list of candidate rates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTable {
    rates: Vec<CandidateRate>,
}

impl CandidateTable {
    /// Build a table from explicit entries
    pub fn new(rates: Vec<CandidateRate>) -> Result<Self, ConfigError> {
        if rates.is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        if let Some(bad) = rates.iter().find(|c| c.rate == 0) {
            return Err(ConfigError::InvalidRate(bad.label.clone()));
        }
        Ok(Self { rates })
    }

    /// Build a table from bare rates, in the given order
    pub fn from_rates(rates: &[u32]) -> Result<Self, ConfigError> {
        Self::new(rates.iter().copied().map(CandidateRate::new).collect())
    }

    /// Parse a comma separated list such as `"9600,115200"`
    pub fn parse_list(list: &str) -> Result<Self, ConfigError> {
        let rates = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u32>()
                    .map_err(|_| ConfigError::InvalidRate(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_rates(&rates)
    }

    /// The curated default table (2400 .. 115200)
    pub fn standard() -> Self {
        Self {
            rates: STANDARD_RATES.iter().copied().map(CandidateRate::new).collect(),
        }
    }

    /// The full table of supported rates (50 .. 4000000)
    pub fn extended() -> Self {
        Self {
            rates: EXTENDED_RATES.iter().copied().map(CandidateRate::new).collect(),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Row at `index`, if in range
    pub fn get(&self, index: usize) -> Option<&CandidateRate> {
        self.rates.get(index)
    }

    /// Row at `index`; indices past the end resolve to the last row
    pub fn at(&self, index: usize) -> &CandidateRate {
        &self.rates[index.min(self.rates.len() - 1)]
    }

    /// Starting row: the last (highest) entry, the most common high-speed rate
    pub fn default_index(&self) -> usize {
        self.rates.len() - 1
    }

    /// Iterate over the rows in order
    pub fn iter(&self) -> impl Iterator<Item = &CandidateRate> {
        self.rates.iter()
    }
}

impl Default for CandidateTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// What happens when the cursor is pushed past either end of the table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexPolicy {
    /// Past the top goes to row 0, below row 0 goes to the top
    #[default]
    Wrap,
    /// Saturate at the first and last rows
    Clamp,
}

impl IndexPolicy {
    /// Move `index` by `delta` rows inside a table of `len` rows.
    ///
    /// `len` must be non-zero. The result is always in `0..len`, even when
    /// `index` itself was out of range.
    pub fn step(self, index: usize, delta: isize, len: usize) -> usize {
        debug_assert!(len > 0);
        let len = len as isize;
        let target = index.min(len as usize - 1) as isize + delta;
        let next = match self {
            IndexPolicy::Wrap => target.rem_euclid(len),
            IndexPolicy::Clamp => target.clamp(0, len - 1),
        };
        next as usize
    }
}
