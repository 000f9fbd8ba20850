//! Detection settings
//!
//! One owned value carries every tunable; it is handed to the controller, the
//! reader and the session when they are built.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::candidates::IndexPolicy;
use crate::error::ConfigError;
use crate::scorer::DEFAULT_THRESHOLD;

/// Default time spent on each candidate in auto mode
pub const DEFAULT_WAIT_PERIOD: Duration = Duration::from_secs(5);

/// Per-read timeout on the link; bounds how quickly the reader notices
/// cancellation
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// How long shutdown waits for the reader to acknowledge cancellation
pub const DEFAULT_READER_GRACE: Duration = Duration::from_millis(500);

/// How candidates are selected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Cycle through candidates on a timer, scoring the input for text
    #[default]
    Auto,
    /// The operator steps through candidates with the keyboard
    Manual,
}

/// Detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Auto-detect or step by hand
    pub mode: DetectionMode,
    /// Minimum printable run length before text is confirmed
    pub threshold: usize,
    /// How long to listen at each rate before moving on (auto mode)
    #[serde(with = "millis")]
    pub wait_period: Duration,
    /// Upper bound on a single blocking read of the link
    #[serde(with = "millis")]
    pub read_timeout: Duration,
    /// How long shutdown waits for the reader before detaching it
    #[serde(with = "millis")]
    pub reader_grace: Duration,
    /// Wrap or clamp at the ends of the table
    pub index_policy: IndexPolicy,
    /// Print the rate banners and the intro. Received data is echoed either way.
    pub verbose: bool,
    /// Ask the operator where to save the configuration on exit
    pub prompt: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            mode: DetectionMode::Auto,
            threshold: DEFAULT_THRESHOLD,
            wait_period: DEFAULT_WAIT_PERIOD,
            read_timeout: DEFAULT_READ_TIMEOUT,
            reader_grace: DEFAULT_READER_GRACE,
            index_policy: IndexPolicy::Wrap,
            verbose: true,
            prompt: true,
        }
    }
}

impl DetectionConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the detector cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_period.is_zero() {
            return Err(ConfigError::ZeroWaitPeriod);
        }
        Ok(())
    }

    /// Quiet mode: no banners and no prompts. Received data is still echoed.
    pub fn quiet(mut self) -> Self {
        self.verbose = false;
        self.prompt = false;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = DetectionConfig::default();
        assert_eq!(cfg.mode, DetectionMode::Auto);
        assert_eq!(cfg.threshold, 25);
        assert_eq!(cfg.wait_period, Duration::from_secs(5));
        assert_eq!(cfg.index_policy, IndexPolicy::Wrap);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let cfg: DetectionConfig =
            serde_json::from_str(r#"{"mode":"manual","wait_period":1500,"index_policy":"clamp"}"#)
                .unwrap();
        assert_eq!(cfg.mode, DetectionMode::Manual);
        assert_eq!(cfg.wait_period, Duration::from_millis(1500));
        assert_eq!(cfg.index_policy, IndexPolicy::Clamp);
        assert_eq!(cfg.threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_from_file_rejects_zero_wait() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"wait_period":0}}"#).unwrap();
        assert!(matches!(
            DetectionConfig::from_file(file.path()),
            Err(ConfigError::ZeroWaitPeriod)
        ));
    }

    #[test]
    fn test_quiet() {
        let cfg = DetectionConfig::default().quiet();
        assert!(!cfg.verbose);
        assert!(!cfg.prompt);
    }
}
