//! CLI argument definitions using Clap

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use baudrate_core::candidates::{CandidateTable, IndexPolicy};
use baudrate_core::config::{DetectionConfig, DetectionMode};
use baudrate_core::error::ConfigError;
use baudrate_core::link::serial::DEFAULT_SERIAL_PORT;
use baudrate_core::report::{MINICOM_BIN, MINICOM_CONFIG_DIR};

/// Identify the baud rate of an unknown serial port
#[derive(Parser, Debug)]
#[command(name = "baudrate")]
#[command(
    version,
    about = "Identify the baud rate of a serial port by auto-detection or by stepping through rates manually",
    after_help = "Assumes 8 data bits, no parity, 1 stop bit and no handshaking."
)]
pub struct Cli {
    /// Serial device
    #[arg(default_value = DEFAULT_SERIAL_PORT)]
    pub device: String,

    /// Step through rates with the up/down arrows (or u/d) instead of auto-detecting
    #[arg(short, long)]
    pub manual: bool,

    /// Seconds to wait on each rate in auto-detect mode [default: 5]
    #[arg(short = 't', long = "wait", value_name = "SECONDS")]
    pub wait: Option<u64>,

    /// Minimum run of printable characters needed to confirm a rate [default: 25]
    #[arg(short = 'c', long = "threshold", value_name = "NUM")]
    pub threshold: Option<usize>,

    /// Save the configuration as minirc.<NAME> and start minicom with it
    #[arg(short = 'n', long, value_name = "NAME")]
    pub name: Option<String>,

    /// Do not start minicom when --name is given
    #[arg(short = 'E', long = "no-exec")]
    pub no_exec: bool,

    /// List the candidate baud rates and exit
    #[arg(short = 'b', long = "list-rates")]
    pub list_rates: bool,

    /// Disable interactive prompts
    #[arg(short = 'p', long = "no-prompt")]
    pub no_prompt: bool,

    /// Quiet mode: no banners (implies --no-prompt)
    #[arg(short, long)]
    pub quiet: bool,

    /// Saturate at the lowest/highest rate instead of wrapping around
    #[arg(long)]
    pub clamp: bool,

    /// Comma separated candidate rates, lowest first (e.g. 9600,57600,115200)
    #[arg(long, value_name = "RATES", conflicts_with = "extended")]
    pub rates: Option<String>,

    /// Try every supported rate instead of the common ones
    #[arg(long)]
    pub extended: bool,

    /// JSON file with detection settings; flags override it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for minicom configuration files
    #[arg(long, value_name = "DIR", default_value = MINICOM_CONFIG_DIR)]
    pub minicom_dir: PathBuf,

    /// minicom binary to start with --name
    #[arg(long, value_name = "PATH", default_value = MINICOM_BIN)]
    pub minicom_bin: String,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Candidate table selected by the flags
    pub fn candidate_table(&self) -> Result<CandidateTable, ConfigError> {
        match (&self.rates, self.extended) {
            (Some(list), _) => CandidateTable::parse_list(list),
            (None, true) => Ok(CandidateTable::extended()),
            (None, false) => Ok(CandidateTable::standard()),
        }
    }

    /// Detection settings: config file (if any), then flags on top
    pub fn detection_config(&self) -> Result<DetectionConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => DetectionConfig::from_file(path)?,
            None => DetectionConfig::default(),
        };

        if self.manual {
            config.mode = DetectionMode::Manual;
        }
        if let Some(secs) = self.wait {
            config.wait_period = Duration::from_secs(secs);
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if self.clamp {
            config.index_policy = IndexPolicy::Clamp;
        }
        if self.no_prompt {
            config.prompt = false;
        }
        if self.quiet {
            config = config.quiet();
        }

        config.validate()?;
        Ok(config)
    }

    /// Whether minicom should be started after saving a named configuration
    pub fn launch_minicom(&self) -> bool {
        self.name.is_some() && !self.no_exec
    }
}
