//! Configuration report
//!
//! Emits the final link settings as a minicom-compatible configuration block,
//! either on stdout or into `<config dir>/minirc.<name>`, and can hand the
//! terminal over to minicom afterwards.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ReportError;
use crate::session::Summary;

/// Default minicom configuration directory
pub const MINICOM_CONFIG_DIR: &str = "/etc/minicom";

/// Prefix minicom expects on configuration file names
pub const MINICOM_CONFIG_PREFIX: &str = "minirc.";

/// Default minicom binary
pub const MINICOM_BIN: &str = "/usr/bin/minicom";

const RULE: &str = "########################################################################";

/// Settings written to the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    /// Device path
    pub port: String,
    /// Rate label as written to `pu baudrate`
    pub baud_label: String,
}

impl LinkReport {
    /// Report for `port` at `baud_label`
    pub fn new(port: impl Into<String>, baud_label: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_label: baud_label.into(),
        }
    }

    /// Render the minicom block. Framing is always 8-N-1 without flow control.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(RULE);
        out.push('\n');
        out.push_str("# Minicom configuration file - use \"minicom -s\" to change parameters.\n");
        out.push_str(&format!("pu port             {}\n", self.port));
        out.push_str(&format!("pu baudrate         {}\n", self.baud_label));
        out.push_str("pu bits             8\n");
        out.push_str("pu parity           N\n");
        out.push_str("pu stopbits         1\n");
        out.push_str("pu rtscts           No\n");
        out.push_str(RULE);
        out.push('\n');
        out
    }
}

impl From<&Summary> for LinkReport {
    fn from(summary: &Summary) -> Self {
        Self::new(summary.port.clone(), summary.label.clone())
    }
}

/// Where the report was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    /// Printed to standard output
    Stdout,
    /// Saved as this minicom configuration file
    File(PathBuf),
}

/// Path of the named minicom configuration inside `config_dir`
pub fn config_path(config_dir: &Path, name: &str) -> PathBuf {
    config_dir.join(format!("{}{}", MINICOM_CONFIG_PREFIX, name))
}

/// Write the report for `name` into `config_dir`, or to `stdout` when no name
/// is given or the file cannot be created.
pub fn write_report(
    report: &LinkReport,
    name: Option<&str>,
    config_dir: &Path,
    stdout: &mut dyn Write,
) -> Result<ReportDestination, ReportError> {
    let text = report.render();

    if let Some(name) = name.filter(|n| !n.is_empty()) {
        let path = config_path(config_dir, name);
        match File::create(&path) {
            Ok(mut file) => {
                file.write_all(text.as_bytes())?;
                info!("Saved minicom configuration to {}", path.display());
                return Ok(ReportDestination::File(path));
            }
            Err(e) => {
                warn!("Failed to open {} for writing: {}", path.display(), e);
            }
        }
    }

    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(ReportDestination::Stdout)
}

/// Replace the current process with `bin <name>`.
///
/// Only returns on failure.
#[cfg(unix)]
pub fn launch_companion(bin: &str, name: &str) -> ReportError {
    use std::os::unix::process::CommandExt;

    let err = std::process::Command::new(bin).arg(name).exec();
    ReportError::Launch {
        bin: bin.to_string(),
        source: err,
    }
}

/// Run `bin <name>` to completion.
#[cfg(not(unix))]
pub fn launch_companion(bin: &str, name: &str) -> ReportError {
    match std::process::Command::new(bin).arg(name).status() {
        Ok(_) => std::process::exit(0),
        Err(source) => ReportError::Launch {
            bin: bin.to_string(),
            source,
        },
    }
}

/// Read one line from `input`, without the trailing newline
pub fn read_config_name(input: &mut dyn io::BufRead) -> io::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render() {
        let report = LinkReport::new("/dev/ttyUSB0", "115200");
        let expected = "\
########################################################################
# Minicom configuration file - use \"minicom -s\" to change parameters.
pu port             /dev/ttyUSB0
pu baudrate         115200
pu bits             8
pu parity           N
pu stopbits         1
pu rtscts           No
########################################################################
";
        assert_eq!(report.render(), expected);
    }

    #[test]
    fn test_write_to_stdout_without_name() {
        let report = LinkReport::new("/dev/ttyS0", "9600");
        let mut out = Vec::new();
        let dest = write_report(&report, None, Path::new("/nonexistent"), &mut out).unwrap();
        assert_eq!(dest, ReportDestination::Stdout);
        assert_eq!(String::from_utf8(out).unwrap(), report.render());
    }

    #[test]
    fn test_write_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = LinkReport::new("/dev/ttyS0", "9600");
        let mut out = Vec::new();
        let dest = write_report(&report, Some("board"), dir.path(), &mut out).unwrap();

        let path = dir.path().join("minirc.board");
        assert_eq!(dest, ReportDestination::File(path.clone()));
        assert!(out.is_empty());
        assert_eq!(std::fs::read_to_string(path).unwrap(), report.render());
    }

    #[test]
    fn test_unwritable_dir_falls_back_to_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let report = LinkReport::new("/dev/ttyS0", "9600");
        let mut out = Vec::new();
        let dest = write_report(&report, Some("board"), &missing, &mut out).unwrap();
        assert_eq!(dest, ReportDestination::Stdout);
        assert!(!out.is_empty());
    }

    #[test]
    fn test_read_config_name() {
        let mut input = io::Cursor::new(b"board\r\n".to_vec());
        assert_eq!(read_config_name(&mut input).unwrap(), "board");
        let mut empty = io::Cursor::new(b"\n".to_vec());
        assert_eq!(read_config_name(&mut empty).unwrap(), "");
    }
}
