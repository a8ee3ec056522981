//! Settings file loading.
//!
//! ```toml
//! [connection]
//! host = "dc01.example.com"
//! port = 22
//! username = "svc-provisioning"
//! known_hosts = "/etc/ps-session/known_hosts"
//!
//! [timeouts]
//! connect_ms = 5000
//! read_ms = 3000
//! bootstrap_ms = 30000
//! poll_interval_ms = 20
//!
//! [console]
//! bootstrap_command = "Import-Module ActiveDirectory"  # "" disables
//! status_probe = "$?"
//! success_token = "True"
//! line_ending = "crlf"
//! term = "xterm"
//! columns = 512
//! rows = 48
//! ```
//!
//! Unknown keys are rejected, which includes any attempt to put a password
//! in the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::{LineEnding, SessionConfig};
use crate::error::{ConsoleError, Result};

/// A parsed settings file. Every value is optional and overrides the
/// corresponding default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    /// `[connection]` section.
    pub connection: ConnectionSection,
    /// `[timeouts]` section.
    pub timeouts: TimeoutsSection,
    /// `[console]` section.
    pub console: ConsoleSection,
}

/// `[connection]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSection {
    /// Remote host.
    pub host: Option<String>,
    /// Remote port.
    pub port: Option<u16>,
    /// Login user.
    pub username: Option<String>,
    /// Known-hosts file.
    pub known_hosts: Option<PathBuf>,
}

/// `[timeouts]` section, all values in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsSection {
    /// Connect timeout.
    pub connect_ms: Option<u64>,
    /// Read timeout.
    pub read_ms: Option<u64>,
    /// Bootstrap timeout.
    pub bootstrap_ms: Option<u64>,
    /// Poll interval.
    pub poll_interval_ms: Option<u64>,
}

/// `[console]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleSection {
    /// Module-load command; empty disables it.
    pub bootstrap_command: Option<String>,
    /// Status probe.
    pub status_probe: Option<String>,
    /// Success token.
    pub success_token: Option<String>,
    /// Line ending: `lf`, `crlf` or `cr`.
    pub line_ending: Option<LineEnding>,
    /// Terminal type.
    pub term: Option<String>,
    /// Terminal columns.
    pub columns: Option<u32>,
    /// Terminal rows.
    pub rows: Option<u32>,
}

impl SettingsFile {
    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        // The message alone: the full rendering quotes the offending line.
        toml::from_str(content)
            .map_err(|e| ConsoleError::config(format!("invalid settings file: {}", e.message())))
    }

    /// Read and parse a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::io_context(format!("reading settings file {}", path.display()), e)
        })?;
        tracing::debug!(path = %path.display(), "Loaded settings file");
        Self::parse(&content)
    }

    /// Overlay these settings on `config`.
    #[must_use]
    pub fn apply(self, mut config: SessionConfig) -> SessionConfig {
        let Self {
            connection,
            timeouts,
            console,
        } = self;

        if let Some(host) = connection.host {
            config.host = host;
        }
        if let Some(port) = connection.port {
            config.port = port;
        }
        if let Some(username) = connection.username {
            config.username = username;
        }
        if connection.known_hosts.is_some() {
            config.known_hosts = connection.known_hosts;
        }

        let millis = Duration::from_millis;
        if let Some(ms) = timeouts.connect_ms {
            config.timeouts.connect = millis(ms);
        }
        if let Some(ms) = timeouts.read_ms {
            config.timeouts.read = millis(ms);
        }
        if let Some(ms) = timeouts.bootstrap_ms {
            config.timeouts.bootstrap = millis(ms);
        }
        if let Some(ms) = timeouts.poll_interval_ms {
            config.timeouts.poll_interval = millis(ms);
        }

        if let Some(command) = console.bootstrap_command {
            config.console.bootstrap_command = Some(command).filter(|c| !c.trim().is_empty());
        }
        if let Some(probe) = console.status_probe {
            config.console.status_probe = probe;
        }
        if let Some(token) = console.success_token {
            config.console.success_token = token;
        }
        if let Some(line_ending) = console.line_ending {
            config.console.line_ending = line_ending;
        }
        if let Some(term) = console.term {
            config.console.term = term;
        }
        if let Some(columns) = console.columns {
            config.console.dimensions.0 = columns;
        }
        if let Some(rows) = console.rows {
            config.console.dimensions.1 = rows;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [connection]
        host = "dc01.example.com"
        port = 2222
        username = "svc-provisioning"
        known_hosts = "/etc/ps-session/known_hosts"

        [timeouts]
        read_ms = 10000
        poll_interval_ms = 50

        [console]
        bootstrap_command = ""
        line_ending = "lf"
        columns = 300
    "#;

    #[test]
    fn parse_and_apply() {
        let settings = SettingsFile::parse(SAMPLE).unwrap();
        let config = settings.apply(SessionConfig::default());

        assert_eq!(config.host, "dc01.example.com");
        assert_eq!(config.port, 2222);
        assert_eq!(config.username, "svc-provisioning");
        assert_eq!(
            config.known_hosts.as_deref(),
            Some(Path::new("/etc/ps-session/known_hosts"))
        );
        assert_eq!(config.timeouts.read, Duration::from_secs(10));
        assert_eq!(config.timeouts.poll_interval, Duration::from_millis(50));
        assert_eq!(config.timeouts.connect, Duration::from_secs(5));
        assert!(config.console.bootstrap_command.is_none());
        assert_eq!(config.console.line_ending, LineEnding::Lf);
        assert_eq!(config.console.dimensions, (300, 48));
    }

    #[test]
    fn empty_file_changes_nothing() {
        let settings = SettingsFile::parse("").unwrap();
        assert_eq!(settings, SettingsFile::default());
        let config = settings.apply(SessionConfig::new("dc01", "abij"));
        assert_eq!(config.host, "dc01");
        assert!(config.console.bootstrap_command.is_some());
    }

    #[test]
    fn password_in_file_is_rejected() {
        let err = SettingsFile::parse("[connection]\npassword = \"hunter2\"\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("password"));
        assert!(!msg.contains("hunter2"));
    }

    #[test]
    fn wrong_type_is_rejected() {
        assert!(SettingsFile::parse("[connection]\nport = \"twenty-two\"\n").is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SettingsFile::load(Path::new("/nonexistent/ps-session.toml")).unwrap_err();
        assert!(err.to_string().contains("reading settings file"));
    }
}
