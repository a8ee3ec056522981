//! Configuration types for ps-session.
//!
//! [`SessionConfig`] is built in code with chained setters, or assembled from
//! a TOML settings file ([`file`]) and `PS_SESSION_*` environment overrides
//! ([`env`]) with [`load`]. Precedence is defaults, then file, then
//! environment. The credential never comes from the settings file.

pub mod env;
pub mod file;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::credential::Credential;
use crate::error::{ConsoleError, Result};

pub use env::EnvConfig;
pub use file::SettingsFile;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default transport connect and authentication timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for a single read-until-prompt.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Default timeout for the module-load bootstrap.
pub const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default sleep between empty polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Default module-load command.
pub const DEFAULT_BOOTSTRAP_COMMAND: &str = "Import-Module ActiveDirectory";

/// Default status probe: PowerShell's last-status variable.
pub const DEFAULT_STATUS_PROBE: &str = "$?";

/// Default literal reported by the status probe on success.
pub const DEFAULT_SUCCESS_TOKEN: &str = "True";

/// Default terminal type requested for the PTY.
pub const DEFAULT_TERM: &str = "xterm";

/// Default terminal width. Wide enough that long commands do not wrap.
pub const DEFAULT_TERMINAL_WIDTH: u32 = 512;

/// Default terminal height.
pub const DEFAULT_TERMINAL_HEIGHT: u32 = 48;

/// Connection parameters for one remote console session.
pub struct SessionConfig {
    /// Remote host name or address.
    pub host: String,

    /// Remote port.
    pub port: u16,

    /// Login user.
    pub username: String,

    /// Credential, taken by the session when it is created.
    credential: Option<Credential>,

    /// Known-hosts file; `None` accepts any server key.
    pub known_hosts: Option<PathBuf>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Console conversation configuration.
    pub console: ConsoleConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            credential: None,
            known_hosts: None,
            timeouts: TimeoutConfig::default(),
            console: ConsoleConfig::default(),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .field("known_hosts", &self.known_hosts)
            .field("timeouts", &self.timeouts)
            .field("console", &self.console)
            .finish()
    }
}

impl SessionConfig {
    /// Create a configuration for `username` at `host`.
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    /// Set the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the password.
    #[must_use]
    pub fn password(self, password: impl Into<String>) -> Self {
        self.credential(Credential::from_password(password))
    }

    /// Set the credential.
    #[must_use]
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Verify server keys against a known-hosts file.
    #[must_use]
    pub fn known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts = Some(path.into());
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = timeout;
        self
    }

    /// Set the per-command read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.read = timeout;
        self
    }

    /// Set the bootstrap read timeout.
    #[must_use]
    pub const fn bootstrap_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.bootstrap = timeout;
        self
    }

    /// Set the poll interval of the read loop.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.timeouts.poll_interval = interval;
        self
    }

    /// Set the module-load command run once per channel.
    #[must_use]
    pub fn bootstrap_command(mut self, command: impl Into<String>) -> Self {
        self.console.bootstrap_command = Some(command.into());
        self
    }

    /// Skip the module load.
    #[must_use]
    pub fn no_bootstrap(mut self) -> Self {
        self.console.bootstrap_command = None;
        self
    }

    /// Set the status probe.
    #[must_use]
    pub fn status_probe(mut self, probe: impl Into<String>) -> Self {
        self.console.status_probe = probe.into();
        self
    }

    /// Set the success token.
    #[must_use]
    pub fn success_token(mut self, token: impl Into<String>) -> Self {
        self.console.success_token = token.into();
        self
    }

    /// Set the line ending.
    #[must_use]
    pub const fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.console.line_ending = line_ending;
        self
    }

    /// Set the terminal type.
    #[must_use]
    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.console.term = term.into();
        self
    }

    /// Set the terminal dimensions.
    #[must_use]
    pub const fn dimensions(mut self, cols: u32, rows: u32) -> Self {
        self.console.dimensions = (cols, rows);
        self
    }

    /// Check whether a credential is present.
    #[must_use]
    pub const fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Take the credential out of the configuration.
    pub(crate) fn take_credential(&mut self) -> Option<Credential> {
        self.credential.take()
    }

    /// Check the configuration for values no session can work with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConsoleError::config("host must not be empty"));
        }
        if self.username.trim().is_empty() {
            return Err(ConsoleError::config("username must not be empty"));
        }
        if self.port == 0 {
            return Err(ConsoleError::config("port must not be 0"));
        }
        self.timeouts.validate()?;
        self.console.validate()
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Transport connect and authentication.
    pub connect: Duration,
    /// One read-until-prompt for banners, commands and status probes.
    pub read: Duration,
    /// The read-until-prompt after the module-load command.
    pub bootstrap: Duration,
    /// Sleep between polls that returned no data.
    pub poll_interval: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
            bootstrap: DEFAULT_BOOTSTRAP_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl TimeoutConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("connect timeout", self.connect),
            ("read timeout", self.read),
            ("bootstrap timeout", self.bootstrap),
            ("poll interval", self.poll_interval),
        ] {
            if value.is_zero() {
                return Err(ConsoleError::config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

/// How the console conversation is conducted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Command run once after each channel is opened.
    pub bootstrap_command: Option<String>,
    /// Command whose output reports the status of the previous command.
    pub status_probe: String,
    /// Literal the status probe output contains on success.
    pub success_token: String,
    /// Terminator appended to every command.
    pub line_ending: LineEnding,
    /// Terminal type requested for the PTY.
    pub term: String,
    /// Terminal dimensions (columns, rows).
    pub dimensions: (u32, u32),
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            bootstrap_command: Some(DEFAULT_BOOTSTRAP_COMMAND.to_string()),
            status_probe: DEFAULT_STATUS_PROBE.to_string(),
            success_token: DEFAULT_SUCCESS_TOKEN.to_string(),
            line_ending: LineEnding::default(),
            term: DEFAULT_TERM.to_string(),
            dimensions: (DEFAULT_TERMINAL_WIDTH, DEFAULT_TERMINAL_HEIGHT),
        }
    }
}

impl ConsoleConfig {
    fn validate(&self) -> Result<()> {
        if self.status_probe.trim().is_empty() {
            return Err(ConsoleError::config("status probe must not be empty"));
        }
        if self.success_token.is_empty() {
            return Err(ConsoleError::config("success token must not be empty"));
        }
        if self
            .bootstrap_command
            .as_deref()
            .is_some_and(|cmd| cmd.trim().is_empty())
        {
            return Err(ConsoleError::config(
                "bootstrap command must not be blank; disable it instead",
            ));
        }
        Ok(())
    }
}

/// Line ending styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style line ending (LF).
    Lf,

    /// Windows-style line ending (CRLF).
    #[default]
    CrLf,

    /// Classic Mac line ending (CR).
    Cr,
}

impl LineEnding {
    /// Get the line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }

    /// Get the line ending as bytes.
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    /// Terminate `command`, unless it already ends with a line break.
    #[must_use]
    pub fn terminate(self, command: &str) -> String {
        if command.ends_with(['\n', '\r']) {
            command.to_string()
        } else {
            format!("{command}{}", self.as_str())
        }
    }
}

/// Build a configuration from defaults, an optional settings file and the
/// environment, in that order of precedence.
pub fn load(settings: Option<&Path>, env: &EnvConfig) -> Result<SessionConfig> {
    let mut config = SessionConfig::default();
    if let Some(path) = settings {
        config = SettingsFile::load(path)?.apply(config);
    }
    let config = env.apply(config)?;
    config.validate()?;
    Ok(config)
}
