//! Environment-based configuration.
//!
//! Variables are named `<PREFIX>_<NAME>`, e.g. `PS_SESSION_HOST`. Values are
//! read through a lookup function so tests can supply them without touching
//! the process environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::SessionConfig;
use crate::credential::Credential;
use crate::error::{ConsoleError, Result};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "PS_SESSION";

/// Recognized variable names, without the prefix.
pub mod vars {
    /// Remote host.
    pub const HOST: &str = "HOST";
    /// Remote port.
    pub const PORT: &str = "PORT";
    /// Login user.
    pub const USERNAME: &str = "USERNAME";
    /// Login password.
    pub const PASSWORD: &str = "PASSWORD";
    /// Known-hosts file.
    pub const KNOWN_HOSTS: &str = "KNOWN_HOSTS";
    /// Connect timeout in milliseconds.
    pub const CONNECT_TIMEOUT_MS: &str = "CONNECT_TIMEOUT_MS";
    /// Read timeout in milliseconds.
    pub const READ_TIMEOUT_MS: &str = "READ_TIMEOUT_MS";
    /// Bootstrap timeout in milliseconds.
    pub const BOOTSTRAP_TIMEOUT_MS: &str = "BOOTSTRAP_TIMEOUT_MS";
    /// Poll interval in milliseconds.
    pub const POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";
    /// Module-load command; empty disables it.
    pub const BOOTSTRAP_COMMAND: &str = "BOOTSTRAP_COMMAND";
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable reader.
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Source of values.
    lookup: Lookup,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvConfig")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl EnvConfig {
    /// Read from the process environment.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_lookup(prefix, |name| std::env::var(name).ok())
    }

    /// Read through `lookup`, which receives full variable names.
    #[must_use]
    pub fn with_lookup<F>(prefix: impl Into<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            prefix: prefix.into(),
            lookup: Box::new(lookup),
        }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(&self.var_name(name))
    }

    /// Get a parsed value. A set but unparsable value is an error.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.get(name)
            .map(|raw| {
                raw.trim().parse().map_err(|_| {
                    ConsoleError::config(format!(
                        "{} has an invalid value: {raw:?}",
                        self.var_name(name)
                    ))
                })
            })
            .transpose()
    }

    /// Get a duration in milliseconds.
    pub fn duration_millis(&self, name: &str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_millis))
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The password variable as a credential.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.get(vars::PASSWORD).map(Credential::from_password)
    }

    /// Overlay the environment on `config`.
    pub fn apply(&self, mut config: SessionConfig) -> Result<SessionConfig> {
        if let Some(host) = self.get(vars::HOST) {
            config.host = host;
        }
        if let Some(port) = self.parse(vars::PORT)? {
            config.port = port;
        }
        if let Some(username) = self.get(vars::USERNAME) {
            config.username = username;
        }
        if let Some(path) = self.get(vars::KNOWN_HOSTS) {
            config.known_hosts = Some(path.into());
        }
        if let Some(timeout) = self.duration_millis(vars::CONNECT_TIMEOUT_MS)? {
            config.timeouts.connect = timeout;
        }
        if let Some(timeout) = self.duration_millis(vars::READ_TIMEOUT_MS)? {
            config.timeouts.read = timeout;
        }
        if let Some(timeout) = self.duration_millis(vars::BOOTSTRAP_TIMEOUT_MS)? {
            config.timeouts.bootstrap = timeout;
        }
        if let Some(interval) = self.duration_millis(vars::POLL_INTERVAL_MS)? {
            config.timeouts.poll_interval = interval;
        }
        if let Some(command) = self.get(vars::BOOTSTRAP_COMMAND) {
            config.console.bootstrap_command = Some(command).filter(|c| !c.trim().is_empty());
        }
        if let Some(credential) = self.credential() {
            config = config.credential(credential);
        }
        Ok(config)
    }
}
