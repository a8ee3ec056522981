//! Directory administration over a console session.

use std::fmt;
use std::sync::Arc;

use ps_session::sanitize::sanitize;
use ps_session::{CommandExecutor, ConsoleError, Connector, Credential};

use crate::error::Result;
use crate::template::{self, CREATE_USER, DELETE_USER};

/// Replacement for secrets found in console output.
const REDACTED: &str = "********";

/// A user account to create.
pub struct NewUser {
    /// Logon name (`sAMAccountName`); also used as the object name.
    pub sam_account_name: String,
    /// Name shown in address lists.
    pub display_name: String,
    /// Primary e-mail address.
    pub email: String,
    /// Initial password.
    pub password: Credential,
}

impl NewUser {
    /// Describe a user.
    pub fn new(
        sam_account_name: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<Credential>,
    ) -> Self {
        Self {
            sam_account_name: sam_account_name.into(),
            display_name: display_name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("sam_account_name", &self.sam_account_name)
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Creates and removes directory users through one console session.
///
/// Commands share the executor's session, so they run one at a time no matter
/// how many tasks hold the service.
pub struct DirectoryService<K: Connector> {
    executor: Arc<CommandExecutor<K>>,
    user_path: String,
}

impl<K: Connector> DirectoryService<K> {
    /// Create a service placing new users in the container `user_path`
    /// (a distinguished name such as `OU=Users,DC=example,DC=com`).
    pub fn new(executor: impl Into<Arc<CommandExecutor<K>>>, user_path: impl Into<String>) -> Self {
        Self {
            executor: executor.into(),
            user_path: user_path.into(),
        }
    }

    /// The container new users are created in.
    #[must_use]
    pub fn user_path(&self) -> &str {
        &self.user_path
    }

    /// The underlying executor.
    #[must_use]
    pub const fn executor(&self) -> &Arc<CommandExecutor<K>> {
        &self.executor
    }

    /// Create an enabled user whose password never expires.
    ///
    /// Console output carried by a failure has the password masked.
    pub async fn create_user(&self, user: &NewUser) -> Result<()> {
        let password = user.password.expose_password()?;
        let command = CREATE_USER.render([
            ("samAccountName", user.sam_account_name.as_str()),
            ("name", user.sam_account_name.as_str()),
            ("displayName", user.display_name.as_str()),
            ("email", user.email.as_str()),
            ("password", password.as_str()),
            ("adUserPath", self.user_path.as_str()),
        ])?;

        tracing::info!(
            user = %user.sam_account_name,
            path = %self.user_path,
            "Creating directory user"
        );

        match self.executor.execute(&command).await {
            Ok(_) => {
                tracing::info!(user = %user.sam_account_name, "Directory user created");
                Ok(())
            }
            Err(e) => {
                let e = redact(e, &password);
                tracing::warn!(user = %user.sam_account_name, error = %e, "Failed to create directory user");
                Err(e.into())
            }
        }
    }

    /// Remove a user without confirmation.
    pub async fn remove_user(&self, sam_account_name: &str) -> Result<()> {
        let command = DELETE_USER.render([("samAccountName", sam_account_name)])?;

        tracing::info!(user = %sam_account_name, "Removing directory user");
        match self.executor.execute(&command).await {
            Ok(_) => {
                tracing::info!(user = %sam_account_name, "Directory user removed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(user = %sam_account_name, error = %e, "Failed to remove directory user");
                Err(e.into())
            }
        }
    }

    /// Disconnect the session.
    pub async fn disconnect(&self) {
        self.executor.disconnect().await;
    }
}

impl<K: Connector> fmt::Debug for DirectoryService<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryService")
            .field("user_path", &self.user_path)
            .field("state", &self.executor.state())
            .finish()
    }
}

/// Mask `secret` in the console text an error carries.
///
/// The console echoes the command as typed, so the secret appears in its
/// quoted form; diagnostics are lower-cased.
fn redact(error: ConsoleError, secret: &str) -> ConsoleError {
    let typed = sanitize(&template::quote_value(secret));
    if typed.is_empty() {
        return error;
    }
    let lowered = typed.to_lowercase();
    let mask = |text: String| text.replace(&typed, REDACTED).replace(&lowered, REDACTED);

    match error {
        ConsoleError::CommandFailed {
            command,
            diagnostic,
            output,
        } => ConsoleError::CommandFailed {
            command,
            diagnostic: mask(diagnostic),
            output: mask(output),
        },
        ConsoleError::Timeout {
            phase,
            duration,
            buffer,
        } => ConsoleError::Timeout {
            phase,
            duration,
            buffer: mask(buffer),
        },
        ConsoleError::ChannelClosed { phase, buffer } => ConsoleError::ChannelClosed {
            phase,
            buffer: mask(buffer),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ps_session::ReadPhase;

    use super::*;

    #[test]
    fn redacts_echoed_password() {
        let err = ConsoleError::command_failed(
            "new-aduser",
            "the password does not meet the length requirements",
            r#"New-ADUser -AccountPassword (ConvertTo-SecureString -AsPlainText "pa`$s w0rd" -Force)"#,
        );
        let ConsoleError::CommandFailed { output, .. } = redact(err, "pa$s  w0rd") else {
            panic!("variant changed");
        };
        assert!(output.contains(r#"-AsPlainText "********" -Force"#), "{output}");
    }

    #[test]
    fn redacts_lowercased_diagnostic() {
        let err = ConsoleError::command_failed("new-aduser", "value 'hunter2x' is invalid", "");
        let ConsoleError::CommandFailed { diagnostic, .. } = redact(err, "Hunter2X") else {
            panic!("variant changed");
        };
        assert_eq!(diagnostic, "value '********' is invalid");
    }

    #[test]
    fn redacts_timeout_buffer() {
        let err = ConsoleError::timeout(ReadPhase::Command, Duration::from_secs(3), "New-ADUser \"s3cret\"");
        let redacted = redact(err, "s3cret");
        assert_eq!(redacted.buffer(), Some("New-ADUser \"********\""));
        assert!(redacted.is_timeout());
    }

    #[test]
    fn other_errors_pass_through() {
        let err = redact(ConsoleError::CredentialSpent, "secret");
        assert!(matches!(err, ConsoleError::CredentialSpent));
    }

    #[test]
    fn debug_hides_password() {
        let user = NewUser::new("abij01", "Abij", "abij@example.com", "hunter2");
        let debug = format!("{user:?}");
        assert!(debug.contains("abij01"));
        assert!(!debug.contains("hunter2"));
    }
}
