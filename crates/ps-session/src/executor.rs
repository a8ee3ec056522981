//! Serialized command execution.
//!
//! [`CommandExecutor`] is the public entry point. It owns one
//! [`SessionConnection`] behind a FIFO-fair async mutex, so concurrent callers
//! run their commands one after another, each as a complete command/probe
//! pair on the wire.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Mutex;
use tracing::Instrument;

use crate::config::SessionConfig;
use crate::error::{ConsoleError, ReadPhase, Result};
use crate::session::{SessionConnection, SessionState};
use crate::transport::Connector;

/// Output of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    command: String,
    transcript: String,
    output: String,
}

impl CommandOutput {
    /// The command as it was sent, without terminator.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Sanitized console text: the echoed command, its output and the
    /// trailing prompt.
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Sanitized output of the command alone, best effort: the echo and the
    /// trailing prompt are removed when recognized.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }
}

struct Inner<K: Connector> {
    session: SessionConnection<K>,
    /// Set while a command runs; still set at the next lock means the
    /// previous caller was cancelled mid-command.
    in_flight: bool,
}

/// Runs commands on a remote console, one at a time.
pub struct CommandExecutor<K: Connector> {
    inner: Mutex<Inner<K>>,
    state: AtomicU8,
}

impl<K: Connector> CommandExecutor<K> {
    /// Create an executor with a new session. Nothing connects until the
    /// first command.
    pub fn new(connector: K, config: SessionConfig) -> Result<Self> {
        Ok(Self::from_session(SessionConnection::new(connector, config)?))
    }

    /// Create an executor around an existing session.
    #[must_use]
    pub fn from_session(session: SessionConnection<K>) -> Self {
        let state = AtomicU8::new(session.state() as u8);
        Self {
            inner: Mutex::new(Inner {
                session,
                in_flight: false,
            }),
            state,
        }
    }

    /// Lifecycle state as of the last completed operation. Never waits for a
    /// running command.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(SessionState::Closed)
    }

    /// Connect and bootstrap the console if needed.
    ///
    /// Returns immediately when the session is already ready; otherwise waits
    /// its turn behind running commands.
    pub async fn ensure_connected(&self) -> Result<()> {
        if self.state() == SessionState::ShellReady {
            return Ok(());
        }
        let mut inner = self.inner.lock().await;
        let result = inner.session.ensure_connected().await;
        self.publish(&inner.session);
        result
    }

    /// Run `command` and verify that it succeeded.
    ///
    /// On a timeout or a lost channel the channel is closed before the error
    /// is returned; the next command opens a fresh one. Nothing is retried.
    pub async fn execute(&self, command: &str) -> Result<CommandOutput> {
        let span = tracing::debug_span!("execute", command = %command_token(command));
        async {
            let mut inner = self.inner.lock().await;
            let result = Self::execute_locked(&mut inner, command).await;
            self.publish(&inner.session);
            result
        }
        .instrument(span)
        .await
    }

    /// Run `commands` in order without letting other callers interleave.
    ///
    /// Stops at the first failure.
    pub async fn execute_all<I, S>(&self, commands: I) -> Result<Vec<CommandOutput>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let commands: Vec<String> = commands
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .collect();

        let mut inner = self.inner.lock().await;
        let mut outputs = Vec::with_capacity(commands.len());
        let mut result = Ok(());

        for command in &commands {
            let span = tracing::debug_span!("execute", command = %command_token(command));
            match Self::execute_locked(&mut inner, command).instrument(span).await {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        self.publish(&inner.session);
        result.map(|()| outputs)
    }

    /// Disconnect the session. Idempotent; teardown errors are only logged.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        inner.session.disconnect().await;
        self.publish(&inner.session);
    }

    async fn execute_locked(inner: &mut Inner<K>, command: &str) -> Result<CommandOutput> {
        if inner.in_flight {
            tracing::warn!("Previous command was cancelled mid-flight; replacing shell channel");
            inner.session.close_channel().await;
        }
        inner.in_flight = true;

        let result = Self::run(&mut inner.session, command).await;

        if let Err(e) = &result {
            if e.desynchronizes_channel() && inner.session.state() == SessionState::ShellReady {
                inner.session.close_channel().await;
            }
        }
        inner.in_flight = false;

        match &result {
            Ok(output) => tracing::debug!(bytes = output.transcript.len(), "Command succeeded"),
            Err(e) => tracing::debug!(kind = ?e.kind(), "Command failed"),
        }
        result
    }

    async fn run(session: &mut SessionConnection<K>, command: &str) -> Result<CommandOutput> {
        session.ensure_connected().await?;

        let timeout = session.config().timeouts.read;
        let console = session
            .console_mut()
            .ok_or_else(|| ConsoleError::channel_closed(ReadPhase::Command, ""))?;

        tracing::trace!(
            command = command_token(command),
            bytes = command.len(),
            "Sending command"
        );
        let transcript = console.run(command, timeout, ReadPhase::Command).await?;
        let output = console.reply_body(command, &transcript).to_string();

        Ok(CommandOutput {
            command: command.trim_end_matches(['\r', '\n']).to_string(),
            transcript,
            output,
        })
    }

    fn publish(&self, session: &SessionConnection<K>) {
        self.state.store(session.state() as u8, Ordering::Release);
    }
}

/// First word of a command, for logs that must not carry arguments.
fn command_token(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_first_word() {
        assert_eq!(
            command_token("New-ADUser -AccountPassword (ConvertTo-SecureString secret)"),
            "New-ADUser"
        );
        assert_eq!(command_token("  $?\r\n"), "$?");
        assert_eq!(command_token(""), "");
    }
}
