//! Error types for ps-session.
//!
//! Every failure of a console operation lands in [`ConsoleError`]. Errors carry
//! the context an operator needs to act on them without re-running with verbose
//! tracing: the console output collected so far on timeouts, the offending
//! command token and the diagnostic text on remote failures.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Maximum length of buffer content to display in error messages.
const MAX_BUFFER_DISPLAY: usize = 500;

/// Context lines to show before/after truncation point.
const CONTEXT_LINES: usize = 3;

/// Format buffer content for display, truncating if necessary.
fn format_buffer_snippet(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(empty buffer)".to_string();
    }

    let buffer_len = buffer.len();

    if buffer_len <= MAX_BUFFER_DISPLAY {
        return format!(
            "┌─ console ({} bytes) ─────────────────────\n│ {}\n└────────────────────────────────────────",
            buffer_len,
            buffer.lines().collect::<Vec<_>>().join("\n│ ")
        );
    }

    let lines: Vec<&str> = buffer.lines().collect();
    let total_lines = lines.len();

    if total_lines <= CONTEXT_LINES * 2 {
        // Sanitized console text is usually a single long line; show its tail.
        let mut tail_start = buffer_len - MAX_BUFFER_DISPLAY;
        while !buffer.is_char_boundary(tail_start) {
            tail_start += 1;
        }
        return format!(
            "┌─ console ({} bytes, {} lines) ────────────\n│ ...{}\n└────────────────────────────────────────",
            buffer_len,
            total_lines,
            &buffer[tail_start..]
        );
    }

    let tail_lines = &lines[lines.len().saturating_sub(CONTEXT_LINES * 2)..];
    let hidden = total_lines - tail_lines.len();

    format!(
        "┌─ console ({} bytes, {} lines) ────────────\n│ ... ({} lines hidden)\n│ {}\n└────────────────────────────────────────",
        buffer_len,
        total_lines,
        hidden,
        tail_lines.join("\n│ ")
    )
}

/// Format a timeout error message.
fn format_timeout_error(phase: ReadPhase, duration: Duration, buffer: &str) -> String {
    let buffer_snippet = format_buffer_snippet(buffer);

    format!(
        "timeout after {duration:?} waiting for the idle prompt ({phase})\n\
         \n\
         {buffer_snippet}\n\
         \n\
         The remote console state is unknown: the command may still be running.\n\
         The interactive channel has been closed; the next command opens a fresh one."
    )
}

/// Format a remote command failure.
fn format_command_failed(command: &str, diagnostic: &str) -> String {
    if diagnostic.is_empty() {
        format!("failed to execute:\ncommand: {command}\nmessage: (no diagnostic found)")
    } else {
        format!("failed to execute:\ncommand: {command}\nmessage: {diagnostic}")
    }
}

/// Which read-until-prompt call was running when a read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPhase {
    /// Draining the login banner of a freshly opened channel.
    Banner,
    /// Waiting for the module-load command.
    Bootstrap,
    /// Waiting for an ordinary command.
    Command,
    /// Waiting for the status probe.
    StatusProbe,
}

impl fmt::Display for ReadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Banner => "banner",
            Self::Bootstrap => "bootstrap",
            Self::Command => "command",
            Self::StatusProbe => "status probe",
        };
        f.write_str(name)
    }
}

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport or channel could not be established or was lost.
    Connection,
    /// The one-time module load failed or timed out.
    Bootstrap,
    /// The idle prompt did not reappear before the deadline.
    Timeout,
    /// The remote shell reported that the command failed.
    RemoteCommand,
    /// Invalid configuration.
    Configuration,
}

/// The main error type for ps-session operations.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The credential was consumed by an earlier connection that is now gone.
    #[error(
        "session credential already consumed by a previous connection; \
         create a new session to reconnect"
    )]
    CredentialSpent,

    /// The interactive channel closed while waiting for output.
    #[error("interactive channel closed during {phase}\n\n{}", format_buffer_snippet(buffer))]
    ChannelClosed {
        /// The read that was interrupted.
        phase: ReadPhase,
        /// Output collected before the close.
        buffer: String,
    },

    /// Channel bootstrap (banner drain or module load) failed.
    #[error("console bootstrap failed: {source}")]
    Bootstrap {
        /// The failure that aborted the bootstrap.
        #[source]
        source: Box<ConsoleError>,
    },

    /// The idle prompt did not reappear in time.
    #[error("{}", format_timeout_error(*phase, *duration, buffer))]
    Timeout {
        /// The read that timed out.
        phase: ReadPhase,
        /// The timeout that elapsed.
        duration: Duration,
        /// Sanitized output collected before the deadline.
        buffer: String,
    },

    /// The status probe did not report success.
    #[error("{}", format_command_failed(command, diagnostic))]
    CommandFailed {
        /// Failing command token, lower-cased.
        command: String,
        /// Diagnostic text extracted from the console output.
        diagnostic: String,
        /// Sanitized console output of the command itself.
        output: String,
    },

    /// Invalid regex pattern.
    #[error("invalid prompt pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Errors raised by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("failed to connect to {host}:{port}: {reason}")]
    Connection {
        /// The host that could not be connected to.
        host: String,
        /// The port that was used.
        port: u16,
        /// The reason for the failure.
        reason: String,
    },

    /// Authentication failed.
    #[error("authentication failed for user '{user}': {reason}")]
    Authentication {
        /// The user that failed to authenticate.
        user: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Host key verification failed.
    #[error("host key verification failed for {host}: {reason}")]
    HostKeyVerification {
        /// The host whose key verification failed.
        host: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Channel error.
    #[error("channel error: {reason}")]
    Channel {
        /// The reason for the channel error.
        reason: String,
    },

    /// Session error.
    #[error("session error: {reason}")]
    Session {
        /// The reason for the session error.
        reason: String,
    },

    /// Timeout while connecting.
    #[error("connect timed out after {duration:?}")]
    Timeout {
        /// The duration that elapsed.
        duration: Duration,
    },
}

/// Result type alias for ps-session operations.
pub type Result<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
    /// Create a timeout error.
    pub fn timeout(phase: ReadPhase, duration: Duration, buffer: impl Into<String>) -> Self {
        Self::Timeout {
            phase,
            duration,
            buffer: buffer.into(),
        }
    }

    /// Create a channel-closed error.
    pub fn channel_closed(phase: ReadPhase, buffer: impl Into<String>) -> Self {
        Self::ChannelClosed {
            phase,
            buffer: buffer.into(),
        }
    }

    /// Create a remote command failure.
    pub fn command_failed(
        command: impl Into<String>,
        diagnostic: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            diagnostic: diagnostic.into(),
            output: output.into(),
        }
    }

    /// Wrap an error as a bootstrap failure.
    #[must_use]
    pub fn bootstrap(source: Self) -> Self {
        Self::Bootstrap {
            source: Box::new(source),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::IoWithContext { .. }
            | Self::Transport(_)
            | Self::CredentialSpent
            | Self::ChannelClosed { .. } => FailureKind::Connection,
            Self::Bootstrap { .. } => FailureKind::Bootstrap,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::CommandFailed { .. } => FailureKind::RemoteCommand,
            Self::Regex(_) | Self::Config { .. } => FailureKind::Configuration,
        }
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if the interactive channel can no longer be trusted after this error.
    ///
    /// Only a failure reported by the status probe leaves the console idle at
    /// a known prompt. After anything else the remote console may still be
    /// busy, so the channel must be replaced before reuse.
    #[must_use]
    pub const fn desynchronizes_channel(&self) -> bool {
        !matches!(
            self,
            Self::CommandFailed { .. } | Self::Config { .. } | Self::Regex(_)
        )
    }

    /// Get the collected console output if this error carries it.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Timeout { buffer, .. } | Self::ChannelClosed { buffer, .. } => Some(buffer),
            Self::CommandFailed { output, .. } => Some(output),
            Self::Bootstrap { source } => source.buffer(),
            _ => None,
        }
    }
}

impl TransportError {
    /// Create a connection error.
    pub fn connection(host: impl Into<String>, port: u16, reason: impl Into<String>) -> Self {
        Self::Connection {
            host: host.into(),
            port,
            reason: reason.into(),
        }
    }

    /// Create an authentication error.
    pub fn authentication(user: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Authentication {
            user: user.into(),
            reason: reason.into(),
        }
    }

    /// Create a host key verification error.
    pub fn host_key_verification(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::HostKeyVerification {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Create a channel error.
    pub fn channel(reason: impl Into<String>) -> Self {
        Self::Channel {
            reason: reason.into(),
        }
    }

    /// Create a session error.
    pub fn session(reason: impl Into<String>) -> Self {
        Self::Session {
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub const fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_mentions_phase_and_output() {
        let err = ConsoleError::timeout(
            ReadPhase::Command,
            Duration::from_secs(3),
            "Get-ADUser -Identity abij01",
        );
        let msg = err.to_string();
        assert!(msg.contains("timeout"));
        assert!(msg.contains("command"));
        assert!(msg.contains("Get-ADUser"));
        assert!(msg.contains("state is unknown"));
    }

    #[test]
    fn command_failed_display() {
        let err = ConsoleError::command_failed("new-aduser", "object already exists", "...");
        let msg = err.to_string();
        assert!(msg.contains("command: new-aduser"));
        assert!(msg.contains("message: object already exists"));
    }

    #[test]
    fn command_failed_without_diagnostic() {
        let err = ConsoleError::command_failed("remove-aduser", "", "");
        assert!(err.to_string().contains("no diagnostic"));
    }

    #[test]
    fn kinds() {
        assert_eq!(
            ConsoleError::timeout(ReadPhase::Command, Duration::ZERO, "").kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            ConsoleError::command_failed("x", "y", "z").kind(),
            FailureKind::RemoteCommand
        );
        assert_eq!(
            ConsoleError::Transport(TransportError::channel("gone")).kind(),
            FailureKind::Connection
        );
        assert_eq!(ConsoleError::CredentialSpent.kind(), FailureKind::Connection);
        assert_eq!(
            ConsoleError::bootstrap(ConsoleError::CredentialSpent).kind(),
            FailureKind::Bootstrap
        );
        assert_eq!(ConsoleError::config("bad").kind(), FailureKind::Configuration);
    }

    #[test]
    fn buffer_passes_through_bootstrap() {
        let inner = ConsoleError::timeout(ReadPhase::Bootstrap, Duration::ZERO, "Import-Module");
        let err = ConsoleError::bootstrap(inner);
        assert_eq!(err.buffer(), Some("Import-Module"));
        assert!(ConsoleError::CredentialSpent.buffer().is_none());
    }

    #[test]
    fn desynchronizing_errors() {
        assert!(ConsoleError::timeout(ReadPhase::Command, Duration::ZERO, "").desynchronizes_channel());
        assert!(ConsoleError::channel_closed(ReadPhase::Command, "").desynchronizes_channel());
        assert!(
            ConsoleError::Transport(TransportError::channel("send failed")).desynchronizes_channel()
        );
        assert!(!ConsoleError::command_failed("a", "b", "c").desynchronizes_channel());
    }

    #[test]
    fn format_buffer_snippet_empty() {
        assert_eq!(format_buffer_snippet(""), "(empty buffer)");
    }

    #[test]
    fn format_buffer_snippet_long_single_line_shows_tail() {
        let long = format!("{}TAIL", "x".repeat(2000));
        let snippet = format_buffer_snippet(&long);
        assert!(snippet.contains(&format!("...{}TAIL\n", "x".repeat(MAX_BUFFER_DISPLAY - 4))));
        assert_eq!(snippet.matches('x').count(), MAX_BUFFER_DISPLAY - 4);
        assert!(snippet.chars().count() < 700);
    }

    #[test]
    fn format_buffer_snippet_tail_starts_on_char_boundary() {
        let long = format!("{}end", "é".repeat(600));
        let snippet = format_buffer_snippet(&long);
        assert!(snippet.contains("é".repeat(10).as_str()));
        assert!(snippet.contains("end\n"));
        assert!(snippet.chars().filter(|c| *c == 'é').count() <= MAX_BUFFER_DISPLAY / 2);
    }

    #[test]
    fn transport_error_display() {
        let err = TransportError::connection("dc01", 22, "refused");
        assert_eq!(err.to_string(), "failed to connect to dc01:22: refused");
    }
}
