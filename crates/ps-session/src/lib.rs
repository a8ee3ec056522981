//! ps-session: drive an interactive remote PowerShell console over SSH.
//!
//! Directory-administration commands are typed into a remote console as an
//! operator would type them. The hard part is knowing when the console has
//! finished answering, whether the command worked, and what the error was.
//! This crate answers all three from the console stream alone: the idle prompt
//! marks the end of output, the `$?` status probe reports success, and the
//! error record printed on failure is reduced to the failing command and its
//! diagnostic.
//!
//! # Features
//!
//! - **One command at a time** over one long-lived channel, safe to share
//!   between tasks
//! - **Lazy connection** with a one-time module-load bootstrap per channel
//! - **Consume-once credential**, zeroed as soon as authentication succeeds
//! - **SSH backend** built on russh (feature: `ssh`)
//! - **Mock backend** with a scripted PowerShell console (feature: `mock`)
//!
//! # Example
//!
//! ```ignore
//! use ps_session::backend::ssh::SshConnector;
//! use ps_session::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SessionConfig::new("dc01.example.com", "svc-provisioning")
//!         .password(std::env::var("PS_SESSION_PASSWORD").unwrap_or_default())
//!         .known_hosts("/etc/ps-session/known_hosts");
//!
//!     let executor = CommandExecutor::new(SshConnector::new(), config)?;
//!     let output = executor.execute("Get-ADUser -Identity abij01").await?;
//!     println!("{}", output.output());
//!     executor.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod console;
pub mod credential;
pub mod diagnose;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod prompt;
pub mod sanitize;
pub mod session;
pub mod transport;
pub mod util;

/// Scripted console backend for testing.
#[cfg(feature = "mock")]
pub mod mock;

pub use config::{ConsoleConfig, EnvConfig, LineEnding, SessionConfig, SettingsFile, TimeoutConfig};
pub use console::Console;
pub use credential::Credential;
pub use diagnose::Diagnosis;
pub use error::{ConsoleError, FailureKind, ReadPhase, Result, TransportError};
pub use executor::{CommandExecutor, CommandOutput};
pub use prompt::PromptMatcher;
pub use sanitize::{sanitize, sanitize_bytes};
pub use session::{SessionConnection, SessionState};
pub use transport::{Connector, ReadStatus, ShellChannel, Transport};
pub use util::Deadline;
