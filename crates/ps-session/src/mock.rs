//! Scripted in-memory PowerShell console for testing.
//!
//! [`MockConnector`] plugs into [`CommandExecutor`](crate::CommandExecutor)
//! like the SSH backend does, but answers from a [`MockScript`]: it prints a
//! banner and a `PS C:\Users\<user>> ` prompt, echoes every line, answers the
//! `$?` probe from the status of the previous command, and counts what
//! happened so tests can assert on connects, channels and module loads.
//!
//! ```
//! use ps_session::mock::{MockConnector, MockScript};
//! use ps_session::{CommandExecutor, SessionConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ps_session::Result<()> {
//! let connector = MockConnector::new(
//!     MockScript::new().reply("Get-Date", "Monday, 19 October 2026 10:00:00"),
//! );
//! let config = SessionConfig::new("dc01", "abij").password("pw");
//! let executor = CommandExecutor::new(connector.clone(), config)?;
//!
//! let output = executor.execute("Get-Date").await?;
//! assert!(output.output().contains("2026"));
//! assert_eq!(connector.stats().connects, 1);
//! # Ok(())
//! # }
//! ```

mod emulator;
mod script;
mod transport;

pub use script::{MockScript, Reaction};
pub use transport::{MockConnector, MockShell, MockStats, MockTransport};
