//! ps-directory: Active Directory user administration over a remote
//! PowerShell console.
//!
//! Commands are built from [`template::CommandTemplate`]s, whose placeholders
//! are filled with escaped values, and run through a
//! [`ps_session::CommandExecutor`]. A remote failure surfaces as
//! [`DirectoryError::Console`] with the failing command and the diagnostic
//! the console printed.
//!
//! # Example
//!
//! ```
//! use ps_directory::{DirectoryService, NewUser};
//! use ps_session::mock::{MockConnector, MockScript};
//! use ps_session::{CommandExecutor, SessionConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ps_directory::Result<()> {
//! let connector = MockConnector::new(MockScript::new());
//! let config = SessionConfig::new("dc01.example.com", "svc-provisioning").password("secret");
//! let executor = CommandExecutor::new(connector, config)?;
//!
//! let directory = DirectoryService::new(executor, "OU=Users,DC=example,DC=com");
//! directory
//!     .create_user(&NewUser::new("abij01", "A. Bij", "abij@example.com", "Welcome01!"))
//!     .await?;
//! directory.remove_user("abij01").await?;
//! directory.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod service;
pub mod template;

pub use error::{DirectoryError, Result};
pub use service::{DirectoryService, NewUser};
pub use template::{CommandTemplate, quote_value};
