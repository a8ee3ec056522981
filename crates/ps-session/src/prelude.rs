//! Convenient re-exports for common ps-session usage.
//!
//! ```ignore
//! use ps_session::prelude::*;
//! ```

// Configuration
pub use crate::config::{LineEnding, SessionConfig};
pub use crate::credential::Credential;

// Error handling
pub use crate::error::{ConsoleError, FailureKind, Result};

// Execution
pub use crate::executor::{CommandExecutor, CommandOutput};
pub use crate::session::SessionState;

// Transport seam
pub use crate::transport::{Connector, ShellChannel, Transport};
