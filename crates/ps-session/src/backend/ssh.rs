//! SSH transport built on russh.
//!
//! Password authentication, an interactive shell with a PTY, and optional
//! server key verification against a known-hosts file.

mod channel;
mod known_hosts;
mod session;

pub use channel::SshShell;
pub use known_hosts::{HostKeyStatus, check_host_key};
pub use session::{SshConnector, SshTransport};
