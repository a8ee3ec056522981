//! The seam between the session protocol and the wire.
//!
//! A [`Connector`] creates a [`Transport`] from the configuration; the
//! transport authenticates and opens interactive [`ShellChannel`]s. The SSH
//! backend and the scripted mock console both plug in here.

use std::future::Future;

use crate::config::SessionConfig;
use crate::credential::Credential;
use crate::error::Result;

/// Outcome of a non-blocking read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// Bytes were available.
    Data(Vec<u8>),
    /// Nothing available right now.
    Empty,
    /// The channel is closed; no more data will arrive.
    Closed,
}

/// An interactive shell channel with a PTY attached.
pub trait ShellChannel: Send {
    /// Take whatever output is available without waiting.
    fn read_available(&mut self) -> Result<ReadStatus>;

    /// Write bytes to the remote console.
    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Flush buffered writes.
    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Check whether the channel has been closed by either side.
    fn is_closed(&self) -> bool;

    /// Close the channel.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// An authenticated connection that can open shell channels.
pub trait Transport: Send {
    /// The channel type opened by this transport.
    type Channel: ShellChannel;

    /// Connect and authenticate.
    ///
    /// The caller bounds this with the connect timeout and drops the
    /// credential after it succeeds.
    fn connect(&mut self, credential: &Credential) -> impl Future<Output = Result<()>> + Send;

    /// Check whether the transport is connected.
    fn is_connected(&self) -> bool;

    /// Open an interactive shell channel.
    fn open_shell(&mut self) -> impl Future<Output = Result<Self::Channel>> + Send;

    /// Disconnect the transport.
    fn disconnect(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Creates transports.
pub trait Connector: Send + Sync {
    /// The transport type produced by this connector.
    type Transport: Transport;

    /// Create an unconnected transport for `config`.
    fn create(&self, config: &SessionConfig) -> Result<Self::Transport>;

    /// Get the connector name.
    fn name(&self) -> &'static str;
}
