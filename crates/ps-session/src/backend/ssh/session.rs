//! SSH connection management.

use std::path::PathBuf;
use std::sync::Arc;

use russh::client;
use russh::keys::PublicKey;

use super::channel::SshShell;
use super::known_hosts::{HostKeyStatus, check_host_key};
use crate::config::{ConsoleConfig, SessionConfig};
use crate::credential::Credential;
use crate::error::{ConsoleError, Result, TransportError};
use crate::transport::{Connector, Transport};

/// Creates [`SshTransport`]s.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    config: Arc<client::Config>,
}

impl SshConnector {
    /// Create a connector with russh's default client configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector with a custom russh client configuration.
    #[must_use]
    pub fn with_client_config(config: client::Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Connector for SshConnector {
    type Transport = SshTransport;

    fn create(&self, config: &SessionConfig) -> Result<SshTransport> {
        if config.known_hosts.is_none() {
            tracing::warn!(
                host = %config.host,
                "No known_hosts file configured; server identity will not be verified"
            );
        }
        Ok(SshTransport {
            client_config: Arc::clone(&self.config),
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            known_hosts: config.known_hosts.clone(),
            console: Arc::new(config.console.clone()),
            handle: None,
        })
    }

    fn name(&self) -> &'static str {
        "ssh"
    }
}

/// Client handler for russh that verifies the server key.
pub(super) struct ClientHandler {
    host: String,
    port: u16,
    known_hosts: Option<PathBuf>,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> std::result::Result<bool, Self::Error> {
        let Some(path) = &self.known_hosts else {
            tracing::warn!(host = %self.host, "Accepting server key without verification");
            return Ok(true);
        };

        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(
                    host = %self.host,
                    path = %path.display(),
                    error = %e,
                    "Failed to read known_hosts file, rejecting key"
                );
                return Ok(false);
            }
        };

        match check_host_key(&contents, &self.host, self.port, server_public_key) {
            HostKeyStatus::Verified => {
                tracing::debug!(host = %self.host, "Host key verified against known_hosts");
                Ok(true)
            }
            HostKeyStatus::Mismatch => {
                tracing::error!(
                    host = %self.host,
                    "HOST KEY MISMATCH! Possible man-in-the-middle attack!"
                );
                Ok(false)
            }
            HostKeyStatus::Unknown => {
                tracing::warn!(host = %self.host, path = %path.display(), "Host not found in known_hosts file");
                Ok(false)
            }
        }
    }
}

/// An SSH connection to the console host.
pub struct SshTransport {
    client_config: Arc<client::Config>,
    host: String,
    port: u16,
    username: String,
    known_hosts: Option<PathBuf>,
    console: Arc<ConsoleConfig>,
    handle: Option<client::Handle<ClientHandler>>,
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("known_hosts", &self.known_hosts)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl SshTransport {
    fn handle_mut(&mut self) -> Result<&mut client::Handle<ClientHandler>> {
        self.handle
            .as_mut()
            .ok_or_else(|| TransportError::session("not connected").into())
    }
}

impl Transport for SshTransport {
    type Channel = SshShell;

    async fn connect(&mut self, credential: &Credential) -> Result<()> {
        let handler = ClientHandler {
            host: self.host.clone(),
            port: self.port,
            known_hosts: self.known_hosts.clone(),
        };

        tracing::info!(host = %self.host, port = %self.port, "Connecting to SSH server");

        let addr = (self.host.as_str(), self.port);
        let mut handle = client::connect(Arc::clone(&self.client_config), addr, handler)
            .await
            .map_err(|e| match e {
                russh::Error::UnknownKey => {
                    TransportError::host_key_verification(&self.host, "server key not accepted")
                }
                other => TransportError::connection(&self.host, self.port, other.to_string()),
            })?;

        tracing::debug!(user = %self.username, "Attempting password authentication");
        let password = credential.expose_password()?;
        let auth = handle
            .authenticate_password(self.username.as_str(), password.as_str())
            .await
            .map_err(|e| TransportError::authentication(&self.username, e.to_string()))?;
        drop(password);

        if !auth.success() {
            return Err(ConsoleError::Transport(TransportError::authentication(
                &self.username,
                "password rejected",
            )));
        }

        tracing::info!(host = %self.host, user = %self.username, "SSH connection established");
        self.handle = Some(handle);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_closed())
    }

    async fn open_shell(&mut self) -> Result<SshShell> {
        let console = Arc::clone(&self.console);
        let handle = self.handle_mut()?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::channel(format!("open session failed: {e}")))?;

        let (cols, rows) = console.dimensions;
        channel
            .request_pty(false, &console.term, cols, rows, 0, 0, &[])
            .await
            .map_err(|e| TransportError::channel(format!("PTY request failed: {e}")))?;
        channel
            .request_shell(false)
            .await
            .map_err(|e| TransportError::channel(format!("shell request failed: {e}")))?;

        tracing::debug!(term = %console.term, cols, rows, "Interactive shell opened");
        Ok(SshShell::new(channel))
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| TransportError::session(format!("disconnect failed: {e}")))?;
        tracing::debug!(host = %self.host, "SSH session disconnected");
        Ok(())
    }
}
