//! Connection lifecycle of one remote console session.
//!
//! [`SessionConnection`] owns the transport and the interactive channel and
//! moves through [`SessionState`]:
//!
//! ```text
//! Uninitialized -> Initialized -> TransportConnected <-> ShellReady
//!                                        |
//!                                        v
//!                                      Closed
//! ```
//!
//! The credential lives in the first two states only. It is dropped (and its
//! bytes zeroed) the moment authentication succeeds, so a session whose
//! transport is later lost cannot reconnect and ends in `Closed`.

use std::mem;
use std::sync::Arc;

use crate::config::{ConsoleConfig, SessionConfig};
use crate::console::Console;
use crate::credential::Credential;
use crate::error::{ConsoleError, ReadPhase, Result, TransportError};
use crate::prompt::PromptMatcher;
use crate::transport::{Connector, Transport};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// No transport object yet.
    Uninitialized = 0,
    /// Transport object created, not connected.
    Initialized = 1,
    /// Authenticated, no interactive channel.
    TransportConnected = 2,
    /// Channel open and bootstrapped.
    ShellReady = 3,
    /// Credential spent and transport gone; the session cannot reconnect.
    Closed = 4,
}

impl SessionState {
    /// Convert from the `repr(u8)` value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Uninitialized),
            1 => Some(Self::Initialized),
            2 => Some(Self::TransportConnected),
            3 => Some(Self::ShellReady),
            4 => Some(Self::Closed),
            _ => None,
        }
    }

    /// Check if the transport is authenticated.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::TransportConnected | Self::ShellReady)
    }
}

enum Link<T: Transport> {
    Uninitialized {
        credential: Credential,
    },
    Initialized {
        transport: T,
        credential: Credential,
    },
    TransportConnected {
        transport: T,
    },
    ShellReady {
        transport: T,
        console: Console<T::Channel>,
    },
    Closed,
}

impl<T: Transport> Link<T> {
    const fn state(&self) -> SessionState {
        match self {
            Self::Uninitialized { .. } => SessionState::Uninitialized,
            Self::Initialized { .. } => SessionState::Initialized,
            Self::TransportConnected { .. } => SessionState::TransportConnected,
            Self::ShellReady { .. } => SessionState::ShellReady,
            Self::Closed => SessionState::Closed,
        }
    }
}

/// Owner of the transport connection and the interactive channel.
pub struct SessionConnection<K: Connector> {
    connector: K,
    config: SessionConfig,
    console_settings: Arc<ConsoleConfig>,
    prompt: Arc<PromptMatcher>,
    link: Link<K::Transport>,
}

impl<K: Connector> SessionConnection<K> {
    /// Create a session. Nothing is connected until
    /// [`ensure_connected`](Self::ensure_connected).
    ///
    /// Takes the credential out of `config`; a configuration without one is
    /// rejected.
    pub fn new(connector: K, mut config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let credential = config
            .take_credential()
            .ok_or_else(|| ConsoleError::config("no credential configured"))?;
        let prompt = Arc::new(PromptMatcher::new(&config.username)?);
        let console_settings = Arc::new(config.console.clone());

        tracing::debug!(
            host = %config.host,
            port = config.port,
            user = %config.username,
            transport = connector.name(),
            prompt = %prompt.as_str(),
            "Session created"
        );

        Ok(Self {
            connector,
            config,
            console_settings,
            prompt,
            link: Link::Uninitialized { credential },
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.link.state()
    }

    /// The session configuration (without credential).
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The prompt matcher derived from the username.
    #[must_use]
    pub fn prompt(&self) -> &PromptMatcher {
        &self.prompt
    }

    /// Make sure the transport is authenticated and a bootstrapped channel is
    /// open.
    ///
    /// Connects at most once per session. A lost channel is reopened on the
    /// existing transport without authenticating again.
    pub async fn ensure_connected(&mut self) -> Result<()> {
        self.ensure_transport().await?;
        self.ensure_shell().await
    }

    /// The console of the open channel, if any.
    pub fn console_mut(&mut self) -> Option<&mut Console<<K::Transport as Transport>::Channel>> {
        match &mut self.link {
            Link::ShellReady { console, .. } => Some(console),
            _ => None,
        }
    }

    /// Close the interactive channel and keep the transport.
    ///
    /// Used when the console can no longer be trusted to be idle; the next
    /// [`ensure_connected`](Self::ensure_connected) opens a fresh channel.
    pub async fn close_channel(&mut self) {
        if let Link::ShellReady { console, .. } = &mut self.link {
            if !console.is_closed() {
                if let Err(e) = console.close().await {
                    tracing::warn!(error = %e, "Failed to close shell channel");
                }
            }
            tracing::debug!("Shell channel closed");
        }
        self.transition(|link| match link {
            Link::ShellReady { transport, .. } => Link::TransportConnected { transport },
            other => other,
        });
    }

    /// Close the channel, then the transport.
    ///
    /// Idempotent. Teardown errors are logged, not returned. A session that
    /// never connected keeps its credential; otherwise it ends `Closed`.
    pub async fn disconnect(&mut self) {
        self.close_channel().await;

        if let Link::TransportConnected { transport } = &mut self.link {
            if let Err(e) = transport.disconnect().await {
                tracing::warn!(host = %self.config.host, error = %e, "Failed to disconnect transport");
            }
            self.link = Link::Closed;
            tracing::info!(host = %self.config.host, "Session disconnected");
        }
    }

    async fn ensure_transport(&mut self) -> Result<()> {
        match &self.link {
            Link::Uninitialized { .. } => {
                let transport = self.connector.create(&self.config)?;
                self.transition(|link| match link {
                    Link::Uninitialized { credential } => Link::Initialized {
                        transport,
                        credential,
                    },
                    other => other,
                });
                tracing::debug!(transport = self.connector.name(), "Transport created");
            }
            Link::TransportConnected { transport } | Link::ShellReady { transport, .. } => {
                if transport.is_connected() {
                    return Ok(());
                }
                tracing::warn!(
                    host = %self.config.host,
                    "Transport connection lost; credential already consumed"
                );
                self.link = Link::Closed;
                return Err(ConsoleError::CredentialSpent);
            }
            Link::Closed => return Err(ConsoleError::CredentialSpent),
            Link::Initialized { .. } => {}
        }

        let timeout = self.config.timeouts.connect;
        let Link::Initialized {
            transport,
            credential,
        } = &mut self.link
        else {
            return Err(TransportError::session("transport in unexpected state").into());
        };

        tracing::debug!(host = %self.config.host, port = self.config.port, "Connecting");
        match tokio::time::timeout(timeout, transport.connect(credential)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(host = %self.config.host, error = %e, "Connect failed");
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(host = %self.config.host, timeout_ms = timeout.as_millis(), "Connect timed out");
                return Err(TransportError::timeout(timeout).into());
            }
        }

        // Dropping the Initialized state drops the credential.
        self.transition(|link| match link {
            Link::Initialized { transport, .. } => Link::TransportConnected { transport },
            other => other,
        });
        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            user = %self.config.username,
            "Transport connected"
        );
        Ok(())
    }

    async fn ensure_shell(&mut self) -> Result<()> {
        match &self.link {
            Link::ShellReady { console, .. } if !console.is_closed() => return Ok(()),
            Link::ShellReady { .. } => {
                tracing::debug!("Shell channel was closed remotely; reopening");
                self.transition(|link| match link {
                    Link::ShellReady { transport, .. } => Link::TransportConnected { transport },
                    other => other,
                });
            }
            _ => {}
        }

        let Link::TransportConnected { transport } = &mut self.link else {
            return Err(TransportError::session("transport not connected").into());
        };

        let channel = transport.open_shell().await?;
        let mut console = Console::new(
            channel,
            Arc::clone(&self.prompt),
            Arc::clone(&self.console_settings),
            self.config.timeouts.poll_interval,
        );

        if let Err(e) = Self::bootstrap(&mut console, &self.config).await {
            tracing::warn!(error = %e, "Console bootstrap failed; closing channel");
            if let Err(close_err) = console.close().await {
                tracing::warn!(error = %close_err, "Failed to close shell channel");
            }
            return Err(ConsoleError::bootstrap(e));
        }

        self.transition(|link| match link {
            Link::TransportConnected { transport } => Link::ShellReady { transport, console },
            other => other,
        });
        tracing::debug!("Shell channel ready");
        Ok(())
    }

    async fn bootstrap(
        console: &mut Console<<K::Transport as Transport>::Channel>,
        config: &SessionConfig,
    ) -> Result<()> {
        let banner = console
            .read_until_prompt(config.timeouts.read, ReadPhase::Banner)
            .await?;
        tracing::trace!(banner = %banner, "Banner consumed");

        if let Some(command) = &config.console.bootstrap_command {
            console
                .run(command, config.timeouts.bootstrap, ReadPhase::Bootstrap)
                .await?;
            tracing::info!(command = %command, "Console bootstrap complete");
        }
        Ok(())
    }

    fn transition(&mut self, step: impl FnOnce(Link<K::Transport>) -> Link<K::Transport>) {
        let before = self.link.state();
        let link = mem::replace(&mut self.link, Link::Closed);
        self.link = step(link);
        let after = self.link.state();
        if before != after {
            tracing::debug!(from = ?before, to = ?after, "Session state changed");
        }
    }
}

impl<K: Connector> Drop for SessionConnection<K> {
    fn drop(&mut self) {
        if self.state().is_connected() {
            tracing::debug!(
                host = %self.config.host,
                "Session dropped while connected; releasing transport without graceful disconnect"
            );
        }
    }
}
