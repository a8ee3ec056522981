//! Mock connector, transport and shell channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

use super::emulator::Emulator;
use super::script::MockScript;
use crate::config::SessionConfig;
use crate::credential::Credential;
use crate::error::{Result, TransportError};
use crate::transport::{Connector, ReadStatus, ShellChannel, Transport};

/// Counters of what the mock console saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Transports created.
    pub transports: usize,
    /// Connection attempts, successful or not.
    pub connect_attempts: usize,
    /// Successful connections.
    pub connects: usize,
    /// Shell channels opened.
    pub shells: usize,
    /// Successful module loads.
    pub module_loads: usize,
    /// Shell channels closed by the client.
    pub channel_closes: usize,
    /// Transport disconnects.
    pub disconnects: usize,
}

#[derive(Debug)]
struct Shared {
    script: Arc<MockScript>,
    stats: MockStats,
    lines: Vec<String>,
    transport_alive: bool,
    shell: Option<Arc<Mutex<Emulator>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Creates [`MockTransport`]s and lets tests inspect and disturb them.
///
/// Clones share state, so a test keeps one clone and hands the other to the
/// executor.
#[derive(Debug, Clone)]
pub struct MockConnector {
    shared: Arc<Mutex<Shared>>,
}

impl MockConnector {
    /// Create a connector answering from `script`.
    #[must_use]
    pub fn new(script: MockScript) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                script: Arc::new(script),
                stats: MockStats::default(),
                lines: Vec::new(),
                transport_alive: true,
                shell: None,
            })),
        }
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> MockStats {
        lock(&self.shared).stats
    }

    /// Every line written to any channel, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        lock(&self.shared).lines.clone()
    }

    /// Close the current shell channel from the server side.
    pub fn drop_shell(&self) {
        let shell = lock(&self.shared).shell.clone();
        if let Some(shell) = shell {
            lock(&shell).close();
        }
    }

    /// Drop the transport connection from the server side.
    pub fn drop_transport(&self) {
        let shell = {
            let mut shared = lock(&self.shared);
            shared.transport_alive = false;
            shared.shell.clone()
        };
        if let Some(shell) = shell {
            lock(&shell).close();
        }
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new(MockScript::default())
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn create(&self, config: &SessionConfig) -> Result<MockTransport> {
        lock(&self.shared).stats.transports += 1;
        Ok(MockTransport {
            shared: Arc::clone(&self.shared),
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            connected: false,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A connection to the mock console.
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Mutex<Shared>>,
    host: String,
    port: u16,
    username: String,
    connected: bool,
}

impl Transport for MockTransport {
    type Channel = MockShell;

    async fn connect(&mut self, credential: &Credential) -> Result<()> {
        let mut shared = lock(&self.shared);
        shared.stats.connect_attempts += 1;

        if shared.stats.connect_attempts <= shared.script.failing_connects {
            return Err(TransportError::connection(&self.host, self.port, "connection refused").into());
        }
        if let Some(expected) = &shared.script.password {
            if !credential.matches(expected.as_bytes()) {
                return Err(TransportError::authentication(&self.username, "password rejected").into());
            }
        }

        shared.stats.connects += 1;
        shared.transport_alive = true;
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected && lock(&self.shared).transport_alive
    }

    async fn open_shell(&mut self) -> Result<MockShell> {
        if !self.is_connected() {
            return Err(TransportError::session("not connected").into());
        }
        let mut shared = lock(&self.shared);
        let emulator = Arc::new(Mutex::new(Emulator::open(
            Arc::clone(&shared.script),
            &self.username,
        )));
        shared.stats.shells += 1;
        shared.shell = Some(Arc::clone(&emulator));
        Ok(MockShell {
            shared: Arc::clone(&self.shared),
            emulator,
        })
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut shared = lock(&self.shared);
        shared.stats.disconnects += 1;
        shared.transport_alive = false;
        self.connected = false;
        if shared.script.fail_close {
            return Err(TransportError::session("disconnect failed").into());
        }
        Ok(())
    }
}

/// A shell channel on the mock console.
#[derive(Debug)]
pub struct MockShell {
    shared: Arc<Mutex<Shared>>,
    emulator: Arc<Mutex<Emulator>>,
}

impl ShellChannel for MockShell {
    fn read_available(&mut self) -> Result<ReadStatus> {
        Ok(lock(&self.emulator).read(Instant::now()))
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let processed = {
            let mut emulator = lock(&self.emulator);
            if emulator.is_closed() {
                return Err(TransportError::channel("channel closed").into());
            }
            emulator.feed(data)
        };

        let mut shared = lock(&self.shared);
        for entry in processed {
            if entry.succeeded && entry.line.to_lowercase().starts_with("import-module") {
                shared.stats.module_loads += 1;
            }
            shared.lines.push(entry.line);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        lock(&self.emulator).is_closed()
    }

    async fn close(&mut self) -> Result<()> {
        lock(&self.emulator).close();
        let mut shared = lock(&self.shared);
        shared.stats.channel_closes += 1;
        if shared.script.fail_close {
            return Err(TransportError::channel("close failed").into());
        }
        Ok(())
    }
}
