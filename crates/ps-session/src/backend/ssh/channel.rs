//! The interactive shell channel.

use futures::FutureExt;
use russh::{ChannelMsg, client};

use crate::error::{Result, TransportError};
use crate::transport::{ReadStatus, ShellChannel};

/// Channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Open,
    /// The server sent EOF or an exit status; buffered data may remain.
    Eof,
    Closed,
}

/// An interactive shell on an SSH channel.
pub struct SshShell {
    channel: russh::Channel<client::Msg>,
    state: ChannelState,
}

impl std::fmt::Debug for SshShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshShell")
            .field("id", &self.channel.id())
            .field("state", &self.state)
            .finish()
    }
}

impl SshShell {
    pub(super) const fn new(channel: russh::Channel<client::Msg>) -> Self {
        Self {
            channel,
            state: ChannelState::Open,
        }
    }
}

impl ShellChannel for SshShell {
    fn read_available(&mut self) -> Result<ReadStatus> {
        if self.state == ChannelState::Closed {
            return Ok(ReadStatus::Closed);
        }

        let mut data = Vec::new();

        // `wait` only receives from the channel's queue, so polling it once
        // and dropping a pending future loses nothing.
        while let Some(next) = self.channel.wait().now_or_never() {
            match next {
                Some(ChannelMsg::Data { data: bytes }) => data.extend_from_slice(&bytes),
                Some(ChannelMsg::ExtendedData { data: bytes, ext: 1 }) => {
                    data.extend_from_slice(&bytes);
                }
                Some(ChannelMsg::Eof | ChannelMsg::ExitStatus { .. }) => {
                    self.state = ChannelState::Eof;
                }
                Some(ChannelMsg::Close) | None => {
                    self.state = ChannelState::Closed;
                    break;
                }
                Some(_) => {}
            }
        }

        if !data.is_empty() {
            Ok(ReadStatus::Data(data))
        } else if self.state == ChannelState::Open {
            Ok(ReadStatus::Empty)
        } else {
            self.state = ChannelState::Closed;
            Ok(ReadStatus::Closed)
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.channel
            .data(data)
            .await
            .map_err(|e| TransportError::channel(format!("data send failed: {e}")).into())
    }

    async fn flush(&mut self) -> Result<()> {
        // `data` returns once the bytes are handed to the session.
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state == ChannelState::Closed
    }

    async fn close(&mut self) -> Result<()> {
        self.state = ChannelState::Closed;
        self.channel
            .close()
            .await
            .map_err(|e| TransportError::channel(format!("channel close failed: {e}")).into())
    }
}
