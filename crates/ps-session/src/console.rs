//! The command/reply conversation over one shell channel.
//!
//! A [`Console`] writes one line at a time and reads until the idle prompt
//! reappears. Every command is followed by the status probe; the probe's
//! reply decides whether the command succeeded.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ConsoleConfig;
use crate::diagnose::Diagnosis;
use crate::error::{ConsoleError, ReadPhase, Result};
use crate::prompt::PromptMatcher;
use crate::sanitize::{ends_in_partial_escape, sanitize, sanitize_bytes};
use crate::transport::{ReadStatus, ShellChannel};
use crate::util::Deadline;

/// An interactive console on an open shell channel.
pub struct Console<C> {
    channel: C,
    prompt: Arc<PromptMatcher>,
    settings: Arc<ConsoleConfig>,
    poll_interval: Duration,
}

impl<C: ShellChannel> Console<C> {
    /// Wrap an open channel.
    pub const fn new(
        channel: C,
        prompt: Arc<PromptMatcher>,
        settings: Arc<ConsoleConfig>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            channel,
            prompt,
            settings,
            poll_interval,
        }
    }

    /// Write `command` followed by the line terminator, unless it already
    /// ends with one.
    pub async fn send_line(&mut self, command: &str) -> Result<()> {
        let line = self.settings.line_ending.terminate(command);
        self.channel.write_all(line.as_bytes()).await?;
        self.channel.flush().await
    }

    /// Read until the output ends with the idle prompt.
    ///
    /// Returns the sanitized output. Polls without blocking, sleeping for the
    /// poll interval whenever nothing is available. Output that ends inside an
    /// escape sequence is not idle yet: the rest of the sequence belongs to
    /// this read, not the next one. Fails as soon as the
    /// channel closes or the deadline passes, carrying what was read so far.
    pub async fn read_until_prompt(&mut self, timeout: Duration, phase: ReadPhase) -> Result<String> {
        let deadline = Deadline::from_now(timeout);
        let mut raw = Vec::new();

        loop {
            let mut received = false;
            loop {
                match self.channel.read_available()? {
                    ReadStatus::Data(bytes) => {
                        received |= !bytes.is_empty();
                        raw.extend_from_slice(&bytes);
                    }
                    ReadStatus::Empty => break,
                    ReadStatus::Closed => {
                        let output = sanitize_bytes(&raw);
                        tracing::debug!(%phase, bytes = raw.len(), "Channel closed while reading");
                        return Err(ConsoleError::channel_closed(phase, output));
                    }
                }
            }

            let mut pending_escape = false;
            if received {
                let output = sanitize_bytes(&raw);
                if self.prompt.is_idle(&output) {
                    if ends_in_partial_escape(&raw) {
                        pending_escape = true;
                    } else {
                        tracing::debug!(
                            %phase,
                            bytes = raw.len(),
                            elapsed_ms = deadline.elapsed().as_millis(),
                            "Prompt reached"
                        );
                        return Ok(output);
                    }
                }
            }

            if deadline.is_expired() {
                let output = sanitize_bytes(&raw);
                tracing::debug!(%phase, bytes = raw.len(), "Timed out waiting for prompt");
                return Err(ConsoleError::timeout(phase, timeout, output));
            }

            if !received || pending_escape {
                deadline.sleep_at_most(self.poll_interval).await;
            }
        }
    }

    /// Ask the shell for the status of the previous command.
    ///
    /// `transcript` is the output of that command; on failure it is carried in
    /// the error together with the diagnostic extracted from it.
    pub async fn verify(&mut self, transcript: &str, timeout: Duration) -> Result<()> {
        let settings = Arc::clone(&self.settings);
        self.send_line(&settings.status_probe).await?;
        let status = self.read_until_prompt(timeout, ReadPhase::StatusProbe).await?;
        let answer = self.reply_body(&settings.status_probe, &status);

        if answer.contains(settings.success_token.as_str()) {
            return Ok(());
        }

        let diagnosis = Diagnosis::extract(transcript);
        tracing::debug!(
            command = %diagnosis.command,
            diagnostic = %diagnosis.message,
            "Status probe reported failure"
        );
        Err(ConsoleError::command_failed(
            diagnosis.command,
            diagnosis.message,
            transcript,
        ))
    }

    /// Run one command: write it, read its output, then verify it.
    ///
    /// Returns the sanitized transcript of the command (echo, output and the
    /// trailing prompt).
    pub async fn run(&mut self, command: &str, timeout: Duration, phase: ReadPhase) -> Result<String> {
        self.send_line(command).await?;
        let transcript = self.read_until_prompt(timeout, phase).await?;
        self.verify(&transcript, timeout).await?;
        Ok(transcript)
    }

    /// The reply to `command` in `transcript`: without the echoed command and
    /// without the trailing prompt.
    #[must_use]
    pub fn reply_body<'a>(&self, command: &str, transcript: &'a str) -> &'a str {
        let body = self.prompt.strip_prompt(transcript);
        let echo = sanitize(command);
        body.strip_prefix(echo.as_str()).unwrap_or(body).trim()
    }

    /// Check whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    /// Close the channel.
    pub async fn close(&mut self) -> Result<()> {
        self.channel.close().await
    }

    /// The prompt matcher.
    #[must_use]
    pub fn prompt(&self) -> &PromptMatcher {
        &self.prompt
    }
}
