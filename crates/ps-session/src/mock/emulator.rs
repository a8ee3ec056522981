//! A tiny PowerShell console emulator.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::script::{MockScript, Reaction};
use crate::transport::ReadStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Hung,
    Closed,
}

#[derive(Debug)]
struct Pending {
    ready_at: Instant,
    bytes: Vec<u8>,
}

/// A line the console received and what became of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Processed {
    pub(crate) line: String,
    pub(crate) succeeded: bool,
}

#[derive(Debug)]
pub(crate) struct Emulator {
    script: Arc<MockScript>,
    prompt: String,
    pending_input: Vec<u8>,
    output: VecDeque<Pending>,
    last_status: bool,
    hang_next_status: bool,
    state: State,
}

impl Emulator {
    /// Open a console for `username`: banner and first prompt are queued.
    pub(crate) fn open(script: Arc<MockScript>, username: &str) -> Self {
        let user = username.rsplit('\\').next().unwrap_or(username);
        let prompt = if script.escape_noise {
            format!("\x1b[?25lPS C:\\Users\\{user}> \x1b[?25h")
        } else {
            format!("PS C:\\Users\\{user}> ")
        };

        let mut emulator = Self {
            script,
            prompt,
            pending_input: Vec::new(),
            output: VecDeque::new(),
            last_status: true,
            hang_next_status: false,
            state: State::Idle,
        };

        let mut greeting = String::new();
        if emulator.script.escape_noise {
            greeting.push_str("\x1b[2J\x1b[1;1H\x1b]0;Windows PowerShell\x07");
        }
        greeting.push_str(&emulator.script.banner);
        greeting.push_str(&emulator.prompt);
        emulator.queue(greeting);
        emulator
    }

    /// Accept written bytes; complete lines are executed.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Vec<Processed> {
        self.pending_input.extend_from_slice(bytes);

        let mut processed = Vec::new();
        while let Some(end) = self
            .pending_input
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')
        {
            let line_bytes: Vec<u8> = self.pending_input.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line_bytes[..end]).into_owned();
            if line.is_empty() {
                continue;
            }
            if let Some(result) = self.execute(&line) {
                processed.push(result);
            }
        }
        processed
    }

    /// Take output that is ready at `now`.
    pub(crate) fn read(&mut self, now: Instant) -> ReadStatus {
        if self.state == State::Closed {
            return ReadStatus::Closed;
        }

        let Some(front) = self.output.front_mut() else {
            return ReadStatus::Empty;
        };
        if front.ready_at > now {
            return ReadStatus::Empty;
        }

        let take = self.script.chunk_size.min(front.bytes.len());
        let chunk: Vec<u8> = front.bytes.drain(..take).collect();
        if front.bytes.is_empty() {
            self.output.pop_front();
        }
        ReadStatus::Data(chunk)
    }

    pub(crate) fn close(&mut self) {
        self.state = State::Closed;
        self.output.clear();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    fn execute(&mut self, line: &str) -> Option<Processed> {
        if self.state != State::Idle {
            return None;
        }

        let mut reply = format!("{line}\r\n");
        let mut delay = Duration::ZERO;
        let succeeded;
        let is_status_query = line.trim() == "$?";

        if is_status_query && self.hang_next_status {
            self.hang_next_status = false;
            self.queue(reply);
            self.state = State::Hung;
            return Some(Processed {
                line: line.to_string(),
                succeeded: false,
            });
        }

        if is_status_query {
            reply.push_str(if self.last_status { "True" } else { "False" });
            reply.push_str("\r\n");
            succeeded = true;
        } else {
            match self.script.reaction_for(line).cloned() {
                None => succeeded = true,
                Some(Reaction::Reply(output)) => {
                    reply.push_str(&output);
                    reply.push_str("\r\n");
                    succeeded = true;
                }
                Some(Reaction::Slow(after)) => {
                    self.queue(std::mem::take(&mut reply));
                    delay = after;
                    succeeded = true;
                }
                Some(Reaction::HangStatus) => {
                    self.hang_next_status = true;
                    succeeded = true;
                }
                Some(Reaction::Fail(diagnostic)) => {
                    let token = line.split_whitespace().next().unwrap_or_default();
                    if self.script.escape_noise {
                        reply.push_str("\x1b[91m");
                    }
                    reply.push_str(&format!(
                        "{token} : {diagnostic}\r\nAt line:1 char:1\r\n+ {line}\r\n"
                    ));
                    if self.script.escape_noise {
                        reply.push_str("\x1b[0m");
                    }
                    succeeded = false;
                }
                Some(Reaction::Hang) => {
                    self.queue(reply);
                    self.state = State::Hung;
                    return Some(Processed {
                        line: line.to_string(),
                        succeeded: false,
                    });
                }
                Some(Reaction::Close) => {
                    self.close();
                    return Some(Processed {
                        line: line.to_string(),
                        succeeded: false,
                    });
                }
            }
        }

        self.last_status = succeeded;
        reply.push_str(&self.prompt);
        self.queue_after(reply, delay);
        Some(Processed {
            line: line.to_string(),
            succeeded,
        })
    }

    fn queue(&mut self, text: String) {
        self.queue_after(text, Duration::ZERO);
    }

    fn queue_after(&mut self, text: String, delay: Duration) {
        self.output.push_back(Pending {
            ready_at: Instant::now() + self.script.latency + delay,
            bytes: text.into_bytes(),
        });
    }
}
