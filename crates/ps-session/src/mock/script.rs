//! Scripted console behaviour.

use std::time::Duration;

/// Default banner printed when a shell opens.
pub const DEFAULT_BANNER: &str = "Windows PowerShell\r\n\
    Copyright (C) Microsoft Corporation. All rights reserved.\r\n\r\n";

/// How the console reacts to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Print this output; the command succeeds.
    Reply(String),
    /// Print an error record with this diagnostic; the command fails.
    Fail(String),
    /// Succeed, but print the output and the prompt only after this delay.
    Slow(Duration),
    /// Succeed, then hang on the status query that follows.
    HangStatus,
    /// Never print the prompt again.
    Hang,
    /// Close the channel.
    Close,
}

#[derive(Debug, Clone)]
pub(crate) struct Rule {
    prefix: String,
    reaction: Reaction,
}

/// Behaviour of the scripted console.
#[derive(Debug, Clone)]
pub struct MockScript {
    pub(crate) banner: String,
    pub(crate) rules: Vec<Rule>,
    pub(crate) latency: Duration,
    pub(crate) chunk_size: usize,
    pub(crate) escape_noise: bool,
    pub(crate) password: Option<String>,
    pub(crate) failing_connects: usize,
    pub(crate) fail_close: bool,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            banner: DEFAULT_BANNER.to_string(),
            rules: Vec::new(),
            latency: Duration::ZERO,
            chunk_size: 64,
            escape_noise: true,
            password: None,
            failing_connects: 0,
            fail_close: false,
        }
    }
}

impl MockScript {
    /// A console on which every command succeeds silently.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// React to commands starting with `prefix` (case-insensitive).
    ///
    /// Rules are tried in the order they were added.
    #[must_use]
    pub fn on(mut self, prefix: impl Into<String>, reaction: Reaction) -> Self {
        self.rules.push(Rule {
            prefix: prefix.into().to_lowercase(),
            reaction,
        });
        self
    }

    /// Print `output` for commands starting with `prefix`.
    #[must_use]
    pub fn reply(self, prefix: impl Into<String>, output: impl Into<String>) -> Self {
        self.on(prefix, Reaction::Reply(output.into()))
    }

    /// Fail commands starting with `prefix` with `diagnostic`.
    #[must_use]
    pub fn fail(self, prefix: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        self.on(prefix, Reaction::Fail(diagnostic.into()))
    }

    /// Hang on commands starting with `prefix`.
    #[must_use]
    pub fn hang(self, prefix: impl Into<String>) -> Self {
        self.on(prefix, Reaction::Hang)
    }

    /// Answer commands starting with `prefix` only after `delay`.
    #[must_use]
    pub fn slow(self, prefix: impl Into<String>, delay: Duration) -> Self {
        self.on(prefix, Reaction::Slow(delay))
    }

    /// Run commands starting with `prefix`, then never answer the status
    /// query that follows them.
    #[must_use]
    pub fn hang_status(self, prefix: impl Into<String>) -> Self {
        self.on(prefix, Reaction::HangStatus)
    }

    /// Close the channel on commands starting with `prefix`.
    #[must_use]
    pub fn close_on(self, prefix: impl Into<String>) -> Self {
        self.on(prefix, Reaction::Close)
    }

    /// Set the banner.
    #[must_use]
    pub fn banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    /// Delay every reply by `latency`.
    #[must_use]
    pub const fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Deliver output in reads of at most `size` bytes.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Wrap prompts and replies in cursor and colour sequences.
    #[must_use]
    pub const fn escape_noise(mut self, enabled: bool) -> Self {
        self.escape_noise = enabled;
        self
    }

    /// Only accept this password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Refuse the first `count` connection attempts.
    #[must_use]
    pub const fn failing_connects(mut self, count: usize) -> Self {
        self.failing_connects = count;
        self
    }

    /// Make channel and transport close calls report an error.
    #[must_use]
    pub const fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub(crate) fn reaction_for(&self, line: &str) -> Option<&Reaction> {
        let line = line.trim_start().to_lowercase();
        self.rules
            .iter()
            .find(|rule| line.starts_with(&rule.prefix))
            .map(|rule| &rule.reaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins() {
        let script = MockScript::new()
            .fail("New-ADUser", "exists")
            .reply("New-", "created");
        assert_eq!(
            script.reaction_for("new-aduser -Name x"),
            Some(&Reaction::Fail("exists".to_string()))
        );
        assert_eq!(
            script.reaction_for("New-Item foo"),
            Some(&Reaction::Reply("created".to_string()))
        );
        assert_eq!(script.reaction_for("Get-Date"), None);
    }
}
