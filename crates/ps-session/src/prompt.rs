//! Idle-prompt detection.
//!
//! A PowerShell console signals that it finished a command by printing its
//! prompt again, e.g. `PS C:\Users\abij> `. The prompt is the only end-of-output
//! marker the console offers, so the read loop stops as soon as the
//! accumulated output *ends* with it.
//!
//! Detection is heuristic: output that happens to end in a prompt-shaped line
//! (for example a command that prints `\abij>` as its last line) ends the read
//! early.

use regex::Regex;

use crate::error::{ConsoleError, Result};

/// Recognizes the idle prompt of a console logged in as a given user.
#[derive(Debug, Clone)]
pub struct PromptMatcher {
    username: String,
    regex: Regex,
}

impl PromptMatcher {
    /// Build a matcher for `username`.
    ///
    /// A `DOMAIN\user` name is reduced to `user`, which is what the console
    /// shows in its working directory.
    pub fn new(username: &str) -> Result<Self> {
        let username = username
            .rsplit('\\')
            .next()
            .unwrap_or(username)
            .trim()
            .to_string();

        if username.is_empty() {
            return Err(ConsoleError::config("username must not be empty"));
        }

        // \user> then optional residue of cursor/colour sequences, possibly
        // stripped of their ESC byte, then trailing whitespace, then the end.
        let pattern = format!(
            r"(?i)\\{}>[ ]?(?:\s*\x1b?\[[0-9;?]*[A-Za-z])*\s*\z",
            regex::escape(&username)
        );
        let regex = Regex::new(&pattern)?;

        Ok(Self { username, regex })
    }

    /// Check whether `output` ends with the idle prompt.
    #[must_use]
    pub fn is_idle(&self, output: &str) -> bool {
        self.regex.is_match(output)
    }

    /// Strip the trailing prompt line from idle output.
    ///
    /// The prompt is cut back to its `PS ` marker when there is one, so
    /// `Done PS C:\Users\abij>` becomes `Done`. Output that does not end
    /// with the prompt is returned unchanged.
    #[must_use]
    pub fn strip_prompt<'a>(&self, output: &'a str) -> &'a str {
        let Some(found) = self.regex.find(output) else {
            return output;
        };
        let before = &output[..found.start()];
        let cut = before.rfind("PS ").unwrap_or(before.len());
        output[..cut].trim_end()
    }

    /// The username the prompt is derived from.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The compiled pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}
