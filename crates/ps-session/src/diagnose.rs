//! Diagnostic extraction from failed command output.
//!
//! When a command fails, the console echoes the command and then prints an
//! error record of the shape
//!
//! ```text
//! New-ADUser : The specified account already exists
//! At line:1 char:1
//! + New-ADUser -SamAccountName "abij01" ...
//! ```
//!
//! which sanitizes to `new-aduser ... New-ADUser : The specified account already
//! exists At line:1 char:1 ...`. The extractor isolates the failing command
//! token and the diagnostic between the `<token> : ` and ` : At line:` markers
//! (PowerShell versions differ in whether the second colon is printed, so a
//! plain ` At line:` also ends the diagnostic).

use crate::sanitize::sanitize;

/// The failing command and its diagnostic, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diagnosis {
    /// First word of the output: the command that failed.
    pub command: String,
    /// Diagnostic text, empty when no error record was found.
    pub message: String,
}

impl Diagnosis {
    /// Extract a diagnosis from console output.
    ///
    /// Never fails: missing markers degrade to a best-effort result. When the
    /// start marker is present but the end marker is not, the rest of the
    /// output after the start marker is the diagnostic; without a start
    /// marker the diagnostic is empty.
    #[must_use]
    pub fn extract(output: &str) -> Self {
        let lower = sanitize(output).to_lowercase();

        let command = lower
            .split(' ')
            .next()
            .unwrap_or_default()
            .to_string();

        if command.is_empty() {
            return Self::default();
        }

        let start_marker = format!("{command} : ");
        let message = lower
            .find(&start_marker)
            .map(|start| {
                let rest = &lower[start + start_marker.len()..];
                let end = [" : at line:", " at line:"]
                    .iter()
                    .filter_map(|marker| rest.find(marker))
                    .min()
                    .unwrap_or(rest.len());
                rest[..end].trim().to_string()
            })
            .unwrap_or_default();

        Self { command, message }
    }

    /// Check whether a diagnostic was found.
    #[must_use]
    pub fn has_message(&self) -> bool {
        !self.message.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_error_record() {
        let d = Diagnosis::extract("New-ADUser : Object already exists : At line:1 char:1");
        assert_eq!(d.command, "new-aduser");
        assert_eq!(d.message, "object already exists");
    }

    #[test]
    fn echoed_command_before_record() {
        let out = "Remove-ADUser -identity \"ghost\" -Confirm:$false\r\n\
                   Remove-ADUser : Cannot find an object with identity: 'ghost'\r\n\
                   At line:1 char:14\r\n+ Remove-ADUser <<<< -identity \"ghost\"";
        let d = Diagnosis::extract(out);
        assert_eq!(d.command, "remove-aduser");
        assert_eq!(d.message, "cannot find an object with identity: 'ghost'");
    }

    #[test]
    fn escape_noise_and_case() {
        let out = "\x1b[31mNEW-ADUSER : The Name Is Taken : AT LINE:3 char:9\x1b[0m";
        let d = Diagnosis::extract(out);
        assert_eq!(d.command, "new-aduser");
        assert_eq!(d.message, "the name is taken");
    }

    #[test]
    fn missing_end_marker_takes_remainder() {
        let d = Diagnosis::extract("Get-ADUser : directory unavailable   ");
        assert_eq!(d.command, "get-aduser");
        assert_eq!(d.message, "directory unavailable");
    }

    #[test]
    fn missing_start_marker_gives_empty_message() {
        let d = Diagnosis::extract("Get-ADUser -Identity nobody\r\nsomething odd happened");
        assert_eq!(d.command, "get-aduser");
        assert!(!d.has_message());
    }

    #[test]
    fn empty_output() {
        assert_eq!(Diagnosis::extract(""), Diagnosis::default());
        assert_eq!(Diagnosis::extract("\r\n\x1b[0m"), Diagnosis::default());
    }

    #[test]
    fn first_end_marker_wins() {
        let d = Diagnosis::extract("x : first : at line:1 : second : at line:2");
        assert_eq!(d.message, "first");
    }
}
