//! PowerShell command templates.
//!
//! A template is command text with `${name}` placeholders. Rendering replaces
//! every placeholder with its value escaped for a double-quoted PowerShell
//! string; a placeholder without a value is an error, so a half-filled
//! command is never sent.

use std::collections::HashMap;

use crate::error::{DirectoryError, Result};

/// Create a user enabled, with a password that never expires.
pub const CREATE_USER: CommandTemplate = CommandTemplate::new(concat!(
    r#"New-ADUser -SamAccountName "${samAccountName}""#,
    r#" -Name "${name}""#,
    r#" -DisplayName "${displayName}""#,
    r#" -EmailAddress "${email}""#,
    r#" -AccountPassword (ConvertTo-SecureString -AsPlainText "${password}" -Force)"#,
    " -ChangePasswordAtLogin $false -PasswordNeverExpires $true -Enabled $true",
    r#" -Path "${adUserPath}""#,
));

/// Remove a user without confirmation.
pub const DELETE_USER: CommandTemplate =
    CommandTemplate::new(r#"Remove-ADUser -Identity "${samAccountName}" -Confirm:$false"#);

/// Command text with `${name}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTemplate {
    source: &'static str,
}

/// A piece of a template.
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

impl CommandTemplate {
    /// Wrap template text.
    #[must_use]
    pub const fn new(source: &'static str) -> Self {
        Self { source }
    }

    /// The template text.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.source
    }

    /// Placeholder names in order of appearance, repeats included.
    pub fn placeholders(&self) -> impl Iterator<Item = &'static str> {
        segments(self.source).filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name),
            Segment::Text(_) => None,
        })
    }

    /// Fill the template.
    ///
    /// Values are escaped with [`quote_value`]. Values for names the template
    /// does not use are ignored.
    pub fn render<'a, I>(&self, values: I) -> Result<String>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let values: HashMap<&str, &str> = values.into_iter().collect();
        let mut command = String::with_capacity(self.source.len());
        let mut missing: Vec<&str> = Vec::new();

        for segment in segments(self.source) {
            match segment {
                Segment::Text(text) => command.push_str(text),
                Segment::Placeholder(name) => match values.get(name) {
                    Some(value) => command.push_str(&quote_value(value)),
                    None if !missing.contains(&name) => missing.push(name),
                    None => {}
                },
            }
        }

        if missing.is_empty() {
            Ok(command)
        } else {
            Err(DirectoryError::template(missing))
        }
    }
}

/// Escape `value` for use inside a double-quoted PowerShell string.
///
/// Backtick, double quote and dollar sign are prefixed with a backtick; line
/// breaks become `` `n `` and `` `r `` so the value stays on one console line.
///
/// ```
/// use ps_directory::template::quote_value;
///
/// assert_eq!(quote_value(r#"Jan "the man" $HOME"#), r#"Jan `"the man`" `$HOME"#);
/// ```
#[must_use]
pub fn quote_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '`' | '"' | '$' => {
                quoted.push('`');
                quoted.push(c);
            }
            '\n' => quoted.push_str("`n"),
            '\r' => quoted.push_str("`r"),
            _ => quoted.push(c),
        }
    }
    quoted
}

/// Split template text into literal text and placeholders. An unterminated
/// `${` is literal text.
fn segments(source: &str) -> impl Iterator<Item = Segment<'_>> {
    let mut rest = source;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        if let Some(after) = rest.strip_prefix("${") {
            if let Some(end) = after.find('}') {
                let name = &after[..end];
                rest = &after[end + 1..];
                return Some(Segment::Placeholder(name));
            }
            let text = rest;
            rest = "";
            return Some(Segment::Text(text));
        }
        let skip = rest.chars().next().map_or(0, char::len_utf8);
        let end = rest[skip..].find("${").map_or(rest.len(), |i| i + skip);
        let text = &rest[..end];
        rest = &rest[end..];
        Some(Segment::Text(text))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_placeholders() {
        let template = CommandTemplate::new("Hi ${foo}, ${bar}!");
        let command = template.render([("foo", "there"), ("bar", "world")]).unwrap();
        assert_eq!(command, "Hi there, world!");
    }

    #[test]
    fn repeated_placeholder_uses_same_value() {
        let template = CommandTemplate::new("${a}-${a}");
        assert_eq!(template.render([("a", "x")]).unwrap(), "x-x");
    }

    #[test]
    fn unfilled_placeholders_are_reported_once_each() {
        let err = CREATE_USER
            .render([("samAccountName", "abij01"), ("name", "abij01")])
            .unwrap_err();
        let DirectoryError::Template { missing } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(*missing, ["displayName", "email", "password", "adUserPath"]);
    }

    #[test]
    fn unused_values_are_ignored() {
        let command = DELETE_USER
            .render([("samAccountName", "abij01"), ("password", "secret")])
            .unwrap();
        assert_eq!(command, r#"Remove-ADUser -Identity "abij01" -Confirm:$false"#);
    }

    #[test]
    fn values_are_escaped_not_expanded() {
        let template = CommandTemplate::new(r#"Write-Output "${text}""#);
        let command = template.render([("text", "${other} $(whoami)")]).unwrap();
        assert_eq!(command, r#"Write-Output "`${other} `$(whoami)""#);
    }

    #[test]
    fn line_breaks_stay_on_one_line() {
        assert_eq!(quote_value("a\r\nb"), "a`r`nb");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        let template = CommandTemplate::new("cost ${amount");
        assert_eq!(template.placeholders().count(), 0);
        assert_eq!(template.render(std::iter::empty()).unwrap(), "cost ${amount");
    }

    #[test]
    fn lists_placeholders() {
        let names: Vec<_> = CREATE_USER.placeholders().collect();
        assert_eq!(
            names,
            ["samAccountName", "name", "displayName", "email", "password", "adUserPath"]
        );
        assert_eq!(DELETE_USER.placeholders().collect::<Vec<_>>(), ["samAccountName"]);
    }

    #[test]
    fn dollar_signs_in_template_text_survive() {
        let command = DELETE_USER.render([("samAccountName", "x")]).unwrap();
        assert!(command.ends_with("-Confirm:$false"));
    }
}
