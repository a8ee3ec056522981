//! Console output sanitization.
//!
//! Remote consoles interleave their text with terminal control sequences
//! (cursor positioning, colours, window titles) and split it across lines at
//! arbitrary points. Everything downstream (prompt detection, success probing,
//! diagnostic extraction) works on the sanitized form produced here: escape
//! sequences and control characters removed, whitespace runs collapsed to a
//! single space, no leading or trailing whitespace.

use std::borrow::Cow;

/// Sanitize raw console bytes, decoding invalid UTF-8 lossily.
#[must_use]
pub fn sanitize_bytes(bytes: &[u8]) -> String {
    sanitize(&String::from_utf8_lossy(bytes))
}

/// Sanitize console text.
///
/// The result never contains control characters, never contains two
/// consecutive spaces and is trimmed. Applying it twice yields the same text.
///
/// # Examples
///
/// ```
/// use ps_session::sanitize::sanitize;
///
/// let raw = "\x1b[2J\x1b[1;1HPS C:\\Users\\abij>\r\n  Get-ADUser\x1b[0m";
/// assert_eq!(sanitize(raw), "PS C:\\Users\\abij> Get-ADUser");
/// ```
#[must_use]
pub fn sanitize(text: &str) -> String {
    let stripped = strip_escapes(text);

    let mut result = String::with_capacity(stripped.len());
    let mut pending_space = false;

    for c in stripped.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else if c.is_control() {
            // BEL, BS, NUL and friends carry no text.
        } else {
            if pending_space && !result.is_empty() {
                result.push(' ');
            }
            pending_space = false;
            result.push(c);
        }
    }

    result
}

/// Check whether `bytes` ends inside an escape sequence whose remaining
/// bytes have not arrived yet.
///
/// Sanitizing such a buffer drops the incomplete sequence, so the text may
/// look finished while the rest of the sequence is still in flight.
///
/// ```
/// use ps_session::sanitize::ends_in_partial_escape;
///
/// assert!(ends_in_partial_escape(b"PS C:\\> \x1b[?25"));
/// assert!(!ends_in_partial_escape(b"PS C:\\> \x1b[?25h"));
/// ```
#[must_use]
pub fn ends_in_partial_escape(bytes: &[u8]) -> bool {
    let Some(start) = bytes.iter().rposition(|&b| b == 0x1b) else {
        return false;
    };
    let rest = &bytes[start + 1..];

    match rest.first() {
        None => true,
        Some(b'[') => !rest[1..].iter().any(|b| (0x40..=0x7e).contains(b)),
        // The ESC of an ST terminator would have been found first.
        Some(b']') => !rest[1..].contains(&0x07),
        Some(b'(' | b')' | b'*' | b'+') => rest.len() < 2,
        Some(_) => false,
    }
}

/// Remove ANSI escape sequences: CSI, OSC, charset designation and two-byte
/// ESC sequences.
fn strip_escapes(text: &str) -> Cow<'_, str> {
    if !text.contains('\x1b') {
        return Cow::Borrowed(text);
    }

    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            result.push(c);
            continue;
        }

        let Some(&next) = chars.peek() else {
            break;
        };

        match next {
            '[' => {
                // CSI: ESC [ params final
                chars.next();
                while let Some(param) = chars.next() {
                    if ('@'..='~').contains(&param) {
                        break;
                    }
                }
            }
            ']' => {
                // OSC: ESC ] ... BEL | ESC \
                chars.next();
                while let Some(osc_char) = chars.next() {
                    if osc_char == '\x07' {
                        break;
                    }
                    if osc_char == '\x1b' {
                        if chars.peek() == Some(&'\\') {
                            chars.next();
                        }
                        break;
                    }
                }
            }
            '(' | ')' | '*' | '+' => {
                // Charset designation: ESC ( X
                chars.next();
                chars.next();
            }
            _ if ('0'..='~').contains(&next) => {
                // Two-byte sequence: ESC 7, ESC M, ESC =, ...
                chars.next();
            }
            _ => {}
        }
    }

    Cow::Owned(result)
}
