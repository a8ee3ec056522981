//! Server key verification against a known-hosts file.

use russh::keys::{HashAlg, PublicKey};

/// Result of looking up a server key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyStatus {
    /// A matching entry lists this key.
    Verified,
    /// The host is listed, but with a different key.
    Mismatch,
    /// The host is not listed.
    Unknown,
}

/// Look up `key` for `host:port` in known-hosts `contents`.
///
/// Entries are `hostnames keytype base64key [comment]`; the host matches as
/// `host` on port 22 and as `[host]:port` otherwise. Hashed hostnames and
/// `@` markers are not supported and are skipped.
#[must_use]
pub fn check_host_key(contents: &str, host: &str, port: u16, key: &PublicKey) -> HostKeyStatus {
    let host_pattern = if port == 22 {
        host.to_string()
    } else {
        format!("[{host}]:{port}")
    };

    let mut listed = false;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('@') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(hostnames), Some(key_type), Some(key_data)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };

        let host_matches = hostnames
            .split(',')
            .any(|h| h.eq_ignore_ascii_case(&host_pattern));
        if !host_matches {
            continue;
        }

        match parse_key(key_type, key_data) {
            Some(stored) if keys_match(&stored, key) => return HostKeyStatus::Verified,
            Some(_) => listed = true,
            None => {}
        }
    }

    if listed {
        HostKeyStatus::Mismatch
    } else {
        HostKeyStatus::Unknown
    }
}

fn parse_key(key_type: &str, key_data: &str) -> Option<PublicKey> {
    match key_type {
        "ssh-ed25519"
        | "ssh-rsa"
        | "ecdsa-sha2-nistp256"
        | "ecdsa-sha2-nistp384"
        | "ecdsa-sha2-nistp521" => russh::keys::parse_public_key_base64(key_data).ok(),
        _ => {
            tracing::debug!(key_type = %key_type, "Unknown key type in known_hosts");
            None
        }
    }
}

fn keys_match(stored: &PublicKey, server: &PublicKey) -> bool {
    stored.fingerprint(HashAlg::Sha256) == server.fingerprint(HashAlg::Sha256)
}
