//! The login credential.
//!
//! A [`Credential`] is handed to the session once and moved into the
//! transport when authentication succeeds, after which it is dropped. The
//! secret bytes live in a [`secrecy`] box and are zeroed when that happens;
//! they never appear in `Debug` output or logs.

use std::fmt;

use secrecy::{ExposeSecret, SecretSlice};
use zeroize::Zeroizing;

use crate::error::{ConsoleError, Result};

/// Password bytes used to authenticate the transport.
pub struct Credential(SecretSlice<u8>);

impl Credential {
    /// Create a credential from a password.
    #[must_use]
    pub fn from_password(password: impl Into<String>) -> Self {
        Self::from_bytes(password.into().into_bytes())
    }

    /// Create a credential from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(SecretSlice::from(bytes))
    }

    /// Length of the secret in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    /// Check whether the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the secret out as text for a transport that takes a password
    /// string. The copy is zeroed when dropped.
    pub fn expose_password(&self) -> Result<Zeroizing<String>> {
        let text = std::str::from_utf8(self.0.expose_secret())
            .map_err(|_| ConsoleError::config("password is not valid UTF-8"))?;
        Ok(Zeroizing::new(text.to_owned()))
    }

    /// Compare against a candidate password without exposing the secret.
    #[must_use]
    pub fn matches(&self, candidate: &[u8]) -> bool {
        let secret = self.0.expose_secret();
        secret.len() == candidate.len()
            && secret
                .iter()
                .zip(candidate)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl From<&str> for Credential {
    fn from(password: &str) -> Self {
        Self::from_password(password)
    }
}

impl From<String> for Credential {
    fn from(password: String) -> Self {
        Self::from_password(password)
    }
}
