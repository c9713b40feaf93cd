//! Shared secrets used to authenticate uploads.

use crate::error::ConfigError;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of generated keys when none is supplied.
pub const DEFAULT_PASS_KEY_LEN: usize = 6;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PassKey(String);

impl PassKey {
    /// Wrap a user-supplied key.
    ///
    /// The key travels as an HTTP header value, so it must be non-empty,
    /// free of control characters and without surrounding whitespace (which
    /// the header parser strips). Non-ASCII text is fine.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptyPassKey);
        }
        if key.trim() != key || key.chars().any(char::is_control) {
            return Err(ConfigError::InvalidPassKey);
        }
        Ok(Self(key))
    }

    /// Draw `len` characters uniformly from `[a-zA-Z0-9]`.
    pub fn generate(len: usize) -> Self {
        // Largest multiple of the alphabet size that fits a byte.
        let limit = (u8::MAX as usize + 1) / LETTERS.len() * LETTERS.len();
        let mut out = String::with_capacity(len);
        let mut buf = [0u8; 32];

        while out.len() < len {
            OsRng.fill_bytes(&mut buf);
            for &b in buf.iter().filter(|&&b| (b as usize) < limit) {
                if out.len() == len {
                    break;
                }
                out.push(LETTERS[b as usize % LETTERS.len()] as char);
            }
        }
        Self(out)
    }

    /// Compare against a presented key without short-circuiting on the
    /// first differing byte.
    pub fn matches(&self, presented: &[u8]) -> bool {
        let (a, b) = (self.0.as_bytes(), presented);
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PassKey {
    type Error = ConfigError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}

impl From<PassKey> for String {
    fn from(key: PassKey) -> Self {
        key.0
    }
}

impl fmt::Display for PassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PassKey(..)")
    }
}
