//! Permission string formatting and matching

use std::fmt;
use std::str::FromStr;

use arrayvec::ArrayString;

use crate::error::{Error, Result};
use crate::types::PERMISSION_LEN;

/// Mode bit and character for each position of `rwxrwxrwx`
const SLOTS: [(u32, u8); PERMISSION_LEN] = [
    (0o400, b'r'),
    (0o200, b'w'),
    (0o100, b'x'),
    (0o040, b'r'),
    (0o020, b'w'),
    (0o010, b'x'),
    (0o004, b'r'),
    (0o002, b'w'),
    (0o001, b'x'),
];

/// A validated `rwxrwxrwx` pattern
///
/// Owner, group and other triples in the order `ls -l` prints them, with `-`
/// for an absent bit. Only exact equality is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionSpec {
    /// Always exactly `PERMISSION_LEN` ASCII bytes
    text: ArrayString<PERMISSION_LEN>,
}

impl PermissionSpec {
    /// Format the permission bits of `mode`
    ///
    /// File type, setuid, setgid and sticky bits are ignored.
    #[must_use]
    pub fn from_mode(mode: u32) -> Self {
        let mut text = ArrayString::new();
        for (bit, ch) in SLOTS {
            text.push(if mode & bit == 0 { '-' } else { char::from(ch) });
        }
        Self { text }
    }

    /// Whether the permission bits of `mode` are exactly this pattern
    #[must_use]
    pub fn matches(&self, mode: u32) -> bool {
        Self::from_mode(mode) == *self
    }

    /// Octal permission bits this pattern describes
    #[must_use]
    pub fn mode(&self) -> u32 {
        SLOTS
            .iter()
            .zip(self.text.bytes())
            .filter(|&(_, ch)| ch != b'-')
            .fold(0, |acc, (&(bit, _), _)| acc | bit)
    }

    /// The pattern as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Format the permission bits of `mode` as `rwxrwxrwx`
#[must_use]
pub fn format_permissions(mode: u32) -> PermissionSpec {
    PermissionSpec::from_mode(mode)
}

impl FromStr for PermissionSpec {
    type Err = Error;

    fn from_str(pattern: &str) -> Result<Self> {
        let bytes = pattern.as_bytes();
        let valid = bytes.len() == PERMISSION_LEN
            && SLOTS.iter().zip(bytes).all(|(&(_, ch), &given)| given == ch || given == b'-');
        if !valid {
            return Err(Error::InvalidPermissions(pattern.to_owned()));
        }

        let text =
            ArrayString::from(pattern).map_err(|_| Error::InvalidPermissions(pattern.to_owned()))?;
        Ok(Self { text })
    }
}

impl fmt::Display for PermissionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
