//! Common types and constants for `permfind`

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Maximum path length in bytes (Linux `PATH_MAX`)
pub const MAX_PATH_LENGTH: usize = 4_096;

/// Length of an `rwxrwxrwx` permission string
pub const PERMISSION_LEN: usize = 9;

/// Maximum number of command line arguments the walker accepts
pub const MAX_ARGS: usize = 5;

/// Prefix of the pipeline's summary line
pub const SUMMARY_PREFIX: &str = "Total Matches: ";

/// Chunk size used when draining the last pipeline stage
pub const DRAIN_CHUNK: usize = 8_192;

const _: () = {
    assert!(MAX_PATH_LENGTH > 0);
    assert!(PERMISSION_LEN == 9);
    assert!(DRAIN_CHUNK > 0);
};

/// Length-checked path assembly buffer
///
/// Holds the absolute path of the entry being examined. Names are appended
/// with [`PathBuffer::push`] and removed again with [`PathBuffer::truncate`],
/// so the buffer never reallocates past `max` bytes.
#[derive(Debug, Clone)]
pub struct PathBuffer {
    /// Raw path bytes
    buf: Vec<u8>,
    /// Maximum length in bytes
    max: usize,
}

impl PathBuffer {
    /// Create an empty buffer with the given maximum length
    #[must_use]
    pub fn with_max(max: usize) -> Self {
        Self { buf: Vec::with_capacity(max.min(MAX_PATH_LENGTH)), max }
    }

    /// Replace the contents with `path`
    ///
    /// # Errors
    /// Returns [`Error::PathTooLong`] if `path` is longer than the maximum.
    pub fn reset(&mut self, path: &Path) -> Result<()> {
        let bytes = path.as_os_str().as_bytes();
        if bytes.len() > self.max {
            return Err(Error::PathTooLong { path: path.to_path_buf(), max: self.max });
        }
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Append a single path component, returning the length before the append
    ///
    /// # Errors
    /// Returns [`Error::PathTooLong`] if the joined path would exceed the
    /// maximum. The buffer is left unchanged in that case.
    pub fn push(&mut self, name: &OsStr) -> Result<usize> {
        let mark = self.buf.len();
        let needs_sep = !self.buf.ends_with(b"/");
        let new_len = mark + usize::from(needs_sep) + name.len();
        if new_len > self.max {
            let mut path = self.as_path().to_path_buf();
            path.push(name);
            return Err(Error::PathTooLong { path, max: self.max });
        }
        if needs_sep {
            self.buf.push(b'/');
        }
        self.buf.extend_from_slice(name.as_bytes());
        Ok(mark)
    }

    /// Cut the buffer back to `len` bytes
    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    /// Current length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer holds no path
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Maximum length in bytes
    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Borrow the buffer as a path
    #[must_use]
    pub fn as_path(&self) -> &Path {
        Path::new(OsStr::from_bytes(&self.buf))
    }

    /// Copy the buffer into an owned path
    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        self.as_path().to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_truncate() {
        let mut buf = PathBuffer::with_max(64);
        buf.reset(Path::new("/tmp/root")).unwrap();

        let mark = buf.push(OsStr::new("child")).unwrap();
        assert_eq!(mark, "/tmp/root".len());
        assert_eq!(buf.as_path(), Path::new("/tmp/root/child"));

        buf.truncate(mark);
        assert_eq!(buf.as_path(), Path::new("/tmp/root"));
    }

    #[test]
    fn test_push_onto_filesystem_root() {
        let mut buf = PathBuffer::with_max(64);
        buf.reset(Path::new("/")).unwrap();

        buf.push(OsStr::new("etc")).unwrap();
        assert_eq!(buf.as_path(), Path::new("/etc"));
    }

    #[test]
    fn test_push_at_exact_limit() {
        let mut buf = PathBuffer::with_max(6);
        buf.reset(Path::new("/ab")).unwrap();

        buf.push(OsStr::new("cd")).unwrap();
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn test_push_past_limit_leaves_buffer_untouched() {
        let mut buf = PathBuffer::with_max(6);
        buf.reset(Path::new("/ab")).unwrap();

        match buf.push(OsStr::new("cde")) {
            Err(Error::PathTooLong { path, max }) => {
                assert_eq!(path, Path::new("/ab/cde"));
                assert_eq!(max, 6);
            },
            other => panic!("Expected PathTooLong error, got {other:?}"),
        }
        assert_eq!(buf.as_path(), Path::new("/ab"));
    }

    #[test]
    fn test_reset_rejects_long_root() {
        let mut buf = PathBuffer::with_max(4);
        assert!(matches!(buf.reset(Path::new("/abcd")), Err(Error::PathTooLong { .. })));
        assert!(buf.is_empty());
    }
}
