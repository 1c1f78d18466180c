//! Error types for `permfind`

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Custom result type for `permfind` operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for `permfind`
///
/// Every message follows `Error: <message>. <system-reason>.` except
/// [`Error::AccessDenied`], which is only a warning.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed command line
    #[error("Error: {0}.")]
    Usage(String),

    /// Permission pattern is not a valid `rwxrwxrwx` string
    #[error("Error: Permissions string '{0}' is invalid.")]
    InvalidPermissions(String),

    /// Path could not be canonicalized
    #[error("Error: Cannot get full path of directory '{}'. {}.", .path.display(), reason(.source))]
    PathResolution {
        /// Path as given
        path:   PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// Path exists but is not a directory
    #[error("Error: '{}' is not a directory path.", .0.display())]
    NotADirectory(PathBuf),

    /// Directory could not be opened for lack of permission
    #[error("Cannot open directory {}. {}.", .path.display(), reason(.source))]
    AccessDenied {
        /// Directory that was skipped
        path:   PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// Directory could not be opened
    #[error("Error: Cannot open directory '{}'. {}.", .path.display(), reason(.source))]
    OpenDir {
        /// Directory that failed to open
        path:   PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// Directory listing failed part way through
    #[error("Error: Cannot read directory '{}'. {}.", .path.display(), reason(.source))]
    ReadDir {
        /// Directory being listed
        path:   PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// Entry metadata could not be read
    #[error("Error: Cannot lstat '{}'. {}.", .path.display(), reason(.source))]
    Stat {
        /// Entry path
        path:   PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// Assembled path exceeds the buffer maximum
    #[error("Error: Path '{}' exceeds the maximum length of {max} bytes.", .path.display())]
    PathTooLong {
        /// Path that would have been built
        path: PathBuf,
        /// Maximum length in bytes
        max:  usize,
    },

    /// Pipeline was given no stages
    #[error("Error: Pipeline has no stages.")]
    EmptyPipeline,

    /// Subprocess could not be started
    #[error("Error: Failed to spawn {stage}. {}.", reason(.source))]
    Spawn {
        /// Stage name
        stage:  String,
        /// Underlying failure
        source: io::Error,
    },

    /// Waiting on a subprocess failed
    #[error("Error: Failed to wait for {stage}. {}.", reason(.source))]
    Wait {
        /// Stage name
        stage:  String,
        /// Underlying failure
        source: io::Error,
    },

    /// Reading the output of the last stage failed
    #[error("Error: Failed to read from {stage} pipe. {}.", reason(.source))]
    Drain {
        /// Stage name
        stage:  String,
        /// Underlying failure
        source: io::Error,
    },

    /// IO operation failed
    #[error("Error: Failed to write output. {}.", reason(.0))]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether traversal can continue after this error
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    /// Process exit code for this error
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.is_recoverable() { 0 } else { 1 }
    }
}

/// OS error text without the trailing `(os error N)`
fn reason(err: &io::Error) -> String {
    let text = err.to_string();
    match text.rfind(" (os error ") {
        Some(idx) => text[..idx].to_owned(),
        None => text,
    }
}
