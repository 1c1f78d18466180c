//! Directory crawler implementation

use std::fs::{self, ReadDir};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::permission::PermissionSpec;
use crate::types::{MAX_PATH_LENGTH, PathBuffer};

/// Depth-first crawler yielding files whose permissions match a pattern
///
/// Pending directories live on an explicit stack, so tree depth is bounded by
/// heap memory rather than the call stack. At most one directory handle is
/// open at a time. Symbolic links are examined but never followed.
///
/// Iteration yields `Ok(path)` for every match. A directory that cannot be
/// opened for lack of permission yields a recoverable
/// [`Error::AccessDenied`] and the walk carries on; any other error is
/// yielded once and ends the walk.
#[derive(Debug)]
pub struct Crawler {
    /// Pattern entries must match
    spec:        PermissionSpec,
    /// Directories waiting to be opened
    pending:     Vec<PathBuf>,
    /// Directory currently being listed
    current:     Option<ReadDir>,
    /// Path of the entry being examined
    buf:         PathBuffer,
    /// Length of the current directory's path inside `buf`
    dir_len:     usize,
    /// Number of entries examined
    entry_count: usize,
    /// Number of matches yielded
    match_count: usize,
    /// Number of directories opened
    dir_count:   usize,
    /// Set once the walk is exhausted or hit a fatal error
    finished:    bool,
}

impl Crawler {
    /// Create a new crawler rooted at the canonical form of `root`
    ///
    /// # Errors
    /// Returns error if:
    /// - `root` cannot be canonicalized
    /// - The canonical path exceeds `MAX_PATH_LENGTH`
    pub fn new(root: &Path, spec: PermissionSpec) -> Result<Self> {
        let root = canonicalize(root)?;

        let mut buf = PathBuffer::with_max(MAX_PATH_LENGTH);
        buf.reset(&root)?;

        debug!(root = %root.display(), %spec, "starting walk");

        Ok(Self {
            spec,
            pending: vec![root],
            current: None,
            buf,
            dir_len: 0,
            entry_count: 0,
            match_count: 0,
            dir_count: 0,
            finished: false,
        })
    }

    /// Limit assembled paths to `max` bytes instead of `MAX_PATH_LENGTH`
    ///
    /// # Errors
    /// Returns [`Error::PathTooLong`] if the root itself is longer than `max`.
    pub fn with_max_path_length(mut self, max: usize) -> Result<Self> {
        let mut buf = PathBuffer::with_max(max);
        for dir in &self.pending {
            buf.reset(dir)?;
        }
        self.buf = buf;
        Ok(self)
    }

    /// Get the current progress of the crawl
    ///
    /// Returns a tuple of:
    /// - Number of entries examined so far
    /// - Number of matches yielded
    /// - Number of directories opened
    #[must_use = "Progress information should be used for monitoring"]
    pub const fn progress(&self) -> (usize, usize, usize) {
        (self.entry_count, self.match_count, self.dir_count)
    }

    /// Advance to the next match
    fn advance(&mut self) -> Result<Option<PathBuf>> {
        loop {
            let Some(entries) = self.current.as_mut() else {
                let Some(dir) = self.pending.pop() else {
                    return Ok(None);
                };
                self.open(dir)?;
                continue;
            };

            self.buf.truncate(self.dir_len);
            let Some(entry) = entries.next() else {
                self.current = None;
                continue;
            };
            let entry = entry.map_err(|source| Error::ReadDir {
                path: self.buf.as_path().to_path_buf(),
                source,
            })?;

            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }

            self.buf.push(&name)?;
            self.entry_count += 1;

            let meta = fs::symlink_metadata(self.buf.as_path())
                .map_err(|source| Error::Stat { path: self.buf.to_path_buf(), source })?;
            trace!(path = %self.buf.as_path().display(), mode = meta.mode(), "examined entry");

            if meta.is_dir() {
                self.pending.push(self.buf.to_path_buf());
            } else if self.spec.matches(meta.mode()) {
                self.match_count += 1;
                return Ok(Some(self.buf.to_path_buf()));
            }
        }
    }

    /// Open `dir` and make it the directory being listed
    fn open(&mut self, dir: PathBuf) -> Result<()> {
        self.buf.reset(&dir)?;
        self.dir_len = self.buf.len();

        match fs::read_dir(&dir) {
            Ok(entries) => {
                self.current = Some(entries);
                self.dir_count += 1;
                Ok(())
            },
            Err(source) => Err(open_error(dir, source)),
        }
    }
}

impl Iterator for Crawler {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.advance() {
            Ok(Some(path)) => Some(Ok(path)),
            Ok(None) => {
                self.finished = true;
                let (entries, matches, dirs) = self.progress();
                debug!(entries, matches, dirs, "walk complete");
                None
            },
            Err(err) => {
                if !err.is_recoverable() {
                    self.finished = true;
                    self.current = None;
                    self.pending.clear();
                }
                Some(Err(err))
            },
        }
    }
}

impl std::iter::FusedIterator for Crawler {}

/// Canonicalize `path` and check that it is a directory
///
/// # Errors
/// Returns error if:
/// - `path` cannot be canonicalized
/// - The canonical path is not a directory
pub fn validate_directory(path: &Path) -> Result<PathBuf> {
    let canonical = canonicalize(path)?;
    let meta = fs::metadata(&canonical)
        .map_err(|source| Error::Stat { path: canonical.clone(), source })?;
    if !meta.is_dir() {
        return Err(Error::NotADirectory(path.to_path_buf()));
    }
    Ok(canonical)
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|source| Error::PathResolution { path: path.to_path_buf(), source })
}

/// Classify a failure to open a directory
fn open_error(path: PathBuf, source: io::Error) -> Error {
    if source.kind() == io::ErrorKind::PermissionDenied {
        Error::AccessDenied { path, source }
    } else {
        Error::OpenDir { path, source }
    }
}
