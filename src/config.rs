//! Pipeline configuration resolved from the environment

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::Result;
use crate::pipeline::Stage;

/// Overrides the walker executable
pub const WALKER_ENV: &str = "PERMFIND_WALKER";

/// Overrides the sort executable
pub const SORT_ENV: &str = "PERMFIND_SORT";

/// Walker executable expected next to the pipeline binary
pub const WALKER_BIN: &str = "permfind";

/// Default sort program, looked up on `PATH`
pub const SORT_BIN: &str = "sort";

/// Arguments that make the walker print usage instead of paths
pub const HELP_FLAGS: [&str; 2] = ["-h", "--help"];

/// Whether forwarded `args` ask the walker for usage text
///
/// The pipeline prints no summary in that case, since the lines it counted
/// are usage rather than matches.
#[must_use]
pub fn requests_help(args: &[OsString]) -> bool {
    args.iter().any(|arg| HELP_FLAGS.iter().any(|flag| arg == flag))
}

/// Programs the pipeline runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Walker executable
    pub walker: OsString,
    /// Sort executable
    pub sorter: OsString,
}

impl PipelineConfig {
    /// Resolve programs from `PERMFIND_WALKER` and `PERMFIND_SORT`
    ///
    /// # Errors
    /// Returns error if the walker is not overridden and the path of the
    /// running executable cannot be determined.
    pub fn from_env() -> Result<Self> {
        Self::resolve(env::var_os(WALKER_ENV), env::var_os(SORT_ENV), env::current_exe)
    }

    fn resolve(
        walker: Option<OsString>,
        sorter: Option<OsString>,
        current_exe: impl FnOnce() -> std::io::Result<PathBuf>,
    ) -> Result<Self> {
        let walker = match walker {
            Some(walker) => walker,
            None => current_exe()?.with_file_name(WALKER_BIN).into_os_string(),
        };
        let sorter = sorter.unwrap_or_else(|| OsString::from(SORT_BIN));
        Ok(Self { walker, sorter })
    }

    /// Walker stage receiving `args`, followed by the sort stage
    ///
    /// Sorting runs under `LC_ALL=C` so the order is plain byte order.
    #[must_use]
    pub fn stages(&self, args: Vec<OsString>) -> Vec<Stage> {
        vec![
            Stage::new("permfind", self.walker.clone()).args(args),
            Stage::new("sort", self.sorter.clone()).env("LC_ALL", "C"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults_use_sibling_walker() {
        let config =
            PipelineConfig::resolve(None, None, || Ok(PathBuf::from("/opt/bin/permfind-pipe")))
                .unwrap();
        assert_eq!(config.walker, OsString::from("/opt/bin/permfind"));
        assert_eq!(config.sorter, OsString::from("sort"));
    }

    #[test]
    fn test_overrides_win() {
        let config = PipelineConfig::resolve(
            Some("/usr/local/bin/walk".into()),
            Some("/usr/bin/sort".into()),
            || Err(io::Error::other("not consulted")),
        )
        .unwrap();
        assert_eq!(config.walker, OsString::from("/usr/local/bin/walk"));
        assert_eq!(config.sorter, OsString::from("/usr/bin/sort"));
    }

    #[test]
    fn test_missing_current_exe() {
        let result = PipelineConfig::resolve(None, None, || Err(io::Error::other("unknown")));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_help_flags_are_recognized() {
        let args = |list: &[&str]| list.iter().map(OsString::from).collect::<Vec<_>>();

        assert!(requests_help(&args(&["-h"])));
        assert!(requests_help(&args(&["-d", "/tmp", "--help"])));
        assert!(!requests_help(&args(&["-d", "/tmp", "-p", "rw-r--r--"])));
        assert!(!requests_help(&args(&["-d", "-help", "-p", "rw-r--r--"])));
        assert!(!requests_help(&[]));
    }

    #[test]
    fn test_stages_forward_arguments() {
        let config = PipelineConfig { walker: "walk".into(), sorter: "sort".into() };
        let stages = config.stages(vec!["-d".into(), "/tmp".into()]);
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].name(), "permfind");
        assert_eq!(stages[1].name(), "sort");
    }
}
