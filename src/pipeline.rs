//! Subprocess pipeline: walker output through an external sort

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{DRAIN_CHUNK, SUMMARY_PREFIX};

/// One subprocess in a chain
///
/// Each stage reads the stdout of the stage before it. The first stage
/// inherits stdin; the last stage's stdout is read by the orchestrator.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Name used in diagnostics
    name:    String,
    /// Program to execute
    program: OsString,
    /// Arguments passed to the program
    args:    Vec<OsString>,
    /// Extra environment variables
    envs:    Vec<(OsString, OsString)>,
}

impl Stage {
    /// Create a stage running `program` with no arguments
    #[must_use]
    pub fn new(name: impl Into<String>, program: impl Into<OsString>) -> Self {
        Self { name: name.into(), program: program.into(), args: Vec::new(), envs: Vec::new() }
    }

    /// Append arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for this stage only
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Name used in diagnostics
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(self.envs.iter().map(|(k, v)| (k, v)));
        cmd
    }
}

/// How a stage ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited with a status code
    Exited(i32),
    /// Killed or stopped by a signal
    Signaled(i32),
}

/// Recorded status of one finished stage
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Stage name
    pub name:   String,
    /// Raw wait status
    pub status: ExitStatus,
}

impl StageOutcome {
    /// Whether the stage exited with status 0
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status.success()
    }

    /// Exit code or terminating signal
    #[must_use]
    pub fn termination(&self) -> Termination {
        match (self.status.code(), self.status.signal()) {
            (Some(code), _) => Termination::Exited(code),
            (None, Some(signal)) => Termination::Signaled(signal),
            (None, None) => Termination::Signaled(self.status.stopped_signal().unwrap_or(0)),
        }
    }
}

/// A running chain of stages
#[derive(Debug)]
pub struct Chain {
    /// Spawned stages in chain order
    children: Vec<(String, Child)>,
    /// Read end of the last stage's stdout
    output:   ChildStdout,
}

impl Chain {
    /// Name of the last stage
    fn last_name(&self) -> &str {
        self.children.last().map_or("", |(name, _)| name.as_str())
    }

    /// Read end of the last stage's stdout
    pub fn output(&mut self) -> &mut ChildStdout {
        &mut self.output
    }

    /// Close the output and wait for every stage in chain order
    ///
    /// # Errors
    /// Returns [`Error::Wait`] for the first stage that could not be waited
    /// on. The remaining stages are still reaped.
    pub fn wait(self) -> Result<Vec<StageOutcome>> {
        drop(self.output);

        let mut outcomes = Vec::with_capacity(self.children.len());
        let mut failure = None;
        for (name, mut child) in self.children {
            match child.wait() {
                Ok(status) => {
                    debug!(stage = %name, %status, "stage finished");
                    outcomes.push(StageOutcome { name, status });
                },
                Err(source) => {
                    if failure.is_none() {
                        failure = Some(Error::Wait { stage: name, source });
                    }
                },
            }
        }
        failure.map_or(Ok(outcomes), Err)
    }
}

/// Spawn `stages` connected stdout to stdin
///
/// Every stage is started before this returns and nothing is waited on.
/// The orchestrator keeps only the read end of the last stage's stdout.
///
/// # Errors
/// Returns [`Error::EmptyPipeline`] for an empty slice and [`Error::Spawn`] if
/// any stage fails to start. Stages already started are killed and reaped.
pub fn spawn_chain(stages: &[Stage]) -> Result<Chain> {
    if stages.is_empty() {
        return Err(Error::EmptyPipeline);
    }

    let mut children: Vec<(String, Child)> = Vec::with_capacity(stages.len());
    let mut upstream: Option<ChildStdout> = None;

    for stage in stages {
        let mut cmd = stage.command();
        cmd.stdout(Stdio::piped());
        if let Some(read_end) = upstream.take() {
            cmd.stdin(Stdio::from(read_end));
        }

        let spawned = cmd.spawn();
        // releases our copy of the upstream read end
        drop(cmd);

        match spawned {
            Ok(mut child) => {
                debug!(stage = %stage.name, pid = child.id(), "stage spawned");
                upstream = child.stdout.take();
                children.push((stage.name.clone(), child));
            },
            Err(source) => {
                abort(children);
                return Err(Error::Spawn { stage: stage.name.clone(), source });
            },
        }
    }

    match upstream {
        Some(output) => Ok(Chain { children, output }),
        None => {
            let stage = children.last().map(|(name, _)| name.clone()).unwrap_or_default();
            abort(children);
            Err(Error::Spawn { stage, source: io::Error::other("stdout was not captured") })
        },
    }
}

/// Kill and reap stages after a failed spawn
fn abort(children: Vec<(String, Child)>) {
    for (name, mut child) in children {
        debug!(stage = %name, "aborting stage");
        let _ = child.kill();
        let _ = child.wait();
    }
}

/// Copy everything from `input` to `out`, counting newlines
///
/// Read failures are reported against `stage`; write failures as [`Error::Io`].
fn drain<R: Read, W: Write>(stage: &str, input: &mut R, out: &mut W) -> Result<usize> {
    let mut buf = [0_u8; DRAIN_CHUNK];
    let mut records = 0;
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => return Ok(records),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(Error::Drain { stage: stage.to_owned(), source }),
        };
        let chunk = &buf[..n];
        out.write_all(chunk)?;
        records += chunk.iter().filter(|&&b| b == b'\n').count();
    }
}

/// Outcome of a finished pipeline
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Outcome of each stage in chain order
    stages:   Vec<StageOutcome>,
    /// Newline-terminated records forwarded
    records:  usize,
    /// Whether the caller asked for no summary
    suppress: bool,
}

impl PipelineResult {
    /// Outcome of each stage in chain order
    #[must_use]
    pub fn stages(&self) -> &[StageOutcome] {
        &self.stages
    }

    /// Number of newline-terminated records forwarded
    #[must_use]
    pub const fn records(&self) -> usize {
        self.records
    }

    /// Whether every stage exited with status 0
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.stages.iter().all(StageOutcome::succeeded)
    }

    /// Summary line, unless suppressed or a stage failed
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        (!self.suppress && self.all_succeeded()).then(|| format!("{SUMMARY_PREFIX}{}", self.records))
    }
}

/// Runs a chain of stages and reports the number of records it produced
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Stages in chain order
    stages:   Vec<Stage>,
    /// Never print the summary line
    suppress: bool,
}

impl Pipeline {
    /// Create a pipeline from stages in chain order
    #[must_use]
    pub const fn new(stages: Vec<Stage>) -> Self {
        Self { stages, suppress: false }
    }

    /// Suppress the summary line
    #[must_use]
    pub const fn suppress_summary(mut self, suppress: bool) -> Self {
        self.suppress = suppress;
        self
    }

    /// Run the pipeline, forwarding the last stage's output to `out`
    ///
    /// All stages are spawned first, then the output is drained, then the
    /// stages are reaped in order. A failing stage only suppresses the
    /// summary; whatever it produced is still forwarded.
    ///
    /// # Errors
    /// Returns error if:
    /// - A stage cannot be spawned or waited on
    /// - Reading the last stage's output fails
    /// - Writing to `out` fails
    pub fn run<W: Write>(&self, out: &mut W) -> Result<PipelineResult> {
        let mut chain = spawn_chain(&self.stages)?;
        let last = chain.last_name().to_owned();

        let drained = drain(&last, chain.output(), out);
        debug!("output drained");

        // reap every stage before reporting a drain failure
        let stages = chain.wait()?;
        let records = drained?;

        let result = PipelineResult { stages, records, suppress: self.suppress };
        if let Some(line) = result.summary() {
            writeln!(out, "{line}")?;
        }
        out.flush()?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(name: &str, script: &str) -> Stage {
        Stage::new(name, "sh").args(["-c", script])
    }

    fn sort() -> Stage {
        Stage::new("sort", "sort").env("LC_ALL", "C")
    }

    fn run(pipeline: &Pipeline) -> (String, PipelineResult) {
        let mut out = Vec::new();
        let result = pipeline.run(&mut out).unwrap();
        (String::from_utf8(out).unwrap(), result)
    }

    #[test]
    fn test_sorted_output_with_summary() {
        let pipeline = Pipeline::new(vec![sh("producer", "printf '/b\\n/a\\n/c\\n'"), sort()]);
        let (out, result) = run(&pipeline);

        assert_eq!(out, "/a\n/b\n/c\nTotal Matches: 3\n");
        assert_eq!(result.records(), 3);
        assert!(result.all_succeeded());
        assert_eq!(result.stages().len(), 2);
        assert_eq!(result.stages()[0].name, "producer");
    }

    #[test]
    fn test_empty_output_counts_zero() {
        let pipeline = Pipeline::new(vec![sh("producer", "true"), sort()]);
        let (out, result) = run(&pipeline);

        assert_eq!(out, "Total Matches: 0\n");
        assert_eq!(result.records(), 0);
    }

    #[test]
    fn test_suppressed_summary() {
        let pipeline =
            Pipeline::new(vec![sh("producer", "printf 'x\\n'"), sort()]).suppress_summary(true);
        let (out, result) = run(&pipeline);

        assert_eq!(out, "x\n");
        assert_eq!(result.summary(), None);
    }

    #[test]
    fn test_failed_producer_still_forwards_output() {
        let pipeline = Pipeline::new(vec![sh("producer", "printf 'kept\\n'; exit 1"), sort()]);
        let (out, result) = run(&pipeline);

        assert_eq!(out, "kept\n");
        assert_eq!(result.records(), 1);
        assert_eq!(result.stages()[0].termination(), Termination::Exited(1));
        assert!(result.summary().is_none());
    }

    #[test]
    fn test_killed_filter_omits_summary() {
        let filter = sh("sort", "LC_ALL=C sort; kill -KILL $$");
        let pipeline = Pipeline::new(vec![sh("producer", "printf 'b\\na\\n'"), filter]);
        let (out, result) = run(&pipeline);

        assert_eq!(out, "a\nb\n");
        assert_eq!(result.records(), 2);
        assert_eq!(result.stages()[1].termination(), Termination::Signaled(9));
        assert!(!result.all_succeeded());
    }

    #[test]
    fn test_output_larger_than_pipe_buffer() {
        const LINES: usize = 200_000;

        let pipeline = Pipeline::new(vec![sh("producer", "seq 1 200000"), sort()]);
        let mut out = Vec::new();
        let result = pipeline.run(&mut out).unwrap();

        assert!(out.len() > 1024 * 1024);
        assert_eq!(result.records(), LINES);
        assert!(out.ends_with(format!("Total Matches: {LINES}\n").as_bytes()));
    }

    #[test]
    fn test_partial_last_line_is_not_counted() {
        let pipeline = Pipeline::new(vec![sh("producer", "printf 'one\\ntwo'")]);
        let (out, result) = run(&pipeline);

        assert_eq!(out, "one\ntwoTotal Matches: 1\n");
        assert_eq!(result.records(), 1);
    }

    #[test]
    fn test_spawn_failure_kills_started_stages() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let marker = temp_dir.path().join("producer-finished");
        let script = format!("sleep 1; touch '{}'", marker.display());

        let missing = Stage::new("sort", "/nonexistent/permfind-test-sorter");
        let pipeline = Pipeline::new(vec![sh("producer", &script), missing]);

        match pipeline.run(&mut Vec::new()) {
            Err(Error::Spawn { stage, .. }) => assert_eq!(stage, "sort"),
            other => panic!("Expected Spawn error, got {other:?}"),
        }

        std::thread::sleep(std::time::Duration::from_millis(2_000));
        assert!(!marker.exists(), "producer kept running after the chain was aborted");
    }

    #[test]
    fn test_spawn_chain_reaps_on_failure() {
        let stages = [
            sh("producer", "sleep 30"),
            Stage::new("sort", "/nonexistent/permfind-test-sorter"),
        ];
        let started = std::time::Instant::now();

        assert!(matches!(spawn_chain(&stages), Err(Error::Spawn { .. })));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[test]
    fn test_empty_pipeline() {
        assert!(matches!(Pipeline::new(Vec::new()).run(&mut Vec::new()), Err(Error::EmptyPipeline)));
    }

    #[test]
    fn test_write_failure_is_reported_after_reaping() {
        struct Closed;

        impl Write for Closed {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let pipeline = Pipeline::new(vec![sh("producer", "printf 'x\\n'"), sort()]);
        assert!(matches!(pipeline.run(&mut Closed), Err(Error::Io(_))));
    }
}
