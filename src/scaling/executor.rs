//! Child process execution.
//!
//! The [`CommandExecutor`] trait is the seam between chain logic and the
//! operating system. [`ShellExecutor`] is the production implementation;
//! tests use a recording mock so chain semantics can be checked without
//! spawning anything.
//!
//! Every invocation runs with the tool's own thread pool pinned to one thread
//! and, on Unix, an `RLIMIT_FSIZE` ceiling on the files it may write.

use std::ffi::OsString;
use std::io::Read;
use std::process::Stdio;
use thiserror::Error;

/// Environment applied to every scaler invocation. libvips reads
/// `VIPS_CONCURRENCY`; `IM_CONCURRENCY` covers ImageMagick delegates.
pub const SERIAL_ENV: &[(&str, &str)] = &[("VIPS_CONCURRENCY", "1"), ("IM_CONCURRENCY", "1")];

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to collect {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub env: Vec<(String, String)>,
    /// Ceiling on written file size, in KiB.
    pub max_file_size_kib: Option<u64>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            max_file_size_kib: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Pin the tool to serial execution.
    pub fn serial(mut self) -> Self {
        self.env.extend(
            SERIAL_ENV
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        self
    }

    pub fn max_file_size_kib(mut self, kib: u64) -> Self {
        self.max_file_size_kib = Some(kib);
        self
    }

    /// Shell-quoted rendering for logs.
    pub fn display(&self) -> String {
        let mut parts = vec![format!("\"{}\"", self.program)];
        parts.extend(
            self.args
                .iter()
                .map(|a| format!("\"{}\"", a.to_string_lossy())),
        );
        parts.join(" ")
    }
}

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Process exit code; `-1` when the process was killed by a signal
    /// (e.g. `SIGXFSZ` after exceeding the file size ceiling).
    pub exit_code: i32,
    /// Stdout and stderr, interleaved in the order they were written.
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs invocations to completion.
pub trait CommandExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<ExecOutput, ExecError>;
}

/// Executes invocations as real child processes, blocking until exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for ShellExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<ExecOutput, ExecError> {
        let spawn_error = |source: std::io::Error| ExecError::Spawn {
            program: invocation.program.clone(),
            source,
        };

        // stdout and stderr share one pipe, so the output reads as a
        // terminal would show it (`2>&1`).
        let (mut reader, writer) = std::io::pipe().map_err(spawn_error)?;
        let stderr_writer = writer.try_clone().map_err(spawn_error)?;

        let mut cmd = std::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer);

        if let Some(kib) = invocation.max_file_size_kib {
            limit_file_size(&mut cmd, kib);
        }

        tracing::debug!(command = %invocation.display(), "executing");
        let mut child = cmd.spawn().map_err(spawn_error)?;
        // The parent's copies of the write ends must close before reading
        // to EOF.
        drop(cmd);

        let mut raw = Vec::new();
        let read = reader.read_to_end(&mut raw);
        let status = child.wait().map_err(|source| ExecError::Wait {
            program: invocation.program.clone(),
            source,
        })?;
        read.map_err(|source| ExecError::Wait {
            program: invocation.program.clone(),
            source,
        })?;

        Ok(ExecOutput {
            exit_code: status.code().unwrap_or(-1),
            output: String::from_utf8_lossy(&raw).into_owned(),
        })
    }
}

#[cfg(unix)]
fn limit_file_size(cmd: &mut std::process::Command, kib: u64) {
    use std::os::unix::process::CommandExt;

    let bytes = kib.saturating_mul(1024) as libc::rlim_t;
    // SAFETY: the closure only calls setrlimit, which is async-signal-safe.
    unsafe {
        cmd.pre_exec(move || {
            let limit = libc::rlimit {
                rlim_cur: bytes,
                rlim_max: bytes,
            };
            if libc::setrlimit(libc::RLIMIT_FSIZE, &limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn limit_file_size(_cmd: &mut std::process::Command, _kib: u64) {
    tracing::trace!("file size limits are not supported on this platform");
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Mock executor that records invocations and replays scripted results.
    ///
    /// With `touch_outputs`, the path following `-o` is created before the
    /// scripted result is returned, like a tool that wrote (part of) its
    /// output.
    #[derive(Default)]
    pub struct MockExecutor {
        pub results: Mutex<VecDeque<ExecOutput>>,
        pub invocations: Mutex<Vec<Invocation>>,
        pub touch_outputs: bool,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every invocation succeeds and writes its output file.
        pub fn succeeding() -> Self {
            Self {
                touch_outputs: true,
                ..Self::default()
            }
        }

        pub fn with_results(results: Vec<ExecOutput>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                invocations: Mutex::new(Vec::new()),
                touch_outputs: true,
            }
        }

        pub fn get_invocations(&self) -> Vec<Invocation> {
            self.invocations.lock().unwrap().clone()
        }
    }

    pub fn ok() -> ExecOutput {
        ExecOutput {
            exit_code: 0,
            output: String::new(),
        }
    }

    pub fn fail(code: i32, text: &str) -> ExecOutput {
        ExecOutput {
            exit_code: code,
            output: text.to_string(),
        }
    }

    /// Path after `-o`, with any `[...]` option suffix removed.
    pub fn output_path(invocation: &Invocation) -> Option<PathBuf> {
        let pos = invocation.args.iter().position(|a| a == "-o")?;
        let raw = invocation.args.get(pos + 1)?.to_string_lossy().into_owned();
        let path = raw.split_once('[').map(|(p, _)| p).unwrap_or(&raw);
        Some(PathBuf::from(path))
    }

    impl CommandExecutor for MockExecutor {
        fn execute(&self, invocation: &Invocation) -> Result<ExecOutput, ExecError> {
            self.invocations.lock().unwrap().push(invocation.clone());
            if self.touch_outputs {
                if let Some(path) = output_path(invocation) {
                    std::fs::write(&path, b"thumb").unwrap();
                }
            }
            Ok(self.results.lock().unwrap().pop_front().unwrap_or_else(ok))
        }
    }

    #[test]
    fn mock_records_invocations() {
        let exec = MockExecutor::new();
        let inv = Invocation::new("vipsthumbnail").arg("/in.png").serial();
        exec.execute(&inv).unwrap();
        let recorded = exec.get_invocations();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].program, "vipsthumbnail");
    }

    #[test]
    fn serial_sets_concurrency_env() {
        let inv = Invocation::new("vipsthumbnail").serial();
        assert!(
            inv.env
                .contains(&("VIPS_CONCURRENCY".to_string(), "1".to_string()))
        );
        assert!(inv.env.contains(&("IM_CONCURRENCY".to_string(), "1".to_string())));
    }

    #[test]
    fn output_path_strips_option_suffix() {
        let inv = Invocation::new("x").args(["/in.png", "-o", "/out.png[strip=true]"]);
        assert_eq!(output_path(&inv), Some(PathBuf::from("/out.png")));
    }

    #[test]
    fn display_quotes_every_part() {
        let inv = Invocation::new("vipsthumbnail").args(["/in.png", "--size=10x10"]);
        assert_eq!(inv.display(), r#""vipsthumbnail" "/in.png" "--size=10x10""#);
    }

    #[test]
    fn shell_executor_reports_spawn_failure() {
        let inv = Invocation::new("/nonexistent/thumbro-test-binary");
        let err = ShellExecutor::new().execute(&inv).unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_captures_exit_code_and_stderr() {
        let inv = Invocation::new("sh")
            .args(["-c", "echo out; echo bad input >&2; exit 3"])
            .serial()
            .max_file_size_kib(1024);
        let result = ShellExecutor::new().execute(&inv).unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.output, "out\nbad input\n");
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_interleaves_stdout_and_stderr() {
        let inv = Invocation::new("sh").args(["-c", "echo a; echo b >&2; echo c"]);
        let result = ShellExecutor::new().execute(&inv).unwrap();
        assert_eq!(result.output, "a\nb\nc\n");
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_passes_environment() {
        let inv = Invocation::new("sh")
            .args(["-c", "printf %s \"$VIPS_CONCURRENCY\""])
            .serial();
        let result = ShellExecutor::new().execute(&inv).unwrap();
        assert!(result.success());
        assert_eq!(result.output, "1");
    }
}
