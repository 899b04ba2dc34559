//! The only place that talks to `security(1)`.
//!
//! Reads go out as a plain argument vector. Writes go through `sh -c` with the note contents
//! embedded in a double-quoted word; the record name is handed over positionally.

use std::{
    fmt,
    future::Future,
    io,
    path::PathBuf,
    process::{Output, Stdio},
    string::FromUtf8Error,
    time::Duration,
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::{process::Command, time};

use crate::escape::escape_double_quoted;

/// `errSecItemNotFound`, what `security` exits with when there is no such note
pub const NOT_FOUND_STATUS: i32 = 44;

const NOTE_CLASS: &str = "note";
const NOTE_DESCRIPTION: &str = "secure note";

/// Where to find the tools the gateway shells out to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub security: PathBuf,
    pub shell: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            security: PathBuf::from("/usr/bin/security"),
            shell: PathBuf::from("/bin/sh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a process ended. A process killed by a signal has no exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Exit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl Exit {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit status {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub exit: Exit,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl From<Output> for Completion {
    fn from(output: Output) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&output.status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            exit: Exit {
                code: output.status.code(),
                signal,
            },
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("Could not start the process: {0}")]
    Spawn(#[source] io::Error),
    #[error("Could not collect the process output: {0}")]
    Wait(#[source] io::Error),
    #[error("The process did not finish in time and was killed")]
    TimedOut,
}

/// Runs an [`Invocation`] to completion.
///
/// A `timeout` of `None` waits for as long as the process runs. When the timeout expires the
/// process must be killed before returning [`RunError::TimedOut`].
pub trait CommandRunner {
    fn run(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Completion, RunError>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
    ) -> Result<Completion, RunError> {
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // dropping the wait future on timeout kills the child
            .kill_on_drop(true)
            .spawn()
            .map_err(RunError::Spawn)?;

        let output = match timeout {
            Some(limit) => time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_elapsed| RunError::TimedOut)?,
            None => child.wait_with_output().await,
        }
        .map_err(RunError::Wait)?;

        Ok(output.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Could not run `{program}` for keychain {operation}: {source}")]
    Spawn {
        operation: Operation,
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Lost track of the keychain {operation}: {source}")]
    Wait {
        operation: Operation,
        #[source]
        source: io::Error,
    },
    #[error("Keychain {operation} timed out after {timeout:?}")]
    Timeout {
        operation: Operation,
        timeout: Duration,
    },
    #[error("Keychain {operation} failed with {exit}: {stderr}")]
    Status {
        operation: Operation,
        exit: Exit,
        stderr: String,
    },
    #[error("Keychain {operation} printed something that is not UTF-8")]
    Output {
        operation: Operation,
        #[source]
        source: FromUtf8Error,
    },
}

impl StoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn from_run(
        operation: Operation,
        invocation: &Invocation,
        timeout: Option<Duration>,
        err: RunError,
    ) -> Self {
        match err {
            RunError::Spawn(source) => Self::Spawn {
                operation,
                program: invocation.program.display().to_string(),
                source,
            },
            RunError::Wait(source) => Self::Wait { operation, source },
            RunError::TimedOut => {
                warn!("Keychain {operation} exceeded {timeout:?} and was killed");
                Self::Timeout {
                    operation,
                    timeout: timeout.unwrap_or_default(),
                }
            }
        }
    }

    fn from_exit(operation: Operation, completion: Completion) -> Self {
        Self::Status {
            operation,
            exit: completion.exit,
            stderr: String::from_utf8_lossy(&completion.stderr).trim().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Hex dump exactly as `security` printed it
    Found(String),
    NotFound,
}

#[derive(Debug, Clone, Default)]
pub struct Keychain<R = SystemRunner> {
    config: GatewayConfig,
    runner: R,
}

impl Keychain<SystemRunner> {
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_runner(config, SystemRunner)
    }
}

impl<R: CommandRunner> Keychain<R> {
    pub fn with_runner(config: GatewayConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn read_invocation(&self, name: &str) -> Invocation {
        Invocation {
            program: self.config.security.clone(),
            args: vec![
                "find-generic-password".to_owned(),
                "-C".to_owned(),
                NOTE_CLASS.to_owned(),
                "-s".to_owned(),
                name.to_owned(),
                "-w".to_owned(),
            ],
        }
    }

    pub fn write_invocation(&self, name: &str, contents: &str) -> Invocation {
        // $0 is the security binary, $1 the record name. exec so a timeout kills the tool itself
        let script = format!(
            r#"exec "$0" add-generic-password -C {NOTE_CLASS} -D "{NOTE_DESCRIPTION}" -a "" -s "$1" -w "{}""#,
            escape_double_quoted(contents)
        );
        Invocation {
            program: self.config.shell.clone(),
            args: vec![
                "-c".to_owned(),
                script,
                self.config.security.display().to_string(),
                name.to_owned(),
            ],
        }
    }

    /// Fetch the note called `name`. A missing note is an outcome, everything else that is not
    /// a clean exit is a [`StoreError`].
    pub async fn read(&self, name: &str, timeout: Duration) -> Result<ReadOutcome, StoreError> {
        let invocation = self.read_invocation(name);
        debug!("Reading secure note {name}: `{invocation}`");

        let completion = self
            .runner
            .run(&invocation, Some(timeout))
            .await
            .map_err(|err| StoreError::from_run(Operation::Read, &invocation, Some(timeout), err))?;

        match completion.exit.code {
            Some(0) => String::from_utf8(completion.stdout)
                .map(ReadOutcome::Found)
                .map_err(|source| StoreError::Output {
                    operation: Operation::Read,
                    source,
                }),
            Some(NOT_FOUND_STATUS) => {
                debug!("Secure note {name} does not exist");
                Ok(ReadOutcome::NotFound)
            }
            _ => Err(StoreError::from_exit(Operation::Read, completion)),
        }
    }

    /// Add a secure note called `name` holding `contents`.
    pub async fn write(
        &self,
        name: &str,
        contents: &str,
        timeout: Option<Duration>,
    ) -> Result<(), StoreError> {
        let invocation = self.write_invocation(name, contents);
        debug!(
            "Writing secure note {name} ({} bytes) with {}",
            contents.len(),
            self.config.security.display()
        );

        let completion = self
            .runner
            .run(&invocation, timeout)
            .await
            .map_err(|err| StoreError::from_run(Operation::Write, &invocation, timeout, err))?;

        if completion.exit.code == Some(0) {
            Ok(())
        } else {
            Err(StoreError::from_exit(Operation::Write, completion))
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::{cell::RefCell, collections::VecDeque};

    use super::*;

    /// Replays canned completions and remembers every invocation it was asked to run
    #[derive(Default)]
    pub(crate) struct FakeRunner {
        responses: RefCell<VecDeque<Result<Completion, RunError>>>,
        calls: RefCell<Vec<(Invocation, Option<Duration>)>>,
    }

    impl FakeRunner {
        pub(crate) fn new(responses: impl IntoIterator<Item = Result<Completion, RunError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into_iter().collect()),
                calls: RefCell::default(),
            }
        }

        pub(crate) fn calls(&self) -> Vec<(Invocation, Option<Duration>)> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        async fn run(
            &self,
            invocation: &Invocation,
            timeout: Option<Duration>,
        ) -> Result<Completion, RunError> {
            self.calls.borrow_mut().push((invocation.clone(), timeout));
            self.responses
                .borrow_mut()
                .pop_front()
                .expect("FakeRunner ran out of responses")
        }
    }

    pub(crate) fn exited(code: i32, stdout: &str) -> Result<Completion, RunError> {
        Ok(Completion {
            exit: Exit::code(code),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        })
    }

    fn keychain(responses: impl IntoIterator<Item = Result<Completion, RunError>>) -> Keychain<FakeRunner> {
        Keychain::with_runner(GatewayConfig::default(), FakeRunner::new(responses))
    }

    #[test]
    fn read_invocation_is_an_argument_vector() {
        let keychain = keychain([]);
        let invocation = keychain.read_invocation("App \"prod\".env");
        assert_eq!(invocation.program, PathBuf::from("/usr/bin/security"));
        assert_eq!(
            invocation.args,
            vec!["find-generic-password", "-C", "note", "-s", "App \"prod\".env", "-w"]
        );
    }

    #[test]
    fn write_invocation_only_embeds_escaped_contents() {
        let keychain = keychain([]);
        let invocation = keychain.write_invocation("$(evil)", "X=\"1\"\\");
        assert_eq!(invocation.program, PathBuf::from("/bin/sh"));
        assert_eq!(
            invocation.args,
            vec![
                "-c".to_owned(),
                r#"exec "$0" add-generic-password -C note -D "secure note" -a "" -s "$1" -w "X=\"1\"\\""#
                    .to_owned(),
                "/usr/bin/security".to_owned(),
                "$(evil)".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn read_returns_output_verbatim() {
        let keychain = keychain([exited(0, "413d310a\n")]);
        let outcome = keychain.read("App.env", Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Found("413d310a\n".to_owned()));
        assert_eq!(keychain.runner().calls()[0].1, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn read_maps_not_found_status() {
        let keychain = keychain([exited(NOT_FOUND_STATUS, "")]);
        let outcome = keychain.read("App.env", Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome, ReadOutcome::NotFound);
    }

    #[tokio::test]
    async fn read_fails_on_other_status() {
        let keychain = keychain([Ok(Completion {
            exit: Exit::code(51),
            stdout: Vec::new(),
            stderr: b"User interaction is not allowed.\n".to_vec(),
        })]);
        let err = keychain.read("App.env", Duration::from_secs(5)).await.unwrap_err();
        match err {
            StoreError::Status {
                operation,
                exit,
                stderr,
            } => {
                assert_eq!(operation, Operation::Read);
                assert_eq!(exit, Exit::code(51));
                assert_eq!(stderr, "User interaction is not allowed.");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_fails_when_killed_by_signal() {
        let keychain = keychain([Ok(Completion {
            exit: Exit {
                code: None,
                signal: Some(9),
            },
            ..Completion::default()
        })]);
        let err = keychain.read("App.env", Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Keychain read failed with signal 9: "
        );
    }

    #[tokio::test]
    async fn read_timeout_is_a_store_error() {
        let keychain = keychain([Err(RunError::TimedOut)]);
        let err = keychain.read("App.env", Duration::from_millis(10)).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(
            err,
            StoreError::Timeout {
                operation: Operation::Read,
                timeout,
            } if timeout == Duration::from_millis(10)
        ));
    }

    #[tokio::test]
    async fn write_passes_timeout_through() {
        let keychain = keychain([exited(0, "")]);
        keychain
            .write("App.env", "X=1", Some(Duration::from_secs(2)))
            .await
            .unwrap();
        let calls = keychain.runner().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, Some(Duration::from_secs(2)));
        assert!(calls[0].0.args[1].ends_with(r#"-w "X=1""#));
    }

    #[tokio::test]
    async fn write_fails_on_duplicate_item() {
        // errSecDuplicateItem
        let keychain = keychain([exited(45, "")]);
        let err = keychain.write("App.env", "X=1", None).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Status {
                operation: Operation::Write,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn system_runner_collects_output() {
        let invocation = Invocation {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_owned(), "printf out; printf err >&2; exit 3".to_owned()],
        };
        let completion = SystemRunner
            .run(&invocation, Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(completion.exit, Exit::code(3));
        assert_eq!(completion.stdout, b"out");
        assert_eq!(completion.stderr, b"err");
    }

    #[tokio::test]
    async fn system_runner_kills_on_timeout() {
        let invocation = Invocation {
            program: PathBuf::from("sleep"),
            args: vec!["5".to_owned()],
        };
        let started = std::time::Instant::now();
        let result = SystemRunner
            .run(&invocation, Some(Duration::from_millis(100)))
            .await;
        assert!(matches!(result, Err(RunError::TimedOut)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn system_runner_reports_missing_program() {
        let invocation = Invocation {
            program: PathBuf::from("/nonexistent/security"),
            args: Vec::new(),
        };
        let result = SystemRunner.run(&invocation, None).await;
        assert!(matches!(result, Err(RunError::Spawn(_))));
    }
}
