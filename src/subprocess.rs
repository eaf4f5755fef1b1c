use std::io::Read;
use std::process::{Child, ChildStdin, ChildStdout, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::ExitError;

/// Errors from launching or waiting on an external program.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{program} not found")]
    NotFound { program: String },

    #[error("running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },

    #[error("{program} failed (exit {code}): {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },
}

impl ToolError {
    fn from_io(program: &str, e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound {
                program: program.to_string(),
            }
        } else {
            Self::Io {
                program: program.to_string(),
                source: e,
            }
        }
    }
}

impl From<ToolError> for ExitError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::NotFound { program } => Self::ToolNotFound { tool: program },
            ToolError::Timeout {
                program,
                timeout_secs,
            } => Self::Other(format!("{program} timed out after {timeout_secs}s")),
            ToolError::Failed {
                program,
                code,
                stderr,
            } => Self::ToolFailed {
                tool: program,
                code,
                message: stderr,
            },
            ToolError::Io { program, source } => Self::Other(format!("running {program}: {source}")),
        }
    }
}

/// Result of running a subprocess.
#[derive(Debug)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl RunOutput {
    /// Returns true if the process exited successfully.
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Builder for running external programs.
#[derive(Debug, Clone)]
pub struct Tool {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl Tool {
    /// Create a new tool invocation.
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            envs: Vec::new(),
            timeout: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<S: AsRef<str>>(mut self, args: &[S]) -> Self {
        self.args.extend(args.iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    /// Set a timeout for the subprocess.
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run the tool, capturing stdout and stderr.
    pub fn run(&self) -> Result<RunOutput, ToolError> {
        let mut cmd = self.command();

        let output: Output = if let Some(timeout) = self.timeout {
            run_with_timeout(&mut cmd, timeout, &self.program)?
        } else {
            cmd.output()
                .map_err(|e| ToolError::from_io(&self.program, e))?
        };

        Ok(RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Run the tool and return an error if it fails.
    pub fn run_ok(&self) -> Result<RunOutput, ToolError> {
        let output = self.run()?;
        if output.success() {
            Ok(output)
        } else {
            Err(ToolError::Failed {
                program: self.program.clone(),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Spawn the tool as a long-lived child with piped stdin/stdout.
    ///
    /// Stderr is inherited so the child's own diagnostics reach the terminal.
    pub fn spawn_piped(&self) -> Result<PipedChild, ToolError> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ToolError::from_io(&self.program, e))?;

        let missing = |what: &str| ToolError::Io {
            program: self.program.clone(),
            source: std::io::Error::other(format!("failed to capture {what}")),
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;

        Ok(PipedChild {
            child,
            stdin,
            stdout,
        })
    }
}

/// A running child whose stdio pipes have been taken over by the caller.
#[derive(Debug)]
pub struct PipedChild {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

fn run_with_timeout(
    cmd: &mut Command,
    timeout: Duration,
    program: &str,
) -> Result<Output, ToolError> {
    let mut child = cmd.spawn().map_err(|e| ToolError::from_io(program, e))?;

    // Pipes are drained while we poll; a child blocked on a full pipe never exits.
    let stdout = spawn_drain(child.stdout.take());
    let stderr = spawn_drain(child.stderr.take());

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return Ok(Output {
                    status,
                    stdout: join_drain(stdout),
                    stderr: join_drain(stderr),
                });
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolError::Timeout {
                        program: program.to_string(),
                        timeout_secs: timeout.as_secs(),
                    });
                }
                thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::from_io(program, e));
            }
        }
    }
}

fn spawn_drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || drain(pipe))
}

fn join_drain(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    pipe.map_or_else(Vec::new, |mut r| {
        let mut buf = Vec::new();
        r.read_to_end(&mut buf).unwrap_or(0);
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_echo() {
        let output = Tool::new("echo").arg("hello").run().unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn run_false_fails() {
        let output = Tool::new("false").run().unwrap();
        assert!(!output.success());
    }

    #[test]
    fn run_ok_returns_error_on_failure() {
        let err = Tool::new("false").run_ok().unwrap_err();
        assert!(matches!(err, ToolError::Failed { code: 1, .. }));
    }

    #[test]
    fn run_not_found() {
        let err = Tool::new("nonexistent-tool-xyz").run().unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
        let exit: ExitError = err.into();
        assert!(matches!(exit, ExitError::ToolNotFound { .. }));
    }

    #[test]
    fn run_with_timeout_succeeds() {
        let output = Tool::new("echo")
            .arg("fast")
            .timeout(Duration::from_secs(5))
            .run()
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "fast");
    }

    #[test]
    fn run_with_timeout_expires() {
        let err = Tool::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100))
            .run()
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
        let exit: ExitError = err.into();
        assert!(matches!(&exit, ExitError::Other(msg) if msg == "sleep timed out after 0s"));
    }

    #[test]
    fn run_with_timeout_collects_output_larger_than_a_pipe() {
        let output = Tool::new("sh")
            .args(&["-c", "head -c 200000 /dev/zero | tr '\\0' a; echo done >&2"])
            .timeout(Duration::from_secs(10))
            .run_ok()
            .unwrap();
        assert_eq!(output.stdout.len(), 200_000);
        assert!(output.stdout.bytes().all(|b| b == b'a'));
        assert_eq!(output.stderr.trim(), "done");
    }

    #[test]
    fn env_reaches_child() {
        let output = Tool::new("sh")
            .args(&["-c", "printf '%s' \"$GREETING\""])
            .env("GREETING", "hi")
            .run_ok()
            .unwrap();
        assert_eq!(output.stdout, "hi");
    }

    #[test]
    fn spawn_piped_round_trip() {
        use std::io::{BufRead, BufReader, Write};

        let mut piped = Tool::new("cat").spawn_piped().unwrap();
        piped.stdin.write_all(b"line\n").unwrap();
        drop(piped.stdin);
        let mut line = String::new();
        BufReader::new(piped.stdout).read_line(&mut line).unwrap();
        assert_eq!(line, "line\n");
        assert!(piped.child.wait().unwrap().success());
    }
}
