//! External process execution.
//!
//! Every ffmpeg/ffprobe invocation goes through [`ProcessRunner`] so the
//! pipeline can be driven by a scripted fake in tests and by
//! [`DryRunRunner`] for `stillcut dry-run`.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// A fully built external tool invocation: program plus argument vector.
///
/// Arguments are kept as `OsString` so file names reach the tool byte for
/// byte, even when they are not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Last argument, which for ffmpeg is the output target. `None` if it
    /// isn't valid UTF-8.
    pub fn output_target(&self) -> Option<&str> {
        self.args.last().and_then(|a| a.to_str())
    }

    /// Value following the first occurrence of `flag`.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .and_then(|a| a.to_str())
    }

    /// Space-joined arguments for logs and assertions. Lossy.
    pub fn arg_line(&self) -> String {
        self.args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains([' ', '\'', '"', ';', '[']) {
                let quoted = shlex::try_quote(&arg).unwrap_or_else(|_| arg.clone());
                write!(f, " {}", quoted)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external tools. Implementations block until the tool exits.
pub trait ProcessRunner: Send + Sync {
    /// Run `cmd` to completion. With a `timeout`, a process still running at
    /// the deadline is killed and an `io::ErrorKind::TimedOut` error returned.
    fn run(&self, cmd: &ToolCommand, timeout: Option<Duration>) -> io::Result<ToolOutput>;
}

/// Runs tools as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, cmd: &ToolCommand, timeout: Option<Duration>) -> io::Result<ToolOutput> {
        tracing::debug!(command = %cmd, "running external tool");

        let mut command = cmd.to_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        match timeout {
            None => {
                let output = command.output()?;
                Ok(ToolOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            Some(limit) => run_bounded(command.spawn()?, limit),
        }
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn run_bounded(mut child: Child, limit: Duration) -> io::Result<ToolOutput> {
    // Pipes are drained on their own threads so a chatty child can't block on a full pipe
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + limit;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("process did not exit within {:.1}s", limit.as_secs_f64()),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(ToolOutput {
        exit_code: status.code(),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

/// Prints-instead-of-runs wrapper used by `stillcut dry-run`.
///
/// Read-only invocations (ffprobe, and ffmpeg writing to the `-` null sink)
/// are forwarded to the inner runner so the plan reflects the real audio
/// length and encoder availability. Everything else is recorded and reported
/// as a success.
pub struct DryRunRunner<R> {
    inner: R,
    ffprobe: String,
    planned: Mutex<Vec<ToolCommand>>,
}

impl<R: ProcessRunner> DryRunRunner<R> {
    pub fn new(inner: R, ffprobe: impl Into<String>) -> Self {
        Self {
            inner,
            ffprobe: ffprobe.into(),
            planned: Mutex::new(Vec::new()),
        }
    }

    /// Commands that would have been executed, in order.
    pub fn planned(&self) -> Vec<ToolCommand> {
        self.planned.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn is_read_only(&self, cmd: &ToolCommand) -> bool {
        cmd.program == self.ffprobe
            || cmd.output_target() == Some("-")
            || cmd.args.iter().any(|a| a == "-version")
    }
}

impl<R: ProcessRunner> ProcessRunner for DryRunRunner<R> {
    fn run(&self, cmd: &ToolCommand, timeout: Option<Duration>) -> io::Result<ToolOutput> {
        if self.is_read_only(cmd) {
            return self.inner.run(cmd, timeout);
        }
        if let Ok(mut planned) = self.planned.lock() {
            planned.push(cmd.clone());
        }
        Ok(ToolOutput::success())
    }
}
