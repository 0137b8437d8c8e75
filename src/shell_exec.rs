//! Subprocess execution.
//!
//! Every external command `repos` runs is described by a [`Cmd`] carrying
//! its own working directory. Nothing here touches the process-wide current
//! directory, so any number of workers can launch commands concurrently.
//!
//! Captured execution goes through the [`CommandRunner`] trait. The live
//! implementation is [`ProcessRunner`]; tests substitute scripted runners.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

/// Monotonic epoch for trace timestamps.
static TRACE_EPOCH: OnceLock<Instant> = OnceLock::new();

fn trace_epoch() -> &'static Instant {
    TRACE_EPOCH.get_or_init(Instant::now)
}

/// Extract numeric thread ID from ThreadId's debug format ("ThreadId(N)").
fn thread_id_number() -> u64 {
    let debug_str = format!("{:?}", std::thread::current().id());
    debug_str
        .strip_prefix("ThreadId(")
        .and_then(|s| s.strip_suffix(")"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

// ============================================================================
// Command description
// ============================================================================

/// Builder describing one subprocess invocation.
///
/// ```ignore
/// let cmd = Cmd::new("git")
///     .args(["diff", "--numstat"])
///     .current_dir(&repo.path)
///     .context(&repo.name);
/// let output = runner.run(&cmd)?;
/// ```
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    context: Option<String>,
    timeout: Option<Duration>,
    envs: Vec<(String, String)>,
    env_clear: bool,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            context: None,
            timeout: None,
            envs: Vec::new(),
            env_clear: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Working directory of the subprocess.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Logging context (the repository name).
    pub fn context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Kill the command if it runs longer than `duration`.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.envs.push((key.into(), val.into()));
        self
    }

    /// Start the subprocess from an empty environment (only `env()` entries).
    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    pub fn envs(&self) -> &[(String, String)] {
        &self.envs
    }

    /// Command line for logs and error messages.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if self.env_clear {
            cmd.env_clear();
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, val) in &self.envs {
            cmd.env(key, val);
        }
        cmd
    }
}

// ============================================================================
// Captured execution
// ============================================================================

/// Captured result of a subprocess that was launched successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `128 + signal` when the process was killed by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The process-execution capability.
///
/// `Err` means the command could not be run to completion at all, e.g. a
/// missing binary or an expired timeout. A command that ran and exited non-zero is
/// `Ok` with a non-zero [`CommandOutput::exit_code`].
pub trait CommandRunner: Send + Sync {
    fn run(&self, cmd: &Cmd) -> io::Result<CommandOutput>;
}

/// Runs commands as real subprocesses.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    default_timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `timeout` to every command that does not set its own.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            default_timeout: timeout,
        }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, cmd: &Cmd) -> io::Result<CommandOutput> {
        let cmd_str = cmd.display();
        match &cmd.context {
            Some(ctx) => log::debug!("$ {} [{}]", cmd_str, ctx),
            None => log::debug!("$ {}", cmd_str),
        }

        let t0 = Instant::now();
        let ts = t0.duration_since(*trace_epoch()).as_micros() as u64;
        let tid = thread_id_number();

        let mut command = cmd.to_command();
        let result = match cmd.timeout.or(self.default_timeout) {
            Some(timeout) => run_with_timeout_impl(&mut command, timeout),
            None => command.stdin(Stdio::null()).output(),
        }
        .map(|output| CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: exit_code(output.status),
        });

        let dur_us = t0.elapsed().as_micros() as u64;
        let ctx = cmd.context.as_deref().unwrap_or("-");
        match &result {
            Ok(output) => log::debug!(
                "[repos-trace] ts={} tid={} context={} cmd=\"{}\" dur_us={} exit={}",
                ts,
                tid,
                ctx,
                cmd_str,
                dur_us,
                output.exit_code
            ),
            Err(e) => log::debug!(
                "[repos-trace] ts={} tid={} context={} cmd=\"{}\" dur_us={} err=\"{}\"",
                ts,
                tid,
                ctx,
                cmd_str,
                dur_us,
                e
            ),
        }

        result
    }
}

/// Exit code of a finished process, following the shell convention of
/// `128 + signal` for signal deaths.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    if let Some(sig) = std::os::unix::process::ExitStatusExt::signal(&status) {
        return 128 + sig;
    }
    1
}

/// Spawn with piped output, read both pipes on helper threads, and wait for
/// exit until `timeout`. On expiry the child is killed and reaped and the
/// call fails with `ErrorKind::TimedOut` right away. The reader threads are
/// detached then, since a grandchild may still hold the pipes open.
fn run_with_timeout_impl(cmd: &mut Command, timeout: Duration) -> io::Result<std::process::Output> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdout_handle = child.stdout.take();
    let mut stderr_handle = child.stderr.take();

    // Drain both pipes concurrently so a full buffer can't block the child.
    let stdout_thread = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(ref mut handle) = stdout_handle {
            let _ = handle.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_thread = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(ref mut handle) = stderr_handle {
            let _ = handle.read_to_end(&mut buf);
        }
        buf
    });

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            drop(stdout_thread);
            drop(stderr_thread);
            return Err(io::Error::new(io::ErrorKind::TimedOut, "command timed out"));
        }
    };

    Ok(std::process::Output {
        status,
        stdout: stdout_thread.join().unwrap_or_default(),
        stderr: stderr_thread.join().unwrap_or_default(),
    })
}

// ============================================================================
// Shell selection
// ============================================================================

static SHELL_CONFIG: OnceLock<ShellConfig> = OnceLock::new();

/// Shell used to interpret foreach command strings.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub executable: PathBuf,
    /// Arguments placed before the command string (e.g. `["-c"]`).
    pub args: Vec<String>,
    /// Human-readable name for error messages.
    pub name: String,
}

impl ShellConfig {
    /// Shell for the current platform, detected once.
    ///
    /// Prefers bash (foreach commands are usually written for it) and falls
    /// back to `sh`. On Windows this is Git Bash.
    pub fn get() -> &'static ShellConfig {
        SHELL_CONFIG.get_or_init(detect_shell)
    }

    /// A [`Cmd`] that runs `shell_command` through this shell in `dir`.
    pub fn command(&self, shell_command: &str, dir: &Path) -> Cmd {
        Cmd::new(self.executable.to_string_lossy())
            .args(self.args.iter().cloned())
            .arg(shell_command)
            .current_dir(dir)
    }
}

fn detect_shell() -> ShellConfig {
    #[cfg(windows)]
    if let Some(bash) = find_git_bash() {
        return ShellConfig {
            executable: bash,
            args: vec!["-c".to_string()],
            name: "Git Bash".to_string(),
        };
    }

    match which::which("bash") {
        Ok(bash) => ShellConfig {
            executable: bash,
            args: vec!["-c".to_string()],
            name: "bash".to_string(),
        },
        Err(_) => ShellConfig {
            executable: PathBuf::from("sh"),
            args: vec!["-c".to_string()],
            name: "sh".to_string(),
        },
    }
}

/// Derive Git Bash from the location of `git.exe`; `which bash` tends to
/// find the WSL launcher first.
#[cfg(windows)]
fn find_git_bash() -> Option<PathBuf> {
    let git_path = which::which("git").ok()?;
    let git_dir = git_path.parent()?.parent()?;
    [
        git_dir.join("bin").join("bash.exe"),
        git_dir.join("usr").join("bin").join("bash.exe"),
    ]
    .into_iter()
    .find(|p| p.exists())
}

// ============================================================================
// Foreground execution
// ============================================================================

/// Run `cmd` attached to the terminal (inherited stdio) and return its exit
/// code. Used for the interactive repository shell.
pub fn run_foreground(cmd: &Cmd) -> io::Result<i32> {
    log::debug!("$ {} (foreground)", cmd.display());
    let status = cmd
        .to_command()
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;
    Ok(exit_code(status))
}

/// Replace the current process with `cmd`.
///
/// On Unix this is `exec(2)` and only returns on failure. Elsewhere the
/// command runs in the foreground and the current process exits with its
/// code.
pub fn replace_process(cmd: &Cmd) -> io::Error {
    log::debug!("exec {}", cmd.display());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.to_command().exec()
    }
    #[cfg(not(unix))]
    {
        match run_foreground(cmd) {
            Ok(code) => std::process::exit(code),
            Err(e) => e,
        }
    }
}
