//! Scripted command runner for unit tests.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::shell_exec::{Cmd, CommandOutput, CommandRunner};

enum Reply {
    Output(CommandOutput),
    Error(io::ErrorKind),
}

/// Answers commands from a script keyed by their arguments joined with
/// spaces (the program name is not part of the key). A key may be scoped to
/// one working directory with [`ScriptedRunner::in_dir`].
///
/// Unscripted commands fail with `NotFound`.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: HashMap<(Option<PathBuf>, String), Reply>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Cmd>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    scope: Option<PathBuf>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope the following script entries to commands run in `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scope = Some(dir.into());
        self
    }

    pub fn ok(self, args: &str, stdout: &str) -> Self {
        self.reply(
            args,
            Reply::Output(CommandOutput {
                stdout: stdout.to_string(),
                ..Default::default()
            }),
        )
    }

    pub fn output(self, args: &str, stdout: &str, stderr: &str, exit_code: i32) -> Self {
        self.reply(
            args,
            Reply::Output(CommandOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                exit_code,
            }),
        )
    }

    pub fn fail(self, args: &str, exit_code: i32, stderr: &str) -> Self {
        self.output(args, "", stderr, exit_code)
    }

    pub fn error(self, args: &str, kind: io::ErrorKind) -> Self {
        self.reply(args, Reply::Error(kind))
    }

    /// Sleep this long inside every command, to make overlap observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn reply(mut self, args: &str, reply: Reply) -> Self {
        self.replies
            .insert((self.scope.clone(), args.to_string()), reply);
        self
    }

    pub fn calls(&self) -> Vec<Cmd> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of commands observed running at the same time.
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, cmd: &Cmd) -> io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(cmd.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let key = cmd.arguments().join(" ");
        let scoped = (cmd.dir().map(PathBuf::from), key.clone());
        let reply = self
            .replies
            .get(&scoped)
            .or_else(|| self.replies.get(&(None, key.clone())));
        match reply {
            Some(Reply::Output(output)) => Ok(output.clone()),
            Some(Reply::Error(kind)) => Err(io::Error::new(*kind, format!("scripted failure: {key}"))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("unscripted command: {}", cmd.display()),
            )),
        }
    }
}
