//! Shell child process
//!
//! Spawns the configured shell with piped stdio. Standard output and
//! standard error share a single pipe so the emulator sees one stream in
//! the order the shell produced it.

use std::io::{self, PipeReader};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, info};

use super::session::SessionConfig;

/// Terminal type advertised to the child
pub const TERM: &str = "xterm-256color";

/// Default shell when none is configured
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Search path handed to the child
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: io::Error,
    },

    #[error("Child process has no {0} pipe")]
    MissingPipe(&'static str),

    #[error("Failed to read shell output: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write shell input: {0}")]
    Write(#[source] io::Error),

    #[error("Session is not running")]
    NotRunning,

    #[error("Failed to wait for shell: {0}")]
    Wait(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, ProcessError>;

/// A spawned shell and its stdio handles
pub struct ShellProcess {
    child: Child,
    stdin: ChildStdin,
    output: PipeReader,
}

impl ShellProcess {
    /// Spawn the shell described by `config`
    pub fn spawn(config: &SessionConfig) -> Result<Self> {
        let spawn_error = |source| ProcessError::Spawn {
            shell: config.shell.clone(),
            source,
        };

        let (output, output_writer) = io::pipe().map_err(spawn_error)?;
        let error_writer = output_writer.try_clone().map_err(spawn_error)?;

        let home = config.home.clone().unwrap_or_else(user_home);

        let mut command = Command::new(&config.shell);
        command
            .args(&config.args)
            .env("TERM", TERM)
            .env("HOME", &home)
            .env("PATH", &config.path)
            .stdin(Stdio::piped())
            .stdout(output_writer)
            .stderr(error_writer);

        let mut child = command.spawn().map_err(spawn_error)?;
        // The command holds the parent's copies of the pipe write ends;
        // the reader only sees EOF once they are gone.
        drop(command);

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProcessError::MissingPipe("stdin"));
        };

        info!(
            "Spawned '{}' (pid {}) with HOME={}",
            config.shell,
            child.id(),
            home.display()
        );

        Ok(Self {
            child,
            stdin,
            output,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Split into the child handle, its stdin and the merged output pipe
    pub fn into_parts(self) -> (Child, ChildStdin, PipeReader) {
        (self.child, self.stdin, self.output)
    }
}

/// Home directory of the current user, or "/" when unknown
pub fn user_home() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Exit code reported to listeners. Signal deaths map to 128 + signal on
/// Unix; anything else without a code is -1.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            debug!("Shell terminated by signal {}", signal);
            return 128 + signal;
        }
    }

    -1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn config(shell: &str, args: &[&str]) -> SessionConfig {
        SessionConfig {
            shell: shell.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_spawn_missing_shell() {
        let result = ShellProcess::spawn(&config("/nonexistent/shell", &[]));
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn test_stdout_and_stderr_merged() {
        let process = ShellProcess::spawn(&config("/bin/sh", &["-c", "echo out; echo err >&2"]))
            .expect("spawn sh");
        let (mut child, stdin, mut output) = process.into_parts();
        drop(stdin);

        let mut text = String::new();
        output.read_to_string(&mut text).expect("read output");
        child.wait().expect("wait");

        assert_eq!(text, "out\nerr\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_environment() {
        let mut cfg = config("/bin/sh", &["-c", "printf '%s|%s|%s' \"$TERM\" \"$HOME\" \"$PATH\""]);
        cfg.home = Some(PathBuf::from("/tmp"));
        let (mut child, _stdin, mut output) = ShellProcess::spawn(&cfg).expect("spawn sh").into_parts();

        let mut text = String::new();
        output.read_to_string(&mut text).expect("read output");
        child.wait().expect("wait");

        assert_eq!(text, format!("xterm-256color|/tmp|{}", DEFAULT_PATH));
    }

    #[test]
    #[cfg(unix)]
    fn test_exit_code_mapping() {
        let (mut child, _stdin, _output) = ShellProcess::spawn(&config("/bin/sh", &["-c", "exit 3"]))
            .expect("spawn sh")
            .into_parts();
        assert_eq!(exit_code(child.wait().expect("wait")), 3);

        let (mut child, _stdin, _output) = ShellProcess::spawn(&config("/bin/sh", &["-c", "kill -9 $$"]))
            .expect("spawn sh")
            .into_parts();
        assert_eq!(exit_code(child.wait().expect("wait")), 128 + 9);
    }
}
