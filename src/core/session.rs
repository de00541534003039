//! Session management
//!
//! Bridges a shell process and the emulator. A reader thread and an exit
//! monitor forward everything over a channel; the owner of the session
//! drains it with [`Session::process_output`] or [`Session::wait_output`],
//! which makes the owning thread the only one that touches the screen or
//! calls the listener.

use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use tracing::{debug, error, info, warn};

use super::event::{NoopListener, TerminalListener};
use super::process::{self, exit_code, ProcessError, ShellProcess};
use super::term::{Emulator, EscapeParser, ScreenBuffer, DEFAULT_MAX_SEQUENCE_LEN};
use crate::ui::keymapper::{KeyMapper, Modifiers};

/// Everything needed to start a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub shell: String,
    pub args: Vec<String>,
    /// HOME for the child; the user's home directory when unset
    pub home: Option<PathBuf>,
    pub path: String,
    pub cols: u16,
    pub rows: u16,
    pub read_buffer_size: usize,
    pub max_sequence_len: usize,
    /// Upper bound on waiting for each background thread in `close`
    pub close_timeout: Duration,
    pub exit_poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shell: process::DEFAULT_SHELL.to_string(),
            args: Vec::new(),
            home: None,
            path: process::DEFAULT_PATH.to_string(),
            cols: 80,
            rows: 24,
            read_buffer_size: 4096,
            max_sequence_len: DEFAULT_MAX_SEQUENCE_LEN,
            close_timeout: Duration::from_secs(1),
            exit_poll_interval: Duration::from_millis(20),
        }
    }
}

/// Lifecycle of a session. There is no way back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Terminated,
}

/// Messages from the background threads
#[derive(Debug)]
pub enum SessionMessage {
    /// A chunk of shell output
    Output(Vec<u8>),
    /// The shell exited with this code
    Exited(i32),
}

/// Cloneable handle for writing to the shell from any thread
#[derive(Clone, Default)]
pub struct SessionWriter {
    stdin: Arc<Mutex<Option<ChildStdin>>>,
}

impl SessionWriter {
    fn new(stdin: ChildStdin) -> Self {
        Self {
            stdin: Arc::new(Mutex::new(Some(stdin))),
        }
    }

    pub fn write(&self, text: &str) -> process::Result<()> {
        self.write_bytes(text.as_bytes())
    }

    pub fn write_bytes(&self, data: &[u8]) -> process::Result<()> {
        let mut guard = lock(&self.stdin);
        let stdin = guard.as_mut().ok_or(ProcessError::NotRunning)?;
        stdin.write_all(data).map_err(ProcessError::Write)?;
        stdin.flush().map_err(ProcessError::Write)
    }

    fn close(&self) {
        lock(&self.stdin).take();
    }
}

/// A shell session
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    emulator: Emulator,
    listener: Box<dyn TerminalListener>,
    child: Option<Arc<Mutex<Child>>>,
    writer: SessionWriter,
    /// Cleared when the shell exits or the session is closed
    running: Arc<AtomicBool>,
    /// Set by `close` to stop both background threads
    cancel: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
    monitor_thread: Option<JoinHandle<()>>,
    output_rx: Option<Receiver<SessionMessage>>,
}

impl Session {
    /// Create an idle session
    pub fn new(config: SessionConfig) -> Self {
        let parser = EscapeParser::with_max_sequence_len(config.max_sequence_len);
        let emulator = Emulator::with_parser(config.cols, config.rows, parser);

        Self {
            config,
            state: SessionState::Idle,
            emulator,
            listener: Box::new(NoopListener),
            child: None,
            writer: SessionWriter::default(),
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            reader_thread: None,
            monitor_thread: None,
            output_rx: None,
        }
    }

    /// Replace the listener. Set it before `start` to see every event.
    pub fn set_listener(&mut self, listener: Box<dyn TerminalListener>) {
        self.listener = listener;
    }

    /// Spawn the shell and the background threads. Failures are logged and
    /// leave the session idle.
    pub fn start(&mut self) {
        if self.state != SessionState::Idle {
            warn!("Session already started ({:?})", self.state);
            return;
        }

        let shell = match ShellProcess::spawn(&self.config) {
            Ok(shell) => shell,
            Err(e) => {
                error!("Failed to start session: {}", e);
                return;
            }
        };
        let (child, stdin, output) = shell.into_parts();
        let child = Arc::new(Mutex::new(child));

        self.writer = SessionWriter::new(stdin);
        self.cancel.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel::<SessionMessage>();
        self.output_rx = Some(rx);

        self.reader_thread = Some(spawn_reader(
            output,
            self.config.read_buffer_size,
            self.cancel.clone(),
            tx.clone(),
        ));
        self.monitor_thread = Some(spawn_exit_monitor(
            child.clone(),
            self.config.exit_poll_interval,
            self.running.clone(),
            self.cancel.clone(),
            tx,
        ));

        self.child = Some(child);
        self.state = SessionState::Running;
    }

    /// Check if session is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn emulator(&self) -> &Emulator {
        &self.emulator
    }

    pub fn screen(&self) -> &ScreenBuffer {
        self.emulator.screen()
    }

    /// Mutable screen access, e.g. for renderers clearing dirty state
    pub fn screen_mut(&mut self) -> &mut ScreenBuffer {
        self.emulator.screen_mut()
    }

    /// Handle for writing from other threads
    pub fn writer(&self) -> SessionWriter {
        self.writer.clone()
    }

    /// Write text to the shell. Errors are logged, not returned.
    pub fn write(&self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    /// Write the bytes for a special key. Keys outside the table are dropped.
    pub fn write_key_event(&self, code: KeyCode, mods: Modifiers) {
        match KeyMapper::map(code, mods) {
            Some(bytes) => self.write_bytes(bytes),
            None => debug!("Unmapped key {:?}", code),
        }
    }

    /// Write raw bytes, e.g. control characters. Errors are logged.
    pub fn write_bytes(&self, data: &[u8]) {
        match self.writer.write_bytes(data) {
            Ok(()) => {}
            Err(ProcessError::NotRunning) => debug!("Dropped {} bytes, session not running", data.len()),
            Err(e) => warn!("{}", e),
        }
    }

    /// Apply pending output without blocking. Returns true if anything was
    /// processed.
    pub fn process_output(&mut self) -> bool {
        let mut messages = Vec::new();

        if let Some(rx) = &self.output_rx {
            loop {
                match rx.try_recv() {
                    Ok(message) => messages.push(message),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        } else {
            return false;
        }

        let processed = !messages.is_empty();
        for message in messages {
            self.handle_message(message);
        }
        processed
    }

    /// Block up to `timeout` for output, then apply everything pending.
    pub fn wait_output(&mut self, timeout: Duration) -> bool {
        let first = match &self.output_rx {
            Some(rx) => rx.recv_timeout(timeout),
            None => return false,
        };

        match first {
            Ok(message) => {
                self.handle_message(message);
                self.process_output();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Output(bytes) => {
                self.emulator.process_input(&bytes, &mut *self.listener);
            }
            SessionMessage::Exited(code) => {
                info!("Shell exited with code {}", code);
                self.running.store(false, Ordering::SeqCst);
                self.state = SessionState::Terminated;
                self.listener.on_session_finished(code);
            }
        }
    }

    /// Resize the screen
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.emulator.resize(cols, rows);
        self.config.cols = self.emulator.screen().cols();
        self.config.rows = self.emulator.screen().rows();
    }

    /// Stop the shell and release every resource. Safe to call repeatedly.
    /// Does not notify the listener.
    pub fn close(&mut self) {
        let started = self.child.is_some()
            || self.reader_thread.is_some()
            || self.monitor_thread.is_some();

        self.running.store(false, Ordering::SeqCst);
        self.cancel.store(true, Ordering::SeqCst);

        if let Some(child) = self.child.take() {
            terminate(&mut lock(&child));
        }
        self.writer.close();

        let timeout = self.config.close_timeout;
        if let Some(handle) = self.reader_thread.take() {
            join_with_timeout(handle, timeout, "reader");
        }
        if let Some(handle) = self.monitor_thread.take() {
            join_with_timeout(handle, timeout, "exit monitor");
        }
        self.output_rx = None;

        if started {
            info!("Session closed");
        }
        self.state = SessionState::Terminated;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_reader(
    mut output: impl Read + Send + 'static,
    buffer_size: usize,
    cancel: Arc<AtomicBool>,
    tx: Sender<SessionMessage>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buffer = vec![0u8; buffer_size.max(1)];

        loop {
            if cancel.load(Ordering::SeqCst) {
                break;
            }

            match output.read(&mut buffer) {
                Ok(0) => {
                    debug!("Shell output closed");
                    break;
                }
                Ok(n) => {
                    if tx.send(SessionMessage::Output(buffer[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Ends the reader only; the exit monitor decides when
                    // the session is finished.
                    warn!("{}", ProcessError::Read(e));
                    break;
                }
            }
        }
    })
}

fn spawn_exit_monitor(
    child: Arc<Mutex<Child>>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    tx: Sender<SessionMessage>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        if cancel.load(Ordering::SeqCst) {
            break;
        }

        let status = lock(&child).try_wait();
        match status {
            Ok(Some(status)) => {
                running.store(false, Ordering::SeqCst);
                let _ = tx.send(SessionMessage::Exited(exit_code(status)));
                break;
            }
            Ok(None) => thread::sleep(poll_interval),
            Err(e) => {
                warn!("{}", ProcessError::Wait(e));
                break;
            }
        }
    })
}

/// Kill the child unless it already exited, then reap it
fn terminate(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => warn!("{}", ProcessError::Wait(e)),
    }

    if let Err(e) = child.kill() {
        debug!("Kill failed: {}", e);
    }
    if let Err(e) = child.wait() {
        warn!("{}", ProcessError::Wait(e));
    }
}

/// Join a thread, giving up after `timeout`. A thread still blocked after
/// that is left detached.
fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration, name: &str) {
    let deadline = Instant::now() + timeout;

    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("{} thread did not stop within {:?}, detaching", name, timeout);
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }

    if handle.join().is_err() {
        warn!("{} thread panicked", name);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
