//! Core terminal emulation components.
//!
//! This module contains the engine that turns shell output into a screen:
//!
//! - **term**: screen buffer, styles, colors and the escape sequence parser
//! - **process**: shell child process with piped stdio
//! - **session**: lifecycle and I/O bridge between the process and the emulator
//! - **event**: listener callbacks raised on the dispatch context
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── ShellProcess (stdin writer, merged stdout/stderr reader)
//! ├── reader thread ──┐
//! ├── exit monitor ───┴─ mpsc ─> process_output()
//! └── Emulator
//!     ├── ScreenBuffer (cell grid + cursor + pending style)
//!     └── EscapeParser (ANSI escape sequences)
//! ```

pub mod event;
pub mod process;
pub mod session;
pub mod term;
