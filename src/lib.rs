//! pipeterm - a VT100/xterm terminal-emulation engine
//!
//! Spawns a shell, interprets its output and keeps a fixed-size grid of
//! styled cells plus a cursor that any renderer can read.
//!
//! ```no_run
//! use std::time::Duration;
//! use pipeterm::core::session::{Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.start();
//! session.write("echo hello\n");
//! while session.wait_output(Duration::from_millis(100)) {}
//! println!("{}", session.screen().text());
//! session.close();
//! ```

pub mod config;
pub mod core;
pub mod ui;
