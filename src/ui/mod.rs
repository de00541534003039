//! User interface rendering and input handling.
//!
//! - **renderer**: crossterm renderer for a single screen buffer
//! - **keymapper**: special keys to shell input bytes

pub mod keymapper;
pub mod renderer;

pub use keymapper::*;
pub use renderer::*;
