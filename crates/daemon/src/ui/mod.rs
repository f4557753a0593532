//! User interface module for the Iris daemon.
//!
//! This module provides QR code rendering for account pairing: terminal
//! output using Unicode block characters, and PNG file output for use
//! outside the terminal.

pub mod qr;

// Re-export QR functions for convenience
pub use qr::{render_png_qr, render_terminal_qr};
