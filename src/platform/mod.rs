//! macOS implementations of the core seams
//!
//! The process runner spawns the real tools; the keychain store drives
//! `security`.

pub mod keychain;
pub mod process;

pub use keychain::Keychain;
pub use process::ProcessRunner;
