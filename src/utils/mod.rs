//! # Utilities Module
//!
//! Cross-cutting concerns shared by the `core` and `platform` modules.
//!
//! - [`errors`]: Typed error hierarchy using `thiserror`
//!
//! Error types live here to avoid circular dependencies between `core` and
//! `platform`. Nothing in this crate retries: every operation makes a single
//! attempt and reports the outcome to its caller.

pub mod errors;

pub use errors::{AdError, CommandError, ConfigError};
