//! # Domain Models
//!
//! Principals, secrets, directory snapshots and ticket lifecycle types.
//!
//! ## Security Design
//!
//! [`SecureString`] holds passwords only for the duration of one operation:
//! - Zeroed on drop via `zeroize`
//! - Never exposed in `Debug` or `Display` output
//!
//! Stored passwords live in the user's keychain, never in files or logs.

pub mod credentials;
pub mod directory;
pub mod ticket;

pub use credentials::{CredentialKey, Principal, SecureString};
pub use directory::DirectoryStatus;
pub use ticket::{PasswordCheck, TicketPhase, TicketState};
