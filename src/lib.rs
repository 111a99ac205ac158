//! macad - Active Directory workstation helper for macOS
//!
//! Binding status, principal resolution, keychain-backed passwords and
//! Kerberos ticket management, built on the system's own tools.

// Public modules
pub mod config;
pub mod constants;
pub mod core;
pub mod logger;
pub mod models;
pub mod platform;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use core::{
    CredentialStore, DirectoryService, GroupMembership, PrincipalResolver, RefreshOutcome,
    TicketManager, Tools, Workstation,
};
pub use models::{DirectoryStatus, PasswordCheck, Principal, SecureString, TicketPhase, TicketState};
pub use utils::{AdError, CommandError, ConfigError};
