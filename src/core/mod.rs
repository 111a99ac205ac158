//! Core logic (no direct process spawning)
//!
//! Everything here talks to the system through [`runner::Tools`], so the
//! whole module runs against a scripted runner in tests.

pub mod credential;
pub mod directory;
pub mod membership;
pub mod principal;
pub mod runner;
pub mod scutil;
pub mod tickets;
pub mod workstation;

// Scripted tool doubles (tests only)
#[cfg(test)]
pub mod mock_tools;

pub use credential::CredentialStore;
pub use directory::DirectoryService;
pub use membership::GroupMembership;
pub use principal::{extract_principal, PrincipalResolver};
pub use runner::{CommandOutput, CommandRunner, Invocation, Tools};
pub use tickets::TicketManager;
pub use workstation::{RefreshOutcome, Workstation};
