//! Workstation flows
//!
//! Composes the one-shot operations into what a login agent or the CLI
//! actually does: keep a ticket fresh, accept a new password, and work out
//! whose principal to use when none is given. No step is ever retried.

use super::credential::CredentialStore;
use super::directory::DirectoryService;
use super::membership::GroupMembership;
use super::principal::PrincipalResolver;
use super::runner::Tools;
use super::tickets::TicketManager;
use crate::models::{PasswordCheck, Principal, SecureString};
use crate::utils::AdError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of [`Workstation::refresh`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The existing ticket was renewed
    Renewed,
    /// A new ticket was obtained with the stored password
    Acquired,
    /// Nothing worked; ask the user for their password
    NeedsPassword,
}

/// Every service of the crate wired to one set of tools
pub struct Workstation {
    pub directory: DirectoryService,
    pub resolver: PrincipalResolver,
    pub store: Arc<dyn CredentialStore>,
    pub tickets: TicketManager,
    pub groups: GroupMembership,
}

impl Workstation {
    pub fn new(tools: Tools, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            directory: DirectoryService::new(tools.clone()),
            resolver: PrincipalResolver::new(tools.clone()),
            tickets: TicketManager::new(tools.clone(), store.clone()),
            groups: GroupMembership::new(tools),
            store,
        }
    }

    /// Keep a ticket for `principal` without user interaction
    ///
    /// Renews when the cache holds a valid, renewable ticket for
    /// `principal`; otherwise (or when renewal fails) acquires a new one
    /// from the stored password.
    pub async fn refresh(&self, principal: &Principal) -> Result<RefreshOutcome, AdError> {
        // The cache listing is advisory; if it cannot be read, skip renewal
        let renewable = match self.tickets.ticket_state().await {
            Ok(Some(state)) if state.principal == *principal => state.valid && state.renewable,
            Ok(Some(state)) => {
                info!(cached = %state.principal, wanted = %principal, "ticket cache holds another principal");
                false
            }
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "ticket cache unreadable; not renewing");
                false
            }
        };

        if renewable && self.tickets.renew().await {
            info!(principal = %principal, "ticket renewed");
            return Ok(RefreshOutcome::Renewed);
        }
        if self.tickets.acquire_via_store(principal).await {
            return Ok(RefreshOutcome::Acquired);
        }

        warn!(principal = %principal, "no way to refresh the ticket without a password");
        Ok(RefreshOutcome::NeedsPassword)
    }

    /// Check `password` and, when the KDC accepts it, store it
    ///
    /// Only a clean [`PasswordCheck::Success`] is saved. A store failure is
    /// returned even though the check itself passed.
    pub async fn login(
        &self,
        principal: &Principal,
        password: &SecureString,
    ) -> Result<PasswordCheck, AdError> {
        let check = self.tickets.test_password(principal, password).await?;
        if check == PasswordCheck::Success {
            self.store.save(principal, password).await?;
        }
        Ok(check)
    }

    /// Console user in the first configured realm
    ///
    /// "First" follows the order of the default realm list, not sorting.
    ///
    /// # Returns
    /// * `Ok(Some(principal))` - Someone is logged in and a realm is configured
    /// * `Ok(None)` - Nobody at the console, or no realm
    /// * `Err(NotBound)` - The host is not bound
    pub async fn default_principal(&self) -> Result<Option<Principal>, AdError> {
        const OPERATION: &str = "default_principal";
        self.directory.require_bound(OPERATION).await?;

        let user = match self.directory.console_user().await? {
            Some(user) => user,
            None => return Ok(None),
        };
        let realm = match self.directory.first_realm().await? {
            Some(realm) => realm,
            None => return Ok(None),
        };

        Principal::new(user.as_str(), realm.as_str())
            .map(Some)
            .map_err(|_| AdError::malformed(OPERATION, format!("{}@{}", user, realm)))
    }
}
