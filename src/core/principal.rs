//! Principal resolution
//!
//! Finds `user@REALM` for a local account, either from the directory
//! (`AuthenticationAuthority` of the user record) or, as a best-effort
//! fallback, from the default ticket cache.
//!
//! ## Principal grammar
//!
//! ```text
//! principal  = local-part "@" domain "." tld
//! local-part = 1*( ALPHA / DIGIT / "+" / "_" / "." / "-" )
//! domain     = 1*( any char except ";" "@" and whitespace )
//! tld        = 2*ALPHA
//! ```
//!
//! Letters match case-insensitively. The first match in the text wins.

use super::directory::DirectoryService;
use super::runner::{Invocation, Tools};
use crate::constants::SEARCH_NODE;
use crate::models::Principal;
use crate::utils::AdError;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn principal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)[a-z0-9+_.\-]+@[^;@\s]+\.[a-z]{2,}").expect("principal pattern is valid")
    })
}

/// First substring of `text` matching the principal grammar
pub fn extract_principal(text: &str) -> Option<&str> {
    principal_pattern().find(text).map(|found| found.as_str())
}

#[derive(Clone)]
pub struct PrincipalResolver {
    tools: Tools,
    directory: DirectoryService,
}

impl PrincipalResolver {
    pub fn new(tools: Tools) -> Self {
        Self {
            directory: DirectoryService::new(tools.clone()),
            tools,
        }
    }

    /// Principal of `user` from the directory
    ///
    /// # Returns
    /// * `Ok(Some(principal))` - The user record names a Kerberos principal
    /// * `Ok(None)` - No record or no `AuthenticationAuthority` value
    /// * `Err(NotBound)` - The host is not bound (checked first)
    /// * `Err(MalformedPrincipal)` - A value exists but holds no principal
    pub async fn resolve_principal(&self, user: &str) -> Result<Option<Principal>, AdError> {
        const OPERATION: &str = "resolve_principal";
        self.directory.require_bound(OPERATION).await?;

        let record = format!("/Users/{}", user);
        let output = self
            .tools
            .run(
                OPERATION,
                Invocation::new(&self.tools.paths().dscl).args([
                    SEARCH_NODE,
                    "-read",
                    record.as_str(),
                    "AuthenticationAuthority",
                ]),
            )
            .await?;

        if !output.success() || output.stdout.contains("No such key:") {
            debug!(user, code = ?output.code, "no AuthenticationAuthority for user");
            return Ok(None);
        }
        let value = output.stdout.trim();
        if value.is_empty() {
            return Ok(None);
        }

        let found = extract_principal(value).ok_or_else(|| AdError::malformed(OPERATION, value))?;
        let principal = Principal::parse(found).map_err(|_| AdError::malformed(OPERATION, found))?;
        debug!(user, principal = %principal, "principal resolved from directory");
        Ok(Some(principal))
    }

    /// Default principal of the ticket cache
    ///
    /// Works bound or unbound. Never fails: any problem yields `None`.
    pub async fn resolve_from_ticket_cache(&self) -> Option<Principal> {
        let output = match self
            .tools
            .run(
                "resolve_from_ticket_cache",
                Invocation::new(&self.tools.paths().klist),
            )
            .await
        {
            Ok(output) if output.success() => output,
            Ok(output) => {
                debug!(code = ?output.code, "no ticket cache");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "ticket cache listing failed");
                return None;
            }
        };

        let found = extract_principal(&output.stdout)?;
        match Principal::parse(found) {
            Ok(principal) => Some(principal),
            Err(err) => {
                warn!(error = %err, "unusable principal in ticket cache");
                None
            }
        }
    }
}
