//! Group membership lookup
//!
//! Runs `ldapsearch` (SASL bind with the current ticket) against the
//! principal's realm and collects the `CN` of every `memberOf` value.
//! Independent of ticket state beyond needing some ticket to bind with.

use super::directory::DirectoryService;
use super::runner::{Invocation, Tools};
use crate::models::Principal;
use crate::utils::AdError;
use base64::{engine::general_purpose, Engine as _};
use std::collections::BTreeSet;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct GroupMembership {
    tools: Tools,
    directory: DirectoryService,
}

impl GroupMembership {
    pub fn new(tools: Tools) -> Self {
        Self {
            directory: DirectoryService::new(tools.clone()),
            tools,
        }
    }

    /// Groups `principal` is a direct member of
    ///
    /// # Returns
    /// * `Ok(Some(groups))` - The account was found (groups may be empty)
    /// * `Ok(None)` - The search returned nothing
    /// * `Err(MalformedPrincipal)` - `principal` is not `user@REALM`
    /// * `Err(DomainUnreachable)` - No LDAP SRV record; nothing was searched
    pub async fn membership(&self, principal: &str) -> Result<Option<BTreeSet<String>>, AdError> {
        const OPERATION: &str = "membership";
        let principal = Principal::parse(principal)
            .map_err(|_| AdError::malformed(OPERATION, principal.trim()))?;
        let domain = principal.domain();

        if !self.directory.is_reachable(&domain).await? {
            return Err(AdError::DomainUnreachable {
                operation: OPERATION,
                domain,
            });
        }

        let base_dn = format_base_dn(&domain)
            .ok_or_else(|| AdError::malformed(OPERATION, principal.to_string()))?;
        let filter = format!("sAMAccountName={}", escape_filter_value(principal.username()));
        let url = format!("ldap://{}", domain);
        let invocation = Invocation::new(&self.tools.paths().ldapsearch).args([
            "-LLL",
            "-Q",
            "-H",
            url.as_str(),
            "-b",
            base_dn.as_str(),
            filter.as_str(),
            "memberOf",
        ]);

        let output = self.tools.run_checked(OPERATION, invocation).await?;
        if output.stdout.trim().is_empty() {
            debug!(principal = %principal, "directory search returned nothing");
            return Ok(None);
        }

        let groups = parse_member_of(&output.stdout);
        debug!(principal = %principal, count = groups.len(), "group membership resolved");
        Ok(Some(groups))
    }
}

/// Format a domain like "example.com" into "DC=example,DC=com"
fn format_base_dn(domain: &str) -> Option<String> {
    let parts: Vec<&str> = domain.split('.').filter(|p| !p.trim().is_empty()).collect();
    if parts.is_empty() {
        return None;
    }
    Some(
        parts
            .into_iter()
            .map(|p| format!("DC={}", p))
            .collect::<Vec<String>>()
            .join(","),
    )
}

/// Escape LDAP filter metacharacters (RFC 4515)
fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Collect the CN of every `memberOf` value in LDIF output
fn parse_member_of(ldif: &str) -> BTreeSet<String> {
    unfold_ldif(ldif)
        .iter()
        .filter_map(|line| {
            let (attr, rest) = line.split_once(':')?;
            if !attr.trim().eq_ignore_ascii_case("memberOf") {
                return None;
            }
            let value = match rest.strip_prefix(':') {
                Some(encoded) => match general_purpose::STANDARD.decode(encoded.trim()) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(err) => {
                        warn!(error = %err, "undecodable memberOf value");
                        return None;
                    }
                },
                None => rest.trim().to_string(),
            };
            common_name(&value)
        })
        .collect()
}

/// Join LDIF continuation lines (those starting with one space)
fn unfold_ldif(ldif: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in ldif.lines() {
        match (line.strip_prefix(' '), lines.last_mut()) {
            (Some(continuation), Some(previous)) => previous.push_str(continuation),
            _ => lines.push(line.to_string()),
        }
    }
    lines
}

/// `CN=Domain Users,CN=Users,DC=example,DC=com` → `Domain Users`
fn common_name(dn: &str) -> Option<String> {
    let start = dn.find("CN=").or_else(|| dn.find("cn="))? + 3;
    let mut name = String::new();
    let mut chars = dn[start..].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    name.push(escaped);
                }
            }
            ',' => break,
            other => name.push(other),
        }
    }
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
