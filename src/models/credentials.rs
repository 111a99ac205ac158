//! Principal and credential model types
//!
//! SECURITY: Secret types zero their memory on drop.

use crate::utils::AdError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// Kerberos identity `username@REALM`
///
/// The realm is always stored upper-cased; the username keeps its case.
/// A `Principal` can only be built from a well-formed value, so holding one
/// means both halves are non-empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Principal {
    username: String,
    realm: String,
}

impl Principal {
    /// Create a principal from its parts, upper-casing the realm
    pub fn new(username: impl Into<String>, realm: impl AsRef<str>) -> Result<Self, AdError> {
        let username = username.into();
        let realm = realm.as_ref().trim().to_uppercase();
        let username_trimmed = username.trim();

        if username_trimmed.is_empty()
            || realm.is_empty()
            || username_trimmed.contains('@')
            || realm.contains('@')
        {
            return Err(AdError::malformed(
                "principal",
                format!("{}@{}", username, realm),
            ));
        }

        Ok(Principal {
            username: username_trimmed.to_string(),
            realm,
        })
    }

    /// Parse `user@realm`
    ///
    /// Fails with `MalformedPrincipal` when there is no `@`, when either side
    /// is empty, or when more than one `@` is present.
    pub fn parse(input: &str) -> Result<Self, AdError> {
        let trimmed = input.trim();
        let (username, realm) = trimmed
            .split_once('@')
            .ok_or_else(|| AdError::malformed("split_principal", trimmed))?;

        Principal::new(username, realm).map_err(|_| AdError::malformed("split_principal", trimmed))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// DNS form of the realm, used for directory lookups
    pub fn domain(&self) -> String {
        self.realm.to_lowercase()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.realm)
    }
}

impl FromStr for Principal {
    type Err = AdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Principal::parse(s)
    }
}

/// Password that zeros memory on drop
///
/// SECURITY: This type never implements Display or Debug in a way that reveals the password.
pub struct SecureString(String);

impl Clone for SecureString {
    fn clone(&self) -> Self {
        SecureString(self.0.clone())
    }
}

impl SecureString {
    /// Create a new secure string
    pub fn new(password: impl Into<String>) -> Self {
        SecureString(password.into())
    }

    /// Copy of this secret followed by a newline, for tools reading a line from stdin
    pub fn with_newline(&self) -> Self {
        let mut line = String::with_capacity(self.0.len() + 1);
        line.push_str(&self.0);
        line.push('\n');
        SecureString(line)
    }

    /// Get the password as a string slice
    ///
    /// Use this sparingly and only when necessary to hand the secret to a tool.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SECURITY: Never reveal the password content
        write!(f, "SecureString(*** {} bytes ***)", self.0.len())
    }
}

/// Key tuple a stored password lives under in the credential store
///
/// The secret itself is never part of the key; it is handed to the store
/// separately and dropped as soon as the operation finishes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    pub account: String,
    pub realm: String,
    pub service_label: String,
}

impl CredentialKey {
    pub fn for_principal(principal: &Principal, service_label: &str) -> Self {
        CredentialKey {
            account: principal.username().to_string(),
            realm: principal.realm().to_string(),
            service_label: service_label.to_string(),
        }
    }

    /// Human readable item label, e.g. `EXAMPLE.COM (alice)`
    pub fn label(&self) -> String {
        format!("{} ({})", self.realm, self.account)
    }
}
