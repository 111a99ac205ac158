//! Platform-agnostic credential storage trait

use crate::models::{Principal, SecureString};
use crate::utils::AdError;
use async_trait::async_trait;

/// Secure store for a principal's domain password
///
/// Records are keyed by `(account, realm, service label)`. Implementations
/// handle platform-specific storage (the login keychain on macOS).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Check whether a password is stored for `principal`
    ///
    /// Never reveals the secret. Any failure to query the store reads as
    /// "not found", since this is only a gate before ticket acquisition.
    async fn find(&self, principal: &Principal) -> bool;

    /// Store `secret` for `principal`, replacing any previous value
    ///
    /// # Security
    /// - The secret MUST NOT appear in process arguments or logs
    /// - Only the ticket acquisition tool may read it back
    async fn save(&self, principal: &Principal, secret: &SecureString) -> Result<(), AdError>;

    /// Remove the stored password for `principal`
    ///
    /// # Returns
    /// * `Ok(())` - Success (idempotent - succeeds even if nothing is stored)
    async fn delete(&self, principal: &Principal) -> Result<(), AdError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock_tools::MemoryCredentialStore;

    #[tokio::test]
    async fn test_find_after_save_roundtrip() {
        let store = MemoryCredentialStore::new();
        let bob = Principal::parse("bob@example.com").unwrap();
        let carol = Principal::parse("carol@example.com").unwrap();

        assert!(!store.find(&bob).await);

        store.save(&bob, &SecureString::new("s3cret")).await.unwrap();
        assert!(store.find(&bob).await);
        assert!(!store.find(&carol).await);

        store.delete(&bob).await.unwrap();
        assert!(!store.find(&bob).await);
        // Deleting again is fine
        store.delete(&bob).await.unwrap();
    }
}
