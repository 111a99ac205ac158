//! macOS keychain implementation
//!
//! Drives `/usr/bin/security`. Passwords are written through `security -i`
//! with the command on stdin, so the secret never appears in the process
//! table. Items are created with `-T <kinit>` so the ticket tool can read
//! them back without prompting.

use crate::core::runner::{Invocation, Tools};
use crate::core::CredentialStore;
use crate::constants::SECURITY_ITEM_NOT_FOUND;
use crate::models::{CredentialKey, Principal, SecureString};
use crate::utils::AdError;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Keychain-backed [`CredentialStore`]
pub struct Keychain {
    tools: Tools,
}

impl Keychain {
    pub fn new(tools: Tools) -> Self {
        Self { tools }
    }

    fn key(&self, principal: &Principal) -> CredentialKey {
        CredentialKey::for_principal(principal, &self.tools.settings().service_label)
    }

    /// `-a <account> -s <realm> -c <label>` selecting one item
    fn selector(key: &CredentialKey) -> Vec<String> {
        vec![
            "-a".to_string(),
            key.account.clone(),
            "-s".to_string(),
            key.realm.clone(),
            "-c".to_string(),
            key.service_label.clone(),
        ]
    }

    fn keychain_arg(&self) -> Option<String> {
        self.tools
            .settings()
            .keychain
            .as_ref()
            .map(|path| path.display().to_string())
    }

    /// Interactive-mode command line that adds or updates the item
    fn add_command(&self, key: &CredentialKey, secret: &SecureString) -> SecureString {
        let kinit = self.tools.paths().kinit.display().to_string();
        let mut words = vec![
            "add-generic-password".to_string(),
            "-U".to_string(),
        ];
        words.extend(Self::selector(key));
        words.extend(["-l".to_string(), key.label(), "-T".to_string(), kinit]);

        let mut line = words
            .iter()
            .map(|word| quote(word))
            .collect::<Vec<_>>()
            .join(" ");
        line.push_str(" -w ");
        line.push_str(&quote(secret.as_str()));
        if let Some(keychain) = self.keychain_arg() {
            line.push(' ');
            line.push_str(&quote(&keychain));
        }
        line.push('\n');
        SecureString::new(line)
    }
}

#[async_trait]
impl CredentialStore for Keychain {
    async fn find(&self, principal: &Principal) -> bool {
        let key = self.key(principal);
        let invocation = Invocation::new(&self.tools.paths().security)
            .arg("find-generic-password")
            .args(Self::selector(&key))
            .args(self.keychain_arg());

        match self.tools.run("find", invocation).await {
            Ok(output) if output.success() => {
                debug!(principal = %principal, "keychain item found");
                true
            }
            Ok(output) => {
                debug!(principal = %principal, code = ?output.code, "keychain item not found");
                false
            }
            Err(err) => {
                warn!(principal = %principal, error = %err, "keychain lookup failed; treating as not found");
                false
            }
        }
    }

    async fn save(&self, principal: &Principal, secret: &SecureString) -> Result<(), AdError> {
        // `security -i` reads one command per line; a line break would end
        // the add command and run the remainder as a command of its own
        if secret.as_str().contains(['\n', '\r', '\0']) {
            return Err(AdError::CredentialStoreFailure {
                operation: "save",
                principal: principal.to_string(),
                detail: "password contains a line break or NUL character".to_string(),
            });
        }

        let key = self.key(principal);
        let invocation = Invocation::new(&self.tools.paths().security)
            .arg("-i")
            .stdin(self.add_command(&key, secret));

        let output = self.tools.run("save", invocation).await?;
        // Interactive mode may exit 0 after a failed command; errors land on stderr
        if !output.success() || !output.stderr.trim().is_empty() {
            return Err(AdError::CredentialStoreFailure {
                operation: "save",
                principal: principal.to_string(),
                detail: failure_detail(output.code, &output.stderr),
            });
        }

        info!(principal = %principal, "password stored in keychain");
        Ok(())
    }

    async fn delete(&self, principal: &Principal) -> Result<(), AdError> {
        let key = self.key(principal);
        let invocation = Invocation::new(&self.tools.paths().security)
            .arg("delete-generic-password")
            .args(Self::selector(&key))
            .args(self.keychain_arg());

        let output = self.tools.run("delete", invocation).await?;
        if output.success() {
            info!(principal = %principal, "password removed from keychain");
            return Ok(());
        }
        if output.code == Some(SECURITY_ITEM_NOT_FOUND) {
            debug!(principal = %principal, "nothing to delete");
            return Ok(());
        }

        Err(AdError::CredentialStoreFailure {
            operation: "delete",
            principal: principal.to_string(),
            detail: failure_detail(output.code, &output.stderr),
        })
    }
}

fn failure_detail(code: Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    match (code, stderr.is_empty()) {
        (_, false) => stderr.to_string(),
        (Some(code), true) => format!("security exited with status {}", code),
        (None, true) => "security was terminated by a signal".to_string(),
    }
}

/// Double-quote a word for `security -i`, escaping `"` and `\`
fn quote(word: &str) -> String {
    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('"');
    for c in word.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
