//! Directory status provider
//!
//! Answers "is this Mac bound to Active Directory, and to what?" from
//! `dsconfigad`, the `scutil` dynamic store and `dig`. Nothing is cached:
//! the binding can change at any moment, so every call asks again.

use super::runner::{Invocation, Tools};
use super::scutil::{self, StoreValue};
use crate::constants::*;
use crate::models::{DirectoryStatus, SecureString};
use crate::utils::{AdError, CommandError};
use std::collections::BTreeSet;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct DirectoryService {
    tools: Tools,
}

impl DirectoryService {
    pub fn new(tools: Tools) -> Self {
        Self { tools }
    }

    /// True iff the directory configuration shows an Active Directory binding
    pub async fn is_bound(&self) -> Result<bool, AdError> {
        let output = self
            .tools
            .run_checked(
                "is_bound",
                Invocation::new(&self.tools.paths().dsconfigad).arg("-show"),
            )
            .await?;
        let bound = output.stdout.contains(ACTIVE_DIRECTORY_MARKER);
        debug!(bound, "directory binding checked");
        Ok(bound)
    }

    /// Fail with `NotBound` on behalf of `operation` unless bound
    pub async fn require_bound(&self, operation: &'static str) -> Result<(), AdError> {
        if self.is_bound().await? {
            Ok(())
        } else {
            Err(AdError::NotBound { operation })
        }
    }

    /// DNS name of the joined domain
    pub async fn current_domain(&self) -> Result<Option<String>, AdError> {
        self.require_bound("current_domain").await?;
        self.read_domain("current_domain").await
    }

    /// Ordered search policy; `None` when nothing is configured
    pub async fn search_nodes(&self) -> Result<Option<Vec<String>>, AdError> {
        self.require_bound("search_nodes").await?;
        self.read_search_nodes("search_nodes").await
    }

    /// Default Kerberos realms; `None` when nothing is configured
    pub async fn realms(&self) -> Result<Option<BTreeSet<String>>, AdError> {
        self.require_bound("realms").await?;
        Ok(self
            .read_realm_list("realms")
            .await?
            .map(|realms| realms.into_iter().collect()))
    }

    /// First default realm in configured order
    pub async fn first_realm(&self) -> Result<Option<String>, AdError> {
        self.require_bound("first_realm").await?;
        Ok(self
            .read_realm_list("first_realm")
            .await?
            .and_then(|realms| realms.into_iter().next()))
    }

    /// First search node served by the Active Directory plugin
    pub async fn ad_node(&self) -> Result<Option<String>, AdError> {
        self.require_bound("ad_node").await?;
        Ok(self.read_search_nodes("ad_node").await?.and_then(|nodes| {
            nodes
                .into_iter()
                .find(|node| node.contains(ACTIVE_DIRECTORY_MARKER))
        }))
    }

    /// Full snapshot of the binding; every field but `bound` is `None` when unbound
    ///
    /// The binding is checked once; the store keys are then read as they are.
    pub async fn status(&self) -> Result<DirectoryStatus, AdError> {
        if !self.is_bound().await? {
            return Ok(DirectoryStatus::unbound());
        }
        Ok(DirectoryStatus {
            bound: true,
            domain: self.read_domain("status").await?,
            search_nodes: self.read_search_nodes("status").await?,
            realms: self
                .read_realm_list("status")
                .await?
                .map(|realms| realms.into_iter().collect()),
        })
    }

    async fn read_domain(&self, operation: &'static str) -> Result<Option<String>, AdError> {
        let value = self.read_store(operation, STORE_KEY_ACTIVE_DIRECTORY).await?;
        Ok(value
            .as_ref()
            .and_then(|info| info.get("DomainNameDns"))
            .and_then(StoreValue::as_str)
            .map(str::trim)
            .filter(|domain| !domain.is_empty())
            .map(str::to_string))
    }

    async fn read_search_nodes(
        &self,
        operation: &'static str,
    ) -> Result<Option<Vec<String>>, AdError> {
        let value = self.read_store(operation, STORE_KEY_SEARCH_NODES).await?;
        Ok(value.as_ref().and_then(StoreValue::strings))
    }

    /// Realms in dynamic-store order
    async fn read_realm_list(
        &self,
        operation: &'static str,
    ) -> Result<Option<Vec<String>>, AdError> {
        let value = self.read_store(operation, STORE_KEY_DEFAULT_REALMS).await?;
        Ok(value.as_ref().and_then(StoreValue::strings))
    }

    /// User logged in at the console, resolved now
    ///
    /// `None` while the login window is showing.
    pub async fn console_user(&self) -> Result<Option<String>, AdError> {
        let value = self
            .read_store("console_user", STORE_KEY_CONSOLE_USER)
            .await?;
        Ok(value
            .as_ref()
            .and_then(|session| session.get("Name"))
            .and_then(StoreValue::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != LOGIN_WINDOW_USER)
            .map(str::to_string))
    }

    /// True iff an LDAP SRV record exists for `domain`
    ///
    /// "No answer" is `Ok(false)`; a lookup that cannot run is an error.
    pub async fn is_reachable(&self, domain: &str) -> Result<bool, AdError> {
        let record = format!("_ldap._tcp.{}", domain.trim().trim_end_matches('.'));
        let output = self
            .tools
            .run_checked(
                "is_reachable",
                Invocation::new(&self.tools.paths().dig).args(["-t", "srv", record.as_str()]),
            )
            .await?;
        let reachable = output.stdout.contains("ANSWER SECTION");
        debug!(domain, reachable, "SRV lookup finished");
        Ok(reachable)
    }

    /// Reachability of `domain`, or of the joined domain when none is given
    ///
    /// Without a configured domain there is nothing to reach, so the answer
    /// is `false`.
    pub async fn accessible(&self, domain: Option<&str>) -> Result<bool, AdError> {
        match domain {
            Some(domain) => self.is_reachable(domain).await,
            None => match self.current_domain().await? {
                Some(domain) => self.is_reachable(&domain).await,
                None => {
                    warn!("no Active Directory domain configured; treating as unreachable");
                    Ok(false)
                }
            },
        }
    }

    /// Network home share of `user` as an `smb://` URL
    ///
    /// Empty when the record has no `SMBHome` attribute.
    pub async fn smb_home(&self, user: &str, node: &str) -> Result<String, AdError> {
        self.require_bound("smb_home").await?;
        let record = format!("/Users/{}", user);
        let output = self
            .tools
            .run(
                "smb_home",
                Invocation::new(&self.tools.paths().dscl).args([
                    node,
                    "-read",
                    record.as_str(),
                    "SMBHome",
                ]),
            )
            .await?;

        if !output.success() || output.stdout.contains("No such key:") {
            debug!(user, "no SMBHome attribute");
            return Ok(String::new());
        }
        Ok(smb_url(&output.stdout).unwrap_or_default())
    }

    async fn read_store(
        &self,
        operation: &'static str,
        key: &str,
    ) -> Result<Option<StoreValue>, AdError> {
        let invocation = Invocation::new(&self.tools.paths().scutil)
            .stdin(SecureString::new(format!("show {}\n", key)));
        let program = invocation.program_name();
        let output = self.tools.run_checked(operation, invocation).await?;

        scutil::parse(&output.stdout).map_err(|detail| AdError::ProcessFailure {
            operation,
            source: CommandError::Output { program, detail },
        })
    }
}

/// `SMBHome: \\server\share\user` → `smb://server/share/user`
fn smb_url(dscl_output: &str) -> Option<String> {
    let value = dscl_output
        .split_once(':')
        .map(|(_, value)| value)
        .unwrap_or(dscl_output)
        .trim();
    if value.is_empty() {
        return None;
    }
    let path = value.replace("\\\\", "/").replace('\\', "/");
    Some(format!("smb:/{}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock_tools::{bound_host, unbound_host, ScriptedRunner};

    #[tokio::test]
    async fn test_unbound_host() {
        let runner = unbound_host();
        let directory = DirectoryService::new(runner.tools());

        assert!(!directory.is_bound().await.unwrap());
        assert!(directory.current_domain().await.unwrap_err().is_not_bound());
        assert!(directory.search_nodes().await.unwrap_err().is_not_bound());
        assert!(directory.realms().await.unwrap_err().is_not_bound());
        assert_eq!(directory.status().await.unwrap(), DirectoryStatus::unbound());
        // Only dsconfigad was consulted
        assert!(runner.calls_to("scutil").is_empty());
    }

    #[tokio::test]
    async fn test_bound_status() {
        let runner = bound_host("example.com");
        let directory = DirectoryService::new(runner.tools());

        let status = directory.status().await.unwrap();
        assert!(status.bound);
        assert_eq!(status.domain.as_deref(), Some("example.com"));
        assert_eq!(
            status.search_nodes.unwrap(),
            vec!["/Local/Default", "/Active Directory/EXAMPLE/All Domains"]
        );
        assert_eq!(
            status.realms.unwrap().into_iter().collect::<Vec<_>>(),
            vec!["EXAMPLE.COM"]
        );
        assert_eq!(
            directory.ad_node().await.unwrap().as_deref(),
            Some("/Active Directory/EXAMPLE/All Domains")
        );
    }

    #[tokio::test]
    async fn test_status_checks_binding_once() {
        let runner = bound_host("example.com");
        let directory = DirectoryService::new(runner.tools());

        directory.status().await.unwrap();
        assert_eq!(runner.calls_to("dsconfigad").len(), 1);
        assert_eq!(runner.calls_to("scutil").len(), 3);
    }

    #[tokio::test]
    async fn test_first_realm_keeps_configured_order() {
        let runner = ScriptedRunner::new().on_stdin(
            "scutil",
            "Kerberos-Default-Realms",
            ScriptedRunner::ok("<array> {\n  0 : ZETA.EXAMPLE.COM\n  1 : ALPHA.EXAMPLE.COM\n}\n"),
        );
        let runner = bound_host_with(runner);
        let directory = DirectoryService::new(runner.tools());

        assert_eq!(
            directory.first_realm().await.unwrap().as_deref(),
            Some("ZETA.EXAMPLE.COM")
        );
        // The set view is still sorted
        assert_eq!(
            directory.realms().await.unwrap().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["ALPHA.EXAMPLE.COM", "ZETA.EXAMPLE.COM"]
        );
    }

    #[tokio::test]
    async fn test_store_key_sent_on_stdin() {
        let runner = bound_host("example.com");
        let directory = DirectoryService::new(runner.tools());
        directory.realms().await.unwrap();

        let calls = runner.calls_to("scutil");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].stdin.as_deref(), Some("show Kerberos-Default-Realms\n"));
    }

    #[tokio::test]
    async fn test_missing_search_nodes_is_absent() {
        let runner = ScriptedRunner::new()
            .on_stdin("scutil", "node:/Search", ScriptedRunner::ok("  No such key\n"));
        let runner = bound_host_with(runner);
        let directory = DirectoryService::new(runner.tools());

        assert_eq!(directory.search_nodes().await.unwrap(), None);
        assert_eq!(directory.ad_node().await.unwrap(), None);
    }

    fn bound_host_with(overrides: ScriptedRunner) -> ScriptedRunner {
        overrides.extend(bound_host("example.com"))
    }

    #[tokio::test]
    async fn test_dsconfigad_failure_propagates() {
        let runner = ScriptedRunner::new().on(
            "dsconfigad",
            ScriptedRunner::failed(1, "dsconfigad: Operation not permitted"),
        );
        let directory = DirectoryService::new(runner.tools());

        let err = directory.is_bound().await.unwrap_err();
        assert!(matches!(err, AdError::ProcessFailure { operation: "is_bound", .. }));
    }

    #[tokio::test]
    async fn test_reachability() {
        let runner = ScriptedRunner::new()
            .on_arg(
                "dig",
                "_ldap._tcp.example.com",
                ScriptedRunner::ok(";; ANSWER SECTION:\n_ldap._tcp.example.com. 600 IN SRV 0 100 389 dc1.example.com.\n"),
            )
            .on_arg(
                "dig",
                "_ldap._tcp.nowhere.test",
                ScriptedRunner::ok(";; QUESTION SECTION:\n;_ldap._tcp.nowhere.test. IN SRV\n"),
            )
            .on_arg(
                "dig",
                "_ldap._tcp.broken.test",
                ScriptedRunner::failed(9, ";; connection timed out; no servers could be reached"),
            );
        let directory = DirectoryService::new(runner.tools());

        assert!(directory.is_reachable("example.com").await.unwrap());
        assert!(!directory.is_reachable("nowhere.test").await.unwrap());
        let err = directory.is_reachable("broken.test").await.unwrap_err();
        assert!(matches!(err, AdError::ProcessFailure { operation: "is_reachable", .. }));
    }

    #[tokio::test]
    async fn test_accessible_defaults_to_current_domain() {
        let runner = ScriptedRunner::new()
            .on_arg(
                "dig",
                "_ldap._tcp.example.com",
                ScriptedRunner::ok(";; ANSWER SECTION:\n"),
            )
            .extend(bound_host("example.com"));
        let directory = DirectoryService::new(runner.tools());

        assert!(directory.accessible(None).await.unwrap());
    }

    #[tokio::test]
    async fn test_console_user() {
        let runner = ScriptedRunner::new().on_stdin(
            "scutil",
            "ConsoleUser",
            ScriptedRunner::ok("<dictionary> {\n  Name : alice\n  UID : 501\n}\n"),
        );
        let directory = DirectoryService::new(runner.tools());
        assert_eq!(directory.console_user().await.unwrap().as_deref(), Some("alice"));

        let runner = ScriptedRunner::new().on_stdin(
            "scutil",
            "ConsoleUser",
            ScriptedRunner::ok("<dictionary> {\n  Name : loginwindow\n}\n"),
        );
        let directory = DirectoryService::new(runner.tools());
        assert_eq!(directory.console_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_smb_home() {
        let runner = ScriptedRunner::new()
            .on_arg(
                "dscl",
                "SMBHome",
                ScriptedRunner::ok("SMBHome: \\\\fs01.example.com\\homes\\alice\n"),
            )
            .extend(bound_host("example.com"));
        let directory = DirectoryService::new(runner.tools());

        assert_eq!(
            directory.smb_home("alice", ".").await.unwrap(),
            "smb://fs01.example.com/homes/alice"
        );
    }

    #[tokio::test]
    async fn test_smb_home_missing() {
        let runner = ScriptedRunner::new()
            .on_arg(
                "dscl",
                "SMBHome",
                ScriptedRunner::failed(181, "No such key: SMBHome"),
            )
            .extend(bound_host("example.com"));
        let directory = DirectoryService::new(runner.tools());

        assert_eq!(directory.smb_home("alice", ".").await.unwrap(), "");
    }
}
