//! Scripted tool doubles for testing without a bound Mac
//!
//! [`ScriptedRunner`] answers tool invocations from a list of rules and
//! records every call, so tests can assert both on results and on which
//! tools were (or were not) run. [`MemoryCredentialStore`] stands in for the
//! keychain.

use super::credential::CredentialStore;
use super::runner::{CommandOutput, CommandRunner, Invocation, Tools};
use crate::config::Settings;
use crate::models::{CredentialKey, Principal, SecureString};
use crate::utils::{AdError, CommandError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a matching rule produces
#[derive(Debug, Clone)]
pub enum Scripted {
    Output(CommandOutput),
    Timeout,
}

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Arg(String),
    Stdin(String),
}

#[derive(Debug, Clone)]
struct Rule {
    program: String,
    matcher: Matcher,
    outcome: Scripted,
}

impl Rule {
    fn matches(&self, invocation: &Invocation) -> bool {
        if invocation.program_name() != self.program {
            return false;
        }
        match &self.matcher {
            Matcher::Any => true,
            Matcher::Arg(needle) => invocation.get_args().iter().any(|arg| arg == needle),
            Matcher::Stdin(needle) => invocation
                .get_stdin()
                .map(|stdin| stdin.as_str().contains(needle))
                .unwrap_or(false),
        }
    }
}

/// An invocation as the runner saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

/// Rule-driven [`CommandRunner`]; the first matching rule wins
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(stdout: &str) -> Scripted {
        Scripted::Output(CommandOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    pub fn ok_with_stderr(stdout: &str, stderr: &str) -> Scripted {
        Scripted::Output(CommandOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })
    }

    pub fn failed(code: i32, stderr: &str) -> Scripted {
        Scripted::Output(CommandOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    /// Answer every call to `program`
    pub fn on(self, program: &str, outcome: Scripted) -> Self {
        self.push(program, Matcher::Any, outcome)
    }

    /// Answer calls to `program` with `needle` as one whole argument
    pub fn on_arg(self, program: &str, needle: &str, outcome: Scripted) -> Self {
        self.push(program, Matcher::Arg(needle.to_string()), outcome)
    }

    /// Answer calls to `program` whose stdin contains `needle`
    pub fn on_stdin(self, program: &str, needle: &str, outcome: Scripted) -> Self {
        self.push(program, Matcher::Stdin(needle.to_string()), outcome)
    }

    /// Append the rules of `fallback` after ours
    pub fn extend(mut self, fallback: ScriptedRunner) -> Self {
        self.rules.extend(fallback.rules);
        self
    }

    fn push(mut self, program: &str, matcher: Matcher, outcome: Scripted) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            matcher,
            outcome,
        });
        self
    }

    /// [`Tools`] with default settings wired to this runner
    pub fn tools(&self) -> Tools {
        Tools::new(Arc::new(self.clone()), Arc::new(Settings::default()))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.program == program)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let program = invocation.program_name();
        self.calls.lock().unwrap().push(RecordedCall {
            program: program.clone(),
            args: invocation.get_args().to_vec(),
            stdin: invocation.get_stdin().map(|s| s.as_str().to_string()),
        });

        let rule = self.rules.iter().find(|rule| rule.matches(invocation));
        match rule.map(|rule| rule.outcome.clone()) {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Timeout) => Err(CommandError::Timeout {
                program,
                after: Duration::from_secs(30),
            }),
            None => Err(CommandError::Spawn {
                program,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no scripted rule"),
            }),
        }
    }
}

/// Rules for a Mac bound to `domain`
pub fn bound_host(domain: &str) -> ScriptedRunner {
    let flat = domain
        .split('.')
        .next()
        .unwrap_or(domain)
        .to_uppercase();
    ScriptedRunner::new()
        .on(
            "dsconfigad",
            ScriptedRunner::ok(&format!(
                "Active Directory Forest          = {domain}\nActive Directory Domain          = {domain}\nComputer Account                 = mac01$\n"
            )),
        )
        .on_stdin(
            "scutil",
            "opendirectoryd.ActiveDirectory",
            ScriptedRunner::ok(&format!(
                "<dictionary> {{\n  DomainNameDns : {domain}\n  DomainNameFlat : {flat}\n}}\n"
            )),
        )
        .on_stdin(
            "scutil",
            "node:/Search",
            ScriptedRunner::ok(&format!(
                "<array> {{\n  0 : /Local/Default\n  1 : /Active Directory/{flat}/All Domains\n}}\n"
            )),
        )
        .on_stdin(
            "scutil",
            "Kerberos-Default-Realms",
            ScriptedRunner::ok(&format!(
                "<array> {{\n  0 : {}\n}}\n",
                domain.to_uppercase()
            )),
        )
}

/// Rules for a Mac with no directory binding
pub fn unbound_host() -> ScriptedRunner {
    ScriptedRunner::new().on("dsconfigad", ScriptedRunner::ok(""))
}

/// Keychain stand-in keyed like the real one
#[derive(Default)]
pub struct MemoryCredentialStore {
    label: String,
    items: Mutex<HashMap<CredentialKey, SecureString>>,
    reject_saves: bool,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            label: "aapl".to_string(),
            ..Self::default()
        }
    }

    /// A store whose writes always fail
    pub fn read_only() -> Self {
        Self {
            reject_saves: true,
            ..Self::new()
        }
    }

    pub fn secret_for(&self, principal: &Principal) -> Option<String> {
        let key = CredentialKey::for_principal(principal, &self.label);
        self.items
            .lock()
            .unwrap()
            .get(&key)
            .map(|secret| secret.as_str().to_string())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find(&self, principal: &Principal) -> bool {
        let key = CredentialKey::for_principal(principal, &self.label);
        self.items.lock().unwrap().contains_key(&key)
    }

    async fn save(&self, principal: &Principal, secret: &SecureString) -> Result<(), AdError> {
        if self.reject_saves {
            return Err(AdError::CredentialStoreFailure {
                operation: "save",
                principal: principal.to_string(),
                detail: "store is read-only".to_string(),
            });
        }
        let key = CredentialKey::for_principal(principal, &self.label);
        self.items.lock().unwrap().insert(key, secret.clone());
        Ok(())
    }

    async fn delete(&self, principal: &Principal) -> Result<(), AdError> {
        let key = CredentialKey::for_principal(principal, &self.label);
        self.items.lock().unwrap().remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_arg_rule_matches_whole_argument() {
        let runner = ScriptedRunner::new()
            .on_arg("kinit", "--renew", ScriptedRunner::failed(1, "renew failed"))
            .on("kinit", ScriptedRunner::ok("acquired"));

        let renew = runner
            .run(&Invocation::new("/usr/bin/kinit").arg("--renew"))
            .await
            .unwrap();
        assert_eq!(renew.code, Some(1));

        // `--renewable` must not be mistaken for `--renew`
        let acquire = runner
            .run(&Invocation::new("/usr/bin/kinit").args(["-l", "10h", "--renewable", "bob@EXAMPLE.COM"]))
            .await
            .unwrap();
        assert_eq!(acquire.stdout, "acquired");
    }
}
