//! Ticket manager
//!
//! Drives `kinit`/`klist` through the credential lifecycle:
//!
//! ```text
//! NoTicket → Acquiring → Valid → (Expiring) → Renewing → Valid | Failed
//! ```
//!
//! Every operation is one-shot: at most one ticket tool invocation, no
//! retries, no backoff. The ticket cache is the source of truth; the phase
//! kept here only records the outcome of the last operation.

use super::credential::CredentialStore;
use super::runner::{CommandOutput, Invocation, Tools};
use crate::constants::INCORRECT_PASSWORD_MARKER;
use crate::models::{PasswordCheck, Principal, SecureString, TicketPhase, TicketState};
use crate::utils::AdError;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub struct TicketManager {
    tools: Tools,
    store: Arc<dyn CredentialStore>,
    phase: Mutex<TicketPhase>,
}

impl TicketManager {
    pub fn new(tools: Tools, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            tools,
            store,
            phase: Mutex::new(TicketPhase::NoTicket),
        }
    }

    /// Phase reached by the most recent operation
    pub fn phase(&self) -> TicketPhase {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, to: TicketPhase) {
        let mut phase = self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *phase != to {
            info!(from = %*phase, to = %to, "ticket phase changed");
            *phase = to;
        }
    }

    /// `kinit -l <lifetime> --renewable` plus any extra arguments
    fn kinit(&self) -> Invocation {
        Invocation::new(&self.tools.paths().kinit).args([
            "-l",
            self.tools.settings().ticket_lifetime.as_str(),
            "--renewable",
        ])
    }

    /// Check `password` for `principal` without storing it
    ///
    /// The password is written to the tool's stdin, never its arguments.
    /// A successful check leaves a fresh ticket in the cache.
    ///
    /// # Returns
    /// * `Ok(PasswordCheck::IncorrectPassword)` - stderr mentions "incorrect"
    /// * `Ok(PasswordCheck::Success)` - the tool succeeded with empty stderr
    /// * `Ok(PasswordCheck::Unknown(output))` - anything else, raw output attached
    /// * `Err(ProcessFailure)` - the tool could not be run at all
    pub async fn test_password(
        &self,
        principal: &Principal,
        password: &SecureString,
    ) -> Result<PasswordCheck, AdError> {
        self.transition(TicketPhase::Acquiring);
        let invocation = self
            .kinit()
            .arg("--password-file=STDIN")
            .arg(principal.to_string())
            .stdin(password.with_newline());

        let output = match self.tools.run("test_password", invocation).await {
            Ok(output) => output,
            Err(err) => {
                self.transition(TicketPhase::Failed);
                return Err(err);
            }
        };

        let check = classify_password_check(&output);
        match &check {
            PasswordCheck::Success => self.transition(TicketPhase::Valid),
            PasswordCheck::IncorrectPassword => {
                info!(principal = %principal, "password rejected by KDC");
                self.transition(TicketPhase::Failed);
            }
            PasswordCheck::Unknown(raw) => {
                warn!(principal = %principal, output = %raw, "password check inconclusive");
                self.transition(TicketPhase::Failed);
            }
        }
        Ok(check)
    }

    /// Acquire a ticket using the password stored in the credential store
    ///
    /// Returns `false` without running kinit when nothing is stored. Any
    /// kinit failure (including a stale stored password) also returns
    /// `false`; the caller should then prompt for a password, check it with
    /// [`TicketManager::test_password`] and save it.
    pub async fn acquire_via_store(&self, principal: &Principal) -> bool {
        if !self.store.find(principal).await {
            info!(principal = %principal, "no stored password; skipping acquisition");
            return false;
        }

        self.transition(TicketPhase::Acquiring);
        // kinit reads the stored password from the keychain on its own
        let invocation = self.kinit().arg(principal.to_string());
        match self.tools.run_checked("acquire_via_store", invocation).await {
            Ok(_) => {
                info!(principal = %principal, "ticket acquired from stored password");
                self.transition(TicketPhase::Valid);
                true
            }
            Err(err) => {
                warn!(principal = %principal, error = %err, "ticket acquisition failed");
                self.transition(TicketPhase::Failed);
                false
            }
        }
    }

    /// Renew the default ticket
    ///
    /// Every failure cause collapses to `false`; query [`TicketManager::ticket_state`]
    /// for details.
    pub async fn renew(&self) -> bool {
        self.transition(TicketPhase::Renewing);
        let invocation = Invocation::new(&self.tools.paths().kinit).arg("--renew");
        match self.tools.run_checked("renew", invocation).await {
            Ok(_) => {
                self.transition(TicketPhase::Valid);
                true
            }
            Err(err) => {
                warn!(error = %err, "ticket renewal failed");
                self.transition(TicketPhase::Failed);
                false
            }
        }
    }

    /// Current ticket as reported by `klist -v`
    ///
    /// `Ok(None)` when there is no ticket cache or it holds no usable principal.
    pub async fn ticket_state(&self) -> Result<Option<TicketState>, AdError> {
        let output = self
            .tools
            .run(
                "ticket_state",
                Invocation::new(&self.tools.paths().klist).arg("-v"),
            )
            .await?;
        if !output.success() {
            debug!(code = ?output.code, "no ticket cache");
            return Ok(None);
        }
        Ok(parse_klist_verbose(&output.stdout, Utc::now()))
    }

    /// Phase implied by the ticket cache right now
    pub async fn current_phase(&self) -> Result<TicketPhase, AdError> {
        let window = self.tools.settings().renewal_window();
        Ok(match self.ticket_state().await? {
            Some(state) => state.phase(Utc::now(), window),
            None => TicketPhase::NoTicket,
        })
    }
}

fn classify_password_check(output: &CommandOutput) -> PasswordCheck {
    let stderr = output.stderr.trim();
    if stderr.to_lowercase().contains(INCORRECT_PASSWORD_MARKER) {
        return PasswordCheck::IncorrectPassword;
    }
    if output.success() && stderr.is_empty() {
        return PasswordCheck::Success;
    }
    let raw = if stderr.is_empty() {
        output.stdout.trim()
    } else {
        stderr
    };
    PasswordCheck::Unknown(raw.to_string())
}

/// Build a [`TicketState`] from Heimdal `klist -v` output
///
/// Uses the first `krbtgt/` credential (or the first credential when no TGT
/// is listed) for expiry and flags.
fn parse_klist_verbose(output: &str, now: DateTime<Utc>) -> Option<TicketState> {
    let principal = output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("Principal:"))
        .and_then(|value| Principal::parse(value.trim()).ok())?;

    let mut credentials: Vec<Vec<&str>> = Vec::new();
    for line in output.lines().map(str::trim) {
        if line.starts_with("Server:") {
            credentials.push(vec![line]);
        } else if let Some(current) = credentials.last_mut() {
            current.push(line);
        }
    }

    let is_tgt = |credential: &&Vec<&str>| {
        field(credential, "Server:")
            .map(|server| server.starts_with("krbtgt/"))
            .unwrap_or(false)
    };
    let credential = match credentials.iter().find(is_tgt).or_else(|| credentials.first()) {
        Some(credential) => credential,
        None => {
            return Some(TicketState {
                principal,
                valid: false,
                renewable: false,
                expires_at: None,
            })
        }
    };

    let end_time = field(credential, "End time:");
    let expired_marker = end_time
        .map(|value| value.to_lowercase().contains("expired"))
        .unwrap_or(false);
    let expires_at = end_time.and_then(parse_klist_time);
    let renewable = field(credential, "Ticket flags:")
        .map(|flags| flags.split(',').any(|flag| flag.trim() == "renewable"))
        .unwrap_or(false);
    let valid = !expired_marker && expires_at.map(|at| at > now).unwrap_or(true);

    Some(TicketState {
        principal,
        valid,
        renewable,
        expires_at,
    })
}

fn field<'a>(lines: &[&'a str], name: &str) -> Option<&'a str> {
    lines
        .iter()
        .find_map(|line| line.strip_prefix(name))
        .map(str::trim)
}

/// `Oct 18 19:00:00 2026` (local time), optionally followed by `(expired)`
fn parse_klist_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.split('(').next().unwrap_or(value);
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&normalized, "%b %d %H:%M:%S %Y").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
