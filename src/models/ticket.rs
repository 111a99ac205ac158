//! Ticket lifecycle types

use super::Principal;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

/// Position of the credential lifecycle
///
/// `NoTicket → Acquiring → Valid → (Expiring) → Renewing → Valid | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPhase {
    NoTicket,
    Acquiring,
    Valid,
    Expiring,
    Renewing,
    Failed,
}

impl fmt::Display for TicketPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TicketPhase::NoTicket => "no ticket",
            TicketPhase::Acquiring => "acquiring",
            TicketPhase::Valid => "valid",
            TicketPhase::Expiring => "expiring",
            TicketPhase::Renewing => "renewing",
            TicketPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Current ticket as reported by the ticket cache
///
/// Always re-queried; never kept between operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketState {
    pub principal: Principal,
    pub valid: bool,
    pub renewable: bool,
    /// `None` when the cache did not report an end time
    pub expires_at: Option<DateTime<Utc>>,
}

impl TicketState {
    /// Phase implied by this state at `now`
    ///
    /// An expired ticket maps to `Failed`; a valid ticket ending within
    /// `window` maps to `Expiring`.
    pub fn phase(&self, now: DateTime<Utc>, window: Duration) -> TicketPhase {
        if !self.valid {
            return TicketPhase::Failed;
        }
        match self.expires_at {
            Some(expires_at) if expires_at - now <= window => TicketPhase::Expiring,
            _ => TicketPhase::Valid,
        }
    }
}

/// Outcome of a password check against the KDC
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "output", rename_all = "snake_case")]
pub enum PasswordCheck {
    Success,
    IncorrectPassword,
    /// Anything else; carries the tool's raw output
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(valid: bool, expires_in_mins: Option<i64>, now: DateTime<Utc>) -> TicketState {
        TicketState {
            principal: Principal::parse("alice@EXAMPLE.COM").unwrap(),
            valid,
            renewable: true,
            expires_at: expires_in_mins.map(|m| now + Duration::minutes(m)),
        }
    }

    #[test]
    fn test_phase_derivation() {
        let now = Utc::now();
        let window = Duration::minutes(30);

        assert_eq!(state(true, Some(600), now).phase(now, window), TicketPhase::Valid);
        assert_eq!(state(true, Some(10), now).phase(now, window), TicketPhase::Expiring);
        assert_eq!(state(true, None, now).phase(now, window), TicketPhase::Valid);
        assert_eq!(state(false, Some(-5), now).phase(now, window), TicketPhase::Failed);
    }

    #[test]
    fn test_password_check_serialization() {
        let json = serde_json::to_value(PasswordCheck::Unknown("kdc down".to_string())).unwrap();
        assert_eq!(json["result"], "unknown");
        assert_eq!(json["output"], "kdc down");

        let json = serde_json::to_value(PasswordCheck::IncorrectPassword).unwrap();
        assert_eq!(json["result"], "incorrect_password");
    }
}
