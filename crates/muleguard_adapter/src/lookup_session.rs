#![forbid(unsafe_code)]

use muleguard_contracts::verification::{Identifier, VerificationOutcome};
use muleguard_contracts::ContractViolation;
use serde::{Deserialize, Serialize};

/// Tag handed to each submitted lookup. Strictly increasing within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LookupTicket(pub u64);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LookupState {
    #[default]
    Idle,
    Pending {
        ticket: LookupTicket,
        identifier: Identifier,
    },
    Completed {
        ticket: LookupTicket,
        outcome: VerificationOutcome,
    },
    Failed {
        ticket: LookupTicket,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupDelivery {
    Applied(VerificationOutcome),
    Failed(String),
    /// A newer query was issued (or this one already settled); the result
    /// was dropped without touching session state.
    Superseded {
        ticket: LookupTicket,
        current: LookupTicket,
    },
}

/// Lookup state for one operator. A new query replaces whatever was in
/// flight, and only the latest ticket may write a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupSession {
    last_ticket: u64,
    state: LookupState,
}

impl LookupSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a query. Invalid input leaves the session exactly as it was.
    pub fn begin(
        &mut self,
        raw_query: &str,
    ) -> Result<(LookupTicket, Identifier), ContractViolation> {
        let identifier = Identifier::new(raw_query)?;
        self.last_ticket += 1;
        let ticket = LookupTicket(self.last_ticket);
        self.state = LookupState::Pending {
            ticket,
            identifier: identifier.clone(),
        };
        Ok((ticket, identifier))
    }

    pub fn complete(
        &mut self,
        ticket: LookupTicket,
        result: Result<VerificationOutcome, String>,
    ) -> LookupDelivery {
        let awaited = matches!(
            &self.state,
            LookupState::Pending { ticket: pending, .. } if *pending == ticket
        );
        if !awaited {
            return LookupDelivery::Superseded {
                ticket,
                current: LookupTicket(self.last_ticket),
            };
        }
        match result {
            Ok(outcome) => {
                self.state = LookupState::Completed {
                    ticket,
                    outcome: outcome.clone(),
                };
                LookupDelivery::Applied(outcome)
            }
            Err(reason) => {
                self.state = LookupState::Failed {
                    ticket,
                    reason: reason.clone(),
                };
                LookupDelivery::Failed(reason)
            }
        }
    }

    pub fn state(&self) -> &LookupState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, LookupState::Pending { .. })
    }

    pub fn current_ticket(&self) -> Option<LookupTicket> {
        (self.last_ticket > 0).then_some(LookupTicket(self.last_ticket))
    }

    pub fn outcome(&self) -> Option<&VerificationOutcome> {
        match &self.state {
            LookupState::Completed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muleguard_contracts::verification::RiskLevel;

    fn clear(raw: &str) -> VerificationOutcome {
        VerificationOutcome::v1(Identifier::new(raw).unwrap(), vec![], RiskLevel::Clear).unwrap()
    }

    #[test]
    fn at_lookup_session_01_begin_marks_pending() {
        let mut s = LookupSession::new();
        assert!(!s.is_pending());
        assert_eq!(s.current_ticket(), None);
        let (ticket, id) = s.begin(" 0000000000 ").unwrap();
        assert_eq!(ticket, LookupTicket(1));
        assert_eq!(id.as_str(), "0000000000");
        assert!(s.is_pending());
    }

    #[test]
    fn at_lookup_session_02_invalid_query_keeps_previous_state() {
        let mut s = LookupSession::new();
        let (t1, _) = s.begin("1").unwrap();
        s.complete(t1, Ok(clear("1")));
        let before = s.clone();
        assert!(s.begin("   ").is_err());
        assert_eq!(s, before);
    }

    #[test]
    fn at_lookup_session_03_stale_result_is_discarded() {
        let mut s = LookupSession::new();
        let (old, _) = s.begin("1234567890").unwrap();
        let (new, _) = s.begin("0000000000").unwrap();

        let stale = s.complete(old, Ok(clear("1234567890")));
        assert_eq!(
            stale,
            LookupDelivery::Superseded {
                ticket: old,
                current: new,
            }
        );
        assert!(s.is_pending());

        let fresh = s.complete(new, Ok(clear("0000000000")));
        assert!(matches!(fresh, LookupDelivery::Applied(_)));
        assert_eq!(s.outcome().unwrap().identifier.as_str(), "0000000000");
    }

    #[test]
    fn at_lookup_session_04_late_result_never_overwrites_newer_outcome() {
        let mut s = LookupSession::new();
        let (old, _) = s.begin("a").unwrap();
        let (new, _) = s.begin("b").unwrap();
        s.complete(new, Ok(clear("b")));
        let late = s.complete(old, Ok(clear("a")));
        assert!(matches!(late, LookupDelivery::Superseded { .. }));
        assert_eq!(s.outcome().unwrap().identifier.as_str(), "b");
    }

    #[test]
    fn at_lookup_session_05_duplicate_completion_is_ignored() {
        let mut s = LookupSession::new();
        let (t, _) = s.begin("a").unwrap();
        assert!(matches!(
            s.complete(t, Ok(clear("a"))),
            LookupDelivery::Applied(_)
        ));
        assert!(matches!(
            s.complete(t, Err("late failure".to_string())),
            LookupDelivery::Superseded { .. }
        ));
        assert!(s.outcome().is_some());
    }

    #[test]
    fn at_lookup_session_06_state_serializes_with_tag() {
        let mut s = LookupSession::new();
        s.begin("0812345678").unwrap();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["state"]["state"], "pending");
        assert_eq!(json["state"]["identifier"], "0812345678");
        let back: LookupSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
