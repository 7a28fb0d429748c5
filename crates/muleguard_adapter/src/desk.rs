#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use muleguard_contracts::verification::Identifier;
use muleguard_engines::risk_classifier::outcome_from_records;
use muleguard_engines::source_registry::EvidenceSource;
use tokio::task::JoinHandle;

use crate::lookup_session::{LookupDelivery, LookupSession, LookupTicket};
use crate::{lock, AdapterError};

/// Runs lookups off the caller's path. `submit` flips the session to
/// pending right away; the outcome lands later through `PendingLookup`.
#[derive(Clone)]
pub struct VerificationDesk {
    source: Arc<dyn EvidenceSource>,
    session: Arc<Mutex<LookupSession>>,
    latency: Duration,
}

impl VerificationDesk {
    pub fn new(source: Arc<dyn EvidenceSource>, latency: Duration) -> Self {
        Self {
            source,
            session: Arc::new(Mutex::new(LookupSession::new())),
            latency,
        }
    }

    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, raw_query: &str) -> Result<PendingLookup, AdapterError> {
        let (ticket, identifier) = lock(&self.session)?.begin(raw_query)?;
        tracing::info!(ticket = ticket.0, identifier = %identifier, "lookup submitted");

        let identifier_for_caller = identifier.clone();
        let source = Arc::clone(&self.source);
        let session = Arc::clone(&self.session);
        let latency = self.latency;
        let handle = tokio::spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let records = source.lookup(&identifier);
            let result = outcome_from_records(identifier, records).map_err(|e| e.to_string());
            let delivery = match session.lock() {
                Ok(mut session) => session.complete(ticket, result),
                Err(_) => LookupDelivery::Failed("lookup session lock poisoned".to_string()),
            };
            match &delivery {
                LookupDelivery::Applied(outcome) => tracing::info!(
                    ticket = ticket.0,
                    aggregate_risk = outcome.aggregate_risk.as_str(),
                    matches = outcome.records.len(),
                    "lookup applied"
                ),
                LookupDelivery::Superseded { current, .. } => tracing::debug!(
                    ticket = ticket.0,
                    current = current.0,
                    "stale lookup result discarded"
                ),
                LookupDelivery::Failed(reason) => {
                    tracing::warn!(ticket = ticket.0, %reason, "lookup failed")
                }
            }
            delivery
        });
        Ok(PendingLookup {
            ticket,
            identifier: identifier_for_caller,
            handle,
        })
    }

    pub fn session_snapshot(&self) -> Result<LookupSession, AdapterError> {
        Ok(lock(&self.session)?.clone())
    }
}

#[must_use = "a pending lookup does nothing for the caller unless settled"]
pub struct PendingLookup {
    pub ticket: LookupTicket,
    pub identifier: Identifier,
    handle: JoinHandle<LookupDelivery>,
}

impl PendingLookup {
    pub async fn settle(self) -> Result<LookupDelivery, AdapterError> {
        self.handle
            .await
            .map_err(|e| AdapterError::LookupTaskFailed(e.to_string()))
    }
}
