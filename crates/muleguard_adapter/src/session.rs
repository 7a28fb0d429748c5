#![forbid(unsafe_code)]

use muleguard_contracts::api_keys::{ApiKeyId, Application};
use muleguard_contracts::UnixTimeMs;
use serde::{Deserialize, Serialize};

use crate::desk::PendingLookup;
use crate::lookup_session::{LookupDelivery, LookupState, LookupTicket};
use crate::{
    AdapterError, AdapterRuntime, ApiKeyView, ConfirmRequest, DeleteKeyResponse,
    IssueKeyRequest, IssueKeyResponse,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsoleView {
    #[default]
    Verification,
    ApiManagement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmAction {
    Revoke,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub key_id: ApiKeyId,
    pub action: ConfirmAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueForm {
    pub application: Application,
    pub name: String,
    pub error: Option<String>,
}

impl Default for IssueForm {
    fn default() -> Self {
        Self {
            application: Application::PaySolutions,
            name: String::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmedAction {
    Revoked(ApiKeyView),
    Deleted(DeleteKeyResponse),
}

/// Operator-side console state. Plain data so it can be stored or shipped
/// between requests; it never holds a key secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSession {
    pub view: ConsoleView,
    pub query: String,
    /// This console's view of its own latest lookup. A result only lands
    /// here if its ticket is the one this session last submitted.
    pub lookup: LookupState,
    pub issue_form: Option<IssueForm>,
    pub pending_confirmation: Option<PendingConfirmation>,
}

impl ConsoleSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn switch_view(&mut self, view: ConsoleView) {
        self.view = view;
    }

    /// Keeps the raw query so a rejected input stays in the search box.
    /// A rejected query leaves `lookup` as it was.
    pub fn submit_query(
        &mut self,
        runtime: &AdapterRuntime,
        raw_query: &str,
    ) -> Result<PendingLookup, AdapterError> {
        self.query = raw_query.to_string();
        let pending = runtime.desk().submit(raw_query)?;
        self.lookup = LookupState::Pending {
            ticket: pending.ticket,
            identifier: pending.identifier.clone(),
        };
        Ok(pending)
    }

    pub fn lookup_ticket(&self) -> Option<LookupTicket> {
        match &self.lookup {
            LookupState::Idle => None,
            LookupState::Pending { ticket, .. }
            | LookupState::Completed { ticket, .. }
            | LookupState::Failed { ticket, .. } => Some(*ticket),
        }
    }

    /// Waits for `pending` and records the result if it still belongs to the
    /// query this session is showing. Older tickets are returned untouched.
    pub async fn settle_query(
        &mut self,
        pending: PendingLookup,
    ) -> Result<LookupDelivery, AdapterError> {
        let ticket = pending.ticket;
        let delivery = pending.settle().await?;
        let awaited = matches!(
            &self.lookup,
            LookupState::Pending { ticket: current, .. } if *current == ticket
        );
        if awaited {
            self.lookup = match &delivery {
                LookupDelivery::Applied(outcome) => LookupState::Completed {
                    ticket,
                    outcome: outcome.clone(),
                },
                LookupDelivery::Failed(reason) => LookupState::Failed {
                    ticket,
                    reason: reason.clone(),
                },
                LookupDelivery::Superseded { current, .. } => LookupState::Failed {
                    ticket,
                    reason: format!("superseded by lookup {}", current.0),
                },
            };
        }
        Ok(delivery)
    }

    pub fn open_issue_form(&mut self) {
        self.issue_form = Some(IssueForm::default());
    }

    pub fn close_issue_form(&mut self) {
        self.issue_form = None;
    }

    /// On success the form closes and the caller gets the only copy of the
    /// secret. On failure the form keeps its input and records the error.
    pub fn submit_issue_form(
        &mut self,
        runtime: &AdapterRuntime,
        now: UnixTimeMs,
    ) -> Result<IssueKeyResponse, AdapterError> {
        let form = self.issue_form.get_or_insert_with(IssueForm::default);
        let req = IssueKeyRequest {
            application: form.application.as_str().to_string(),
            name: form.name.clone(),
        };
        match runtime.issue_key(&req, now) {
            Ok(issued) => {
                self.issue_form = None;
                Ok(issued)
            }
            Err(err) => {
                form.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn request_confirmation(
        &mut self,
        key_id: &str,
        action: ConfirmAction,
    ) -> Result<(), AdapterError> {
        self.pending_confirmation = Some(PendingConfirmation {
            key_id: ApiKeyId::new(key_id)?,
            action,
        });
        Ok(())
    }

    pub fn cancel_confirmation(&mut self) {
        self.pending_confirmation = None;
    }

    /// Applies the pending action. The prompt is consumed whether or not the
    /// registry accepts the change.
    pub fn confirm(
        &mut self,
        runtime: &AdapterRuntime,
        now: UnixTimeMs,
    ) -> Result<ConfirmedAction, AdapterError> {
        let pending = self
            .pending_confirmation
            .take()
            .ok_or(AdapterError::NothingToConfirm)?;
        let yes = Some(ConfirmRequest { confirm: true });
        match pending.action {
            ConfirmAction::Revoke => runtime
                .revoke_key(pending.key_id.as_str(), yes, now)
                .map(ConfirmedAction::Revoked),
            ConfirmAction::Delete => runtime
                .delete_key(pending.key_id.as_str(), yes)
                .map(ConfirmedAction::Deleted),
        }
    }
}
