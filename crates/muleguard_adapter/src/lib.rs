#![forbid(unsafe_code)]

pub mod config;
pub mod desk;
pub mod lookup_session;
pub mod session;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use muleguard_contracts::api_keys::{
    ApiKeyId, ApiKeyIssueRequest, ApiKeyRecord, ApiKeyStatus, Application,
};
use muleguard_contracts::verification::{EvidenceRecord, RiskLevel, VerificationOutcome};
use muleguard_contracts::{ContractViolation, UnixTimeMs};
use muleguard_engines::source_registry::StaticSourceRegistry;
use muleguard_storage::api_keys::{ApiKeyStore, KeyLifecycleAction, StorageError};
use muleguard_storage::repo::ApiKeyRepo;
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::config::ConsoleConfig;
use crate::desk::VerificationDesk;
use crate::lookup_session::{LookupDelivery, LookupSession, LookupTicket};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("invalid input: {0}")]
    Validation(#[from] ContractViolation),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{} requires explicit confirmation", .action.as_str())]
    ConfirmationRequired { action: KeyLifecycleAction },
    #[error("no destructive action is awaiting confirmation")]
    NothingToConfirm,
    #[error("lookup {} was superseded by lookup {}", .ticket.0, .current.0)]
    Superseded {
        ticket: LookupTicket,
        current: LookupTicket,
    },
    #[error("lookup task failed: {0}")]
    LookupTaskFailed(String),
    #[error("adapter state lock poisoned")]
    LockPoisoned,
}

impl AdapterError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Storage(StorageError::ContractViolation(_)) => "validation",
            Self::Storage(StorageError::NotFound { .. }) => "not_found",
            Self::Storage(StorageError::StateConflict { .. }) => "state_conflict",
            Self::ConfirmationRequired { .. } => "confirmation_required",
            Self::NothingToConfirm => "nothing_to_confirm",
            Self::Superseded { .. } => "superseded",
            Self::LookupTaskFailed(_) | Self::LockPoisoned => "internal",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self.kind() {
            "validation" | "nothing_to_confirm" => 400,
            "not_found" => 404,
            "state_conflict" | "superseded" => 409,
            "confirmation_required" => 428,
            _ => 500,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            error: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub error: String,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AdapterError> {
    mutex.lock().map_err(|_| AdapterError::LockPoisoned)
}

pub fn now_unix_ms() -> UnixTimeMs {
    UnixTimeMs(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1)
            .max(1),
    )
}

/// `YYYY-MM-DD HH:MM:SS` in UTC, matching the console's table column.
pub fn format_timestamp(at: UnixTimeMs) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(at.0) * 1_000_000)
        .ok()
        .and_then(|dt| dt.format(&format).ok())
        .unwrap_or_else(|| at.0.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationView {
    pub ticket: u64,
    pub identifier: String,
    pub matched: bool,
    pub aggregate_risk: RiskLevel,
    pub summary_label: String,
    pub records: Vec<EvidenceRecord>,
}

impl VerificationView {
    fn from_outcome(ticket: LookupTicket, outcome: VerificationOutcome) -> Self {
        Self {
            ticket: ticket.0,
            identifier: outcome.identifier.to_string(),
            matched: outcome.matched,
            aggregate_risk: outcome.aggregate_risk,
            summary_label: outcome.summary_label().to_string(),
            records: outcome.records,
        }
    }
}

/// Read projection of a registry row. Never carries the full secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyView {
    pub id: String,
    pub application: String,
    pub name: String,
    pub display_key: String,
    pub status: ApiKeyStatus,
    pub created_at: String,
    pub revoked_at: Option<String>,
}

impl From<&ApiKeyRecord> for ApiKeyView {
    fn from(record: &ApiKeyRecord) -> Self {
        Self {
            id: record.id.to_string(),
            application: record.application.as_str().to_string(),
            name: record.name.clone(),
            display_key: record.display_key.as_str().to_string(),
            status: record.status,
            created_at: format_timestamp(record.created_at),
            revoked_at: record.revoked_at.map(format_timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueKeyRequest {
    pub application: String,
    pub name: String,
}

/// Returned exactly once per key; `secret` is not retrievable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueKeyResponse {
    pub key: ApiKeyView,
    pub secret: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteKeyResponse {
    pub deleted_id: String,
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub key_count: usize,
    pub applications: Vec<String>,
}

/// In-process API behind the console: verification desk plus key registry.
pub struct AdapterRuntime {
    desk: VerificationDesk,
    keys: Mutex<Box<dyn ApiKeyRepo + Send>>,
}

impl AdapterRuntime {
    pub fn new(desk: VerificationDesk, keys: Box<dyn ApiKeyRepo + Send>) -> Self {
        Self {
            desk,
            keys: Mutex::new(keys),
        }
    }

    pub fn from_config(config: &ConsoleConfig) -> Result<Self, AdapterError> {
        let source = Arc::new(StaticSourceRegistry::demo()?);
        let desk = VerificationDesk::new(source, config.lookup_latency);
        let keys: Box<dyn ApiKeyRepo + Send> = if config.seed_demo_keys {
            Box::new(ApiKeyStore::with_demo_rows()?)
        } else {
            Box::new(ApiKeyStore::new_in_memory())
        };
        Ok(Self::new(desk, keys))
    }

    pub fn desk(&self) -> &VerificationDesk {
        &self.desk
    }

    pub fn lookup_session(&self) -> Result<LookupSession, AdapterError> {
        self.desk.session_snapshot()
    }

    /// Submits the query and waits for it. A result that lost the race to a
    /// newer query surfaces as `Superseded`.
    pub async fn verify(&self, req: VerifyRequest) -> Result<VerificationView, AdapterError> {
        let pending = self.desk.submit(&req.identifier)?;
        let ticket = pending.ticket;
        match pending.settle().await? {
            LookupDelivery::Applied(outcome) => Ok(VerificationView::from_outcome(ticket, outcome)),
            LookupDelivery::Failed(reason) => Err(AdapterError::LookupTaskFailed(reason)),
            LookupDelivery::Superseded { ticket, current } => {
                Err(AdapterError::Superseded { ticket, current })
            }
        }
    }

    pub fn list_keys(&self) -> Result<Vec<ApiKeyView>, AdapterError> {
        let keys = lock(&self.keys)?;
        Ok(keys
            .api_key_rows_newest_first()
            .into_iter()
            .map(ApiKeyView::from)
            .collect())
    }

    pub fn issue_key(
        &self,
        req: &IssueKeyRequest,
        now: UnixTimeMs,
    ) -> Result<IssueKeyResponse, AdapterError> {
        let application = Application::parse(&req.application)?;
        let issue = ApiKeyIssueRequest::v1(application, &req.name)?;
        let issued = lock(&self.keys)?.issue_api_key_row(issue, now)?;
        Ok(IssueKeyResponse {
            key: ApiKeyView::from(&issued.record),
            secret: issued.secret.into_inner(),
        })
    }

    /// `confirm` is `None` when the request carried no body; that counts as
    /// not confirmed.
    pub fn revoke_key(
        &self,
        id: &str,
        confirm: Option<ConfirmRequest>,
        now: UnixTimeMs,
    ) -> Result<ApiKeyView, AdapterError> {
        let id = ApiKeyId::new(id)?;
        require_confirmation(confirm, KeyLifecycleAction::Revoke)?;
        let record = lock(&self.keys)?.revoke_api_key_row(&id, now)?;
        Ok(ApiKeyView::from(&record))
    }

    pub fn delete_key(
        &self,
        id: &str,
        confirm: Option<ConfirmRequest>,
    ) -> Result<DeleteKeyResponse, AdapterError> {
        let id = ApiKeyId::new(id)?;
        require_confirmation(confirm, KeyLifecycleAction::Delete)?;
        let mut keys = lock(&self.keys)?;
        let removed = keys.delete_api_key_row(&id)?;
        Ok(DeleteKeyResponse {
            deleted_id: removed.id.to_string(),
            remaining: keys.api_key_row_count(),
        })
    }

    pub fn health(&self) -> Result<HealthResponse, AdapterError> {
        Ok(HealthResponse {
            status: "ok".to_string(),
            key_count: lock(&self.keys)?.api_key_row_count(),
            applications: Application::allowed_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }
}

fn require_confirmation(
    confirm: Option<ConfirmRequest>,
    action: KeyLifecycleAction,
) -> Result<(), AdapterError> {
    if confirm.unwrap_or_default().confirm {
        Ok(())
    } else {
        Err(AdapterError::ConfirmationRequired { action })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YES: Option<ConfirmRequest> = Some(ConfirmRequest { confirm: true });
    const NO: Option<ConfirmRequest> = Some(ConfirmRequest { confirm: false });

    fn runtime() -> AdapterRuntime {
        AdapterRuntime::from_config(&ConsoleConfig::default()).unwrap()
    }

    fn issue(rt: &AdapterRuntime, app: &str, name: &str) -> IssueKeyResponse {
        rt.issue_key(
            &IssueKeyRequest {
                application: app.to_string(),
                name: name.to_string(),
            },
            UnixTimeMs(1_700_000_000_000),
        )
        .unwrap()
    }

    #[test]
    fn at_adapter_01_timestamp_matches_console_format() {
        assert_eq!(
            format_timestamp(UnixTimeMs(1_697_362_200_000)),
            "2023-10-15 09:30:00"
        );
    }

    #[test]
    fn at_adapter_02_issue_returns_secret_once_listing_masks_it() {
        let rt = runtime();
        let issued = issue(&rt, "PaySolutions", "Prod");
        assert_eq!(issued.key.status, ApiKeyStatus::Active);
        assert!(issued.secret.starts_with("sk_live_"));

        let listed = rt.list_keys().unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, issued.key.id);
        let json = serde_json::to_string(&listed).unwrap();
        assert!(!json.contains(&issued.secret));
    }

    #[test]
    fn at_adapter_03_issue_validation_maps_to_400() {
        let rt = runtime();
        let err = rt
            .issue_key(
                &IssueKeyRequest {
                    application: "PaySolutions".to_string(),
                    name: " ".to_string(),
                },
                UnixTimeMs(1),
            )
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
        let err = rt
            .issue_key(
                &IssueKeyRequest {
                    application: "Nope".to_string(),
                    name: "Prod".to_string(),
                },
                UnixTimeMs(1),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(rt.health().unwrap().key_count, 2);
    }

    #[test]
    fn at_adapter_04_destructive_actions_need_confirmation() {
        let rt = runtime();
        let id = issue(&rt, "Kulap", "Temp").key.id;

        let err = rt.revoke_key(&id, NO, UnixTimeMs(2)).unwrap_err();
        assert_eq!(err.http_status(), 428);
        assert_eq!(rt.list_keys().unwrap()[0].status, ApiKeyStatus::Active);

        rt.revoke_key(&id, YES, UnixTimeMs(1_700_000_000_500)).unwrap();
        let err = rt.revoke_key(&id, YES, UnixTimeMs(3)).unwrap_err();
        assert_eq!(err.http_status(), 409);

        assert_eq!(rt.delete_key(&id, NO).unwrap_err().http_status(), 428);
        let deleted = rt.delete_key(&id, YES).unwrap();
        assert_eq!(deleted.deleted_id, id);
        assert_eq!(deleted.remaining, 2);
    }

    #[test]
    fn at_adapter_05_deleting_active_key_is_a_conflict() {
        let rt = runtime();
        let id = issue(&rt, "AssetSafe", "Vault").key.id;
        let err = rt.delete_key(&id, YES).unwrap_err();
        assert_eq!(err.kind(), "state_conflict");
        assert_eq!(rt.health().unwrap().key_count, 3);
    }

    #[test]
    fn at_adapter_06_unknown_key_is_404() {
        let rt = runtime();
        let err = rt.delete_key("ak_424242", YES).unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn at_adapter_07_verify_reports_aggregate_label() {
        let rt = runtime();
        let view = rt
            .verify(VerifyRequest {
                identifier: " 1234567890 ".to_string(),
            })
            .await
            .unwrap();
        assert!(view.matched);
        assert_eq!(view.aggregate_risk, RiskLevel::High);
        assert_eq!(view.summary_label, "HIGH (Blacklisted)");
        let sources: Vec<_> = view.records.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["CCIB", "AMLO"]);
    }

    #[tokio::test]
    async fn at_adapter_08_blank_identifier_is_400() {
        let rt = runtime();
        let err = rt
            .verify(VerifyRequest {
                identifier: "   ".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn at_adapter_09_missing_confirmation_body_is_428() {
        let rt = runtime();
        let id = issue(&rt, "GroupFin", "Batch").key.id;

        let err = rt.revoke_key(&id, None, UnixTimeMs(2)).unwrap_err();
        assert_eq!(err.http_status(), 428);
        assert_eq!(err.kind(), "confirmation_required");
        assert_eq!(rt.list_keys().unwrap()[0].status, ApiKeyStatus::Active);

        let empty: ConfirmRequest = serde_json::from_str("{}").unwrap();
        let err = rt.revoke_key(&id, Some(empty), UnixTimeMs(2)).unwrap_err();
        assert_eq!(err.http_status(), 428);

        rt.revoke_key(&id, YES, UnixTimeMs(1_700_000_000_900)).unwrap();
        assert_eq!(rt.delete_key(&id, None).unwrap_err().http_status(), 428);
        assert_eq!(rt.health().unwrap().key_count, 3);
    }

    #[tokio::test]
    async fn at_adapter_10_long_unknown_identifier_is_clear() {
        let rt = runtime();
        let identifier = "TH".repeat(40);
        let view = rt
            .verify(VerifyRequest {
                identifier: identifier.clone(),
            })
            .await
            .unwrap();
        assert_eq!(view.identifier, identifier);
        assert!(!view.matched);
        assert!(view.records.is_empty());
        assert_eq!(view.aggregate_risk, RiskLevel::Clear);
        assert_eq!(view.summary_label, "CLEAR");
    }
}
