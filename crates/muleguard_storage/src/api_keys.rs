#![forbid(unsafe_code)]

use muleguard_contracts::api_keys::{
    ApiKeyId, ApiKeyIssueRequest, ApiKeyRecord, ApiKeySecret, ApiKeyStatus, Application,
    DisplayKey,
};
use muleguard_contracts::{ContractViolation, UnixTimeMs, Validate};
use muleguard_engines::key_material::generate_secret;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

const TABLE: &str = "api_keys";

// 2023-10-15 09:30:00 UTC and 2023-11-02 14:20:00 UTC.
const DEMO_PRODUCTION_CREATED_AT: UnixTimeMs = UnixTimeMs(1_697_362_200_000);
const DEMO_STAGING_CREATED_AT: UnixTimeMs = UnixTimeMs(1_698_934_800_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyLifecycleAction {
    Revoke,
    Delete,
}

impl KeyLifecycleAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Revoke => "revoke",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
    #[error("{table}: no row with key {key}")]
    NotFound { table: &'static str, key: String },
    #[error("{table}: cannot {} key {key} while it is {}", .action.as_str(), .status.as_str())]
    StateConflict {
        table: &'static str,
        key: String,
        action: KeyLifecycleAction,
        status: ApiKeyStatus,
    },
}

/// Result of a successful issue. The only place the full secret ever appears.
#[derive(Debug)]
pub struct IssuedApiKey {
    pub record: ApiKeyRecord,
    pub secret: ApiKeySecret,
}

/// In-memory key registry. Rows are kept in issue order; sequence numbers
/// behind ids are never handed out twice.
#[derive(Debug)]
pub struct ApiKeyStore<R = OsRng> {
    rows: Vec<ApiKeyRecord>,
    next_seq: u64,
    rng: R,
}

impl ApiKeyStore<OsRng> {
    pub fn new_in_memory() -> Self {
        Self::with_rng(OsRng)
    }

    /// Store preloaded with the console's two demo keys.
    pub fn with_demo_rows() -> Result<Self, StorageError> {
        let mut store = Self::new_in_memory();
        store.insert_seed_row(
            Application::PaySolutions,
            "Production Backend",
            DisplayKey::new("sk_live_8f23...a9b1")?,
            ApiKeyStatus::Active,
            DEMO_PRODUCTION_CREATED_AT,
        )?;
        store.insert_seed_row(
            Application::Kulap,
            "Staging API",
            DisplayKey::new("sk_test_4d12...c2e4")?,
            ApiKeyStatus::Revoked,
            DEMO_STAGING_CREATED_AT,
        )?;
        Ok(store)
    }
}

impl<R> ApiKeyStore<R>
where
    R: RngCore + CryptoRng,
{
    pub fn with_rng(rng: R) -> Self {
        Self {
            rows: Vec::new(),
            next_seq: 1,
            rng,
        }
    }

    /// Validates `req`, then creates an `Active` row and returns its secret.
    /// Nothing is generated or stored when validation fails.
    pub fn issue(
        &mut self,
        req: ApiKeyIssueRequest,
        now: UnixTimeMs,
    ) -> Result<IssuedApiKey, StorageError> {
        req.validate()?;
        let secret = generate_secret(&mut self.rng)?;
        let id = ApiKeyId::from_sequence(self.next_seq);
        let record = ApiKeyRecord::v1(
            id,
            req.application,
            req.name,
            secret.display_key(),
            ApiKeyStatus::Active,
            now,
            None,
        )?;
        self.next_seq += 1;
        self.rows.push(record.clone());
        tracing::info!(
            key_id = %record.id,
            application = record.application.as_str(),
            display_key = record.display_key.as_str(),
            "api key issued"
        );
        Ok(IssuedApiKey { record, secret })
    }

    /// Inserts a row whose secret was disclosed elsewhere. Only the masked
    /// form is known.
    pub fn insert_seed_row(
        &mut self,
        application: Application,
        name: &str,
        display_key: DisplayKey,
        status: ApiKeyStatus,
        created_at: UnixTimeMs,
    ) -> Result<ApiKeyId, StorageError> {
        let req = ApiKeyIssueRequest::v1(application, name)?;
        let revoked_at = match status {
            ApiKeyStatus::Active => None,
            ApiKeyStatus::Revoked => Some(created_at),
        };
        let record = ApiKeyRecord::v1(
            ApiKeyId::from_sequence(self.next_seq),
            req.application,
            req.name,
            display_key,
            status,
            created_at,
            revoked_at,
        )?;
        self.next_seq += 1;
        let id = record.id.clone();
        self.rows.push(record);
        Ok(id)
    }

    /// `Active -> Revoked`. Revoking twice is a conflict, not a no-op.
    pub fn revoke(&mut self, id: &ApiKeyId, now: UnixTimeMs) -> Result<ApiKeyRecord, StorageError> {
        let row = self
            .rows
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| not_found(id))?;
        if row.status != ApiKeyStatus::Active {
            tracing::warn!(key_id = %id, "revoke rejected: key already revoked");
            return Err(StorageError::StateConflict {
                table: TABLE,
                key: id.to_string(),
                action: KeyLifecycleAction::Revoke,
                status: row.status,
            });
        }
        row.status = ApiKeyStatus::Revoked;
        row.revoked_at = Some(now.max(row.created_at));
        tracing::info!(key_id = %id, "api key revoked");
        Ok(row.clone())
    }

    /// Removes a revoked row for good. Active keys must be revoked first.
    pub fn delete(&mut self, id: &ApiKeyId) -> Result<ApiKeyRecord, StorageError> {
        let idx = self
            .rows
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| not_found(id))?;
        let status = self.rows[idx].status;
        if status != ApiKeyStatus::Revoked {
            tracing::warn!(key_id = %id, "delete rejected: key is still active");
            return Err(StorageError::StateConflict {
                table: TABLE,
                key: id.to_string(),
                action: KeyLifecycleAction::Delete,
                status,
            });
        }
        let removed = self.rows.remove(idx);
        tracing::info!(key_id = %id, remaining = self.rows.len(), "api key deleted");
        Ok(removed)
    }

    pub fn get(&self, id: &ApiKeyId) -> Option<&ApiKeyRecord> {
        self.rows.iter().find(|r| &r.id == id)
    }

    /// Most recently issued first.
    pub fn list(&self) -> Vec<&ApiKeyRecord> {
        self.rows.iter().rev().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn not_found(id: &ApiKeyId) -> StorageError {
    StorageError::NotFound {
        table: TABLE,
        key: id.to_string(),
    }
}
