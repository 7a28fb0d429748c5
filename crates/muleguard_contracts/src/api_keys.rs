#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::{validate_non_blank, validate_text};
use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const API_KEYS_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const SECRET_SCHEME_PREFIX: &str = "sk_live_";
/// Scheme prefixes a masked key may carry. Issued secrets always use
/// `SECRET_SCHEME_PREFIX`; test-mode rows keep their own prefix.
pub const DISPLAY_KEY_PREFIXES: &[&str] = &[SECRET_SCHEME_PREFIX, "sk_test_"];
pub const DISPLAY_KEY_ELISION: &str = "...";
pub const DISPLAY_KEY_EDGE_CHARS: usize = 4;

/// Consumer applications allowed to hold keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Application {
    PaySolutions,
    Kulap,
    GroupFin,
    AssetSafe,
}

impl Application {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PaySolutions => "PaySolutions",
            Self::Kulap => "Kulap",
            Self::GroupFin => "GroupFin",
            Self::AssetSafe => "AssetSafe",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[Self::PaySolutions, Self::Kulap, Self::GroupFin, Self::AssetSafe]
    }

    /// Exact, case-sensitive match on the registered name after trimming.
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        Self::all()
            .iter()
            .copied()
            .find(|app| app.as_str() == trimmed)
            .ok_or(ContractViolation::InvalidValue {
                field: "api_key.application",
                reason: "must be one of the registered applications",
            })
    }

    pub fn allowed_names() -> Vec<&'static str> {
        Self::all().iter().map(|app| app.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApiKeyId(String);

impl ApiKeyId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = Self(raw.into());
        id.validate()?;
        Ok(id)
    }

    /// Registry ids are derived from a sequence number that is never reused.
    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("ak_{seq:06}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ApiKeyId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("api_key.id", &self.0, 32)?;
        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ContractViolation::InvalidValue {
                field: "api_key.id",
                reason: "must contain only [A-Za-z0-9_-]",
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiKeyStatus {
    Active,
    Revoked,
}

impl ApiKeyStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Revoked => "Revoked",
        }
    }
}

/// Full key value. Handed out once by the registry at issue time and never
/// stored. `Debug` output is redacted.
#[derive(PartialEq, Eq)]
pub struct ApiKeySecret(String);

impl ApiKeySecret {
    pub fn new(raw: String) -> Result<Self, ContractViolation> {
        let Some(body) = raw.strip_prefix(SECRET_SCHEME_PREFIX) else {
            return Err(ContractViolation::InvalidValue {
                field: "api_key.secret",
                reason: "must start with the sk_live_ scheme prefix",
            });
        };
        if body.chars().count() < DISPLAY_KEY_EDGE_CHARS * 2 + 1 {
            return Err(ContractViolation::InvalidValue {
                field: "api_key.secret",
                reason: "body is too short to mask",
            });
        }
        if !body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ContractViolation::InvalidValue {
                field: "api_key.secret",
                reason: "body must be url-safe",
            });
        }
        Ok(Self(raw))
    }

    /// The random part after the scheme prefix.
    pub fn body(&self) -> &str {
        &self.0[SECRET_SCHEME_PREFIX.len()..]
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn display_key(&self) -> DisplayKey {
        let body = self.body();
        let head = &body[..DISPLAY_KEY_EDGE_CHARS];
        let tail = &body[body.len() - DISPLAY_KEY_EDGE_CHARS..];
        DisplayKey(format!(
            "{SECRET_SCHEME_PREFIX}{head}{DISPLAY_KEY_ELISION}{tail}"
        ))
    }
}

impl std::fmt::Debug for ApiKeySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKeySecret({})", self.display_key().as_str())
    }
}

/// Masked key shown in listings: scheme prefix, first and last four body
/// characters, the rest elided.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayKey(String);

impl DisplayKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let key = Self(raw.into());
        key.validate()?;
        Ok(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for DisplayKey {
    fn validate(&self) -> Result<(), ContractViolation> {
        let Some(masked) = DISPLAY_KEY_PREFIXES
            .iter()
            .find_map(|prefix| self.0.strip_prefix(*prefix))
        else {
            return Err(ContractViolation::InvalidValue {
                field: "api_key.display_key",
                reason: "must start with the sk_live_ or sk_test_ scheme prefix",
            });
        };
        let Some((head, tail)) = masked.split_once(DISPLAY_KEY_ELISION) else {
            return Err(ContractViolation::InvalidValue {
                field: "api_key.display_key",
                reason: "must contain the elision marker",
            });
        };
        if head.chars().count() != DISPLAY_KEY_EDGE_CHARS
            || tail.chars().count() != DISPLAY_KEY_EDGE_CHARS
        {
            return Err(ContractViolation::InvalidValue {
                field: "api_key.display_key",
                reason: "must reveal exactly four leading and four trailing characters",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyIssueRequest {
    pub application: Application,
    pub name: String,
}

impl ApiKeyIssueRequest {
    /// Name is trimmed before validation.
    pub fn v1(application: Application, name: &str) -> Result<Self, ContractViolation> {
        let req = Self {
            application,
            name: name.trim().to_string(),
        };
        req.validate()?;
        Ok(req)
    }
}

impl Validate for ApiKeyIssueRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_non_blank("api_key.name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub schema_version: SchemaVersion,
    pub id: ApiKeyId,
    pub application: Application,
    pub name: String,
    pub display_key: DisplayKey,
    pub status: ApiKeyStatus,
    pub created_at: UnixTimeMs,
    pub revoked_at: Option<UnixTimeMs>,
}

impl ApiKeyRecord {
    pub fn v1(
        id: ApiKeyId,
        application: Application,
        name: String,
        display_key: DisplayKey,
        status: ApiKeyStatus,
        created_at: UnixTimeMs,
        revoked_at: Option<UnixTimeMs>,
    ) -> Result<Self, ContractViolation> {
        let record = Self {
            schema_version: API_KEYS_CONTRACT_VERSION,
            id,
            application,
            name,
            display_key,
            status,
            created_at,
            revoked_at,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn is_active(&self) -> bool {
        self.status == ApiKeyStatus::Active
    }
}

impl Validate for ApiKeyRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != API_KEYS_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "api_key_record.schema_version",
                reason: "must match API_KEYS_CONTRACT_VERSION",
            });
        }
        self.id.validate()?;
        validate_non_blank("api_key.name", &self.name)?;
        self.display_key.validate()?;
        match (self.status, self.revoked_at) {
            (ApiKeyStatus::Active, Some(_)) => Err(ContractViolation::InvalidValue {
                field: "api_key_record.revoked_at",
                reason: "must be absent while the key is active",
            }),
            (ApiKeyStatus::Revoked, Some(at)) if at < self.created_at => {
                Err(ContractViolation::InvalidValue {
                    field: "api_key_record.revoked_at",
                    reason: "must not precede created_at",
                })
            }
            _ => Ok(()),
        }
    }
}
