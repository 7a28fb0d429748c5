#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::{validate_non_blank, validate_text};
use crate::{ContractViolation, SchemaVersion, Validate};

pub const VERIFICATION_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

const SOURCE_MAX_CHARS: usize = 32;
const CATEGORY_MAX_CHARS: usize = 96;
const DESCRIPTION_MAX_CHARS: usize = 512;

/// Severity reported by a blacklist source. Variant order is severity order,
/// so `Ord` compares `Clear < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Clear,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "CLEAR",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Label shown in the verification summary box.
    pub const fn summary_label(self) -> &'static str {
        match self {
            Self::Clear => "CLEAR",
            Self::Low => "LOW (Caution)",
            Self::Medium => "MEDIUM (Warning)",
            Self::High => "HIGH (Blacklisted)",
        }
    }
}

/// A lookup key: bank account, national ID or phone number. Only surrounding
/// whitespace is normalized; the format itself is not checked.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ContractViolation> {
        let id = Self(raw.as_ref().trim().to_string());
        id.validate()?;
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for Identifier {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_non_blank("identifier", &self.0)?;
        if self.0.trim() != self.0 {
            return Err(ContractViolation::InvalidValue {
                field: "identifier",
                reason: "must be trimmed",
            });
        }
        Ok(())
    }
}

impl TryFrom<String> for Identifier {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub source: String,
    pub risk_category: String,
    pub description: String,
    pub level: RiskLevel,
}

impl EvidenceRecord {
    pub fn v1(
        source: impl Into<String>,
        risk_category: impl Into<String>,
        description: impl Into<String>,
        level: RiskLevel,
    ) -> Result<Self, ContractViolation> {
        let record = Self {
            source: source.into(),
            risk_category: risk_category.into(),
            description: description.into(),
            level,
        };
        record.validate()?;
        Ok(record)
    }
}

impl Validate for EvidenceRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("evidence_record.source", &self.source, SOURCE_MAX_CHARS)?;
        validate_text(
            "evidence_record.risk_category",
            &self.risk_category,
            CATEGORY_MAX_CHARS,
        )?;
        validate_text(
            "evidence_record.description",
            &self.description,
            DESCRIPTION_MAX_CHARS,
        )?;
        Ok(())
    }
}

/// Result of one verification query. Built fresh per query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VerificationOutcomeFields")]
pub struct VerificationOutcome {
    pub schema_version: SchemaVersion,
    pub identifier: Identifier,
    pub matched: bool,
    pub records: Vec<EvidenceRecord>,
    pub aggregate_risk: RiskLevel,
}

impl VerificationOutcome {
    pub fn v1(
        identifier: Identifier,
        records: Vec<EvidenceRecord>,
        aggregate_risk: RiskLevel,
    ) -> Result<Self, ContractViolation> {
        let outcome = Self {
            schema_version: VERIFICATION_CONTRACT_VERSION,
            identifier,
            matched: !records.is_empty(),
            records,
            aggregate_risk,
        };
        outcome.validate()?;
        Ok(outcome)
    }

    pub fn summary_label(&self) -> &'static str {
        self.aggregate_risk.summary_label()
    }
}

#[derive(Deserialize)]
struct VerificationOutcomeFields {
    schema_version: SchemaVersion,
    identifier: Identifier,
    matched: bool,
    records: Vec<EvidenceRecord>,
    aggregate_risk: RiskLevel,
}

impl TryFrom<VerificationOutcomeFields> for VerificationOutcome {
    type Error = ContractViolation;

    fn try_from(fields: VerificationOutcomeFields) -> Result<Self, Self::Error> {
        let outcome = Self {
            schema_version: fields.schema_version,
            identifier: fields.identifier,
            matched: fields.matched,
            records: fields.records,
            aggregate_risk: fields.aggregate_risk,
        };
        outcome.validate()?;
        Ok(outcome)
    }
}

impl Validate for VerificationOutcome {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != VERIFICATION_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "verification_outcome.schema_version",
                reason: "must match VERIFICATION_CONTRACT_VERSION",
            });
        }
        self.identifier.validate()?;
        for record in &self.records {
            record.validate()?;
        }
        if self.matched == self.records.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "verification_outcome.matched",
                reason: "must be true exactly when records are present",
            });
        }
        if self.records.is_empty() != (self.aggregate_risk == RiskLevel::Clear) {
            return Err(ContractViolation::InvalidValue {
                field: "verification_outcome.aggregate_risk",
                reason: "must be CLEAR exactly when no records matched",
            });
        }
        if let Some(worst) = self.records.iter().map(|r| r.level).max() {
            if worst.max(RiskLevel::Low) != self.aggregate_risk {
                return Err(ContractViolation::InvalidValue {
                    field: "verification_outcome.aggregate_risk",
                    reason: "must equal the most severe record level",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: RiskLevel) -> EvidenceRecord {
        EvidenceRecord::v1("CFR", "Brown", "Suspicious transaction patterns.", level).unwrap()
    }

    #[test]
    fn at_verify_contract_01_identifier_is_trimmed() {
        let id = Identifier::new("  0812345678\n").unwrap();
        assert_eq!(id.as_str(), "0812345678");
    }

    #[test]
    fn at_verify_contract_02_blank_identifier_is_rejected() {
        assert!(Identifier::new("").is_err());
        assert!(Identifier::new("   ").is_err());
    }

    #[test]
    fn at_verify_contract_03_identifier_deserialize_validates() {
        let ok: Identifier = serde_json::from_str("\" 1234567890 \"").unwrap();
        assert_eq!(ok.as_str(), "1234567890");
        assert!(serde_json::from_str::<Identifier>("\"  \"").is_err());
    }

    #[test]
    fn at_verify_contract_04_risk_levels_order_by_severity() {
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        assert!(RiskLevel::Low > RiskLevel::Clear);
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"HIGH\"");
    }

    #[test]
    fn at_verify_contract_05_outcome_rejects_inconsistent_aggregate() {
        let id = Identifier::new("1").unwrap();
        assert!(VerificationOutcome::v1(id.clone(), vec![], RiskLevel::Clear).is_ok());
        assert!(VerificationOutcome::v1(id.clone(), vec![], RiskLevel::Low).is_err());
        assert!(
            VerificationOutcome::v1(id.clone(), vec![record(RiskLevel::Medium)], RiskLevel::High)
                .is_err()
        );
        let ok =
            VerificationOutcome::v1(id, vec![record(RiskLevel::Medium)], RiskLevel::Medium).unwrap();
        assert!(ok.matched);
        assert_eq!(ok.summary_label(), "MEDIUM (Warning)");
    }

    #[test]
    fn at_verify_contract_06_clear_record_still_counts_as_a_match() {
        let id = Identifier::new("42").unwrap();
        let out = VerificationOutcome::v1(id, vec![record(RiskLevel::Clear)], RiskLevel::Low)
            .unwrap();
        assert!(out.matched);
        assert_eq!(out.aggregate_risk, RiskLevel::Low);
    }

    #[test]
    fn at_verify_contract_07_long_identifier_is_accepted_verbatim() {
        let raw = "TH".repeat(40);
        let id = Identifier::new(format!("  {raw} ")).unwrap();
        assert_eq!(id.as_str(), raw);
        let from_json: Identifier = serde_json::from_value(serde_json::json!(raw)).unwrap();
        assert_eq!(from_json, id);
    }

    #[test]
    fn at_verify_contract_08_outcome_deserialize_checks_consistency() {
        let id = Identifier::new("0812345678").unwrap();
        let ok = VerificationOutcome::v1(id, vec![record(RiskLevel::Medium)], RiskLevel::Medium)
            .unwrap();
        let json = serde_json::to_value(&ok).unwrap();
        let back: VerificationOutcome = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, ok);

        let mut unmatched = json.clone();
        unmatched["matched"] = serde_json::json!(false);
        assert!(serde_json::from_value::<VerificationOutcome>(unmatched).is_err());

        let mut understated = json.clone();
        understated["aggregate_risk"] = serde_json::json!("LOW");
        assert!(serde_json::from_value::<VerificationOutcome>(understated).is_err());

        let mut cleared = json;
        cleared["records"] = serde_json::json!([]);
        assert!(serde_json::from_value::<VerificationOutcome>(cleared).is_err());
    }
}
