#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use muleguard_contracts::verification::{EvidenceRecord, Identifier, RiskLevel};
use muleguard_contracts::ContractViolation;

/// A read-only provider of blacklist evidence.
pub trait EvidenceSource: Send + Sync {
    /// Exact-match lookup. An empty result means no source reported the
    /// identifier.
    fn lookup(&self, identifier: &Identifier) -> Vec<EvidenceRecord>;
}

/// In-memory registry keyed by exact identifier string.
#[derive(Debug, Clone, Default)]
pub struct StaticSourceRegistry {
    entries: BTreeMap<Identifier, Vec<EvidenceRecord>>,
}

impl StaticSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the console's demo rows.
    pub fn demo() -> Result<Self, ContractViolation> {
        let mut registry = Self::new();
        registry.insert(
            Identifier::new("1234567890")?,
            EvidenceRecord::v1(
                "CCIB",
                "Blacklist (บัญชีม้าดำ)",
                "A police report has been filed by a victim.",
                RiskLevel::High,
            )?,
        );
        registry.insert(
            Identifier::new("1234567890")?,
            EvidenceRecord::v1(
                "AMLO",
                "Dark Gray (บัญชีม้า เทาเข้ม)",
                "Account is involved in an active money laundering case.",
                RiskLevel::High,
            )?,
        );
        registry.insert(
            Identifier::new("0812345678")?,
            EvidenceRecord::v1(
                "CFR",
                "Brown (บัญชีม้าน้ำตาล)",
                "Suspicious transaction patterns detected.",
                RiskLevel::Medium,
            )?,
        );
        Ok(registry)
    }

    /// Appends `record` to the evidence already held for `identifier`.
    pub fn insert(&mut self, identifier: Identifier, record: EvidenceRecord) {
        self.entries.entry(identifier).or_default().push(record);
    }

    pub fn identifier_count(&self) -> usize {
        self.entries.len()
    }
}

impl EvidenceSource for StaticSourceRegistry {
    fn lookup(&self, identifier: &Identifier) -> Vec<EvidenceRecord> {
        let records = self.entries.get(identifier).cloned().unwrap_or_default();
        tracing::debug!(
            identifier = %identifier,
            matches = records.len(),
            "source registry lookup"
        );
        records
    }
}
