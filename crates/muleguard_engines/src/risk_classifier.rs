#![forbid(unsafe_code)]

use muleguard_contracts::verification::{
    EvidenceRecord, Identifier, RiskLevel, VerificationOutcome,
};
use muleguard_contracts::ContractViolation;

/// Worst-case level across `records`. Only presence of a level matters, not
/// how many records report it. Anything below MEDIUM collapses to LOW.
///
/// Empty input has no defined level; callers map "no records" to CLEAR.
pub fn classify(records: &[EvidenceRecord]) -> Result<RiskLevel, ContractViolation> {
    if records.is_empty() {
        return Err(ContractViolation::InvalidValue {
            field: "classify.records",
            reason: "must not be empty",
        });
    }
    if records.iter().any(|r| r.level == RiskLevel::High) {
        return Ok(RiskLevel::High);
    }
    if records.iter().any(|r| r.level == RiskLevel::Medium) {
        return Ok(RiskLevel::Medium);
    }
    Ok(RiskLevel::Low)
}

/// Builds the outcome for one query: CLEAR with no match when `records` is
/// empty, otherwise the classified aggregate.
pub fn outcome_from_records(
    identifier: Identifier,
    records: Vec<EvidenceRecord>,
) -> Result<VerificationOutcome, ContractViolation> {
    let aggregate = if records.is_empty() {
        RiskLevel::Clear
    } else {
        classify(&records)?
    };
    VerificationOutcome::v1(identifier, records, aggregate)
}
