#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(pub u32);

/// Wall-clock instant in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractViolation {
    #[error("{field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{field}: length must be within {min}..={max}, got {got}")]
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
        got: usize,
    },
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

/// Rejects empty and whitespace-only text. No upper bound.
pub fn validate_non_blank(field: &'static str, value: &str) -> Result<(), ContractViolation> {
    if value.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    Ok(())
}

/// Rejects blank text and text longer than `max_chars` characters.
pub fn validate_text(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), ContractViolation> {
    validate_non_blank(field, value)?;
    let got = value.chars().count();
    if got > max_chars {
        return Err(ContractViolation::InvalidLength {
            field,
            min: 1,
            max: max_chars,
            got,
        });
    }
    Ok(())
}
