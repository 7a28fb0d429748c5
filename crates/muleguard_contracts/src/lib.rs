#![forbid(unsafe_code)]

pub mod api_keys;
pub mod common;
pub mod verification;

pub use common::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};
