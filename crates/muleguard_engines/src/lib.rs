#![forbid(unsafe_code)]

pub mod key_material;
pub mod risk_classifier;
pub mod source_registry;
