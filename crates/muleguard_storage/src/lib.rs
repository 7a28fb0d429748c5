#![forbid(unsafe_code)]

pub mod api_keys;
pub mod repo;
