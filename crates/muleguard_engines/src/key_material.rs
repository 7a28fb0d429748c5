#![forbid(unsafe_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use muleguard_contracts::api_keys::{ApiKeySecret, SECRET_SCHEME_PREFIX};
use muleguard_contracts::ContractViolation;
use rand::{CryptoRng, RngCore};

pub const SECRET_ENTROPY_BYTES: usize = 24;
/// Encoded length of the random body: 24 bytes in unpadded base64.
pub const SECRET_BODY_CHARS: usize = 32;

/// Draws a fresh key from `rng`. The bound on `CryptoRng` keeps weak
/// generators out at compile time.
pub fn generate_secret<R>(rng: &mut R) -> Result<ApiKeySecret, ContractViolation>
where
    R: RngCore + CryptoRng,
{
    let mut entropy = [0u8; SECRET_ENTROPY_BYTES];
    rng.fill_bytes(&mut entropy);
    let body = URL_SAFE_NO_PAD.encode(entropy);
    ApiKeySecret::new(format!("{SECRET_SCHEME_PREFIX}{body}"))
}
