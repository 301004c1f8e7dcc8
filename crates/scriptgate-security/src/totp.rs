//! RFC 6238 time-based one-time passwords (HMAC-SHA1).
//!
//! Secrets are base32 strings as printed by authenticator enrollment screens.
//! Decoding is case-insensitive and ignores spaces and `=` padding.

use data_encoding::{Encoding, Specification};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

pub const DEFAULT_PERIOD: u64 = 30;
pub const DEFAULT_DIGITS: u32 = 6;
/// Adjacent time steps accepted on either side of "now".
pub const DEFAULT_DRIFT_STEPS: u32 = 1;
/// Larger drift requests are clamped to this.
pub const MAX_DRIFT_STEPS: u32 = 10;

const BASE32_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TotpError {
    #[error("invalid base32 secret: {0}")]
    InvalidSecret(String),

    #[error("period must be greater than zero")]
    ZeroPeriod,

    #[error("digits must be between 1 and 9, got {0}")]
    UnsupportedDigits(u32),

    #[error("timestamp must not be negative, got {0}")]
    NegativeTimestamp(i64),
}

/// Decode a base32 TOTP secret into key bytes.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, TotpError> {
    let cleaned: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if cleaned.is_empty() {
        return Err(TotpError::InvalidSecret("secret is empty".to_string()));
    }

    base32()?
        .decode(cleaned.as_bytes())
        .map_err(|e| TotpError::InvalidSecret(e.to_string()))
}

/// The code for `timestamp` (Unix seconds).
pub fn generate_totp(
    secret: &str,
    timestamp: i64,
    period: u64,
    digits: u32,
) -> Result<String, TotpError> {
    check_params(period, digits)?;
    if timestamp < 0 {
        return Err(TotpError::NegativeTimestamp(timestamp));
    }
    let key = decode_secret(secret)?;
    hotp(&key, timestamp as u64 / period, digits)
}

/// Whether `code` matches the 6-digit, 30-second code at `now`, or at any of
/// the `drift_steps` neighbouring steps on either side. `drift_steps` is
/// clamped to [`MAX_DRIFT_STEPS`].
///
/// Malformed secrets and codes are simply "no match". Every candidate is
/// compared in constant time and none short-circuits.
pub fn verify_totp(secret: &str, code: &str, now: i64, drift_steps: u32) -> bool {
    let code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    if code.len() != DEFAULT_DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(key) = decode_secret(secret) else {
        return false;
    };

    let drift = i64::from(drift_steps.min(MAX_DRIFT_STEPS));
    let period = DEFAULT_PERIOD as i64;
    let mut matched = false;
    for step in -drift..=drift {
        let Some(at) = now.checked_add(step * period).filter(|t| *t >= 0) else {
            continue;
        };
        if let Ok(candidate) = hotp(&key, at as u64 / DEFAULT_PERIOD, DEFAULT_DIGITS) {
            matched |= bool::from(candidate.as_bytes().ct_eq(code.as_bytes()));
        }
    }
    matched
}

fn check_params(period: u64, digits: u32) -> Result<(), TotpError> {
    if period == 0 {
        return Err(TotpError::ZeroPeriod);
    }
    if !(1..=9).contains(&digits) {
        return Err(TotpError::UnsupportedDigits(digits));
    }
    Ok(())
}

/// RFC 4226 HOTP with dynamic truncation.
fn hotp(key: &[u8], counter: u64, digits: u32) -> Result<String, TotpError> {
    let mut mac =
        HmacSha1::new_from_slice(key).map_err(|e| TotpError::InvalidSecret(e.to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]) & 0x7fff_ffff;

    let code = u64::from(binary) % 10u64.pow(digits);
    Ok(format!("{:0width$}", code, width = digits as usize))
}

/// Unpadded RFC 4648 base32 that tolerates non-zero trailing bits.
fn base32() -> Result<Encoding, TotpError> {
    let mut spec = Specification::new();
    spec.symbols.push_str(BASE32_ALPHABET);
    spec.check_trailing_bits = false;
    spec.encoding().map_err(|e| TotpError::InvalidSecret(e.to_string()))
}
