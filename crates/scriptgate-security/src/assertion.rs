//! Signed security assertions: issuing and verifying.
//!
//! The signature is the lowercase hex HMAC-SHA256 of the RFC 8785 canonical
//! JSON of every assertion field except `signature`. Verification works on
//! the raw JSON value the caller sent, so fields this version does not know
//! about are still covered by the signature.

use hmac::{Hmac, Mac};
use rand::Rng;
use serde_json::{Map, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use scriptgate_contracts::gate::SecurityAssertion;

use crate::{config::GateConfig, identity::normalize_user_id};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_FIELD: &str = "signature";

// ── Rejections ───────────────────────────────────────────────────────────────

/// Why an assertion was not accepted. The `Display` text becomes the gate's
/// blocking reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateRejection {
    #[error("missing security_assertion{}", hint_suffix(.hint))]
    MissingAssertion { hint: Option<String> },

    #[error("security gate signing key not configured")]
    SigningKeyMissing,

    #[error("security_assertion must be a JSON object")]
    NotAnObject,

    #[error("invalid security_assertion signature")]
    BadSignature,

    #[error("malformed security_assertion timestamps")]
    MalformedTimestamps,

    #[error("malformed security_assertion: {reason}")]
    Malformed { reason: String },

    #[error("security_assertion is not yet valid (verified_at {verified_at} is in the future)")]
    NotYetValid { verified_at: i64 },

    #[error("security_assertion expired at {expires_at}")]
    Expired { expires_at: i64 },

    #[error("security_assertion is stale ({age_secs}s old, max {max_age_secs}s)")]
    Stale { age_secs: i64, max_age_secs: i64 },

    #[error("security_assertion user does not match the expected user")]
    WrongUser,

    #[error("security_assertion verification method '{found}' does not match required '{required}'")]
    WrongMethod { required: String, found: String },

    #[error("security_assertion has no session binding")]
    MissingSessionBinding,

    #[error("security_assertion session binding does not match")]
    WrongSessionBinding,
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) => format!("; verify out of band: {hint}"),
        None => String::new(),
    }
}

/// Failures while issuing an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssertionError {
    #[error("signing key must not be empty")]
    EmptySigningKey,

    #[error("user_id must not be empty")]
    EmptyUserId,

    #[error("timestamps must be positive, got verified_at={verified_at} expires_at={expires_at}")]
    NonPositiveTimestamp { verified_at: i64, expires_at: i64 },

    #[error("expires_at ({expires_at}) must be after verified_at ({verified_at})")]
    InvalidWindow { verified_at: i64, expires_at: i64 },

    #[error("failed to encode assertion: {0}")]
    Encoding(String),
}

// ── Signing ──────────────────────────────────────────────────────────────────

/// Failures while computing a signature.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("canonical encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("unusable HMAC key: {0}")]
    Key(#[from] hmac::digest::InvalidLength),
}

/// Canonical JSON of `fields` without the signature.
pub fn canonical_payload(fields: &Map<String, Value>) -> Result<String, serde_json::Error> {
    let mut unsigned = fields.clone();
    unsigned.remove(SIGNATURE_FIELD);
    serde_jcs::to_string(&unsigned)
}

/// Hex HMAC-SHA256 of `fields` (minus any `signature`) under `signing_key`.
pub fn sign_fields(fields: &Map<String, Value>, signing_key: &str) -> Result<String, SigningError> {
    let payload = canonical_payload(fields)?;
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes())?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

// ── Issuing ──────────────────────────────────────────────────────────────────

/// Parameters for [`create_assertion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionRequest {
    pub user_id: String,
    pub verification_method: String,
    /// Defaults to `now`.
    pub verified_at: Option<i64>,
    /// Defaults to `verified_at + ttl_secs`.
    pub expires_at: Option<i64>,
    pub ttl_secs: i64,
    pub session_binding: Option<String>,
}

impl AssertionRequest {
    /// A TOTP-verified request with the default lifetime.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            verification_method: crate::config::DEFAULT_REQUIRED_METHOD.to_string(),
            verified_at: None,
            expires_at: None,
            ttl_secs: crate::config::DEFAULT_ASSERTION_TTL_SECS,
            session_binding: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.verification_method = method.into();
        self
    }

    pub fn with_session_binding(mut self, binding: impl Into<String>) -> Self {
        self.session_binding = Some(binding.into());
        self
    }

    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn verified_at(mut self, verified_at: i64) -> Self {
        self.verified_at = Some(verified_at);
        self
    }

    pub fn expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Issue a signed assertion with a fresh random nonce.
pub fn create_assertion(
    request: &AssertionRequest,
    signing_key: &str,
    now: i64,
) -> Result<SecurityAssertion, AssertionError> {
    if signing_key.is_empty() {
        return Err(AssertionError::EmptySigningKey);
    }
    let user_id = normalize_user_id(&request.user_id);
    if user_id.is_empty() {
        return Err(AssertionError::EmptyUserId);
    }

    let verified_at = request.verified_at.unwrap_or(now);
    let expires_at = request.expires_at.unwrap_or(verified_at.saturating_add(request.ttl_secs));
    if verified_at <= 0 || expires_at <= 0 {
        return Err(AssertionError::NonPositiveTimestamp { verified_at, expires_at });
    }
    if expires_at <= verified_at {
        return Err(AssertionError::InvalidWindow { verified_at, expires_at });
    }

    let nonce: [u8; 16] = rand::thread_rng().gen();
    let mut assertion = SecurityAssertion {
        user_id,
        verified_at,
        expires_at,
        verification_method: request.verification_method.trim().to_string(),
        nonce: hex::encode(nonce),
        session_binding: request.session_binding.clone(),
        signature: String::new(),
    };

    let fields = match serde_json::to_value(&assertion) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(AssertionError::Encoding("assertion is not an object".to_string())),
        Err(e) => return Err(AssertionError::Encoding(e.to_string())),
    };
    assertion.signature =
        sign_fields(&fields, signing_key).map_err(|e| AssertionError::Encoding(e.to_string()))?;
    Ok(assertion)
}

// ── Verification ─────────────────────────────────────────────────────────────

/// Check `value` against `config` at `now` (Unix seconds).
///
/// Checks run in a fixed order and the first failure wins: signing key
/// present, signature, timestamps well-formed, not from the future, not
/// expired, not stale, user, verification method, session binding.
pub fn verify_assertion(
    value: &Value,
    config: &GateConfig,
    now: i64,
) -> Result<SecurityAssertion, GateRejection> {
    let signing_key = config.signing_key().ok_or(GateRejection::SigningKeyMissing)?;
    let fields = value.as_object().ok_or(GateRejection::NotAnObject)?;

    let provided = fields
        .get(SIGNATURE_FIELD)
        .and_then(Value::as_str)
        .ok_or(GateRejection::BadSignature)?;
    let expected = sign_fields(fields, signing_key).map_err(|_| GateRejection::BadSignature)?;
    if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        return Err(GateRejection::BadSignature);
    }

    let verified_at = positive_int(fields.get("verified_at")).ok_or(GateRejection::MalformedTimestamps)?;
    let expires_at = positive_int(fields.get("expires_at")).ok_or(GateRejection::MalformedTimestamps)?;
    if expires_at < verified_at {
        return Err(GateRejection::MalformedTimestamps);
    }
    if verified_at > now.saturating_add(config.clock_skew_secs) {
        return Err(GateRejection::NotYetValid { verified_at });
    }
    if now > expires_at {
        return Err(GateRejection::Expired { expires_at });
    }
    let age_secs = now - verified_at;
    if age_secs > config.max_age_secs {
        return Err(GateRejection::Stale { age_secs, max_age_secs: config.max_age_secs });
    }

    let assertion: SecurityAssertion = serde_json::from_value(value.clone())
        .map_err(|e| GateRejection::Malformed { reason: e.to_string() })?;

    if let Some(expected_user) = non_empty(&config.expected_user_id) {
        if normalize_user_id(&assertion.user_id) != normalize_user_id(expected_user) {
            return Err(GateRejection::WrongUser);
        }
    }

    if let Some(required) = non_empty(&config.required_method) {
        if !assertion.verification_method.trim().eq_ignore_ascii_case(required) {
            return Err(GateRejection::WrongMethod {
                required: required.to_string(),
                found: assertion.verification_method.clone(),
            });
        }
    }

    if let Some(expected_binding) = non_empty(&config.expected_session_binding) {
        match assertion.session_binding.as_deref().map(str::trim) {
            None | Some("") => return Err(GateRejection::MissingSessionBinding),
            Some(binding) if binding != expected_binding => {
                return Err(GateRejection::WrongSessionBinding)
            }
            Some(_) => {}
        }
    }

    Ok(assertion)
}

/// Integers only; `1.5`, `"60"` and non-positive values are rejected.
fn positive_int(value: Option<&Value>) -> Option<i64> {
    value.and_then(Value::as_i64).filter(|v| *v > 0)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
