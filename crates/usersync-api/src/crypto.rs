//! Cryptographic verification of identity-provider webhook deliveries.
//!
//! Implements the provider's HMAC-SHA256 scheme: the signed content is
//! `"{id}.{timestamp}.{body}"` over the raw request body bytes, signatures
//! arrive base64-encoded as space-separated `v1,<mac>` candidates, and the
//! timestamp carries a tolerance window for replay protection.
//!
//! Verification must run against the exact bytes that were signed. Never
//! re-serialize the payload before verifying; any re-encoding changes the
//! bytes and rejects a genuine delivery.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, UNIX_EPOCH},
};

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use usersync_core::Clock;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the unique delivery id.
pub const ID_HEADER: &str = "webhook-id";

/// Header carrying the delivery timestamp in unix seconds.
pub const TIMESTAMP_HEADER: &str = "webhook-timestamp";

/// Header carrying the space-separated signature candidates.
pub const SIGNATURE_HEADER: &str = "webhook-signature";

/// Prefix on shared secrets whose remainder is a base64-encoded key.
const SECRET_PREFIX: &str = "whsec_";

/// Signature version this service accepts. Candidates with other version
/// prefixes are skipped, not rejected.
const SIGNATURE_VERSION: &str = "v1";

/// Webhook verification failures.
///
/// All variants are reported uniformly to the caller; a delivery that
/// fails any check is granted no partial trust.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// A required header is absent or not valid UTF-8.
    MissingHeader(&'static str),
    /// The timestamp header is not an integer.
    InvalidTimestamp,
    /// The timestamp lies outside the tolerance window.
    TimestampOutOfTolerance {
        /// Observed skew between now and the delivery timestamp, seconds.
        skew_secs: i64,
    },
    /// The shared secret could not be decoded into a key.
    InvalidSecret,
    /// No signature candidate matched the expected MAC.
    SignatureMismatch,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeader(name) => write!(f, "missing required header: {name}"),
            Self::InvalidTimestamp => write!(f, "timestamp header is not an integer"),
            Self::TimestampOutOfTolerance { skew_secs } => {
                write!(f, "timestamp outside tolerance window (skew {skew_secs}s)")
            },
            Self::InvalidSecret => write!(f, "invalid signing secret"),
            Self::SignatureMismatch => write!(f, "signature verification failed"),
        }
    }
}

impl std::error::Error for VerifyError {}

/// Verifies webhook deliveries against the shared signing secret.
///
/// Cheap to clone; holds the decoded key, the tolerance window, and the
/// clock used for replay protection.
#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
    tolerance: Duration,
    clock: Arc<dyn Clock>,
}

impl WebhookVerifier {
    /// Creates a verifier from the shared secret.
    ///
    /// Secrets prefixed with `whsec_` are base64-decoded; anything else is
    /// used as the raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::InvalidSecret` for an empty secret or a
    /// prefixed secret that is not valid base64.
    pub fn new(
        secret: &str,
        tolerance: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, VerifyError> {
        let key = decode_secret(secret)?;
        Ok(Self { key, tolerance, clock })
    }

    /// Verifies a delivery. Pure validation; no side effects.
    ///
    /// # Errors
    ///
    /// Returns a `VerifyError` for a missing header, a malformed or stale
    /// timestamp, or when no signature candidate matches.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), VerifyError> {
        let id = header_str(headers, ID_HEADER)?;
        let timestamp = header_str(headers, TIMESTAMP_HEADER)?;
        let signatures = header_str(headers, SIGNATURE_HEADER)?;

        self.check_timestamp(timestamp)?;

        let expected = self.sign(id, timestamp, body)?;

        for candidate in signatures.split_ascii_whitespace() {
            let Some((version, mac)) = candidate.split_once(',') else { continue };
            if version != SIGNATURE_VERSION {
                continue;
            }
            if timing_safe_eq(mac.as_bytes(), expected.as_bytes()) {
                return Ok(());
            }
        }

        Err(VerifyError::SignatureMismatch)
    }

    /// Computes the base64 MAC for a delivery.
    ///
    /// Exposed so tests and operational tooling can construct valid
    /// deliveries.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::InvalidSecret` if the key cannot initialize
    /// the MAC.
    pub fn sign(&self, id: &str, timestamp: &str, body: &[u8]) -> Result<String, VerifyError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| VerifyError::InvalidSecret)?;

        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);

        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    fn check_timestamp(&self, raw: &str) -> Result<(), VerifyError> {
        let timestamp: i64 = raw.parse().map_err(|_| VerifyError::InvalidTimestamp)?;

        let now = self
            .clock
            .now_system()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let now = i64::try_from(now).unwrap_or(i64::MAX);

        let skew = now - timestamp;
        if skew.unsigned_abs() > self.tolerance.as_secs() {
            return Err(VerifyError::TimestampOutOfTolerance { skew_secs: skew });
        }

        Ok(())
    }
}

/// Decodes the shared secret into raw key bytes.
fn decode_secret(secret: &str) -> Result<Vec<u8>, VerifyError> {
    if secret.is_empty() {
        return Err(VerifyError::InvalidSecret);
    }

    match secret.strip_prefix(SECRET_PREFIX) {
        Some(encoded) => BASE64.decode(encoded).map_err(|_| VerifyError::InvalidSecret),
        None => Ok(secret.as_bytes().to_vec()),
    }
}

/// Reads a header as a string slice.
fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, VerifyError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(VerifyError::MissingHeader(name))
}

/// Timing-safe byte comparison to prevent timing attacks.
fn timing_safe_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.iter().zip(b.iter()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}
