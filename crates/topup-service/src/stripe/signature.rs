//! `Stripe-Signature` header verification.
//!
//! The header has the form `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`. Each
//! `v1` is an HMAC-SHA256 of `"{t}.{raw body}"` keyed with the endpoint's
//! signing secret; any one match is accepted.

use std::time::Duration;

use crate::crypto::{constant_time_eq, hmac_sha256_hex};

use super::client::StripeError;

/// Default maximum age of a signed event.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Verify `header` against the raw request body.
///
/// # Errors
///
/// - `StripeError::InvalidSignature` if the header is malformed or no
///   signature matches.
/// - `StripeError::TimestampOutOfTolerance` if the event is older than
///   `tolerance` relative to `now` (unix seconds).
pub fn verify(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: Duration,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(StripeError::InvalidSignature)?;
    let issued_at: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidSignature)?;

    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature);
    }

    let max_age = i64::try_from(tolerance.as_secs()).unwrap_or(i64::MAX);
    if issued_at < now.saturating_sub(max_age) {
        return Err(StripeError::TimestampOutOfTolerance);
    }

    let expected = hmac_sha256_hex(secret, &[timestamp.as_bytes(), b".", payload]);
    if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        Ok(())
    } else {
        Err(StripeError::InvalidSignature)
    }
}

/// Build a `Stripe-Signature` header for `payload`.
///
/// Used to sign events for local testing.
#[must_use]
pub fn header_for(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let ts = timestamp.to_string();
    let sig = hmac_sha256_hex(secret, &[ts.as_bytes(), b".", payload]);
    format!("t={ts},v1={sig}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    #[test]
    fn accepts_valid_signature() {
        let header = header_for(BODY, SECRET, NOW);
        assert!(verify(BODY, &header, SECRET, DEFAULT_TOLERANCE, NOW).is_ok());
    }

    #[test]
    fn accepts_any_matching_v1() {
        let valid = header_for(BODY, SECRET, NOW);
        let sig = valid.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1=deadbeef,v1={sig}");
        assert!(verify(BODY, &header, SECRET, DEFAULT_TOLERANCE, NOW).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let header = header_for(BODY, SECRET, NOW);
        let tampered = br#"{"id":"evt_2","type":"checkout.session.completed"}"#;
        assert!(matches!(
            verify(tampered, &header, SECRET, DEFAULT_TOLERANCE, NOW),
            Err(StripeError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_wrong_secret() {
        let header = header_for(BODY, "whsec_other", NOW);
        assert!(verify(BODY, &header, SECRET, DEFAULT_TOLERANCE, NOW).is_err());
    }

    #[test]
    fn rejects_old_timestamp() {
        let header = header_for(BODY, SECRET, NOW - 301);
        assert!(matches!(
            verify(BODY, &header, SECRET, DEFAULT_TOLERANCE, NOW),
            Err(StripeError::TimestampOutOfTolerance)
        ));
        let header = header_for(BODY, SECRET, NOW - 300);
        assert!(verify(BODY, &header, SECRET, DEFAULT_TOLERANCE, NOW).is_ok());
    }

    #[test]
    fn rejects_malformed_headers() {
        let no_signature = format!("t={NOW}");
        for header in ["", "t=abc,v1=00", "v1=00", no_signature.as_str()] {
            assert!(
                verify(BODY, header, SECRET, DEFAULT_TOLERANCE, NOW).is_err(),
                "{header:?}"
            );
        }
    }
}
