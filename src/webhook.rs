//! Webhook verification and decode pipeline.
//!
//! A delivery is checked against the shared secret before its body is looked
//! at. Only a verified (or policy-trusted) delivery is decoded, and the event
//! header selects which canonical [`Event`] variant the body decodes into.

use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use sha1::Sha1;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::scm::{Event, ScmError, Verification, Webhook};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    HmacSha256,
    HmacSha1,
}

/// A header carrying a hex encoded HMAC of the raw body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureHeader {
    pub name: &'static str,
    pub algorithm: Algorithm,
    /// Literal prefix before the hex digest, e.g. `sha256=`
    pub prefix: &'static str,
}

/// Header layout of one provider's deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookScheme {
    pub event_header: &'static str,
    pub delivery_header: &'static str,
    /// Accepted signature headers, most preferred first. Empty when the
    /// provider does not sign deliveries.
    pub signatures: &'static [SignatureHeader],
}

/// Decodes a verified body for one provider. Returns `Ok(None)` for event
/// types the provider adapter does not model.
pub type Decoder = fn(kind: &str, body: &[u8]) -> Result<Option<Event>, serde_json::Error>;

/// Hex encoded HMAC of `body` under `secret`.
pub fn sign(algorithm: Algorithm, secret: &[u8], body: &[u8]) -> String {
    match algorithm {
        Algorithm::HmacSha256 => hex::encode(mac::<Hmac<Sha256>>(secret, body).finalize().into_bytes()),
        Algorithm::HmacSha1 => hex::encode(mac::<Hmac<Sha1>>(secret, body).finalize().into_bytes()),
    }
}

fn mac<M: Mac + hmac::digest::KeyInit>(secret: &[u8], body: &[u8]) -> M {
    let mut mac = <M as hmac::digest::KeyInit>::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(body);
    mac
}

/// Check `value` (the raw header value) against the expected signature.
/// The comparison runs in constant time.
pub fn verify(header: &SignatureHeader, secret: &[u8], body: &[u8], value: &str) -> bool {
    let Some(digest) = value.trim().strip_prefix(header.prefix) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest) else {
        return false;
    };
    match header.algorithm {
        Algorithm::HmacSha256 => mac::<Hmac<Sha256>>(secret, body).verify_slice(&expected).is_ok(),
        Algorithm::HmacSha1 => mac::<Hmac<Sha1>>(secret, body).verify_slice(&expected).is_ok(),
    }
}

/// Run a delivery through verification and decoding.
pub fn parse(
    scheme: &HookScheme,
    decode: Decoder,
    headers: &HeaderMap,
    body: &[u8],
    secret: Option<&str>,
) -> Result<Webhook, ScmError> {
    let kind = header(headers, scheme.event_header).ok_or_else(|| {
        ScmError::Validation(format!("missing {} header", scheme.event_header))
    })?;
    let delivery = header(headers, scheme.delivery_header).map(str::to_string);

    let verification = match (secret, scheme.signatures.is_empty()) {
        (Some(secret), false) => {
            if !signature_matches(scheme, headers, secret.as_bytes(), body) {
                warn!(event = kind, delivery = ?delivery, "webhook signature rejected");
                return Err(ScmError::SignatureInvalid);
            }
            Verification::Signature
        }
        _ => Verification::Policy,
    };
    debug!(event = kind, delivery = ?delivery, verification = ?verification, "webhook accepted");

    let decoded = decode(kind, body).map_err(|source| ScmError::Decode {
        op: "parse_webhook",
        target: kind.to_string(),
        source,
    })?;
    let event = match decoded {
        Some(event) => event,
        None => Event::Unknown {
            kind: kind.to_string(),
            payload: serde_json::from_slice(body).map_err(|source| ScmError::Decode {
                op: "parse_webhook",
                target: kind.to_string(),
                source,
            })?,
        },
    };

    Ok(Webhook {
        event,
        delivery,
        verification,
    })
}

/// Uses the first signature header present; a missing header fails closed.
fn signature_matches(scheme: &HookScheme, headers: &HeaderMap, secret: &[u8], body: &[u8]) -> bool {
    scheme
        .signatures
        .iter()
        .find_map(|sig| header(headers, sig.name).map(|value| (sig, value)))
        .is_some_and(|(sig, value)| verify(sig, secret, body, value))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const SCHEME: HookScheme = HookScheme {
        event_header: "x-test-event",
        delivery_header: "x-test-delivery",
        signatures: &[
            SignatureHeader {
                name: "x-test-signature-256",
                algorithm: Algorithm::HmacSha256,
                prefix: "sha256=",
            },
            SignatureHeader {
                name: "x-test-signature",
                algorithm: Algorithm::HmacSha1,
                prefix: "sha1=",
            },
        ],
    };

    const UNSIGNED: HookScheme = HookScheme {
        event_header: "x-test-event",
        delivery_header: "x-test-delivery",
        signatures: &[],
    };

    fn decode_ping(kind: &str, _body: &[u8]) -> Result<Option<Event>, serde_json::Error> {
        if kind == "ping" {
            panic!("decoder must not run");
        }
        Ok(None)
    }

    fn headers(pairs: &[(&'static str, String)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    const BODY: &[u8] = br#"{"zen":"Design for failure."}"#;

    #[test]
    fn test_known_hmac_sha256_vector() {
        // RFC 4231 test case 2
        let sig = sign(Algorithm::HmacSha256, b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_correct_secret_verifies_for_every_algorithm() {
        for sig in SCHEME.signatures {
            let value = format!("{}{}", sig.prefix, sign(sig.algorithm, b"S", BODY));
            let h = headers(&[
                ("x-test-event", "zen".to_string()),
                (sig.name, value),
            ]);
            let hook = parse(&SCHEME, decode_ping, &h, BODY, Some("S")).unwrap();
            assert_eq!(hook.verification, Verification::Signature);
        }
    }

    #[test]
    fn test_wrong_secret_rejected_for_every_algorithm() {
        for sig in SCHEME.signatures {
            let value = format!("{}{}", sig.prefix, sign(sig.algorithm, b"S", BODY));
            let h = headers(&[
                ("x-test-event", "ping".to_string()),
                (sig.name, value),
            ]);
            let err = parse(&SCHEME, decode_ping, &h, BODY, Some("S'")).unwrap_err();
            assert!(matches!(err, ScmError::SignatureInvalid));
        }
    }

    #[test]
    fn test_tampered_body_rejected() {
        let value = format!("sha256={}", sign(Algorithm::HmacSha256, b"S", BODY));
        let h = headers(&[
            ("x-test-event", "ping".to_string()),
            ("x-test-signature-256", value),
        ]);
        let tampered = br#"{"zen":"Design for success."}"#;
        let err = parse(&SCHEME, decode_ping, &h, tampered, Some("S")).unwrap_err();
        assert!(matches!(err, ScmError::SignatureInvalid));
    }

    #[test]
    fn test_missing_signature_fails_closed() {
        let h = headers(&[("x-test-event", "ping".to_string())]);
        let err = parse(&SCHEME, decode_ping, &h, BODY, Some("S")).unwrap_err();
        assert!(matches!(err, ScmError::SignatureInvalid));
    }

    #[test]
    fn test_garbled_signature_rejected() {
        let h = headers(&[
            ("x-test-event", "ping".to_string()),
            ("x-test-signature-256", "sha256=not-hex".to_string()),
        ]);
        let err = parse(&SCHEME, decode_ping, &h, BODY, Some("S")).unwrap_err();
        assert!(matches!(err, ScmError::SignatureInvalid));

        let digest = sign(Algorithm::HmacSha256, b"S", BODY);
        let h = headers(&[
            ("x-test-event", "ping".to_string()),
            ("x-test-signature-256", digest),
        ]);
        let err = parse(&SCHEME, decode_ping, &h, BODY, Some("S")).unwrap_err();
        assert!(matches!(err, ScmError::SignatureInvalid), "prefix is required");
    }

    #[test]
    fn test_unsigned_provider_is_trusted_by_policy() {
        let h = headers(&[
            ("x-test-event", "zen".to_string()),
            ("x-test-delivery", "72d3162e".to_string()),
        ]);
        let hook = parse(&UNSIGNED, decode_ping, &h, BODY, Some("S")).unwrap();
        assert_eq!(hook.verification, Verification::Policy);
        assert_eq!(hook.delivery.as_deref(), Some("72d3162e"));
    }

    #[test]
    fn test_no_secret_is_trusted_by_policy() {
        let h = headers(&[("x-test-event", "zen".to_string())]);
        let hook = parse(&SCHEME, decode_ping, &h, BODY, None).unwrap();
        assert_eq!(hook.verification, Verification::Policy);
    }

    #[test]
    fn test_unknown_event_keeps_payload() {
        let h = headers(&[("x-test-event", "zen".to_string())]);
        let hook = parse(&UNSIGNED, decode_ping, &h, BODY, None).unwrap();
        match hook.event {
            Event::Unknown { kind, payload } => {
                assert_eq!(kind, "zen");
                assert_eq!(payload["zen"], "Design for failure.");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_missing_event_header_is_validation_error() {
        let err = parse(&UNSIGNED, decode_ping, &HeaderMap::new(), BODY, None).unwrap_err();
        assert!(matches!(err, ScmError::Validation(_)));
    }
}
