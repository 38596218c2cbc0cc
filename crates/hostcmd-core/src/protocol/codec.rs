// ============================================
// File: crates/hostcmd-core/src/protocol/codec.rs
// ============================================
//! # Envelope Codec
//!
//! ## Creation Reason
//! Converts envelopes to and from the JSON bytes carried on the bus.
//!
//! ## Parsing Strategy
//! 1. Require valid UTF-8
//! 2. Require a JSON object
//! 3. Check each field in order `cmd`, `ts`, `nonce`, `sig`
//!
//! A missing, null or empty field is reported as *incomplete*; a field of
//! the wrong JSON type or unparseable content is reported as *malformed*.
//!
//! ## Timestamp Leniency
//! Other signers may emit `ts` as a float or as a numeric string. Both are
//! accepted and truncated to whole seconds. Zero counts as missing.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never panic here; every path returns a `CoreError`
//! - Unknown extra fields are ignored
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use serde_json::{Map, Value};

use super::envelope::CommandEnvelope;
use crate::error::{CoreError, Result};

/// Serializes an envelope to JSON bytes.
///
/// # Errors
/// Returns `Encoding` if serialization fails.
pub fn encode_envelope(envelope: &CommandEnvelope) -> Result<Vec<u8>> {
    serde_json::to_vec(envelope).map_err(|e| CoreError::Encoding {
        reason: e.to_string(),
    })
}

/// Decodes an envelope from raw payload bytes.
///
/// # Errors
/// - `MalformedEnvelope` for non-UTF-8, invalid JSON, a non-object, or a
///   field of the wrong type
/// - `IncompleteEnvelope` for a missing or empty field
pub fn decode_envelope(raw: &[u8]) -> Result<CommandEnvelope> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| CoreError::malformed(format!("payload is not UTF-8: {e}")))?;

    let value: Value = serde_json::from_str(text)
        .map_err(|e| CoreError::malformed(format!("invalid JSON: {e}")))?;

    let Value::Object(fields) = value else {
        return Err(CoreError::malformed("payload is not a JSON object"));
    };

    let cmd = string_field(&fields, "cmd")?;
    let ts = timestamp_field(&fields)?;
    let nonce = string_field(&fields, "nonce")?;
    let sig = string_field(&fields, "sig")?;

    Ok(CommandEnvelope { cmd, ts, nonce, sig })
}

fn string_field(fields: &Map<String, Value>, name: &'static str) -> Result<String> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(CoreError::incomplete(name)),
        Some(Value::String(s)) if s.is_empty() => Err(CoreError::incomplete(name)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(CoreError::malformed(format!("field '{name}' is not a string"))),
    }
}

fn timestamp_field(fields: &Map<String, Value>) -> Result<i64> {
    let ts = match fields.get("ts") {
        None | Some(Value::Null) => return Err(CoreError::incomplete("ts")),
        Some(Value::Number(n)) => number_to_secs(n)?,
        Some(Value::String(s)) if s.trim().is_empty() => return Err(CoreError::incomplete("ts")),
        Some(Value::String(s)) => parse_secs(s.trim())?,
        Some(_) => return Err(CoreError::malformed("field 'ts' is not a number")),
    };

    if ts == 0 {
        return Err(CoreError::incomplete("ts"));
    }
    Ok(ts)
}

fn number_to_secs(n: &serde_json::Number) -> Result<i64> {
    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    match n.as_f64() {
        Some(f) => float_to_secs(f),
        None => Err(CoreError::malformed("field 'ts' is out of range")),
    }
}

fn parse_secs(s: &str) -> Result<i64> {
    if let Ok(i) = s.parse::<i64>() {
        return Ok(i);
    }
    s.parse::<f64>()
        .map_err(|_| CoreError::malformed("field 'ts' is not numeric"))
        .and_then(float_to_secs)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_secs(f: f64) -> Result<i64> {
    if !f.is_finite() || f >= i64::MAX as f64 || f <= i64::MIN as f64 {
        return Err(CoreError::malformed("field 'ts' is out of range"));
    }
    Ok(f.trunc() as i64)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommandEnvelope {
        CommandEnvelope {
            cmd: "reboot".into(),
            ts: 1_700_000_000,
            nonce: "00112233445566778899aabbccddeeff".into(),
            sig: "ab".repeat(32),
        }
    }

    #[test]
    fn test_encode_decode() {
        let env = sample();
        let bytes = encode_envelope(&env).unwrap();
        assert_eq!(decode_envelope(&bytes).unwrap(), env);
    }

    #[test]
    fn test_rejects_non_utf8_and_bad_json() {
        assert!(matches!(
            decode_envelope(&[0xff, 0xfe, 0x00]),
            Err(CoreError::MalformedEnvelope { .. })
        ));
        assert!(matches!(
            decode_envelope(b"{not json"),
            Err(CoreError::MalformedEnvelope { .. })
        ));
        assert!(matches!(
            decode_envelope(b"[1,2,3]"),
            Err(CoreError::MalformedEnvelope { .. })
        ));
        assert!(matches!(
            decode_envelope(b"\"reboot\""),
            Err(CoreError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn test_missing_or_empty_fields_are_incomplete() {
        let cases: [(&[u8], &str); 5] = [
            (br#"{"ts":1,"nonce":"a","sig":"b"}"#, "cmd"),
            (br#"{"cmd":"","ts":1,"nonce":"a","sig":"b"}"#, "cmd"),
            (br#"{"cmd":"reboot","ts":0,"nonce":"a","sig":"b"}"#, "ts"),
            (br#"{"cmd":"reboot","ts":1,"nonce":null,"sig":"b"}"#, "nonce"),
            (br#"{"cmd":"reboot","ts":1,"nonce":"a"}"#, "sig"),
        ];

        for (raw, expected) in cases {
            match decode_envelope(raw) {
                Err(CoreError::IncompleteEnvelope { field }) => assert_eq!(field, expected),
                other => panic!("expected incomplete '{expected}', got {other:?}"),
            }
        }
    }

    #[test]
    fn test_wrong_field_types_are_malformed() {
        assert!(matches!(
            decode_envelope(br#"{"cmd":7,"ts":1,"nonce":"a","sig":"b"}"#),
            Err(CoreError::MalformedEnvelope { .. })
        ));
        assert!(matches!(
            decode_envelope(br#"{"cmd":"reboot","ts":"soon","nonce":"a","sig":"b"}"#),
            Err(CoreError::MalformedEnvelope { .. })
        ));
        assert!(matches!(
            decode_envelope(br#"{"cmd":"reboot","ts":[1],"nonce":"a","sig":"b"}"#),
            Err(CoreError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn test_lenient_timestamps() {
        let float = decode_envelope(br#"{"cmd":"reboot","ts":1700000000.9,"nonce":"a","sig":"b"}"#)
            .unwrap();
        assert_eq!(float.ts, 1_700_000_000);

        let string = decode_envelope(br#"{"cmd":"reboot","ts":"1700000000","nonce":"a","sig":"b"}"#)
            .unwrap();
        assert_eq!(string.ts, 1_700_000_000);
    }

    #[test]
    fn test_extra_fields_ignored() {
        let env = decode_envelope(
            br#"{"cmd":"reboot","ts":5,"nonce":"a","sig":"b","extra":{"x":1}}"#,
        )
        .unwrap();
        assert_eq!(env.cmd, "reboot");
    }
}
