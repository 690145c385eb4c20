//! Canonical byte layouts for everything that is signed or hashed.
//!
//! One rule everywhere: fixed-size fields are written raw, variable fields
//! are prefixed with their 4-byte big-endian length. Timestamps are always
//! the single RFC 3339 form produced by [`format_timestamp`]. The same
//! inputs produce identical bytes on every platform.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::crypto::{Blake3Hash, Ed25519Signature};
use crate::error::CoreError;

/// Append a variable-length field with its 4-byte big-endian length prefix.
pub fn put_bytes(buf: &mut Vec<u8>, field: &[u8]) {
    buf.extend_from_slice(&(field.len() as u32).to_be_bytes());
    buf.extend_from_slice(field);
}

/// Append a UTF-8 string field (length-prefixed).
pub fn put_str(buf: &mut Vec<u8>, field: &str) {
    put_bytes(buf, field.as_bytes());
}

/// Append a u64 as 8 big-endian bytes.
pub fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// The canonical textual timestamp: RFC 3339 UTC with microsecond
/// precision and a `Z` suffix. Every signed or hashed timestamp uses this
/// exact form.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::InvalidTimestamp(format!("{s}: {e}")))
}

/// Standard Base64 encoding used on the wire.
pub fn b64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Standard Base64 decoding.
pub fn b64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(s)
}

/// Serde adapter for canonical timestamps.
pub mod ts {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_timestamp(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(d)?;
        parse_timestamp(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for Base64-encoded byte vectors.
pub mod b64 {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&b64_encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        b64_decode(&s).map_err(serde::de::Error::custom)
    }
}

/// The message a client signs when requesting a lease:
/// `agent_id || session_id || ts || nonce || ttl`, variable fields
/// length-prefixed.
pub fn lease_request_bytes(
    agent_id: &str,
    session_id: &str,
    timestamp: DateTime<Utc>,
    nonce: &[u8],
    ttl_seconds: u64,
) -> Vec<u8> {
    let mut buf = Vec::new();
    put_str(&mut buf, agent_id);
    put_str(&mut buf, session_id);
    put_str(&mut buf, &format_timestamp(timestamp));
    put_bytes(&mut buf, nonce);
    put_u64(&mut buf, ttl_seconds);
    buf
}

/// The signable portion of a state entry: all fields except `signature`
/// and `entry_hash`.
#[allow(clippy::too_many_arguments)]
pub fn entry_signable_bytes(
    agent_id: &str,
    sequence: u64,
    prev_hash: &Blake3Hash,
    timestamp: DateTime<Utc>,
    action_type: &str,
    action_summary: &str,
    action_data_hash: &Blake3Hash,
) -> Vec<u8> {
    let mut buf = Vec::new();
    put_str(&mut buf, agent_id);
    put_u64(&mut buf, sequence);
    buf.extend_from_slice(prev_hash.as_bytes());
    put_str(&mut buf, &format_timestamp(timestamp));
    put_str(&mut buf, action_type);
    put_str(&mut buf, action_summary);
    buf.extend_from_slice(action_data_hash.as_bytes());
    buf
}

/// The signable portion of a proof bundle: all fields except
/// `bundle_signature`. The state head is committed by its entry hash
/// (zero for an agent with no chain yet).
pub fn bundle_signable_bytes(
    agent_id: &str,
    lease_token: &str,
    state_head_hash: &Blake3Hash,
    challenge: &[u8],
    challenge_signature: &Ed25519Signature,
    bundle_timestamp: DateTime<Utc>,
) -> Vec<u8> {
    let mut buf = Vec::new();
    put_str(&mut buf, agent_id);
    put_str(&mut buf, lease_token);
    buf.extend_from_slice(state_head_hash.as_bytes());
    put_bytes(&mut buf, challenge);
    buf.extend_from_slice(challenge_signature.as_bytes());
    put_str(&mut buf, &format_timestamp(bundle_timestamp));
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let formatted = format_timestamp(ts);
        assert_eq!(formatted, "2026-03-14T09:26:53.000000Z");
        assert_eq!(parse_timestamp(&formatted).unwrap(), ts);
    }

    #[test]
    fn test_put_bytes_layout() {
        let mut buf = Vec::new();
        put_bytes(&mut buf, b"abc");
        assert_eq!(buf, vec![0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_lease_request_bytes_deterministic() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let b1 = lease_request_bytes("aid_x", "sid_y", ts, &[1, 2, 3], 60);
        let b2 = lease_request_bytes("aid_x", "sid_y", ts, &[1, 2, 3], 60);
        assert_eq!(b1, b2);

        let b3 = lease_request_bytes("aid_x", "sid_y", ts, &[1, 2, 3], 61);
        assert_ne!(b1, b3);
    }

    #[test]
    fn test_entry_bytes_field_shift_is_distinct() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let zero = Blake3Hash::ZERO;
        let a = entry_signable_bytes("aid_x", 0, &zero, ts, "custom", "ab", &zero);
        let b = entry_signable_bytes("aid_x", 0, &zero, ts, "customa", "b", &zero);
        assert_ne!(a, b);
    }
}
