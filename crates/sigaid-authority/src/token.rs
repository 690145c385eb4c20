//! Lease token sealing: an authenticated `v4.local` envelope.
//!
//! Tokens look like `v4.local.<base64url(nonce || ciphertext || tag)>`.
//! The literal header is bound into the AEAD as associated data, so a
//! token can only ever open under the version and purpose it advertises —
//! no algorithm confusion is possible. The symmetric key is long-lived
//! and never leaves the Authority.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use sigaid_core::{LeaseClaims, TokenError};

/// Envelope header: version 4, local (symmetric) purpose.
pub const TOKEN_HEADER: &str = "v4.local.";

const NONCE_LEN: usize = 24;

/// Seals and opens lease tokens with a long-lived symmetric key.
pub struct TokenSealer {
    key: Zeroizing<[u8; 32]>,
}

impl TokenSealer {
    /// Create a sealer from an existing 32-byte key.
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Generate a sealer with a fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self::new(key)
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(self.key.as_ref()))
    }

    /// Mint a token for the given claims.
    pub fn seal(&self, claims: &LeaseClaims) -> String {
        let payload = serde_json::to_vec(claims).expect("claims always serialize");

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let sealed = self
            .cipher()
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &payload,
                    aad: TOKEN_HEADER.as_bytes(),
                },
            )
            .expect("seal never fails for in-memory payloads");

        let mut body = Vec::with_capacity(NONCE_LEN + sealed.len());
        body.extend_from_slice(&nonce);
        body.extend_from_slice(&sealed);

        format!("{TOKEN_HEADER}{}", URL_SAFE_NO_PAD.encode(body))
    }

    /// Open a token and return its claims without time validation.
    ///
    /// All failures are opaque `TokenError::Invalid`.
    pub fn open(&self, token: &str) -> Result<LeaseClaims, TokenError> {
        let body = token.strip_prefix(TOKEN_HEADER).ok_or(TokenError::Invalid)?;
        let bytes = URL_SAFE_NO_PAD.decode(body).map_err(|_| TokenError::Invalid)?;
        if bytes.len() <= NONCE_LEN {
            return Err(TokenError::Invalid);
        }
        let (nonce, sealed) = bytes.split_at(NONCE_LEN);

        let payload = self
            .cipher()
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: TOKEN_HEADER.as_bytes(),
                },
            )
            .map_err(|_| TokenError::Invalid)?;

        serde_json::from_slice(&payload).map_err(|_| TokenError::Invalid)
    }

    /// Open a token and validate its time claims at `now`.
    pub fn open_valid(&self, token: &str, now: DateTime<Utc>) -> Result<LeaseClaims, TokenError> {
        let claims = self.open(token)?;
        claims.validate_time(now)?;
        Ok(claims)
    }

    /// Build fresh claims for an agent session.
    pub fn claims(
        agent_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
        ttl: Duration,
        seq: u64,
    ) -> LeaseClaims {
        LeaseClaims {
            agent_id: agent_id.to_string(),
            session_id: session_id.to_string(),
            iat: now,
            exp: now + ttl,
            jti: uuid::Uuid::new_v4().to_string(),
            seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> LeaseClaims {
        TokenSealer::claims("aid_x", "sid_y", Utc::now(), Duration::seconds(600), 0)
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let sealer = TokenSealer::generate();
        let c = claims();
        let token = sealer.seal(&c);

        assert!(token.starts_with("v4.local."));
        let opened = sealer.open(&token).unwrap();
        assert_eq!(opened, c);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let sealer = TokenSealer::generate();
        let other = TokenSealer::generate();
        let token = sealer.seal(&claims());

        assert_eq!(other.open(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let sealer = TokenSealer::generate();
        let token = sealer.seal(&claims());

        let mut chars: Vec<char> = token.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        assert_eq!(sealer.open(&tampered), Err(TokenError::Invalid));
    }

    #[test]
    fn test_header_is_load_bearing() {
        let sealer = TokenSealer::generate();
        let token = sealer.seal(&claims());
        let swapped = token.replacen("v4.local.", "v2.local.", 1);

        assert_eq!(sealer.open(&swapped), Err(TokenError::Invalid));
    }

    #[test]
    fn test_expired_token() {
        let sealer = TokenSealer::generate();
        let now = Utc::now();
        let c = TokenSealer::claims("aid_x", "sid_y", now - Duration::seconds(900), Duration::seconds(60), 0);
        let token = sealer.seal(&c);

        assert!(sealer.open(&token).is_ok());
        assert_eq!(sealer.open_valid(&token, now), Err(TokenError::Expired));
    }

    #[test]
    fn test_unique_jti() {
        let a = claims();
        let b = claims();
        assert_ne!(a.jti, b.jti);
    }
}
