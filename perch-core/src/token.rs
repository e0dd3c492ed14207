use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm,
};
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token key must be exactly 32 bytes, got {0}")]
    KeyLength(usize),
    #[error("token key is not valid base64")]
    KeyEncoding,
    #[error("token encryption failed")]
    Encrypt,
}

/// Mints opaque session tokens.
///
/// Identity material (seat id, user id, a seconds + nanoseconds
/// timestamp, and a per-session salt) is hashed with SHA-256, the
/// digest is encrypted under the server key with AES-256-GCM and a
/// fresh random nonce, and the nonce-prefixed ciphertext is emitted as
/// URL-safe base64. Unpredictability comes from the random nonce and
/// the advancing timestamp; the only side effect is entropy
/// consumption. Mint failure is an error, and callers abort the
/// reservation rather than persist a blank token.
pub struct TokenMinter {
    cipher: Aes256Gcm,
}

impl TokenMinter {
    pub fn new(key: &[u8]) -> Result<Self, TokenError> {
        if key.len() != 32 {
            return Err(TokenError::KeyLength(key.len()));
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| TokenError::KeyLength(key.len()))?;
        Ok(Self { cipher })
    }

    /// Build from the standard-base64 key carried in configuration.
    pub fn from_base64(encoded: &str) -> Result<Self, TokenError> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|_| TokenError::KeyEncoding)?;
        Self::new(&key)
    }

    pub fn mint(
        &self,
        seat_id: Uuid,
        user_id: Uuid,
        salt: &[u8],
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let mut hasher = Sha256::new();
        hasher.update(seat_id.as_bytes());
        hasher.update(user_id.as_bytes());
        hasher.update(now.timestamp().to_le_bytes());
        hasher.update(now.timestamp_subsec_nanos().to_le_bytes());
        hasher.update(salt);
        let digest = hasher.finalize();

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, digest.as_slice())
            .map_err(|_| TokenError::Encrypt)?;

        let mut buf = nonce.to_vec();
        buf.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const KEY: [u8; 32] = [7u8; 32];

    #[test]
    fn short_key_rejected() {
        assert!(matches!(
            TokenMinter::new(&[0u8; 16]),
            Err(TokenError::KeyLength(16))
        ));
    }

    #[test]
    fn base64_key_yields_a_working_minter() {
        let minter = TokenMinter::from_base64(&STANDARD.encode(KEY)).unwrap();
        minter
            .mint(Uuid::new_v4(), Uuid::new_v4(), b"salt", Utc::now())
            .unwrap();

        assert!(matches!(
            TokenMinter::from_base64("!!not base64!!"),
            Err(TokenError::KeyEncoding)
        ));
        // Valid encoding, wrong key size.
        assert!(matches!(
            TokenMinter::from_base64(&STANDARD.encode([1u8; 16])),
            Err(TokenError::KeyLength(16))
        ));
    }

    #[test]
    fn token_is_url_safe_and_nonce_prefixed() {
        let minter = TokenMinter::new(&KEY).unwrap();
        let token = minter
            .mint(Uuid::new_v4(), Uuid::new_v4(), b"salt", Utc::now())
            .unwrap();
        let raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        // 12-byte nonce plus ciphertext of a 32-byte digest.
        assert!(raw.len() > 12 + 32);
    }

    #[test]
    fn ten_thousand_mints_do_not_collide() {
        let minter = TokenMinter::new(&KEY).unwrap();
        let seat = Uuid::new_v4();
        let user = Uuid::new_v4();
        let now = Utc::now();

        // Same identity material every time: uniqueness must come
        // from the random nonce alone.
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let token = minter.mint(seat, user, b"salt", now).unwrap();
            assert!(seen.insert(token), "token collision");
        }
    }
}
