use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use perch_core::repository::NonceStore;
use perch_core::StoreError;
use perch_domain::DoorNonce;

const CODE_SPACE: u32 = 10_000;
const MAX_DRAWS: u32 = 64;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("door code not found or no longer valid")]
    NotFound,
    #[error("could not draw an unused door code")]
    Exhausted,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues short-lived four-digit door codes. A user holds at most one
/// live code; issuing again returns the existing one.
pub struct NonceIssuer {
    nonces: Arc<dyn NonceStore>,
    ttl: Duration,
}

impl NonceIssuer {
    pub fn new(nonces: Arc<dyn NonceStore>, ttl: Duration) -> Self {
        Self { nonces, ttl }
    }

    pub async fn issue(
        &self,
        user_id: Uuid,
        session_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<DoorNonce, AccessError> {
        self.nonces.expire_stale(now).await?;

        if let Some(existing) = self.nonces.live_nonce_for_user(user_id, now).await? {
            return Ok(existing);
        }

        for _ in 0..MAX_DRAWS {
            let code = format!("{:04}", rand::thread_rng().gen_range(0..CODE_SPACE));
            let nonce = DoorNonce::new(code, user_id, session_id, now, self.ttl);
            if self.nonces.insert(&nonce).await? {
                info!(user_id = %user_id, expires_at = %nonce.expires_at, "issued door code");
                return Ok(nonce);
            }
            // Code collided with someone's live one; draw again.
        }
        Err(AccessError::Exhausted)
    }

    /// Validate a code at the door and burn it.
    pub async fn redeem(&self, code: &str, now: DateTime<Utc>) -> Result<DoorNonce, AccessError> {
        let nonce = self
            .nonces
            .find_live(code, now)
            .await?
            .ok_or(AccessError::NotFound)?;
        self.nonces.invalidate(code).await?;
        info!(user_id = %nonce.user_id, "door code redeemed");
        Ok(nonce)
    }
}
