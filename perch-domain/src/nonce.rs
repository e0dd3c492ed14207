use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A short-lived numeric door-access code bound to a user and,
/// optionally, the session they checked in with. A user holds at most
/// one live nonce at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorNonce {
    /// Four-digit code shown to the door panel.
    pub code: String,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub valid: bool,
}

impl DoorNonce {
    pub fn new(
        code: String,
        user_id: Uuid,
        session_id: Option<Uuid>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            code,
            user_id,
            session_id,
            created_at: now,
            expires_at: now + ttl,
            valid: true,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.valid && now < self.expires_at
    }
}
