pub mod app_config;
pub mod database;
pub mod memory;
pub mod nonce_repo;
pub mod seat_repo;
pub mod session_repo;
pub mod user_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use nonce_repo::PgNonceStore;
pub use seat_repo::PgSeatStore;
pub use session_repo::PgSessionStore;
pub use user_repo::PgUserStore;

use perch_core::StoreError;

/// Map a sqlx failure onto the engine-facing error taxonomy.
pub(crate) fn db_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("40001") => {
            // Serialization failure under SERIALIZABLE isolation.
            StoreError::TransactionAborted(db.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(err.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}
