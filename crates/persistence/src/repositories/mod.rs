//! Repository implementations for database operations.

pub mod event;
pub mod organization;
pub mod user;

pub use event::PgEventRepository;
pub use organization::PgOrganizationRepository;
pub use user::PgUserRepository;

use domain::repositories::StoreError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Maps a sqlx error onto the storage error of the domain layer.
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => StoreError::Conflict(db_err.message().to_string()),
            Some(FOREIGN_KEY_VIOLATION) => StoreError::NotFound,
            _ => StoreError::Backend(err.to_string()),
        },
        _ => {
            tracing::error!(error = %err, "Database error");
            StoreError::Backend(err.to_string())
        }
    }
}
