use sea_orm::error::DbErr;
use serde::Serialize;
use uuid::Uuid;

/// Domain error taxonomy for the inventory movement engine.
///
/// Domain errors are returned synchronously to the caller and never retried
/// by the engine. Side-effect failures (cache, alerts, audit) are not errors
/// at this level; they are swallowed and logged by the hook surface.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The atomic guard on `available_qty` failed. `available` is the
    /// quantity observed at failure time so the caller can decide whether to
    /// retry with a smaller request.
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    /// The atomic guard on `reserved_qty` failed during a release.
    #[error("Invalid release quantity: requested {requested}, reserved {reserved}")]
    InvalidReleaseQuantity { requested: i32, reserved: i32 },

    /// A movement with this idempotency key was inserted concurrently. The
    /// engine resolves this by returning the original movement; callers only
    /// see it if the original cannot be read back.
    #[error("Duplicate idempotency key: {0}")]
    DuplicateIdempotencyKey(String),

    /// The underlying store failed to commit; no partial state was left.
    /// Transient, safe for the caller to retry.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Whether the caller may safely retry the operation as-is.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::TransactionAborted(_) | ServiceError::ConcurrentModification(_)
        )
    }
}
