use thiserror::Error;

use crate::models::notification::NotificationType;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Notification {0} not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A notification with request_id '{0}' already exists")]
    DuplicateRequestId(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for IntakeError {
    fn from(error: StoreError) -> Self {
        IntakeError::Storage(error.to_string())
    }
}

/// Uniform fault contract of the directory and render clients.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("resolution failed: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("provider rejected delivery: {0}")]
    Rejected(String),

    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Failure of one attempt of the worker's resolve-render-deliver unit.
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("User {user_id} has no {channel} contact")]
    MissingContact {
        user_id: String,
        channel: NotificationType,
    },

    #[error("User lookup failed: {0}")]
    Directory(ResolutionError),

    #[error("Failed to render template: {0}")]
    Render(ResolutionError),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

impl ProcessingError {
    /// Failures that no amount of retrying will fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProcessingError::UserNotFound(_) | ProcessingError::MissingContact { .. }
        )
    }
}
