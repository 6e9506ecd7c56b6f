//! # Structured Error Handling
//!
//! Central error enum for the integration core. Remote transport failures
//! carry their own taxonomy in [`crate::resilience::retry`]; everything that
//! crosses a module boundary inside the crate funnels through [`CoreError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Remote system error: {0}")]
    Remote(String),

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error("Orchestration error: {0}")]
    Orchestration(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Orchestration(format!("payload serialization: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
