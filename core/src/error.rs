use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("Ticket store error: {0}")]
    Upstream(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnalyticsError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// True when the ticket store itself failed (connection, timeout, bad row).
    /// Callers render these as errors, never as "no data".
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
