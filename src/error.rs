use thiserror::Error;

/// Failures the dashboard can tell apart and surface to the user.
#[derive(Debug, Error)]
pub enum HealthError {
    /// Transport failure, non-2xx status, or unreadable body.
    #[error("balances fetch failed: {0}")]
    FetchFailed(String),
    /// The body arrived but does not have the expected shape.
    #[error("malformed balances response: {0}")]
    MalformedResponse(String),
    #[error("limit storage error: {0}")]
    Storage(String),
}

impl HealthError {
    pub fn kind(&self) -> &'static str {
        match self {
            HealthError::FetchFailed(_) => "fetch_failed",
            HealthError::MalformedResponse(_) => "malformed_response",
            HealthError::Storage(_) => "storage",
        }
    }
}

impl From<rusqlite::Error> for HealthError {
    fn from(err: rusqlite::Error) -> Self {
        HealthError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for HealthError {
    fn from(err: reqwest::Error) -> Self {
        HealthError::FetchFailed(err.to_string())
    }
}
