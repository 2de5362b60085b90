use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccrualClientError {
    #[error("Could not initialize the accrual client: {0}")]
    Initialization(String),
    #[error("The accrual system is rate limiting requests. Retry after: {retry_after:?}")]
    TooManyRequests { retry_after: Option<Duration> },
    #[error("The accrual system reported an internal error")]
    OracleInternalError,
    #[error("Unexpected response status from the accrual system: {0}")]
    UnexpectedStatus(u16),
    #[error("Could not deserialize the accrual system response: {0}")]
    MalformedResponse(String),
    #[error("Could not reach the accrual system: {0}")]
    Transport(String),
}

impl AccrualClientError {
    pub fn is_throttling(&self) -> bool {
        matches!(self, Self::TooManyRequests { .. })
    }

    /// How long the accrual system asked us to wait, if it said so.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::TooManyRequests { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AccrualClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
