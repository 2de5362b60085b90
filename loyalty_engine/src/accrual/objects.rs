use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// The order states reported by the accrual system.
///
/// Values the accrual system might add in future are kept in `Other` so that a single unexpected status fails just
/// the order that carries it, rather than the whole response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccrualStatus {
    New,
    Processing,
    Invalid,
    Processed,
    Other(String),
}

impl From<String> for AccrualStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "NEW" => Self::New,
            "PROCESSING" => Self::Processing,
            "INVALID" => Self::Invalid,
            "PROCESSED" => Self::Processed,
            _ => Self::Other(value),
        }
    }
}

impl From<AccrualStatus> for String {
    fn from(value: AccrualStatus) -> Self {
        value.to_string()
    }
}

impl Display for AccrualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Invalid => write!(f, "INVALID"),
            Self::Processed => write!(f, "PROCESSED"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// The body of a successful `GET /api/orders/{number}` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    /// Points awarded, in major units. Only present for `PROCESSED` orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Number>,
}

impl AccrualResponse {
    pub fn new(order: impl Into<String>, status: AccrualStatus) -> Self {
        Self { order: order.into(), status, accrual: None }
    }

    pub fn with_accrual(mut self, accrual: impl Into<Number>) -> Self {
        self.accrual = Some(accrual.into());
        self
    }
}
